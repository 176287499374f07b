//! Procedure signatures and the signature DSL
//!
//! A signature is declared as `name(arg, ..., kw=Type) -> Return`. Bare
//! entries are positional declarations and only carry a type; `kw=Type`
//! entries are keyword declarations. Positional declarations must come
//! first. The argument list and the return clause are both optional.
//!
//! ```rust
//! use omnirpc_json_rpc_server::signature::ProcedureSignature;
//! use omnirpc_json_rpc_server::types::TypeTag;
//!
//! let sig = ProcedureSignature::parse(None, &[], "echo(message=String) -> String").unwrap();
//! assert_eq!(sig.method_name(), "echo");
//! assert_eq!(sig.arguments()[0].type_tag, TypeTag::String);
//! assert_eq!(sig.render(), "echo(message=String) -> String");
//! ```

use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use serde::Serialize;

use crate::error::SignatureError;
use crate::types::TypeTag;

lazy_static::lazy_static! {
    static ref SIGNATURE_RE: Regex = Regex::new(
        r"^\s*(?P<method>[A-Za-z0-9._]+)\s*(?:\((?P<args>[^()]*)\)\s*(?:->\s*(?P<ret>\S.*?))?)?\s*$"
    )
    .unwrap();
    static ref KEYWORD_ARG_RE: Regex =
        Regex::new(r"^\s*(?P<name>[A-Za-z0-9_]+)\s*=\s*(?P<ty>[A-Za-z]+)\s*$").unwrap();
}

/// How an argument was declared in the DSL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentKind {
    Positional,
    Keyword,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureArgument {
    pub name: String,
    pub type_tag: TypeTag,
    pub kind: ArgumentKind,
}

impl SignatureArgument {
    fn positional(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            type_tag,
            kind: ArgumentKind::Positional,
        }
    }
}

/// Parsed callable contract of a procedure.
/// Argument order is declaration order and names are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureSignature {
    method_name: String,
    arguments: Vec<SignatureArgument>,
    return_type: TypeTag,
}

impl ProcedureSignature {
    /// Parse `signature_text`, seeding the argument list from the handler's own
    /// parameter names (all `Any`) before explicit declarations are applied.
    ///
    /// An empty `signature_text` names the method after `handler_name`.
    pub fn parse(
        handler_name: Option<&str>,
        declared_parameter_names: &[String],
        signature_text: &str,
    ) -> Result<Self, SignatureError> {
        let mut arguments = Vec::with_capacity(declared_parameter_names.len());
        for name in declared_parameter_names {
            if arguments.iter().any(|a: &SignatureArgument| &a.name == name) {
                return Err(SignatureError::DuplicateArgument {
                    name: name.clone(),
                    signature: signature_text.to_string(),
                });
            }
            arguments.push(SignatureArgument::positional(name.clone(), TypeTag::Any));
        }

        if signature_text.trim().is_empty() {
            let method_name = handler_name.ok_or_else(|| SignatureError::Unnamed {
                signature: signature_text.to_string(),
            })?;
            return Ok(Self {
                method_name: method_name.to_string(),
                arguments,
                return_type: TypeTag::Any,
            });
        }

        let malformed = || SignatureError::Malformed {
            signature: signature_text.to_string(),
        };
        let caps = SIGNATURE_RE.captures(signature_text).ok_or_else(malformed)?;
        let method_name = caps.name("method").ok_or_else(malformed)?.as_str().to_string();

        if let Some(args) = caps.name("args").map(|m| m.as_str().trim()) {
            if !args.is_empty() {
                Self::apply_declarations(&mut arguments, args, signature_text)?;
            }
        }

        // Everything after the first keyword declaration can only be written
        // as `name=Type`; record it that way so rendering re-parses identically.
        if let Some(first_kw) = arguments
            .iter()
            .position(|a| a.kind == ArgumentKind::Keyword)
        {
            for arg in &mut arguments[first_kw..] {
                arg.kind = ArgumentKind::Keyword;
            }
        }

        let return_type = match caps.name("ret") {
            Some(ret) => TypeTag::decode(ret.as_str(), signature_text)?,
            None => TypeTag::Any,
        };

        Ok(Self {
            method_name,
            arguments,
            return_type,
        })
    }

    fn apply_declarations(
        arguments: &mut Vec<SignatureArgument>,
        args: &str,
        signature_text: &str,
    ) -> Result<(), SignatureError> {
        let mut explicit: HashSet<String> = HashSet::new();
        let mut seen_keyword = false;

        for (index, fragment) in args.split(',').enumerate() {
            if fragment.contains('=') {
                let kw = KEYWORD_ARG_RE.captures(fragment).ok_or_else(|| {
                    SignatureError::InvalidArgument {
                        fragment: fragment.trim().to_string(),
                        signature: signature_text.to_string(),
                    }
                })?;
                let name = kw["name"].to_string();
                let type_tag = TypeTag::decode(&kw["ty"], signature_text)?;
                if !explicit.insert(name.clone()) {
                    return Err(SignatureError::DuplicateArgument {
                        name,
                        signature: signature_text.to_string(),
                    });
                }
                seen_keyword = true;
                match arguments.iter_mut().find(|a| a.name == name) {
                    Some(existing) => {
                        existing.type_tag = type_tag;
                        existing.kind = ArgumentKind::Keyword;
                    }
                    None => arguments.push(SignatureArgument {
                        name,
                        type_tag,
                        kind: ArgumentKind::Keyword,
                    }),
                }
            } else {
                let fragment = fragment.trim();
                if seen_keyword {
                    return Err(SignatureError::PositionalAfterKeyword {
                        fragment: fragment.to_string(),
                        signature: signature_text.to_string(),
                    });
                }
                if fragment.is_empty() {
                    return Err(SignatureError::InvalidArgument {
                        fragment: fragment.to_string(),
                        signature: signature_text.to_string(),
                    });
                }
                let type_tag = TypeTag::decode(fragment, signature_text)?;
                if let Some(existing) = arguments.get_mut(index) {
                    existing.type_tag = type_tag;
                    explicit.insert(existing.name.clone());
                } else {
                    let name = index.to_string();
                    if arguments.iter().any(|a| a.name == name) {
                        return Err(SignatureError::DuplicateArgument {
                            name,
                            signature: signature_text.to_string(),
                        });
                    }
                    explicit.insert(name.clone());
                    arguments.push(SignatureArgument::positional(name, type_tag));
                }
            }
        }
        Ok(())
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn arguments(&self) -> &[SignatureArgument] {
        &self.arguments
    }

    pub fn return_type(&self) -> TypeTag {
        self.return_type
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    /// Declared index of an argument name
    pub fn position(&self, name: &str) -> Option<usize> {
        self.arguments.iter().position(|a| a.name == name)
    }

    pub fn argument_names(&self) -> Vec<String> {
        self.arguments.iter().map(|a| a.name.clone()).collect()
    }

    /// Inject a synthetic leading positional argument
    pub fn prepend_argument(
        &mut self,
        name: impl Into<String>,
        type_tag: TypeTag,
    ) -> Result<(), SignatureError> {
        let name = name.into();
        if self.position(&name).is_some() {
            return Err(SignatureError::DuplicateArgument {
                name,
                signature: self.render(),
            });
        }
        self.arguments
            .insert(0, SignatureArgument::positional(name, type_tag));
        Ok(())
    }

    /// The signature as seen by the handler once `skip` leading synthetic
    /// arguments have been consumed
    pub fn without_leading(&self, skip: usize) -> Self {
        Self {
            method_name: self.method_name.clone(),
            arguments: self.arguments.iter().skip(skip).cloned().collect(),
            return_type: self.return_type,
        }
    }

    /// Canonical DSL text for this signature
    pub fn render(&self) -> String {
        let args: Vec<String> = self
            .arguments
            .iter()
            .map(|a| match a.kind {
                ArgumentKind::Positional => a.type_tag.to_string(),
                ArgumentKind::Keyword => format!("{}={}", a.name, a.type_tag),
            })
            .collect();
        format!(
            "{}({}) -> {}",
            self.method_name,
            args.join(", "),
            self.return_type
        )
    }
}

impl fmt::Display for ProcedureSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_keyword_signature() {
        let sig = ProcedureSignature::parse(None, &[], "echo(message=String) -> String").unwrap();
        assert_eq!(sig.method_name(), "echo");
        assert_eq!(sig.len(), 1);
        assert_eq!(sig.arguments()[0].name, "message");
        assert_eq!(sig.arguments()[0].kind, ArgumentKind::Keyword);
        assert_eq!(sig.return_type(), TypeTag::String);
    }

    #[test]
    fn test_positional_names_from_handler_then_ordinal() {
        let sig = ProcedureSignature::parse(None, &names(&["a"]), "f(String, Number)").unwrap();
        assert_eq!(sig.arguments()[0].name, "a");
        assert_eq!(sig.arguments()[0].type_tag, TypeTag::String);
        assert_eq!(sig.arguments()[1].name, "1");
        assert_eq!(sig.arguments()[1].type_tag, TypeTag::Number);
        assert_eq!(sig.return_type(), TypeTag::Any);
    }

    #[test]
    fn test_bare_name_backfills_from_handler() {
        let sig =
            ProcedureSignature::parse(None, &names(&["string"]), "jsonrpc.test").unwrap();
        assert_eq!(sig.method_name(), "jsonrpc.test");
        assert_eq!(sig.len(), 1);
        assert_eq!(sig.arguments()[0].type_tag, TypeTag::Any);
    }

    #[test]
    fn test_empty_signature_uses_handler_name() {
        let sig = ProcedureSignature::parse(Some("ping"), &names(&["x"]), "").unwrap();
        assert_eq!(sig.method_name(), "ping");
        assert_eq!(sig.len(), 1);

        let err = ProcedureSignature::parse(None, &[], "  ").unwrap_err();
        assert!(matches!(err, SignatureError::Unnamed { .. }));
    }

    #[test]
    fn test_rejects_positional_after_keyword() {
        let err = ProcedureSignature::parse(None, &[], "f(a=String, Number)").unwrap_err();
        match err {
            SignatureError::PositionalAfterKeyword { fragment, signature } => {
                assert_eq!(fragment, "Number");
                assert_eq!(signature, "f(a=String, Number)");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_types_and_garbage() {
        assert!(matches!(
            ProcedureSignature::parse(None, &[], "f(Widget)"),
            Err(SignatureError::UnknownType { ref name, ref signature })
                if name == "Widget" && signature == "f(Widget)"
        ));
        assert!(matches!(
            ProcedureSignature::parse(None, &[], "f() -> String garbage"),
            Err(SignatureError::UnknownType { .. })
        ));
        assert!(matches!(
            ProcedureSignature::parse(None, &[], "f(String"),
            Err(SignatureError::Malformed { .. })
        ));
        assert!(matches!(
            ProcedureSignature::parse(None, &[], "f(String)) -> Any"),
            Err(SignatureError::Malformed { .. })
        ));
        assert!(matches!(
            ProcedureSignature::parse(None, &[], "f() ->"),
            Err(SignatureError::Malformed { .. })
        ));
        assert!(matches!(
            ProcedureSignature::parse(None, &[], "f(String,)"),
            Err(SignatureError::InvalidArgument { .. })
        ));
        assert!(matches!(
            ProcedureSignature::parse(None, &[], "f(a=String, a=Number)"),
            Err(SignatureError::DuplicateArgument { .. })
        ));
    }

    #[test]
    fn test_render_round_trip() {
        let declared = names(&["a", "b", "c"]);
        for text in [
            "f(String, Number) -> Array",
            "f(b=String)",
            "ns.method(Object, Array, c=Boolean) -> Nil",
            "g() -> String",
            "h",
        ] {
            let sig = ProcedureSignature::parse(None, &declared, text).unwrap();
            let reparsed = ProcedureSignature::parse(None, &declared, &sig.render()).unwrap();
            assert_eq!(sig, reparsed, "round trip of {text}");
        }
    }

    #[test]
    fn test_prepend_argument() {
        let mut sig = ProcedureSignature::parse(None, &names(&["string"]), "echo").unwrap();
        sig.prepend_argument("password", TypeTag::String).unwrap();
        sig.prepend_argument("username", TypeTag::String).unwrap();
        assert_eq!(sig.argument_names(), names(&["username", "password", "string"]));
        assert!(sig.prepend_argument("string", TypeTag::Any).is_err());

        let handler_view = sig.without_leading(2);
        assert_eq!(handler_view.argument_names(), names(&["string"]));
    }
}

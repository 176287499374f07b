use serde::Serialize;
use serde_json::Value;

use crate::error::RpcError;
use crate::params::CanonicalArgs;
use crate::signature::ProcedureSignature;

/// Check canonical arguments against a declared signature.
///
/// Arity is checked first; then, per declared argument in order, ambiguity
/// (given both positionally and by name), absence, and type membership.
pub fn validate_params(signature: &ProcedureSignature, args: &CanonicalArgs) -> Result<(), RpcError> {
    let declared = signature.len();
    if args.len() > declared {
        return Err(RpcError::invalid_params(format!(
            "Too many params provided for {}",
            signature
        )));
    }
    if args.len() < declared {
        return Err(RpcError::invalid_params(format!(
            "Not enough params provided for {}",
            signature
        )));
    }

    for (index, argument) in signature.arguments().iter().enumerate() {
        let value = match args.positional.get(index) {
            Some(value) => {
                if args.keyword.contains_key(&argument.name) {
                    return Err(RpcError::invalid_params(format!(
                        "ambiguous argument {} given both by position and by name for {}",
                        argument.name, signature
                    )));
                }
                value
            }
            None => args.keyword.get(&argument.name).ok_or_else(|| {
                RpcError::invalid_params(format!(
                    "missing argument {} for {}",
                    argument.name, signature
                ))
            })?,
        };

        if !argument.type_tag.accepts(value) {
            return Err(RpcError::invalid_params(format!(
                "{} is not the correct type {} for {}",
                argument.name, argument.type_tag, signature
            )));
        }
    }
    Ok(())
}

/// Encode a handler result, failing when it has no JSON representation
pub fn encode_return<T: Serialize>(result: &T) -> Result<Value, RpcError> {
    serde_json::to_value(result)
        .map_err(|err| RpcError::Other(format!("TypeError: return type not supported: {}", err)))
}

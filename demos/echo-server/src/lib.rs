//! Echo service used by the demo binary and the integration tests.
//!
//! Covers every registration option: plain and safe procedures, typed and
//! untyped signatures, validation, authentication and notifications.

use omnirpc_json_rpc_server::prelude::*;
use omnirpc_json_rpc_server::{Arguments, SignatureError};
use serde_json::Value;

/// Account accepted by [`demo_credentials`]
pub const DEMO_USERNAME: &str = "demo";
pub const DEMO_PASSWORD: &str = "demo-password";

pub fn demo_credentials() -> StaticCredentials {
    StaticCredentials::new().with_user(DEMO_USERNAME, DEMO_PASSWORD)
}

async fn strange_echo(args: Arguments) -> Result<Vec<Value>, RpcError> {
    let yeswai = args
        .optional::<Value>("yeswai")?
        .unwrap_or_else(|| Value::String("Default".to_string()));
    Ok(vec![
        args.required("string")?,
        args.required("omg")?,
        args.required("wtf")?,
        args.required("nowai")?,
        yeswai,
    ])
}

async fn concat(args: Arguments) -> Result<String, RpcError> {
    let string: String = args.required("string")?;
    let string2: String = args.required("string2")?;
    Ok(string + &string2)
}

const STRANGE_PARAMS: [&str; 5] = ["string", "omg", "wtf", "nowai", "yeswai"];

/// Build the echo service registry
pub fn echo_registry(config: RegistryConfig) -> Result<Registry, SignatureError> {
    let mut registry = Registry::new(config);

    registry.add(
        "jsonrpc.test",
        procedure_fn(|_ctx, args| async move { args.required::<Value>("string") })
            .with_params(["string"])
            .with_summary("Returns whatever you give it."),
        ProcedureFlags::new(),
    )?;
    registry.add(
        "jsonrpc.testAuth",
        procedure_fn(|_ctx, args| async move { args.required::<Value>("string") })
            .with_params(["string"]),
        ProcedureFlags::new().authenticated(),
    )?;
    registry.add(
        "jsonrpc.notify",
        procedure_fn(|_ctx, _args| async move { Ok(()) }).with_params(["string"]),
        ProcedureFlags::new(),
    )?;
    registry.add(
        "jsonrpc.fails",
        procedure_fn(|_ctx, _args| async move {
            Err::<Value, _>(RpcError::other("IndexError: list index out of range"))
        })
        .with_params(["string"]),
        ProcedureFlags::new(),
    )?;
    registry.add(
        "jsonrpc.strangeEcho",
        procedure_fn(|_ctx, args| strange_echo(args)).with_params(STRANGE_PARAMS),
        ProcedureFlags::new(),
    )?;
    registry.add(
        "jsonrpc.safeEcho",
        procedure_fn(|_ctx, args| async move { args.required::<Value>("string") })
            .with_params(["string"]),
        ProcedureFlags::new().safe(),
    )?;
    registry.add(
        "jsonrpc.strangeSafeEcho",
        procedure_fn(|_ctx, args| strange_echo(args)).with_params(STRANGE_PARAMS),
        ProcedureFlags::new().safe(),
    )?;
    registry.add(
        "jsonrpc.checkedEcho(string=str, string2=str) -> str",
        procedure_fn(|_ctx, args| concat(args)).with_params(["string", "string2"]),
        ProcedureFlags::new().safe().validated(),
    )?;
    registry.add(
        "jsonrpc.checkedArgsEcho(string=str, string2=str)",
        procedure_fn(|_ctx, args| concat(args)).with_params(["string", "string2"]),
        ProcedureFlags::new().validated(),
    )?;
    registry.add(
        "jsonrpc.checkedReturnEcho() -> String",
        procedure_fn(|_ctx, args| concat(args)).with_params(["string", "string2"]),
        ProcedureFlags::new().validated(),
    )?;
    registry.add(
        "jsonrpc.authCheckedEcho(Object, Array) -> Object",
        procedure_fn(|_ctx, args: Arguments| async move {
            Ok::<_, RpcError>(serde_json::json!({
                "obj1": args.required::<Value>("obj1")?,
                "arr1": args.required::<Value>("arr1")?,
            }))
        })
        .with_params(["obj1", "arr1"]),
        ProcedureFlags::new().validated(),
    )?;
    // Unnamed positional arguments are bound as "0", "1", ...
    registry.add(
        "jsonrpc.varArgs(String, String, str3=String) -> Array",
        procedure_fn(|_ctx, args: Arguments| async move { Ok(args.into_values()) }),
        ProcedureFlags::new().validated(),
    )?;
    registry.add(
        "echo(message=String) -> String",
        procedure_fn(|_ctx, args| async move { args.required::<String>("message") })
            .with_summary("Echo the message back."),
        ProcedureFlags::new().safe().validated(),
    )?;

    Ok(registry)
}

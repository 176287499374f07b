//! Dispatcher behaviour across JSON-RPC 1.0, 1.1 and 2.0
//!
//! Drives the echo service through `Dispatcher` directly: version
//! negotiation, response shapes, batches, validation, authentication
//! and introspection.

use std::sync::Arc;

use omnirpc_echo_server::{DEMO_PASSWORD, DEMO_USERNAME, demo_credentials, echo_registry};
use omnirpc_json_rpc_server::prelude::*;
use omnirpc_json_rpc_server::{ResponseBody, SignatureError};
use serde_json::{Value, json};

fn dispatcher() -> Dispatcher {
    let registry = echo_registry(RegistryConfig::new("compliance").version("0.1")).unwrap();
    Dispatcher::new(registry).with_credential_checker(Arc::new(demo_credentials()))
}

async fn call(request: Value) -> DispatchResponse {
    dispatcher().handle_value(request, &RequestContext::new()).await
}

async fn call_json(request: Value) -> Value {
    call(request).await.to_value().expect("response body")
}

#[tokio::test]
async fn test_v10_echo_shape() {
    let response = call(json!({"method": "echo", "params": ["hi"], "id": "1"})).await;
    assert_eq!(response.status, 200);
    assert_eq!(
        response.to_value().unwrap(),
        json!({"id": "1", "result": "hi", "error": null})
    );
}

#[tokio::test]
async fn test_v11_and_v20_shapes() {
    let v11 = call_json(json!({"version": "1.1", "method": "jsonrpc.test", "params": ["x"], "id": 2})).await;
    assert_eq!(v11, json!({"id": 2, "version": "1.1", "result": "x"}));

    let v20 = call_json(json!({"jsonrpc": "2.0", "method": "jsonrpc.test", "params": {"string": "y"}, "id": 3})).await;
    assert_eq!(v20, json!({"id": 3, "jsonrpc": "2.0", "result": "y"}));
}

#[tokio::test]
async fn test_jsonrpc_field_wins_over_version() {
    let body = call_json(json!({
        "jsonrpc": "2.0",
        "version": "1.1",
        "method": "jsonrpc.test",
        "params": ["z"],
        "id": 4
    }))
    .await;
    assert_eq!(body["jsonrpc"], "2.0");
    assert!(body.get("version").is_none());
}

#[tokio::test]
async fn test_unsupported_version_is_invalid_request() {
    let response = call(json!({"jsonrpc": "3.0", "method": "echo", "params": ["a"], "id": 5})).await;
    assert_eq!(response.status, 400);
    let body = response.to_value().unwrap();
    assert_eq!(body["error"]["name"], "InvalidRequestError");
    assert_eq!(body["id"], 5);
}

#[tokio::test]
async fn test_missing_params_is_invalid_params() {
    let body = call_json(json!({"jsonrpc": "2.0", "method": "echo", "id": 6})).await;
    assert_eq!(body["error"]["code"], INVALID_PARAMS);
}

#[tokio::test]
async fn test_v20_notification_yields_no_content() {
    let response = call(json!({"jsonrpc": "2.0", "method": "jsonrpc.notify", "params": ["x"], "id": null})).await;
    assert_eq!(response.body, ResponseBody::NoContent);
    assert_eq!(response.status, 204);
    assert!(!response.needs_response());
}

#[tokio::test]
async fn test_failed_notification_still_reports_error() {
    let response = call(json!({"jsonrpc": "2.0", "method": "nope", "params": []})).await;
    assert_eq!(response.status, 404);
    assert!(response.is_error());
}

#[tokio::test]
async fn test_batch_preserves_order_and_isolates_faults() {
    let batch: Vec<Value> = (0..5)
        .map(|i| {
            let method = if i == 1 || i == 3 { "missing.method" } else { "jsonrpc.test" };
            json!({"jsonrpc": "2.0", "method": method, "params": [i], "id": i})
        })
        .collect();

    let response = call(Value::Array(batch)).await;
    assert_eq!(response.status, 200);
    let items = response.to_value().unwrap();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 5);

    for (i, item) in items.iter().enumerate() {
        assert_eq!(item["id"], i);
        if i == 1 || i == 3 {
            assert_eq!(item["error"]["code"], METHOD_NOT_FOUND);
            assert_eq!(item["error"]["name"], "MethodNotFoundError");
        } else {
            assert_eq!(item["result"], i);
        }
    }
}

#[tokio::test]
async fn test_batch_rejects_notifications_and_non_objects() {
    let response = call(json!([
        {"jsonrpc": "2.0", "method": "jsonrpc.notify", "params": ["x"]},
        "not an envelope",
        {"jsonrpc": "2.0", "method": "jsonrpc.test", "params": ["ok"], "id": 1}
    ]))
    .await;
    let items = response.to_value().unwrap();
    assert_eq!(items[0]["error"]["name"], "InvalidRequestError");
    assert_eq!(items[1]["error"]["name"], "InvalidRequestError");
    assert_eq!(items[2]["result"], "ok");
}

#[tokio::test]
async fn test_empty_batch() {
    let response = call(json!([])).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.to_value().unwrap(), json!([]));
}

#[tokio::test]
async fn test_v11_mixed_params() {
    let body = call_json(json!({
        "version": "1.1",
        "method": "jsonrpc.checkedArgsEcho",
        "params": {"0": "x", "string2": "y"},
        "id": 7
    }))
    .await;
    assert_eq!(body["result"], "xy");
}

#[tokio::test]
async fn test_v10_rejects_object_params() {
    let body = call_json(json!({"method": "jsonrpc.test", "params": {"string": "x"}, "id": 8})).await;
    assert_eq!(body["error"]["code"], INVALID_PARAMS);
    assert_eq!(body["result"], Value::Null);
}

#[tokio::test]
async fn test_validation_failures() {
    let wrong_type = call_json(json!({"jsonrpc": "2.0", "method": "jsonrpc.checkedEcho", "params": [1, "b"], "id": 1})).await;
    assert_eq!(wrong_type["error"]["name"], "InvalidParamsError");
    assert!(wrong_type["error"]["message"].as_str().unwrap().contains("not the correct type"));

    let too_many = call_json(json!({"jsonrpc": "2.0", "method": "jsonrpc.checkedEcho", "params": ["a", "b", "c"], "id": 2})).await;
    assert!(too_many["error"]["message"].as_str().unwrap().contains("Too many params"));

    let ambiguous = call_json(json!({
        "version": "1.1",
        "method": "jsonrpc.checkedEcho",
        "params": {"0": "a", "string": "b"},
        "id": 3
    }))
    .await;
    assert!(ambiguous["error"]["message"].as_str().unwrap().contains("ambiguous argument"));

    let passes = call_json(json!({"jsonrpc": "2.0", "method": "jsonrpc.checkedEcho", "params": ["a", "b"], "id": 4})).await;
    assert_eq!(passes["result"], "ab");
}

#[tokio::test]
async fn test_var_args_and_typed_objects() {
    let var_args = call_json(json!({
        "version": "1.1",
        "method": "jsonrpc.varArgs",
        "params": {"0": "a", "1": "b", "str3": "c"},
        "id": 1
    }))
    .await;
    assert_eq!(var_args["result"], json!(["a", "b", "c"]));

    let objects = call_json(json!({
        "jsonrpc": "2.0",
        "method": "jsonrpc.authCheckedEcho",
        "params": [{"a": 1}, [1, 2]],
        "id": 2
    }))
    .await;
    assert_eq!(objects["result"], json!({"obj1": {"a": 1}, "arr1": [1, 2]}));
}

#[tokio::test]
async fn test_unvalidated_procedure_tolerates_shapes() {
    let body = call_json(json!({
        "jsonrpc": "2.0",
        "method": "jsonrpc.strangeEcho",
        "params": ["a", 1, {"b": 2}, [3]],
        "id": 1
    }))
    .await;
    assert_eq!(body["result"], json!(["a", 1, {"b": 2}, [3], "Default"]));

    let missing = call(json!({"jsonrpc": "2.0", "method": "jsonrpc.strangeEcho", "params": ["a"], "id": 2})).await;
    assert_eq!(missing.status, 500);
    assert_eq!(missing.to_value().unwrap()["error"]["name"], "OtherError");
}

#[tokio::test]
async fn test_handler_fault_is_generic_other_error() {
    let response = call(json!({"jsonrpc": "2.0", "method": "jsonrpc.fails", "params": ["x"], "id": 1})).await;
    assert_eq!(response.status, 500);
    let error = &response.to_value().unwrap()["error"];
    assert_eq!(error["code"], OTHER_ERROR);
    assert_eq!(error["message"], "OtherError: Error while processing the request");
}

#[tokio::test]
async fn test_authenticated_keyword_credentials() {
    let rejected = call(json!({
        "jsonrpc": "2.0",
        "method": "jsonrpc.testAuth",
        "params": {"username": DEMO_USERNAME, "password": "wrong", "string": "x"},
        "id": 1
    }))
    .await;
    assert_eq!(rejected.status, 401);
    assert_eq!(rejected.to_value().unwrap()["error"]["name"], "InvalidCredentialsError");

    let accepted = call_json(json!({
        "jsonrpc": "2.0",
        "method": "jsonrpc.testAuth",
        "params": {"username": DEMO_USERNAME, "password": DEMO_PASSWORD, "string": "x"},
        "id": 2
    }))
    .await;
    assert_eq!(accepted["result"], "x");
}

#[tokio::test]
async fn test_authenticated_credentials_are_stripped_before_validation() {
    let mut registry = Registry::new(RegistryConfig::new("auth"));
    registry
        .add(
            "whoami(String) -> Array",
            procedure_fn(|ctx: CallContext, args| async move {
                let user = ctx.principal.map(|p| p.username).unwrap_or_default();
                Ok::<_, RpcError>(json!([user, args.len(), args.required::<String>("0")?]))
            }),
            ProcedureFlags::new().authenticated().validated(),
        )
        .unwrap();
    let dispatcher = Dispatcher::new(registry).with_credential_checker(Arc::new(demo_credentials()));

    let response = dispatcher
        .handle_value(
            json!({"method": "whoami", "params": [DEMO_USERNAME, DEMO_PASSWORD, "hi"], "id": 1}),
            &RequestContext::new(),
        )
        .await;
    assert_eq!(response.to_value().unwrap()["result"], json!([DEMO_USERNAME, 1, "hi"]));

    let missing = dispatcher
        .handle_value(json!({"method": "whoami", "params": ["hi"], "id": 2}), &RequestContext::new())
        .await;
    assert_eq!(missing.to_value().unwrap()["error"]["name"], "InvalidParamsError");
}

#[tokio::test]
async fn test_v11_keyword_credentials_with_positional_slots() {
    let mut registry = Registry::new(RegistryConfig::new("auth"));
    registry
        .add(
            "pair(String, String) -> String",
            procedure_fn(|_ctx, args: Arguments| async move {
                let first: String = args.required("0")?;
                let second: String = args.required("1")?;
                Ok::<_, RpcError>(first + &second)
            }),
            ProcedureFlags::new().authenticated().validated(),
        )
        .unwrap();
    let dispatcher = Dispatcher::new(registry).with_credential_checker(Arc::new(demo_credentials()));

    let response = dispatcher
        .handle_value(
            json!({
                "version": "1.1",
                "method": "pair",
                "params": {"0": "a", "1": "b", "username": DEMO_USERNAME, "password": DEMO_PASSWORD},
                "id": 1
            }),
            &RequestContext::new(),
        )
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.to_value().unwrap()["result"], "ab");
}

#[tokio::test]
async fn test_describe_lists_every_procedure_once() {
    let dispatcher = dispatcher();
    let body = dispatcher
        .handle_value(
            json!({"jsonrpc": "2.0", "method": "system.describe", "params": [], "id": 1}),
            &RequestContext::new(),
        )
        .await
        .to_value()
        .unwrap();
    let result = &body["result"];
    assert_eq!(result["sdversion"], "1.0");
    assert_eq!(result["name"], "compliance");
    assert_eq!(result["version"], "0.1");
    assert!(result["id"].as_str().unwrap().starts_with("urn:uuid:"));

    let procs = result["procs"].as_array().unwrap();
    let names: Vec<&str> = procs.iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert!(!names.contains(&"system.describe"));
    assert_eq!(names.len(), dispatcher.registry().len() - 1);

    for proc_desc in procs {
        let name = proc_desc["name"].as_str().unwrap();
        let procedure = dispatcher.registry().resolve(name).unwrap();
        assert_eq!(proc_desc["idempotent"], procedure.flags().allow_get);
    }

    let test = procs.iter().find(|p| p["name"] == "jsonrpc.test").unwrap();
    assert_eq!(test["summary"], "Returns whatever you give it.");
}

#[test]
fn test_invalid_signatures_are_rejected() {
    let mut registry = Registry::default();
    let noop = || procedure_fn(|_ctx, _args| async move { Ok(()) });

    let err = registry
        .add("f(a=String, Number)", noop(), ProcedureFlags::new())
        .unwrap_err();
    assert!(matches!(err, SignatureError::PositionalAfterKeyword { .. }));

    let err = registry.add("f(Widget)", noop(), ProcedureFlags::new()).unwrap_err();
    assert!(matches!(err, SignatureError::UnknownType { .. }));

    let err = registry.add("f(String", noop(), ProcedureFlags::new()).unwrap_err();
    assert!(matches!(err, SignatureError::Malformed { .. }));
    assert!(err.to_string().contains("f(String"));
}

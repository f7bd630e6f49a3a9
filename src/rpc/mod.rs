//! JSON-RPC 2.0 gateway contract for the A2A layer.
//!
//! The HTTP gateway itself lives outside this crate; what is fixed here is
//! its wire contract: the JSON-RPC envelope shapes, the A2A method names,
//! and the error-code table.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A2A method names carried in JSON-RPC requests.
pub mod methods {
    /// Send a message, single response
    pub const MESSAGE_SEND: &str = "message/send";
    /// Send a message, streamed response
    pub const MESSAGE_STREAM: &str = "message/stream";
    /// Fetch a task
    pub const TASKS_GET: &str = "tasks/get";
    /// Cancel a task
    pub const TASKS_CANCEL: &str = "tasks/cancel";
    /// Resubscribe to a task's stream
    pub const TASKS_RESUBSCRIBE: &str = "tasks/resubscribe";
    /// Configure push notifications for a task
    pub const TASKS_PUSH_CONFIG_SET: &str = "tasks/pushNotificationConfig/set";
}

/// JSON-RPC and A2A error codes.
pub mod codes {
    /// Invalid JSON was received
    pub const PARSE_ERROR: i64 = -32700;
    /// The JSON is not a valid request object
    pub const INVALID_REQUEST: i64 = -32600;
    /// The method does not exist
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid method parameters
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal JSON-RPC error
    pub const INTERNAL_ERROR: i64 = -32603;
    /// A2A: no task with the given id
    pub const TASK_NOT_FOUND: i64 = -32001;
    /// A2A: the task is in a state that cannot be canceled
    pub const TASK_NOT_CANCELABLE: i64 = -32002;
    /// A2A: push notifications are not supported
    pub const PUSH_NOT_SUPPORTED: i64 = -32003;
    /// A2A: the operation is not supported
    pub const UNSUPPORTED_OPERATION: i64 = -32004;
}

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`
    pub jsonrpc: String,

    /// Method name
    pub method: String,

    /// Method parameters
    #[serde(default)]
    pub params: Value,

    /// Request id echoed in the response
    #[serde(default)]
    pub id: Value,
}

impl JsonRpcRequest {
    /// Build a request.
    pub fn new(method: impl Into<String>, params: Value, id: impl Into<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
            id: id.into(),
        }
    }
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    /// Always `"2.0"`
    pub jsonrpc: String,

    /// Result on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,

    /// Id of the request this answers
    pub id: Value,
}

impl JsonRpcResponse {
    /// A success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// A failure response.
    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    /// Error code from [`codes`]
    pub code: i64,

    /// Human-readable message
    pub message: String,

    /// Optional structured detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Build an error object.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured detail.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// The request body was not valid JSON.
    pub fn parse_error() -> Self {
        Self::new(codes::PARSE_ERROR, "Parse error")
    }

    /// The body was JSON but not a request object.
    pub fn invalid_request() -> Self {
        Self::new(codes::INVALID_REQUEST, "Invalid Request")
    }

    /// The method is not part of the A2A surface.
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            codes::METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
        )
    }

    /// The parameters do not fit the method.
    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, detail)
    }

    /// Internal failure while handling the request.
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL_ERROR, detail)
    }

    /// No task with the given id.
    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(codes::TASK_NOT_FOUND, "Task not found")
            .with_data(serde_json::json!({ "taskId": task_id }))
    }

    /// The task has already reached a terminal state.
    pub fn task_not_cancelable(task_id: &str) -> Self {
        Self::new(codes::TASK_NOT_CANCELABLE, "Task cannot be canceled")
            .with_data(serde_json::json!({ "taskId": task_id }))
    }

    /// Push notifications are not available.
    pub fn push_not_supported() -> Self {
        Self::new(codes::PUSH_NOT_SUPPORTED, "Push Notification is not supported")
    }

    /// The operation is outside this agent's surface.
    pub fn unsupported_operation(detail: impl Into<String>) -> Self {
        Self::new(codes::UNSUPPORTED_OPERATION, detail)
    }
}

/// Parse a JSON-RPC request body, mapping failures onto the standard codes.
pub fn parse_request(body: &[u8]) -> Result<JsonRpcRequest, JsonRpcError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| JsonRpcError::parse_error())?;
    let request: JsonRpcRequest =
        serde_json::from_value(value).map_err(|_| JsonRpcError::invalid_request())?;
    if request.jsonrpc != "2.0" || request.method.is_empty() {
        return Err(JsonRpcError::invalid_request());
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_request_round_trip() {
        let request = JsonRpcRequest::new(
            methods::MESSAGE_SEND,
            json!({"message": {"role": "user"}}),
            "req-1",
        );

        let body = serde_json::to_vec(&request).unwrap();
        let parsed = parse_request(&body).unwrap();
        assert_eq!(parsed, request);
        assert_eq!(parsed.method, "message/send");
    }

    #[test]
    fn test_parse_error_code() {
        let err = parse_request(b"{not json").unwrap_err();
        assert_eq!(err.code, codes::PARSE_ERROR);
    }

    #[test]
    fn test_invalid_request_code() {
        // Valid JSON, wrong shape.
        let err = parse_request(b"[1, 2, 3]").unwrap_err();
        assert_eq!(err.code, codes::INVALID_REQUEST);

        // Wrong version string.
        let body = serde_json::to_vec(&json!({
            "jsonrpc": "1.0",
            "method": "message/send",
            "params": {},
            "id": 1
        }))
        .unwrap();
        let err = parse_request(&body).unwrap_err();
        assert_eq!(err.code, codes::INVALID_REQUEST);
    }

    #[test]
    fn test_error_constructors() {
        assert_eq!(JsonRpcError::parse_error().code, -32700);
        assert_eq!(JsonRpcError::invalid_request().code, -32600);
        assert_eq!(JsonRpcError::method_not_found("x/y").code, -32601);
        assert_eq!(JsonRpcError::invalid_params("bad").code, -32602);
        assert_eq!(JsonRpcError::internal("boom").code, -32603);
        assert_eq!(JsonRpcError::task_not_found("t").code, -32001);
        assert_eq!(JsonRpcError::task_not_cancelable("t").code, -32002);
        assert_eq!(JsonRpcError::push_not_supported().code, -32003);
        assert_eq!(JsonRpcError::unsupported_operation("x").code, -32004);

        let err = JsonRpcError::task_not_found("task-1");
        assert_eq!(err.data.unwrap()["taskId"], "task-1");
    }

    #[test]
    fn test_response_shapes() {
        let ok = JsonRpcResponse::success(json!("req-1"), json!({"done": true}));
        let json_ok = serde_json::to_value(&ok).unwrap();
        assert_eq!(json_ok["jsonrpc"], "2.0");
        assert_eq!(json_ok["result"]["done"], true);
        assert!(json_ok.get("error").is_none());

        let fail = JsonRpcResponse::failure(json!("req-2"), JsonRpcError::invalid_request());
        let json_fail = serde_json::to_value(&fail).unwrap();
        assert_eq!(json_fail["error"]["code"], -32600);
        assert!(json_fail.get("result").is_none());
    }

    #[test]
    fn test_method_names() {
        assert_eq!(methods::TASKS_RESUBSCRIBE, "tasks/resubscribe");
        assert_eq!(
            methods::TASKS_PUSH_CONFIG_SET,
            "tasks/pushNotificationConfig/set"
        );
    }
}

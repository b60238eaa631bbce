//! Decoding of raw inbound frames into JSON-RPC messages.

use serde_json::{Map, Value, json};

use super::jsonrpc::{
    INVALID_REQUEST, JSONRPC_VERSION, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, PARSE_ERROR, RequestId,
};

/// A decoded inbound message.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    /// A client reply to a server-initiated request. The server never sends
    /// any, so these are acknowledged and ignored.
    Response(Value),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MalformedKind {
    /// Not JSON at all.
    Parse,
    /// JSON, but not a JSON-RPC 2.0 message.
    InvalidRequest,
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("malformed frame: {reason}")]
pub struct MalformedFrame {
    /// The request id, when it could be recovered from the frame.
    pub id: Option<RequestId>,
    pub kind: MalformedKind,
    pub reason: String,
}

impl MalformedFrame {
    fn parse(reason: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: MalformedKind::Parse,
            reason: reason.into(),
        }
    }

    fn invalid(id: Option<RequestId>, reason: impl Into<String>) -> Self {
        Self {
            id,
            kind: MalformedKind::InvalidRequest,
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> i64 {
        match self.kind {
            MalformedKind::Parse => PARSE_ERROR,
            MalformedKind::InvalidRequest => INVALID_REQUEST,
        }
    }

    pub fn to_response(&self) -> JsonRpcResponse {
        let message = match self.kind {
            MalformedKind::Parse => "Parse error",
            MalformedKind::InvalidRequest => "Invalid Request",
        };
        JsonRpcResponse::error(
            self.id.clone(),
            JsonRpcError::new(self.code(), format!("{}: {}", message, self.reason))
                .with_data(json!({ "code": "transport_malformed" })),
        )
    }
}

/// Decodes one frame. Batches are not supported.
pub fn decode(bytes: &[u8]) -> Result<Inbound, MalformedFrame> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| MalformedFrame::parse(e.to_string()))?;

    let Value::Object(mut object) = value else {
        return Err(MalformedFrame::invalid(None, "expected a JSON object"));
    };

    let id = match object.get("id") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(
            RequestId::from_value(raw)
                .ok_or_else(|| MalformedFrame::invalid(None, "id must be a string or an integer"))?,
        ),
    };

    if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(MalformedFrame::invalid(id, "jsonrpc must be \"2.0\""));
    }

    match object.remove("method") {
        Some(Value::String(method)) => {
            let params = take_params(&mut object, id.as_ref())?;
            Ok(match id {
                Some(id) => Inbound::Request(JsonRpcRequest {
                    jsonrpc: JSONRPC_VERSION.to_string(),
                    id,
                    method,
                    params,
                }),
                None => Inbound::Notification(JsonRpcNotification {
                    jsonrpc: JSONRPC_VERSION.to_string(),
                    method,
                    params,
                }),
            })
        }
        Some(_) => Err(MalformedFrame::invalid(id, "method must be a string")),
        None if id.is_some() && (object.contains_key("result") || object.contains_key("error")) => {
            Ok(Inbound::Response(Value::Object(object)))
        }
        None => Err(MalformedFrame::invalid(id, "missing method")),
    }
}

fn take_params(
    object: &mut Map<String, Value>,
    id: Option<&RequestId>,
) -> Result<Option<Value>, MalformedFrame> {
    match object.remove("params") {
        None | Some(Value::Null) => Ok(None),
        Some(params @ (Value::Object(_) | Value::Array(_))) => Ok(Some(params)),
        Some(_) => Err(MalformedFrame::invalid(
            id.cloned(),
            "params must be an object or an array",
        )),
    }
}

//! JSON method codec for the casting channel.
//!
//! Calls are `{"method": <string>, "args": <any>}`. Replies are envelopes:
//! - success: `[result]`
//! - error: `[code, message, details]`
//! - not implemented: an empty reply (zero bytes)

use serde_json::{json, Value};

use ctv_core::{MethodCall, MethodResult};

use crate::error::BridgeError;

/// Decode a method call from the host.
pub fn decode_method_call(message: &[u8]) -> Result<MethodCall, BridgeError> {
    if message.is_empty() {
        return Err(BridgeError::Codec("empty method call".to_string()));
    }
    let call: MethodCall = serde_json::from_slice(message)?;
    Ok(call)
}

/// Encode a method call (used by the demo and tests to play the host side).
pub fn encode_method_call(call: &MethodCall) -> Vec<u8> {
    json!({ "method": call.method, "args": call.arguments })
        .to_string()
        .into_bytes()
}

/// Encode a reply envelope.
pub fn encode_reply(reply: &MethodResult) -> Vec<u8> {
    match reply {
        MethodResult::Success(value) => json!([value]).to_string().into_bytes(),
        MethodResult::Error {
            code,
            message,
            details,
        } => json!([code, message, details]).to_string().into_bytes(),
        MethodResult::NotImplemented => Vec::new(),
    }
}

/// Decode a reply envelope.
pub fn decode_reply(envelope: &[u8]) -> Result<MethodResult, BridgeError> {
    if envelope.is_empty() {
        return Ok(MethodResult::NotImplemented);
    }

    let value: Value = serde_json::from_slice(envelope)?;
    let Value::Array(mut items) = value else {
        return Err(BridgeError::Codec("reply envelope is not a list".to_string()));
    };

    match items.len() {
        1 => Ok(MethodResult::Success(items.remove(0))),
        3 => {
            let details = items.pop().unwrap_or(Value::Null);
            let message = items
                .pop()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            let code = items
                .pop()
                .and_then(|v| v.as_str().map(str::to_string))
                .ok_or_else(|| BridgeError::Codec("error code must be a string".to_string()))?;
            Ok(MethodResult::Error {
                code,
                message,
                details,
            })
        }
        n => Err(BridgeError::Codec(format!(
            "reply envelope has {} items, expected 1 or 3",
            n
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctv_core::errors::codes;
    use ctv_core::CastError;

    #[test]
    fn test_decode_call() {
        let call = decode_method_call(
            br#"{"method":"startScreenMirroring","args":{"deviceId":"abc","deviceName":"Living Room TV"}}"#,
        )
        .unwrap();
        assert_eq!(call.method, "startScreenMirroring");
        assert_eq!(call.arguments["deviceId"], "abc");
    }

    #[test]
    fn test_decode_call_without_args() {
        let call = decode_method_call(br#"{"method":"stopCasting"}"#).unwrap();
        assert_eq!(call, MethodCall::bare("stopCasting"));
    }

    #[test]
    fn test_decode_malformed_calls() {
        assert!(decode_method_call(b"").is_err());
        assert!(decode_method_call(b"{not json").is_err());
        assert!(decode_method_call(br#"{"method":5}"#).is_err());
        assert!(decode_method_call(br#"{"args":{}}"#).is_err());
    }

    #[test]
    fn test_envelope_shapes() {
        assert_eq!(encode_reply(&MethodResult::Success(json!(true))), b"[true]");
        assert_eq!(encode_reply(&MethodResult::empty()), b"[null]");
        assert!(encode_reply(&MethodResult::NotImplemented).is_empty());

        let err = MethodResult::from_error(&CastError::PermissionDenied);
        let encoded: Value = serde_json::from_slice(&encode_reply(&err)).unwrap();
        assert_eq!(
            encoded,
            json!([codes::PERMISSION_DENIED, "screen capture permission denied", null])
        );
    }

    #[test]
    fn test_decode_reply() {
        assert_eq!(decode_reply(b"").unwrap(), MethodResult::NotImplemented);
        assert_eq!(decode_reply(b"[null]").unwrap(), MethodResult::empty());

        let reply = decode_reply(br#"["TIMEOUT","timed out",{"step":"x"}]"#).unwrap();
        assert_eq!(reply.error_code(), Some("TIMEOUT"));

        assert!(decode_reply(b"{}").is_err());
        assert!(decode_reply(b"[1,2]").is_err());
        assert!(decode_reply(b"[1,\"m\",null]").is_err());
    }

    #[test]
    fn test_encode_call_is_decodable() {
        let call = MethodCall::new("startScreenMirroring", json!({ "deviceId": "abc" }));
        assert_eq!(decode_method_call(&encode_method_call(&call)).unwrap(), call);
    }
}

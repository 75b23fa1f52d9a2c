//! Typed channel commands.
//!
//! The UI layer sends a method name plus a loosely typed argument map. This
//! module turns that pair into a closed [`Command`] at the boundary so nothing
//! past the dispatcher ever looks at raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::CastError;
use crate::platform::Receiver;

/// Default method channel name shared with the UI layer.
pub const CHANNEL_NAME: &str = "com.example.casttotvscreen/casting";

/// Method name for starting a mirroring session.
pub const METHOD_START_SCREEN_MIRRORING: &str = "startScreenMirroring";

/// Method name for stopping the active cast.
pub const METHOD_STOP_CASTING: &str = "stopCasting";

/// A raw method call as delivered by the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default, rename = "args")]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    /// Call with no arguments.
    pub fn bare(method: impl Into<String>) -> Self {
        Self::new(method, Value::Null)
    }
}

/// Arguments of `startScreenMirroring`.
///
/// Both fields are optional at the boundary: a missing key and an explicit
/// `null` both decode to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartScreenMirroringRequest {
    /// Opaque identifier of the target receiver
    #[serde(default)]
    pub device_id: Option<String>,
    /// Human-readable receiver label
    #[serde(default)]
    pub device_name: Option<String>,
}

impl StartScreenMirroringRequest {
    pub fn new(device_id: Option<&str>, device_name: Option<&str>) -> Self {
        Self {
            device_id: device_id.map(str::to_string),
            device_name: device_name.map(str::to_string),
        }
    }

    /// Validate into a [`Receiver`]; a real session needs a device id.
    pub fn to_receiver(&self) -> Result<Receiver, CastError> {
        let id = self
            .device_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| CastError::InvalidArgument("deviceId is required".into()))?;

        Ok(Receiver {
            id: id.to_string(),
            name: self
                .device_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
        })
    }
}

/// The closed command set, plus the explicit unknown case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartScreenMirroring(StartScreenMirroringRequest),
    StopCasting,
    /// Any method name outside the command set
    Unimplemented(String),
}

impl Command {
    /// Parse a raw method call into a typed command.
    ///
    /// Unknown method names are not an error here; they become
    /// [`Command::Unimplemented`] so the dispatcher can answer explicitly.
    pub fn parse(call: &MethodCall) -> Result<Self, CastError> {
        match call.method.as_str() {
            METHOD_START_SCREEN_MIRRORING => {
                let request = match &call.arguments {
                    Value::Null => StartScreenMirroringRequest::default(),
                    Value::Object(_) => serde_json::from_value(call.arguments.clone())?,
                    other => {
                        return Err(CastError::InvalidArgument(format!(
                            "expected an argument map, got {}",
                            value_kind(other)
                        )))
                    }
                };
                Ok(Command::StartScreenMirroring(request))
            }
            METHOD_STOP_CASTING => Ok(Command::StopCasting),
            other => Ok(Command::Unimplemented(other.to_string())),
        }
    }

    /// Method name this command was parsed from.
    pub fn method(&self) -> &str {
        match self {
            Command::StartScreenMirroring(_) => METHOD_START_SCREEN_MIRRORING,
            Command::StopCasting => METHOD_STOP_CASTING,
            Command::Unimplemented(name) => name,
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}

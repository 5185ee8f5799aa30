use std::string::FromUtf8Error;

use serde::Serialize;

use crate::device::DeviceKind;

/// All error types that can occur when talking to lights.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The id is not in the current device registry. Re-scanning may help.
    #[error("device {0} not found")]
    NotFound(String),

    /// The operation is structurally unsupported by the resolved device.
    #[error("{operation} is not supported by {kind} devices")]
    CapabilityMismatch {
        kind: DeviceKind,
        operation: String,
    },

    /// Data from a device could not be decoded.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// An underlying find/connect/send/receive step failed.
    #[error("transport {action} failed: {reason}")]
    TransportFailure { action: String, reason: String },

    /// A network socket operation failed.
    #[error("socket {action} error: {err:?}")]
    Socket { action: String, err: std::io::Error },

    /// The bridge HTTP request failed.
    #[error("bridge request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The bridge accepted the request but reported an error entry.
    #[error("bridge rejected {address}: {description}")]
    Bridge { address: String, description: String },

    /// Failed to serialize data to JSON.
    #[error("failed to dump json: {0:?}")]
    JsonDump(serde_json::Error),

    /// Failed to deserialize JSON data.
    #[error("failed to load json: {0:?}")]
    JsonLoad(serde_json::Error),

    /// A response contained invalid UTF-8.
    #[error("utf8 decoding error: {0:?}")]
    Utf8Decode(FromUtf8Error),

    /// Configuration or calibration data is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn socket(action: &str, err: std::io::Error) -> Self {
        Error::Socket {
            action: action.to_string(),
            err,
        }
    }

    pub fn transport(action: &str, reason: impl ToString) -> Self {
        Error::TransportFailure {
            action: action.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn unsupported(kind: DeviceKind, operation: &str) -> Self {
        Error::CapabilityMismatch {
            kind,
            operation: operation.to_string(),
        }
    }

    pub fn malformed(reason: impl ToString) -> Self {
        Error::MalformedPayload(reason.to_string())
    }

    /// Folds this error into the outcome reported to callers.
    ///
    /// # Examples
    ///
    /// ```
    /// use lightdeck::{Error, Outcome};
    ///
    /// assert_eq!(Error::NotFound("a".into()).outcome(), Outcome::NotFound);
    /// assert_eq!(Error::malformed("bad hex").outcome(), Outcome::MalformedPayload);
    /// assert_eq!(Error::transport("connect", "refused").outcome(), Outcome::TransportFailure);
    /// ```
    pub fn outcome(&self) -> Outcome {
        match self {
            Error::NotFound(_) => Outcome::NotFound,
            Error::CapabilityMismatch { .. } => Outcome::CapabilityMismatch,
            Error::MalformedPayload(_) | Error::JsonLoad(_) | Error::Utf8Decode(_) => {
                Outcome::MalformedPayload
            }
            Error::TransportFailure { .. }
            | Error::Socket { .. }
            | Error::Http(_)
            | Error::Bridge { .. }
            | Error::JsonDump(_)
            | Error::Config(_) => Outcome::TransportFailure,
        }
    }
}

/// The kind of result an operation produced, as reported to the routing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    NotFound,
    CapabilityMismatch,
    MalformedPayload,
    TransportFailure,
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

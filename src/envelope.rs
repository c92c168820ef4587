//! The result envelope shared by both stages.
//!
//! Internally every operation works on [`Envelope<T>`], a plain sum type.
//! It only becomes JSON at the process boundary, where it serialises as
//!
//! ```text
//! {"success":true, ...fields of T}
//! {"success":false,"error":"<Kind>","message":"<text>"}
//! ```
//!
//! Because the success body and the failure body live in different variants,
//! a "half-populated" envelope cannot be constructed.

use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors that know their envelope kind name.
pub trait Classify: std::error::Error {
    /// Stable, machine-readable name written to the `"error"` field.
    fn kind(&self) -> &'static str;
}

/// The failure side of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Error kind, e.g. `"TimeoutError"`.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

/// Success or failure of one stage invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    Success(T),
    Failure(Failure),
}

impl<T> Envelope<T> {
    /// Build a failure envelope from a kind and a message.
    pub fn failure(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Envelope::Failure(Failure {
            error: kind.into(),
            message: message.into(),
        })
    }

    /// Build a failure envelope from a classified error.
    pub fn from_error<E: Classify>(err: &E) -> Self {
        Self::failure(err.kind(), err.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success(_))
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            Envelope::Success(body) => Some(body),
            Envelope::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            Envelope::Success(_) => None,
            Envelope::Failure(f) => Some(f),
        }
    }

    pub fn into_result(self) -> Result<T, Failure> {
        match self {
            Envelope::Success(body) => Ok(body),
            Envelope::Failure(f) => Err(f),
        }
    }
}

impl<T, E: Classify> From<Result<T, E>> for Envelope<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(body) => Envelope::Success(body),
            Err(e) => Envelope::from_error(&e),
        }
    }
}

#[derive(Serialize)]
struct Frame<'a, B: Serialize> {
    success: bool,
    #[serde(flatten)]
    body: &'a B,
}

impl<T: Serialize> Serialize for Envelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Envelope::Success(body) => Frame {
                success: true,
                body,
            }
            .serialize(serializer),
            Envelope::Failure(failure) => Frame {
                success: false,
                body: failure,
            }
            .serialize(serializer),
        }
    }
}

impl<T: Serialize> Envelope<T> {
    /// Serialise to a single-line JSON object.
    ///
    /// If the success body itself cannot be serialised the result is a
    /// failure object, so the boundary always has something well-formed to
    /// print.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({
                "success": false,
                "error": "SerializationError",
                "message": e.to_string(),
            })
            .to_string()
        })
    }
}

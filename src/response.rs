//! The `(outcome, payload)` pair handed to the routing layer.

use serde::Serialize;

use crate::errors::{Error, Outcome};

/// Outcome of an operation together with its payload, if any.
///
/// # Examples
///
/// ```
/// use lightdeck::{Error, Outcome, Reply};
///
/// let ok: Reply<u8> = Ok(40).into();
/// assert_eq!((ok.outcome, ok.payload), (Outcome::Success, Some(40)));
///
/// let missing: Reply<u8> = Err(Error::NotFound("porch".into())).into();
/// assert_eq!((missing.outcome, missing.payload), (Outcome::NotFound, None));
/// ```
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply<T> {
    pub outcome: Outcome,
    pub payload: Option<T>,
    /// Human readable failure description.
    pub error: Option<String>,
}

impl<T> Reply<T> {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

impl<T> From<Result<T, Error>> for Reply<T> {
    fn from(result: Result<T, Error>) -> Self {
        match result {
            Ok(payload) => Reply {
                outcome: Outcome::Success,
                payload: Some(payload),
                error: None,
            },
            Err(e) => Reply {
                outcome: e.outcome(),
                payload: None,
                error: Some(e.to_string()),
            },
        }
    }
}

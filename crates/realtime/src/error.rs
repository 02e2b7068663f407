//! Tracking service errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the crate.
pub type Result<T> = anyhow::Result<T, Error>;

/// Message returned to callers when the failure detail is not theirs to see.
pub const GENERIC_FAILURE: &str = "Failed to process request";

/// Domain level error type returned by the tracking pipeline.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Error {
    /// A caller-supplied field is missing or out of range.
    #[error("code: validation_error, description: {0}")]
    Validation(String),

    /// The referenced trip does not exist.
    #[error("code: trip_not_found, description: {0}")]
    TripNotFound(String),

    /// The trip's route, stops or planned distance are not fully configured.
    #[error("code: incomplete_route, description: {0}")]
    IncompleteRoute(String),

    /// The backing store failed. Retrying the single update is safe.
    #[error("code: transient_store, description: {0}")]
    TransientStore(String),

    /// The inbound message could not be decoded.
    #[error("code: invalid_format, description: {0}")]
    InvalidFormat(String),

    /// A non recoverable internal error occurred.
    #[error("code: internal, description: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the stable error code associated with the variant.
    #[must_use]
    pub const fn code(&self) -> &str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::TripNotFound(_) => "trip_not_found",
            Self::IncompleteRoute(_) => "incomplete_route",
            Self::TransientStore(_) => "transient_store",
            Self::InvalidFormat(_) => "invalid_format",
            Self::Internal(_) => "internal",
        }
    }

    /// Returns the error description.
    #[must_use]
    pub fn description(&self) -> String {
        self.to_string()
    }

    /// Trip or route reference data is missing or inconsistent.
    #[must_use]
    pub const fn is_data_integrity(&self) -> bool {
        matches!(self, Self::TripNotFound(_) | Self::IncompleteRoute(_))
    }

    /// The text sent back to the client that caused the error.
    ///
    /// Caller and reference-data errors carry their message; store and internal
    /// failures are reduced to [`GENERIC_FAILURE`].
    #[must_use]
    pub fn reply_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::TripNotFound(msg) | Self::IncompleteRoute(msg) => {
                msg.clone()
            }
            Self::TransientStore(_) | Self::InvalidFormat(_) | Self::Internal(_) => {
                GENERIC_FAILURE.to_string()
            }
        }
    }

    /// Wraps a store collaborator failure.
    #[must_use]
    pub fn store(err: &anyhow::Error) -> Self {
        if let Some(inner @ Self::TransientStore(_)) = err.downcast_ref::<Self>() {
            return inner.clone();
        }
        Self::TransientStore(chain(err))
    }
}

fn chain(err: &anyhow::Error) -> String {
    err.chain().map(ToString::to_string).collect::<Vec<_>>().join(" -> ")
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        let chain = chain(&err);

        // if type is Error, return it with the newly added context
        if let Some(inner) = err.downcast_ref::<Self>() {
            tracing::debug!("Error: {err}, caused by: {inner}");

            return match inner {
                Self::Validation(_) => Self::Validation(chain),
                Self::TripNotFound(_) => Self::TripNotFound(chain),
                Self::IncompleteRoute(_) => Self::IncompleteRoute(chain),
                Self::TransientStore(_) => Self::TransientStore(chain),
                Self::InvalidFormat(_) => Self::InvalidFormat(chain),
                Self::Internal(_) => Self::Internal(chain),
            };
        }

        // otherwise, return an Internal error
        Self::Internal(chain)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidFormat(err.to_string())
    }
}

#[macro_export]
macro_rules! validation {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::Validation(format!($fmt, $($arg)*))
    };
     ($err:expr $(,)?) => {
        $crate::Error::Validation(format!($err))
    };
}

#[macro_export]
macro_rules! not_found {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::TripNotFound(format!($fmt, $($arg)*))
    };
     ($err:expr $(,)?) => {
        $crate::Error::TripNotFound(format!($err))
    };
}

#[macro_export]
macro_rules! incomplete {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::IncompleteRoute(format!($fmt, $($arg)*))
    };
     ($err:expr $(,)?) => {
        $crate::Error::IncompleteRoute(format!($err))
    };
}

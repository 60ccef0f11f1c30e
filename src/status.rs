//! Client-facing outcome of a request.
//!
//! Every request reports a single [`Status`]: either [`StatusCode::Ok`] or a failure
//! carrying one of a small, stable set of codes plus a human readable message.
//! Callers are expected to branch on [`Status::code`] only; messages are for people.
//!
//! Codes fall in two bands:
//!
//! - client-facing: [`StatusCode::InvalidArgument`], [`StatusCode::EntityNotFound`],
//!   [`StatusCode::InvalidTarget`]
//! - engine/internal: [`StatusCode::EngineFailure`], [`StatusCode::Unexpected`]
//!
//! Engine errors are never returned as-is; they go through the
//! `From<EngineError>` conversion below. Requests additionally pin a "not found" to
//! the table they were asked about.
use std::fmt;

use thiserror::Error;

use crate::engine::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok = 0,
    InvalidArgument = 1,
    EntityNotFound = 2,
    InvalidTarget = 3,
    EngineFailure = 4,
    Unexpected = 5,
}

impl StatusCode {
    pub fn name(&self) -> &'static str {
        match self {
            StatusCode::Ok => "ok",
            StatusCode::InvalidArgument => "invalid argument",
            StatusCode::EntityNotFound => "entity not found",
            StatusCode::InvalidTarget => "invalid target",
            StatusCode::EngineFailure => "engine failure",
            StatusCode::Unexpected => "unexpected",
        }
    }

    /// Stable numeric value, suitable for a wire or log representation.
    pub fn value(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{code}] {message}")]
pub struct Status {
    code: StatusCode,
    message: String,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: String::new(),
        }
    }

    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, message)
    }

    pub fn not_found(table: &str) -> Self {
        Self::new(StatusCode::EntityNotFound, table_not_exist_msg(table))
    }

    pub fn invalid_target(table: &str) -> Self {
        Self::new(
            StatusCode::InvalidTarget,
            format!("table '{table}' is a partition, operation requires a root table"),
        )
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unexpected, message)
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub(crate) fn table_not_exist_msg(table: &str) -> String {
    format!("table '{table}' does not exist")
}

impl From<EngineError> for Status {
    fn from(value: EngineError) -> Self {
        match value {
            EngineError::NotFound(table) => Status::not_found(&table),
            EngineError::Failure(reason) | EngineError::Io(reason) => {
                Status::new(StatusCode::EngineFailure, reason)
            }
            EngineError::Unexpected(reason) => Status::unexpected(reason),
        }
    }
}

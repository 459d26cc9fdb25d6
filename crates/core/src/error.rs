// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! Error taxonomy shared by every component: user error, system error, or
//! invariant violation (an internally inconsistent catalog).

use thiserror::Error;

/// Which bucket an error falls into, used by the CLI to pick an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Misuse: bad namespace, duplicate name, not found, primary-only
    /// operation attempted on a non-primary, etc. Exit code 1.
    User,
    /// An external subsystem failed: pool missing, runtime daemon absent,
    /// mount failure, health-check timeout, lock unobtainable. Exit code 2.
    System,
    /// The catalog failed invariant validation. Surfaced as a system error
    /// with no automatic repair. Exit code 2.
    Invariant,
}

/// Top-level engine error. Carries an optional one-line hint for the CLI.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{message}")]
    User { message: String, hint: Option<String> },

    #[error("{message}")]
    System { message: String, hint: Option<String> },

    #[error("state corrupted: {message}")]
    Invariant { message: String },
}

impl EngineError {
    pub fn user(message: impl Into<String>) -> Self {
        EngineError::User { message: message.into(), hint: None }
    }

    pub fn user_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        EngineError::User { message: message.into(), hint: Some(hint.into()) }
    }

    pub fn system(message: impl Into<String>) -> Self {
        EngineError::System { message: message.into(), hint: None }
    }

    pub fn system_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        EngineError::System { message: message.into(), hint: Some(hint.into()) }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        EngineError::Invariant { message: message.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::User { .. } => ErrorKind::User,
            EngineError::System { .. } => ErrorKind::System,
            EngineError::Invariant { .. } => ErrorKind::Invariant,
        }
    }

    pub fn hint(&self) -> Option<&str> {
        match self {
            EngineError::User { hint, .. } | EngineError::System { hint, .. } => hint.as_deref(),
            EngineError::Invariant { .. } => None,
        }
    }

    /// Process exit code: 0 success, 1 user error, 2 system error.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::User => 1,
            ErrorKind::System | ErrorKind::Invariant => 2,
        }
    }
}

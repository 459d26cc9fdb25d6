// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! Carries a process exit code out of command handlers instead of calling
//! `std::process::exit()` deep in the stack.

use std::fmt;

use pgfork_core::EngineError;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
    pub hint: Option<String>,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), hint: None }
    }
}

impl From<EngineError> for ExitError {
    fn from(err: EngineError) -> Self {
        Self { code: err.exit_code(), hint: err.hint().map(str::to_string), message: err.to_string() }
    }
}

impl From<anyhow::Error> for ExitError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(1, err.to_string())
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, "\nhint: {hint}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ExitError {}

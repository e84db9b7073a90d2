// Copyright 2022 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The typed error taxonomy for the executor and its collaborators.
//!
//! Note this is distinct from [`crate::status::Status`]: `Status` is the
//! evidence-driven verdict written into a `ResultLog`, while `JudgeError` is
//! what a stage-level function returns when it cannot continue at all. The
//! job executor downgrades a `JudgeError` encountered mid-stage into an `IE`
//! placeholder `ResultLog` for the task in flight (see `task_runner`).

use std::fmt;

#[derive(Debug)]
pub enum JudgeError {
    /// The container daemon returned an error.
    Daemon(bollard::errors::Error),
    /// Local filesystem I/O failed (missing stdin/expected-output file, a
    /// result-file write failure, or a tar-packing failure).
    Io(String),
    /// The watchdog produced something outside its contract: non-empty
    /// stderr, malformed JSON, or a missing exit code.
    Protocol(String),
    /// The exec wall-clock budget elapsed before the watchdog finished.
    Timeout(String),
}

impl fmt::Display for JudgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JudgeError::Daemon(err) => write!(f, "container daemon error: {err}"),
            JudgeError::Io(msg) => write!(f, "I/O error: {msg}"),
            JudgeError::Protocol(msg) => write!(f, "watchdog protocol error: {msg}"),
            JudgeError::Timeout(msg) => write!(f, "exec timed out: {msg}"),
        }
    }
}

impl std::error::Error for JudgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            JudgeError::Daemon(err) => Some(err),
            _ => None,
        }
    }
}

impl From<bollard::errors::Error> for JudgeError {
    fn from(err: bollard::errors::Error) -> Self {
        JudgeError::Daemon(err)
    }
}

impl From<std::io::Error> for JudgeError {
    fn from(err: std::io::Error) -> Self {
        JudgeError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for JudgeError {
    fn from(err: serde_json::Error) -> Self {
        JudgeError::Protocol(format!("failed to decode watchdog JSON: {err}"))
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::fmt;
use std::process::ExitCode;

/// CLI-specific error type with exit code mapping
#[derive(Debug)]
pub enum CliError {
    /// Invalid command-line arguments
    InvalidArgs(String),
    /// Channel or parameter already in use
    Busy(String),
    /// Reading or writing a file failed
    Io(String),
    /// General error from the capture core
    General(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::InvalidArgs(msg) => write!(f, "Invalid arguments: {}", msg),
            CliError::Busy(msg) => write!(f, "Busy: {}", msg),
            CliError::Io(msg) => write!(f, "I/O error: {}", msg),
            CliError::General(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::InvalidArgs(_) => ExitCode::from(2),
            CliError::Busy(_) => ExitCode::from(3),
            CliError::Io(_) => ExitCode::from(4),
            CliError::General(_) => ExitCode::from(1),
        }
    }
}

/// Map tw686x::Error to CliError with appropriate exit codes
impl From<tw686x::Error> for CliError {
    fn from(err: tw686x::Error) -> Self {
        use tw686x::Error;

        match err {
            Error::InvalidChannel(_)
            | Error::UnsupportedFormat(_)
            | Error::InvalidArgument(_)
            | Error::BufferTooSmall { .. } => CliError::InvalidArgs(err.to_string()),
            Error::Busy(what) => CliError::Busy(what.to_string()),
            _ => CliError::General(err.to_string()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err.to_string())
    }
}

/// Helper function to convert result to exit code
pub fn result_to_exit_code<T>(result: Result<T, CliError>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code()
        }
    }
}

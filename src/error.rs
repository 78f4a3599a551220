// This file is part of nova64.
// Grounded on spec.md §7: device-facing errors never unwind; this type
// exists only for the handful of host-facing constructors that load
// resources before the bus exists (ROM images, PSID files, save-directory
// setup) per zinc64-loader's image-loading failure style.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum NovaError {
    Io(String),
    Format(String),
    Config(String),
}

impl fmt::Display for NovaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NovaError::Io(msg) => write!(f, "io error: {}", msg),
            NovaError::Format(msg) => write!(f, "format error: {}", msg),
            NovaError::Config(msg) => write!(f, "config error: {}", msg),
        }
    }
}

impl std::error::Error for NovaError {}

impl From<std::io::Error> for NovaError {
    fn from(err: std::io::Error) -> Self {
        NovaError::Io(err.to_string())
    }
}

pub type NovaResult<T> = Result<T, NovaError>;

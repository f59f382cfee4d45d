//! Error types shared by the decision engine.

use thiserror::Error;

use crate::classfile::ClassFileError;

/// Failure while reading or rewriting bytecode.
///
/// Raised by backend calls. The orchestrator lets it escape `transform`
/// for the affected class unless a [`MethodErrorHandler`] swallows it
/// for a single method.
///
/// [`MethodErrorHandler`]: crate::transformer::MethodErrorHandler
#[derive(Error, Debug)]
pub enum InstrumenterError {
    /// Injected code did not compile or produced invalid bytecode.
    #[error("bytecode edit failed in {location}: {message}")]
    Bytecode { location: String, message: String },

    /// A class or member required by an edit could not be located.
    #[error("cannot locate {0}")]
    NotFound(String),

    #[error("class file: {0}")]
    ClassFile(#[from] ClassFileError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl InstrumenterError {
    pub fn bytecode(location: impl Into<String>, message: impl Into<String>) -> Self {
        InstrumenterError::Bytecode { location: location.into(), message: message.into() }
    }

    /// The class or member the failure is attributed to, if any.
    pub fn location(&self) -> Option<&str> {
        match self {
            InstrumenterError::Bytecode { location, .. } => Some(location),
            InstrumenterError::NotFound(name) => Some(name),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, InstrumenterError>;

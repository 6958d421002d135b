use std::io;
use thiserror::Error;

use crate::protocol::ExceptionKind;

pub type Result<T> = std::result::Result<T, RpcError>;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("HTTP error: {status} {reason}")]
    Http { status: u16, reason: String },
    #[error("Malformed HTTP message: {0}")]
    MalformedHttp(String),
    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),
    #[error("Transport is not open")]
    NotOpen,
    #[error("Transport is busy with another call")]
    Busy,
    #[error("Remote error ({kind}): {message}")]
    Remote { kind: ExceptionKind, message: String },
    #[error("Unknown method: {0}")]
    UnknownMethod(String),
    #[error("Bad sequence id: expected {expected}, got {actual}")]
    BadSequence { expected: u64, actual: u64 },
    #[error("Wrong method name: expected {expected}, got {actual}")]
    WrongMethodName { expected: String, actual: String },
    #[error("Unexpected message type")]
    UnexpectedMessageType,
    #[error("Mock context is already checked out by an open session")]
    ContextInUse,
}

impl From<httparse::Error> for RpcError {
    fn from(e: httparse::Error) -> Self {
        RpcError::MalformedHttp(e.to_string())
    }
}

impl RpcError {
    /// Kind of application exception this error turns into when it is
    /// raised by a processor on the server side.
    pub(crate) fn exception_kind(&self) -> ExceptionKind {
        match self {
            RpcError::UnknownMethod(_) => ExceptionKind::UnknownMethod,
            RpcError::Json(_) | RpcError::UnexpectedMessageType => ExceptionKind::ProtocolError,
            RpcError::Remote { kind, .. } => *kind,
            _ => ExceptionKind::InternalError,
        }
    }
}

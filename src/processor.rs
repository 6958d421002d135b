use async_trait::async_trait;
use log::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::protocol::{ExceptionKind, Message, MessageType};

/// Server side dispatcher: binds a handler's methods to incoming calls.
///
/// Implementations match on [`Request::method`], decode the arguments with
/// [`Request::args`], call the handler and wrap its return value with
/// [`Request::reply`]. Any error returned here is sent to the caller as an
/// exception, [`crate::RpcError::UnknownMethod`] as an `unknown_method` one.
#[async_trait]
pub trait Processor: Send + Sync + 'static {
    async fn process(&self, request: Request) -> Result<Response>;
}

#[derive(Debug)]
pub struct Request {
    message: Message,
}

impl Request {
    pub fn from_message(message: Message) -> Self {
        Self { message }
    }

    pub fn method(&self) -> &str {
        &self.message.name
    }

    pub fn seq(&self) -> u64 {
        self.message.seq
    }

    /// Decode the call arguments.
    pub fn args<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        Ok(T::deserialize(&self.message.body)?)
    }

    pub fn reply(&self, body: impl Serialize) -> Result<Response> {
        Ok(Response::from_message(Message::reply(&self.message, body)?))
    }

    pub fn exception(&self, kind: ExceptionKind, message: impl ToString) -> Response {
        Response::from_message(Message::exception(&self.message, kind, message))
    }
}

#[derive(Debug)]
pub struct Response {
    message: Message,
}

impl Response {
    pub fn from_message(message: Message) -> Self {
        Self { message }
    }

    pub(crate) fn take_message(self) -> Message {
        self.message
    }
}

/// Run one decoded message through `processor` and produce the message to
/// send back. Never fails: errors become exceptions.
pub(crate) async fn dispatch(processor: &dyn Processor, message: Message) -> Message {
    let call = Message {
        name: message.name.clone(),
        typ: message.typ,
        seq: message.seq,
        body: Value::Null,
    };
    if call.typ != MessageType::Call {
        return Message::exception(&call, ExceptionKind::ProtocolError, "Expected a call");
    }
    match processor.process(Request::from_message(message)).await {
        Ok(response) => response.take_message(),
        Err(error) => {
            debug!("{} #{} failed: {}", call.name, call.seq, error);
            Message::exception(&call, error.exception_kind(), error)
        }
    }
}

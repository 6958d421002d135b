use log::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{Result, RpcError};
use crate::transport::HttpClientTransport;

pub const CONTENT_TYPE: &str = "application/json";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Call,
    Reply,
    Exception,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKind {
    UnknownMethod,
    ProtocolError,
    InternalError,
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExceptionKind::UnknownMethod => "unknown method",
            ExceptionKind::ProtocolError => "protocol error",
            ExceptionKind::InternalError => "internal error",
        };
        f.write_str(name)
    }
}

/// Body of an `exception` message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ApplicationException {
    pub kind: ExceptionKind,
    pub message: String,
}

/// A single JSON message on the wire.
///
/// `name` is the method name, `seq` pairs a reply with its call. For calls
/// `body` holds the arguments, for replies the return value and for
/// exceptions an [`ApplicationException`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub name: String,
    #[serde(rename = "type")]
    pub typ: MessageType,
    pub seq: u64,
    #[serde(default)]
    pub body: Value,
}

impl Message {
    pub fn call(name: impl Into<String>, seq: u64, args: impl Serialize) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            typ: MessageType::Call,
            seq,
            body: serde_json::to_value(args)?,
        })
    }

    pub fn reply(call: &Message, body: impl Serialize) -> Result<Self> {
        Ok(Self {
            name: call.name.clone(),
            typ: MessageType::Reply,
            seq: call.seq,
            body: serde_json::to_value(body)?,
        })
    }

    pub fn exception(call: &Message, kind: ExceptionKind, message: impl ToString) -> Self {
        let exception = ApplicationException {
            kind,
            message: message.to_string(),
        };
        Self {
            name: call.name.clone(),
            typ: MessageType::Exception,
            seq: call.seq,
            body: serde_json::json!(exception),
        }
    }

    pub fn is_call(&self) -> bool {
        self.typ == MessageType::Call
    }

    pub fn is_reply(&self) -> bool {
        self.typ == MessageType::Reply
    }

    pub fn is_exception(&self) -> bool {
        self.typ == MessageType::Exception
    }

    /// Turn a reply into its return value, or an exception into
    /// [`RpcError::Remote`].
    pub fn into_result<T>(self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        match self.typ {
            MessageType::Reply => Ok(serde_json::from_value(self.body)?),
            MessageType::Exception => {
                let exception = match serde_json::from_value::<ApplicationException>(self.body) {
                    Ok(exception) => exception,
                    Err(e) => ApplicationException {
                        kind: ExceptionKind::InternalError,
                        message: format!("Undecodable exception: {}", e),
                    },
                };
                Err(RpcError::Remote {
                    kind: exception.kind,
                    message: exception.message,
                })
            }
            MessageType::Call => Err(RpcError::UnexpectedMessageType),
        }
    }
}

/// Encodes and decodes [`Message`]s as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonProtocolFactory;

impl JsonProtocolFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn encode(&self, message: &Message) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(message)?)
    }

    pub fn decode(&self, buf: &[u8]) -> Result<Message> {
        Ok(serde_json::from_slice(buf)?)
    }

    /// Bind a client codec over `transport`.
    pub fn protocol(&self, transport: HttpClientTransport) -> JsonProtocol {
        JsonProtocol {
            transport,
            codec: *self,
            seq: 0,
        }
    }
}

/// Client side codec. Generated stubs call [`JsonProtocol::call`] once per
/// method invocation.
#[derive(Debug)]
pub struct JsonProtocol {
    transport: HttpClientTransport,
    codec: JsonProtocolFactory,
    seq: u64,
}

impl JsonProtocol {
    pub fn new(transport: HttpClientTransport) -> Self {
        JsonProtocolFactory::new().protocol(transport)
    }

    pub fn transport(&self) -> &HttpClientTransport {
        &self.transport
    }

    pub async fn call<A, R>(&mut self, name: &str, args: A) -> Result<R>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        self.seq += 1;
        let seq = self.seq;
        let request = self.codec.encode(&Message::call(name, seq, args)?)?;
        trace!("call {} #{}", name, seq);
        let response = self.transport.round_trip(&request).await?;
        let reply = self.codec.decode(&response)?;
        if reply.seq != seq {
            return Err(RpcError::BadSequence {
                expected: seq,
                actual: reply.seq,
            });
        }
        if reply.name != name {
            return Err(RpcError::WrongMethodName {
                expected: name.to_string(),
                actual: reply.name,
            });
        }
        reply.into_result()
    }
}

//! Helpers for JSON over HTTP RPC services.
//!
//! A service is described by a contract type implementing [`ServiceContract`]
//! (client side) and [`Dispatch`] (server side). With that in place a server
//! is one call:
//!
//! ```ignore
//! let server = easyrpc::on(AdderHandler, Adder, "localhost", 10000);
//! server.serve().await?;
//! ```
//!
//! and the client side opens short-lived sessions that are always closed:
//!
//! ```ignore
//! let client = easyrpc::to(Adder, "localhost", 10000);
//! let mut session = client.open().await?;
//! assert_eq!(session.add_two(10, 20).await?, 30);
//! session.close()?;
//!
//! let sum = client
//!     .with(|adder| Box::pin(async move { adder.add_three(10, 20, 30).await }))
//!     .await?;
//! ```

mod client;
mod contract;
mod error;
mod http;
mod processor;
mod protocol;
mod server;
mod transport;
pub mod testing;

pub use client::{to, ClientProvider, ClientSession, ConnectionProvider, Session};
pub use contract::{Dispatch, ServiceContract};
pub use error::{Result, RpcError};
pub use http::MAX_MESSAGE_SIZE;
pub use processor::{Processor, Request, Response};
pub use protocol::{
    ApplicationException, ExceptionKind, JsonProtocol, JsonProtocolFactory, Message, MessageType,
};
pub use server::{on, BoundServer, HttpServer};
pub use testing::{mock_to, MockProvider, MockSession};
pub use transport::HttpClientTransport;

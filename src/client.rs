use async_trait::async_trait;
use futures::future::BoxFuture;
use log::*;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use crate::contract::ServiceContract;
use crate::error::{Result, RpcError};
use crate::protocol::JsonProtocol;
use crate::transport::{HttpClientTransport, SCHEME};

/// A scoped client session: holds a client stub for as long as the session
/// lives.
pub trait Session: Send {
    type Client: Send;

    fn client(&mut self) -> &mut Self::Client;

    /// Release the session and report a failure to do so.
    fn close(self) -> Result<()>;
}

/// Something that hands out scoped client sessions.
///
/// Implemented by [`ClientProvider`] for real connections and by
/// [`crate::testing::MockProvider`] for tests, so code that only needs
/// `open` can take either.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    type Client: Send;
    type Session: Session<Client = Self::Client>;

    async fn open(&self) -> Result<Self::Session>;

    /// Open a session, run `body` with its client and close the session.
    ///
    /// The session is closed whatever `body` returns. If `body` fails, its
    /// error is returned and a failure to close is only logged. If `body`
    /// succeeds, a failure to close is returned.
    async fn with<F, T, E>(&self, body: F) -> std::result::Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut Self::Client) -> BoxFuture<'c, std::result::Result<T, E>>
            + Send,
        T: Send,
        E: From<RpcError> + Send,
    {
        let mut session = self.open().await?;
        let outcome = body(session.client()).await;
        let closed = session.close();
        match (outcome, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(suppressed)) => {
                warn!("suppressed error while closing session: {}", suppressed);
                Err(e)
            }
        }
    }
}

/// Create a provider of client sessions to the `contract` service at
/// `http://host:port`. Does no I/O.
pub fn to<C>(_contract: C, host: impl Into<String>, port: u16) -> ClientProvider<C>
where
    C: ServiceContract,
{
    ClientProvider::new(host, port)
}

pub struct ClientProvider<C> {
    host: String,
    port: u16,
    path: String,
    contract: PhantomData<fn() -> C>,
}

impl<C> Clone for ClientProvider<C> {
    fn clone(&self) -> Self {
        Self {
            host: self.host.clone(),
            port: self.port,
            path: self.path.clone(),
            contract: PhantomData,
        }
    }
}

impl<C> fmt::Debug for ClientProvider<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientProvider")
            .field("address", &self.address())
            .field("path", &self.path)
            .finish()
    }
}

impl<C> ClientProvider<C> {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            path: "/".to_string(),
            contract: PhantomData,
        }
    }

    /// Request path to POST calls to. Defaults to `/`.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn address(&self) -> String {
        format!("{}://{}:{}", SCHEME, self.host, self.port)
    }
}

#[async_trait]
impl<C> ConnectionProvider for ClientProvider<C>
where
    C: ServiceContract,
{
    type Client = C::Client;
    type Session = ClientSession<C>;

    /// Connect and build a client stub. Fails if the server can't be
    /// reached, in which case nothing is left open.
    async fn open(&self) -> Result<ClientSession<C>> {
        let transport = HttpClientTransport::new(&format!("{}{}", self.address(), self.path))?;
        let protocol = JsonProtocol::new(transport.clone());
        let client = C::client(protocol);
        transport.open().await?;
        debug!("session opened to {}", transport.address());
        Ok(ClientSession { client, transport })
    }
}

/// An open connection and the client stub bound to it.
///
/// The connection is closed by [`Session::close`] or, on every other way out
/// of scope, when the session is dropped.
pub struct ClientSession<C: ServiceContract> {
    client: C::Client,
    transport: HttpClientTransport,
}

impl<C: ServiceContract> ClientSession<C> {
    pub fn transport(&self) -> &HttpClientTransport {
        &self.transport
    }
}

impl<C: ServiceContract> Session for ClientSession<C> {
    type Client = C::Client;

    fn client(&mut self) -> &mut C::Client {
        &mut self.client
    }

    fn close(self) -> Result<()> {
        self.transport.close()?;
        debug!("session to {} closed", self.transport.address());
        Ok(())
    }
}

impl<C: ServiceContract> Deref for ClientSession<C> {
    type Target = C::Client;

    fn deref(&self) -> &C::Client {
        &self.client
    }
}

impl<C: ServiceContract> DerefMut for ClientSession<C> {
    fn deref_mut(&mut self) -> &mut C::Client {
        &mut self.client
    }
}

impl<C: ServiceContract> Drop for ClientSession<C> {
    fn drop(&mut self) {
        if self.transport.is_open() {
            debug!("session to {} dropped while open", self.transport.address());
            if let Err(e) = self.transport.close() {
                warn!("error while closing session: {}", e);
            }
        }
    }
}

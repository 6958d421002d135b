use async_std::net::TcpStream;
use log::*;
use parking_lot::Mutex;
use std::io::ErrorKind;
use std::net::Shutdown;
use std::sync::Arc;

use crate::error::{Result, RpcError};
use crate::http::{self, Decoder, HttpResponse};
use crate::protocol::CONTENT_TYPE;

pub const SCHEME: &str = "http";
const DEFAULT_PORT: u16 = 80;

#[derive(Debug)]
enum State {
    Idle,
    Open {
        stream: TcpStream,
        // Taken out for the duration of a call.
        decoder: Option<Decoder>,
    },
    Closed,
}

/// HTTP client transport: one persistent TCP connection carrying one
/// request/response exchange at a time.
///
/// Clones share the same connection, so one clone can close the transport
/// another clone is calling through.
#[derive(Debug, Clone)]
pub struct HttpClientTransport {
    host: String,
    port: u16,
    path: String,
    state: Arc<Mutex<State>>,
}

impl HttpClientTransport {
    /// Create a transport for `http://host[:port][/path]`. Does not connect.
    pub fn new(address: &str) -> Result<Self> {
        let invalid = || RpcError::InvalidAddress(address.to_string());
        let rest = address
            .strip_prefix(SCHEME)
            .and_then(|rest| rest.strip_prefix("://"))
            .ok_or_else(invalid)?;
        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, "/"),
        };
        let (host, port) = split_authority(authority).ok_or_else(invalid)?;
        Ok(Self {
            host: host.to_string(),
            port,
            path: path.to_string(),
            state: Arc::new(Mutex::new(State::Idle)),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn address(&self) -> String {
        format!("{}://{}{}", SCHEME, self.authority(), self.path)
    }

    fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.state.lock(), State::Open { .. })
    }

    /// Connect to the peer. A no-op if already open. A transport that has
    /// been closed stays closed and fails with [`RpcError::NotOpen`].
    pub async fn open(&self) -> Result<()> {
        let current = match *self.state.lock() {
            State::Open { .. } => Some(Ok(())),
            State::Closed => Some(Err(RpcError::NotOpen)),
            State::Idle => None,
        };
        if let Some(res) = current {
            return res;
        }
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        stream.set_nodelay(true)?;

        // The state may have moved on while connecting.
        let mut state = self.state.lock();
        if matches!(*state, State::Idle) {
            debug!("connected to {}", self.address());
            *state = State::Open {
                stream,
                decoder: Some(Decoder::default()),
            };
            return Ok(());
        }
        let closed = matches!(*state, State::Closed);
        drop(state);
        if closed {
            let _ = stream.shutdown(Shutdown::Both);
            return Err(RpcError::NotOpen);
        }
        Ok(())
    }

    /// Shut the connection down. Closing a transport that is not open is a
    /// no-op, so only the first close of an open transport touches the socket.
    pub fn close(&self) -> Result<()> {
        let state = std::mem::replace(&mut *self.state.lock(), State::Closed);
        match state {
            State::Open { stream, .. } => {
                debug!("closing connection to {}", self.address());
                match stream.shutdown(Shutdown::Both) {
                    // The peer hung up first.
                    Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
                    res => res.map_err(RpcError::from),
                }
            }
            State::Idle | State::Closed => Ok(()),
        }
    }

    /// Send `body` as one HTTP POST and return the body of the `200 OK` reply.
    ///
    /// If the exchange fails or the future is dropped before the reply is
    /// read, the connection is closed: the stream may be left mid-message.
    pub async fn round_trip(&self, body: &[u8]) -> Result<Vec<u8>> {
        let (stream, mut decoder) = self.checkout()?;
        let call = InFlight {
            transport: self,
            done: false,
        };
        let response = self.exchange(&stream, &mut decoder, body).await?;
        call.finish(decoder, response.keep_alive);

        if response.status != 200 {
            return Err(RpcError::Http {
                status: response.status,
                reason: response.reason,
            });
        }
        Ok(response.body)
    }

    async fn exchange(
        &self,
        stream: &TcpStream,
        decoder: &mut Decoder,
        body: &[u8],
    ) -> Result<HttpResponse> {
        let mut writer = stream;
        let mut reader = stream;
        http::write_request(&mut writer, &self.authority(), &self.path, CONTENT_TYPE, body)
            .await?;
        decoder.read_response(&mut reader).await
    }

    fn checkout(&self) -> Result<(TcpStream, Decoder)> {
        match &mut *self.state.lock() {
            State::Open { stream, decoder } => {
                let decoder = decoder.take().ok_or(RpcError::Busy)?;
                Ok((stream.clone(), decoder))
            }
            State::Idle | State::Closed => Err(RpcError::NotOpen),
        }
    }

    fn checkin(&self, decoder: Decoder) {
        if let State::Open { decoder: slot, .. } = &mut *self.state.lock() {
            *slot = Some(decoder);
        }
    }
}

/// A call between checkout and checkin. Dropped without [`finish`], it
/// closes the transport.
///
/// [`finish`]: InFlight::finish
struct InFlight<'a> {
    transport: &'a HttpClientTransport,
    done: bool,
}

impl InFlight<'_> {
    fn finish(mut self, decoder: Decoder, keep_alive: bool) {
        self.done = true;
        if keep_alive {
            self.transport.checkin(decoder);
        } else {
            debug!("{} closed the connection", self.transport.address());
            if let Err(e) = self.transport.close() {
                warn!("error while closing transport: {}", e);
            }
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.done {
            debug!(
                "call to {} did not complete, closing connection",
                self.transport.address()
            );
            if let Err(e) = self.transport.close() {
                warn!("error while closing transport: {}", e);
            }
        }
    }
}

fn split_authority(authority: &str) -> Option<(&str, u16)> {
    let (host, port) = if let Some(rest) = authority.strip_prefix('[') {
        let end = rest.find(']')?;
        (&rest[..end], rest[end + 1..].strip_prefix(':'))
    } else {
        match authority.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };
    if host.is_empty() {
        return None;
    }
    let port = match port {
        Some(port) => port.parse().ok()?,
        None => DEFAULT_PORT,
    };
    Some((host, port))
}

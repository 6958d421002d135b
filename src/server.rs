use async_std::net::{SocketAddr, TcpListener, TcpStream};
use async_std::prelude::*;
use async_std::task;
use log::*;
use std::sync::Arc;

use crate::contract::Dispatch;
use crate::error::{Result, RpcError};
use crate::http::{self, Decoder, MAX_MESSAGE_SIZE};
use crate::processor::{dispatch, Processor};
use crate::protocol::{JsonProtocolFactory, CONTENT_TYPE};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Create a JSON over HTTP server for `handler`.
///
/// Nothing is bound until [`HttpServer::bind`] or [`HttpServer::serve`] is
/// called.
pub fn on<C, H>(handler: H, _contract: C, host: impl Into<String>, port: u16) -> HttpServer
where
    C: Dispatch<H>,
{
    HttpServer::new(C::processor(handler), JsonProtocolFactory::new(), host, port)
}

pub struct HttpServer {
    processor: Arc<dyn Processor>,
    protocol: JsonProtocolFactory,
    host: String,
    port: u16,
    max_message_size: usize,
}

impl HttpServer {
    pub fn new(
        processor: impl Processor,
        protocol: JsonProtocolFactory,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            processor: Arc::new(processor),
            protocol,
            host: host.into(),
            port,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }

    /// Largest request body accepted. Bigger requests get a
    /// `413 Payload Too Large` and the connection is closed.
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn bind(self) -> Result<BoundServer> {
        let listener = TcpListener::bind((self.host.as_str(), self.port)).await?;
        info!("listening on {}", listener.local_addr()?);
        Ok(BoundServer {
            listener,
            server: self,
        })
    }

    /// Bind and accept connections until the listener fails.
    pub async fn serve(self) -> Result<()> {
        self.bind().await?.run().await
    }
}

/// A server with a bound listener, ready to [`run`](BoundServer::run).
pub struct BoundServer {
    listener: TcpListener,
    server: HttpServer,
}

impl BoundServer {
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) -> Result<()> {
        let BoundServer { listener, server } = self;
        let mut incoming = listener.incoming();
        while let Some(stream) = incoming.next().await {
            let stream = stream?;
            let peer_addr = stream.peer_addr().ok();
            debug!("new connection from {:?}", peer_addr);
            let connection = Connection {
                processor: server.processor.clone(),
                protocol: server.protocol,
                max_message_size: server.max_message_size,
            };
            task::spawn(async move {
                if let Err(e) = connection.serve(stream).await {
                    warn!("connection from {:?} failed: {}", peer_addr, e);
                }
                debug!("connection closed from {:?}", peer_addr);
            });
        }
        info!("server closed");
        Ok(())
    }
}

struct Connection {
    processor: Arc<dyn Processor>,
    protocol: JsonProtocolFactory,
    max_message_size: usize,
}

impl Connection {
    async fn serve(self, stream: TcpStream) -> Result<()> {
        let mut reader = &stream;
        let mut writer = &stream;
        let mut decoder = Decoder::new(self.max_message_size);
        loop {
            let request = match decoder.read_request(&mut reader).await {
                Ok(Some(request)) => request,
                Ok(None) => return Ok(()),
                Err(RpcError::MessageTooLarge(len)) => {
                    let body = format!("Request body of {} bytes is too large", len);
                    http::write_response(
                        &mut writer,
                        413,
                        "Payload Too Large",
                        TEXT_PLAIN,
                        body.as_bytes(),
                        false,
                    )
                    .await?;
                    return Err(RpcError::MessageTooLarge(len));
                }
                Err(RpcError::MalformedHttp(reason)) => {
                    http::write_response(
                        &mut writer,
                        400,
                        "Bad Request",
                        TEXT_PLAIN,
                        reason.as_bytes(),
                        false,
                    )
                    .await?;
                    return Err(RpcError::MalformedHttp(reason));
                }
                Err(e) => return Err(e),
            };
            trace!("{} {} ({} bytes)", request.method, request.path, request.body.len());

            let keep_alive = request.keep_alive;
            if request.method != "POST" {
                http::write_response(
                    &mut writer,
                    405,
                    "Method Not Allowed",
                    TEXT_PLAIN,
                    b"Only POST is supported",
                    keep_alive,
                )
                .await?;
            } else {
                match self.protocol.decode(&request.body) {
                    Ok(message) => {
                        let reply = dispatch(&*self.processor, message).await;
                        let body = self.protocol.encode(&reply)?;
                        http::write_response(&mut writer, 200, "OK", CONTENT_TYPE, &body, keep_alive)
                            .await?;
                    }
                    Err(e) => {
                        let body = e.to_string();
                        http::write_response(
                            &mut writer,
                            400,
                            "Bad Request",
                            TEXT_PLAIN,
                            body.as_bytes(),
                            keep_alive,
                        )
                        .await?;
                    }
                }
            }
            if !keep_alive {
                return Ok(());
            }
        }
    }
}

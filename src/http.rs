//! Just enough HTTP/1.1 to carry one JSON message per request and response.
//!
//! Heads are parsed with `httparse`, bodies are framed by `Content-Length`.
//! Chunked transfer encoding is rejected.
use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use httparse::Status;
use log::*;
use std::io;

use crate::error::{Result, RpcError};

// 4MB is the default max body size (will be much smaller usually).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024 * 4;
const MAX_HEAD_SIZE: usize = 1024 * 64;
const MAX_HEADERS: usize = 32;
const READ_CHUNK: usize = 1024 * 8;

#[derive(Debug)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub keep_alive: bool,
    pub body: Vec<u8>,
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub keep_alive: bool,
    pub body: Vec<u8>,
}

#[derive(Debug)]
struct Head<T> {
    start: T,
    content_length: usize,
    keep_alive: bool,
}

/// Reads HTTP messages off a byte stream.
///
/// Bytes read past the end of one message are kept for the next one, so a
/// decoder must live as long as the connection it reads from.
#[derive(Debug)]
pub struct Decoder {
    buf: Vec<u8>,
    max_message_size: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_SIZE)
    }
}

impl Decoder {
    pub fn new(max_message_size: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_message_size,
        }
    }

    /// Read the next request. Returns `None` if the peer closed the stream
    /// between two requests.
    pub async fn read_request<R>(&mut self, reader: &mut R) -> Result<Option<HttpRequest>>
    where
        R: AsyncRead + Unpin,
    {
        let head = match self.read_head(reader, parse_request).await? {
            Some(head) => head,
            None => return Ok(None),
        };
        let body = self.read_body(reader, head.content_length).await?;
        let (method, path) = head.start;
        Ok(Some(HttpRequest {
            method,
            path,
            keep_alive: head.keep_alive,
            body,
        }))
    }

    pub async fn read_response<R>(&mut self, reader: &mut R) -> Result<HttpResponse>
    where
        R: AsyncRead + Unpin,
    {
        let head = match self.read_head(reader, parse_response).await? {
            Some(head) => head,
            None => return Err(unexpected_eof()),
        };
        let body = self.read_body(reader, head.content_length).await?;
        let (status, reason) = head.start;
        Ok(HttpResponse {
            status,
            reason,
            keep_alive: head.keep_alive,
            body,
        })
    }

    async fn read_head<R, T, F>(&mut self, reader: &mut R, parse: F) -> Result<Option<Head<T>>>
    where
        R: AsyncRead + Unpin,
        F: Fn(&[u8]) -> Result<Option<(usize, Head<T>)>>,
    {
        loop {
            if !self.buf.is_empty() {
                if let Some((len, head)) = parse(&self.buf)? {
                    self.buf.drain(..len);
                    if head.content_length > self.max_message_size {
                        return Err(RpcError::MessageTooLarge(head.content_length));
                    }
                    return Ok(Some(head));
                }
                if self.buf.len() > MAX_HEAD_SIZE {
                    return Err(RpcError::MalformedHttp("Header section too long".into()));
                }
            }
            if self.fill(reader).await? == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(unexpected_eof());
            }
        }
    }

    async fn read_body<R>(&mut self, reader: &mut R, len: usize) -> Result<Vec<u8>>
    where
        R: AsyncRead + Unpin,
    {
        while self.buf.len() < len {
            if self.fill(reader).await? == 0 {
                return Err(unexpected_eof());
            }
        }
        Ok(self.buf.drain(..len).collect())
    }

    async fn fill<R>(&mut self, reader: &mut R) -> Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        let mut chunk = [0u8; READ_CHUNK];
        let n = reader.read(&mut chunk).await?;
        trace!("read {} bytes", n);
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }
}

fn parse_request(buf: &[u8]) -> Result<Option<(usize, Head<(String, String)>)>> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut request = httparse::Request::new(&mut headers);
    match request.parse(buf)? {
        Status::Partial => Ok(None),
        Status::Complete(len) => {
            let method = request.method.unwrap_or_default().to_string();
            let path = request.path.unwrap_or("/").to_string();
            let (content_length, keep_alive) =
                framing(request.headers, request.version.unwrap_or(1))?;
            let head = Head {
                start: (method, path),
                content_length,
                keep_alive,
            };
            Ok(Some((len, head)))
        }
    }
}

fn parse_response(buf: &[u8]) -> Result<Option<(usize, Head<(u16, String)>)>> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut response = httparse::Response::new(&mut headers);
    match response.parse(buf)? {
        Status::Partial => Ok(None),
        Status::Complete(len) => {
            let status = response.code.unwrap_or_default();
            let reason = response.reason.unwrap_or_default().to_string();
            let (content_length, keep_alive) =
                framing(response.headers, response.version.unwrap_or(1))?;
            let head = Head {
                start: (status, reason),
                content_length,
                keep_alive,
            };
            Ok(Some((len, head)))
        }
    }
}

/// Body length and connection persistence from the headers.
fn framing(headers: &[httparse::Header<'_>], version: u8) -> Result<(usize, bool)> {
    let mut content_length = 0;
    // HTTP/1.1 connections persist unless told otherwise, HTTP/1.0 ones don't.
    let mut keep_alive = version >= 1;
    for header in headers {
        let value = std::str::from_utf8(header.value)
            .map_err(|_| RpcError::MalformedHttp(format!("Invalid {} header", header.name)))?
            .trim();
        if header.name.eq_ignore_ascii_case("content-length") {
            content_length = value
                .parse()
                .map_err(|_| RpcError::MalformedHttp(format!("Invalid Content-Length {}", value)))?;
        } else if header.name.eq_ignore_ascii_case("transfer-encoding") {
            return Err(RpcError::MalformedHttp(format!(
                "Unsupported Transfer-Encoding {}",
                value
            )));
        } else if header.name.eq_ignore_ascii_case("connection") {
            if value.eq_ignore_ascii_case("close") {
                keep_alive = false;
            } else if value.eq_ignore_ascii_case("keep-alive") {
                keep_alive = true;
            }
        }
    }
    Ok((content_length, keep_alive))
}

fn unexpected_eof() -> RpcError {
    io::Error::new(io::ErrorKind::UnexpectedEof, "Connection closed mid-message").into()
}

pub async fn write_request<W>(
    writer: &mut W,
    host: &str,
    path: &str,
    content_type: &str,
    body: &[u8],
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let head = format!(
        "POST {} HTTP/1.1\r\nHost: {}\r\nContent-Type: {}\r\nAccept: {}\r\nContent-Length: {}\r\n\r\n",
        path,
        host,
        content_type,
        content_type,
        body.len()
    );
    send(writer, head, body).await
}

pub async fn write_response<W>(
    writer: &mut W,
    status: u16,
    reason: &str,
    content_type: &str,
    body: &[u8],
    keep_alive: bool,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let connection = if keep_alive { "keep-alive" } else { "close" };
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: {}\r\n\r\n",
        status,
        reason,
        content_type,
        body.len(),
        connection
    );
    send(writer, head, body).await
}

async fn send<W>(writer: &mut W, head: String, body: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    trace!("send {:?}", head);
    writer.write_all(head.as_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

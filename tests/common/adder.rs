// Contract for a small adding service, written the way a code generator
// would emit it.

use async_trait::async_trait;
use easyrpc::{
    Dispatch, HttpClientTransport, JsonProtocol, Processor, Request, Response, Result, RpcError,
    ServiceContract,
};
use serde::{Deserialize, Serialize};

pub use client::AdderClient;
pub use server::{AdderHandler, AdderProcessor};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddTwoArgs {
    pub a: i64,
    pub b: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddThreeArgs {
    pub a: i64,
    pub b: i64,
    pub c: i64,
}

/// The `Adder` service.
pub struct Adder;

impl ServiceContract for Adder {
    type Client = AdderClient;

    fn client(protocol: JsonProtocol) -> AdderClient {
        AdderClient::new(protocol)
    }
}

impl<H> Dispatch<H> for Adder
where
    H: AdderHandler,
{
    type Processor = AdderProcessor<H>;

    fn processor(handler: H) -> AdderProcessor<H> {
        AdderProcessor::new(handler)
    }
}

pub mod server {
    use super::*;

    #[async_trait]
    pub trait AdderHandler: Send + Sync + 'static {
        async fn add_two(&self, a: i64, b: i64) -> Result<i64>;
        async fn add_three(&self, a: i64, b: i64, c: i64) -> Result<i64>;
    }

    pub struct AdderProcessor<H> {
        handler: H,
    }

    impl<H> AdderProcessor<H> {
        pub fn new(handler: H) -> Self {
            Self { handler }
        }
    }

    #[async_trait]
    impl<H> Processor for AdderProcessor<H>
    where
        H: AdderHandler,
    {
        async fn process(&self, request: Request) -> Result<Response> {
            match request.method() {
                "addTwo" => {
                    let args: AddTwoArgs = request.args()?;
                    let res = self.handler.add_two(args.a, args.b).await?;
                    request.reply(res)
                }
                "addThree" => {
                    let args: AddThreeArgs = request.args()?;
                    let res = self.handler.add_three(args.a, args.b, args.c).await?;
                    request.reply(res)
                }
                other => Err(RpcError::UnknownMethod(other.to_string())),
            }
        }
    }
}

pub mod client {
    use super::*;

    pub struct AdderClient {
        protocol: JsonProtocol,
    }

    impl AdderClient {
        pub fn new(protocol: JsonProtocol) -> Self {
            Self { protocol }
        }

        pub fn transport(&self) -> &HttpClientTransport {
            self.protocol.transport()
        }

        pub async fn add_two(&mut self, a: i64, b: i64) -> Result<i64> {
            self.protocol.call("addTwo", AddTwoArgs { a, b }).await
        }

        pub async fn add_three(&mut self, a: i64, b: i64, c: i64) -> Result<i64> {
            self.protocol.call("addThree", AddThreeArgs { a, b, c }).await
        }
    }
}

/// Handler that actually adds.
pub struct AdderService;

#[async_trait]
impl AdderHandler for AdderService {
    async fn add_two(&self, a: i64, b: i64) -> Result<i64> {
        Ok(a + b)
    }

    async fn add_three(&self, a: i64, b: i64, c: i64) -> Result<i64> {
        Ok(a + b + c)
    }
}

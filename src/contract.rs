use crate::processor::Processor;
use crate::protocol::JsonProtocol;

/// Describes one RPC service. Implemented by a (usually zero-sized) marker
/// type that is passed to [`crate::on`] and [`crate::to`].
pub trait ServiceContract: Send + Sync + 'static {
    /// Typed client stub whose methods issue calls through a [`JsonProtocol`].
    type Client: Send;

    fn client(protocol: JsonProtocol) -> Self::Client;
}

/// Server side of a [`ServiceContract`] for handlers of type `H`.
///
/// Contracts implement this for every `H` implementing the service's
/// handler trait.
pub trait Dispatch<H>: ServiceContract {
    type Processor: Processor;

    fn processor(handler: H) -> Self::Processor;
}

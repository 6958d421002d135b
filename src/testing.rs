//! Test double for [`ClientProvider`](crate::ClientProvider).
//!
//! Code that takes an `impl ConnectionProvider` can be handed a
//! [`MockProvider`] in tests. Every session opened on it yields the same mock
//! instance, so expectations configured once through
//! [`MockProvider::context`] are seen by every session:
//!
//! ```ignore
//! let client = easyrpc::mock_to::<MockAdderApi>();
//! client.context().expect_add_two().returning(|a, b| Ok(a + b + 10));
//! let sum = client
//!     .with(|adder| Box::pin(async move { adder.add_two(10, 20).await }))
//!     .await?;
//! assert_eq!(sum, 40);
//! ```
use async_trait::async_trait;
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::client::{ConnectionProvider, Session};
use crate::error::{Result, RpcError};

/// Create a mock provider around `M::default()`.
pub fn mock_to<M>() -> MockProvider<M>
where
    M: Default + Send + 'static,
{
    MockProvider::new(M::default())
}

/// Hands out sessions over one shared mock. Clones share the mock too.
///
/// A session holds the mock by `&mut` for as long as it is open, so only one
/// session can be open at a time. Opening a second one before the first is
/// released fails with [`RpcError::ContextInUse`], and [`context`] panics.
/// Code that nests sessions works against a [`ClientProvider`] but not
/// against this provider. Release the outer session first, or keep one
/// session open and share its client.
///
/// [`context`]: MockProvider::context
/// [`ClientProvider`]: crate::ClientProvider
pub struct MockProvider<M> {
    // Empty while a session has the mock checked out.
    context: Arc<Mutex<Option<M>>>,
}

impl<M> Clone for MockProvider<M> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
        }
    }
}

impl<M> MockProvider<M>
where
    M: Send + 'static,
{
    pub fn new(mock: M) -> Self {
        Self {
            context: Arc::new(Mutex::new(Some(mock))),
        }
    }

    /// The shared mock, for setting expectations.
    ///
    /// # Panics
    ///
    /// If a session is open on this provider. Use
    /// [`try_context`](Self::try_context) to get an error instead.
    pub fn context(&self) -> MappedMutexGuard<'_, M> {
        match self.try_context() {
            Ok(context) => context,
            Err(e) => panic!("{}", e),
        }
    }

    pub fn try_context(&self) -> Result<MappedMutexGuard<'_, M>> {
        MutexGuard::try_map(self.context.lock(), |slot| slot.as_mut())
            .map_err(|_| RpcError::ContextInUse)
    }
}

#[async_trait]
impl<M> ConnectionProvider for MockProvider<M>
where
    M: Send + 'static,
{
    type Client = M;
    type Session = MockSession<M>;

    /// Check the mock out. Fails with [`RpcError::ContextInUse`] while
    /// another session on this provider is open.
    async fn open(&self) -> Result<MockSession<M>> {
        let mock = self.context.lock().take().ok_or(RpcError::ContextInUse)?;
        Ok(MockSession {
            mock: Some(mock),
            slot: self.context.clone(),
        })
    }
}

/// Session over a [`MockProvider`]. Hands the mock back when released.
pub struct MockSession<M> {
    mock: Option<M>,
    slot: Arc<Mutex<Option<M>>>,
}

impl<M> MockSession<M> {
    fn mock_mut(&mut self) -> &mut M {
        match self.mock.as_mut() {
            Some(mock) => mock,
            None => unreachable!("mock is only taken on drop"),
        }
    }
}

impl<M: Send> Session for MockSession<M> {
    type Client = M;

    fn client(&mut self) -> &mut M {
        self.mock_mut()
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}

impl<M> Deref for MockSession<M> {
    type Target = M;

    fn deref(&self) -> &M {
        match self.mock.as_ref() {
            Some(mock) => mock,
            None => unreachable!("mock is only taken on drop"),
        }
    }
}

impl<M> DerefMut for MockSession<M> {
    fn deref_mut(&mut self) -> &mut M {
        self.mock_mut()
    }
}

impl<M> Drop for MockSession<M> {
    fn drop(&mut self) {
        if let Some(mock) = self.mock.take() {
            *self.slot.lock() = Some(mock);
        }
    }
}

//! Transport-agnostic seam the three streaming patterns operate over
//! (spec.md §9: "model as three independent higher-order functions
//! parameterised by `<I,O>`"). `LocalTransport` is the in-process
//! implementation; a real wire transport (gRPC or otherwise) would
//! implement the same trait without changing the patterns themselves.

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::error::StreamError;

#[async_trait]
pub trait Transport<I, O>: Send + Sync
where
    I: Send,
    O: Send,
{
    async fn send(&self, item: I) -> Result<(), StreamError>;

    /// Read the next streamed message, or `Ok(None)` on EOF.
    async fn recv(&self) -> Result<Option<O>, StreamError>;

    /// Half-close the send direction. Idempotent.
    async fn close_send(&self);

    /// Client-stream terminal call: close the send direction and await the
    /// single final response (spec.md §4.3, "client pattern").
    async fn close_and_recv(&self) -> Result<O, StreamError> {
        self.close_send().await;
        match self.recv().await? {
            Some(o) => Ok(o),
            None => Err(StreamError::Internal("stream closed before a final response arrived".into())),
        }
    }
}

/// In-process transport backed by `tokio::sync::mpsc`, pairing one
/// `LocalTransport<I, O>` (client side) with one `LocalTransport<O, I>`
/// (server side) via `local_pair`.
pub struct LocalTransport<I, O> {
    outbound: Mutex<Option<mpsc::Sender<I>>>,
    inbound: Mutex<mpsc::Receiver<O>>,
}

/// Channel capacity for each direction of a local pair. Bounded so Send
/// exhibits the same back-pressure spec.md §4.3 expects of a real wire
/// transport.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

pub fn local_pair<I, O>() -> (LocalTransport<I, O>, LocalTransport<O, I>)
where
    I: Send + 'static,
    O: Send + 'static,
{
    local_pair_with_capacity(DEFAULT_CHANNEL_CAPACITY)
}

pub fn local_pair_with_capacity<I, O>(capacity: usize) -> (LocalTransport<I, O>, LocalTransport<O, I>)
where
    I: Send + 'static,
    O: Send + 'static,
{
    let (a_to_b_tx, a_to_b_rx) = mpsc::channel::<I>(capacity);
    let (b_to_a_tx, b_to_a_rx) = mpsc::channel::<O>(capacity);

    let client = LocalTransport {
        outbound: Mutex::new(Some(a_to_b_tx)),
        inbound: Mutex::new(b_to_a_rx),
    };
    let server = LocalTransport {
        outbound: Mutex::new(Some(b_to_a_tx)),
        inbound: Mutex::new(a_to_b_rx),
    };
    (client, server)
}

#[async_trait]
impl<I, O> Transport<I, O> for LocalTransport<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    async fn send(&self, item: I) -> Result<(), StreamError> {
        let guard = self.outbound.lock().await;
        match guard.as_ref() {
            Some(tx) => tx.send(item).await.map_err(|e| StreamError::Send(e.to_string())),
            None => Err(StreamError::Send("send on closed transport".into())),
        }
    }

    async fn recv(&self) -> Result<Option<O>, StreamError> {
        let mut inbound = self.inbound.lock().await;
        Ok(inbound.recv().await)
    }

    async fn close_send(&self) {
        self.outbound.lock().await.take();
    }
}

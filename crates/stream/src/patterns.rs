//! The three generic streaming processor patterns (spec.md §4.3), each a
//! higher-order async function parameterised by `<I, O>` over a
//! [`Transport`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::StreamError;
use crate::transport::Transport;

/// Client pattern (many→one). Consumes `input` and sends each item through
/// `transport`; on channel close, half-closes the send direction and awaits
/// the single final response. On send error or cancellation, returns the
/// error immediately without waiting for further input.
pub async fn client_stream<I, O, T>(
    mut input: mpsc::Receiver<I>,
    transport: Arc<T>,
    cancel: CancellationToken,
) -> Result<O, StreamError>
where
    I: Send + 'static,
    O: Send + 'static,
    T: Transport<I, O> + ?Sized,
{
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                transport.close_send().await;
                return Err(StreamError::Cancelled);
            }
            item = input.recv() => {
                match item {
                    Some(item) => transport.send(item).await?,
                    None => break,
                }
            }
        }
    }
    transport.close_and_recv().await
}

/// Sequential bidi (pair-wise). For each input item: Send, then Recv, then
/// invoke `callback(input, output)`. Strict ordering preserved; if the
/// callback returns an error, the loop terminates immediately.
pub async fn sequential_bidi<I, O, T, F>(
    mut input: mpsc::Receiver<I>,
    transport: Arc<T>,
    cancel: CancellationToken,
    mut callback: F,
) -> Result<(), StreamError>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
    T: Transport<I, O> + ?Sized,
    F: FnMut(I, O) -> Result<(), StreamError>,
{
    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StreamError::Cancelled),
            item = input.recv() => item,
        };
        let item = match item {
            Some(item) => item,
            None => return Ok(()),
        };

        if cancel.is_cancelled() {
            return Err(StreamError::Cancelled);
        }
        transport.send(item.clone()).await?;

        let output = match transport.recv().await? {
            Some(output) => output,
            None => return Ok(()),
        };

        callback(item, output)?;
    }
}

/// Result of [`concurrent_bidi`]: three channels bundling results, the
/// first error (capacity 1, further errors discarded), and a done signal
/// closed strictly after both the sender and receiver tasks return
/// (spec.md §4.3 invariants).
pub struct StreamResult<O> {
    pub results: mpsc::Receiver<O>,
    pub errors: mpsc::Receiver<StreamError>,
    pub done: tokio::sync::oneshot::Receiver<()>,
}

/// Concurrent bidi (true streaming). Spawns a sender task ranging over
/// `input` (terminating by half-close) and a receiver task looping on Recv
/// until EOF, with no ordering guarantee between the two. Cancellation
/// terminates both tasks; every spawned task closes its output channel on
/// exit.
pub fn concurrent_bidi<I, O, T>(
    mut input: mpsc::Receiver<I>,
    transport: Arc<T>,
    cancel: CancellationToken,
) -> StreamResult<O>
where
    I: Send + 'static,
    O: Send + 'static,
    T: Transport<I, O> + ?Sized + 'static,
{
    let (results_tx, results_rx) = mpsc::channel(64);
    let (errors_tx, errors_rx) = mpsc::channel(1);
    let (done_tx, done_rx) = tokio::sync::oneshot::channel();

    let sender_cancel = cancel.clone();
    let sender_transport = transport.clone();
    let sender_errors = errors_tx.clone();
    let sender_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = sender_cancel.cancelled() => {
                    let _ = sender_errors.try_send(StreamError::Cancelled);
                    break;
                }
                item = input.recv() => {
                    match item {
                        Some(item) => {
                            if let Err(e) = sender_transport.send(item).await {
                                let _ = sender_errors.try_send(e);
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }
        sender_transport.close_send().await;
    });

    let receiver_cancel = cancel;
    let receiver_transport = transport;
    let receiver_errors = errors_tx;
    let receiver_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = receiver_cancel.cancelled() => {
                    let _ = receiver_errors.try_send(StreamError::Cancelled);
                    break;
                }
                out = receiver_transport.recv() => {
                    match out {
                        Ok(Some(o)) => {
                            if results_tx.send(o).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            let _ = receiver_errors.try_send(e);
                            break;
                        }
                    }
                }
            }
        }
    });

    tokio::spawn(async move {
        let _ = tokio::join!(sender_task, receiver_task);
        let _ = done_tx.send(());
    });

    StreamResult { results: results_rx, errors: errors_rx, done: done_rx }
}

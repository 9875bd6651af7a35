//! agdir_stream
//!
//! Generic streaming processor patterns (spec.md §4.3): client (many→one),
//! sequential bidi (pair-wise), and concurrent bidi (true streaming), all
//! parameterised over a transport-agnostic [`Transport`] trait.

mod error;
mod patterns;
mod transport;

pub use error::StreamError;
pub use patterns::{client_stream, concurrent_bidi, sequential_bidi, StreamResult};
pub use transport::{local_pair, local_pair_with_capacity, LocalTransport, Transport, DEFAULT_CHANNEL_CAPACITY};

pub use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn client_stream_returns_final_response_on_channel_close() {
        let (client, server) = local_pair::<u32, u32>();
        let client = Arc::new(client);

        let (tx, rx) = tokio::sync::mpsc::channel(8);
        tokio::spawn(async move {
            for i in 0..5u32 {
                tx.send(i).await.unwrap();
            }
        });

        let server_task = tokio::spawn(async move {
            let mut sum = 0u32;
            while let Ok(Some(item)) = server.recv().await {
                sum += item;
            }
            server.send(sum).await.unwrap();
        });

        let result = client_stream(rx, client, CancellationToken::new()).await.unwrap();
        server_task.await.unwrap();
        assert_eq!(result, 0 + 1 + 2 + 3 + 4);
    }

    #[tokio::test]
    async fn client_stream_propagates_cancellation() {
        let (client, _server) = local_pair::<u32, u32>();
        let client = Arc::new(client);
        let (_tx, rx) = tokio::sync::mpsc::channel::<u32>(8);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client_stream(rx, client, cancel).await;
        assert!(matches!(result, Err(StreamError::Cancelled)));
    }

    #[tokio::test]
    async fn sequential_bidi_preserves_pairwise_ordering() {
        let (client, server) = local_pair::<u32, u32>();
        let client = Arc::new(client);

        let (tx, rx) = tokio::sync::mpsc::channel(8);
        tokio::spawn(async move {
            for i in 0..3u32 {
                tx.send(i).await.unwrap();
            }
        });

        let server_task = tokio::spawn(async move {
            while let Ok(Some(item)) = server.recv().await {
                server.send(item * 10).await.unwrap();
            }
        });

        let mut seen = Vec::new();
        sequential_bidi(rx, client, CancellationToken::new(), |input, output| {
            seen.push((input, output));
            Ok(())
        })
        .await
        .unwrap();

        drop(server_task);
        assert_eq!(seen, vec![(0, 0), (1, 10), (2, 20)]);
    }

    #[tokio::test]
    async fn concurrent_bidi_delivers_all_results_and_closes_done() {
        let (client, server) = local_pair::<u32, u32>();
        let client = Arc::new(client);

        let (tx, rx) = tokio::sync::mpsc::channel(8);
        tokio::spawn(async move {
            for i in 0..5u32 {
                tx.send(i).await.unwrap();
            }
        });

        tokio::spawn(async move {
            while let Ok(Some(item)) = server.recv().await {
                let _ = server.send(item).await;
            }
        });

        let mut stream = concurrent_bidi(rx, client, CancellationToken::new());
        let mut results = Vec::new();
        while let Some(item) = stream.results.recv().await {
            results.push(item);
        }
        results.sort_unstable();
        assert_eq!(results, vec![0, 1, 2, 3, 4]);
        assert!(stream.errors.try_recv().is_err());
        stream.done.await.unwrap();
    }
}

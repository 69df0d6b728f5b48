//! Message consumption engine
//!
//! Three consumption modes layered over one backend pull primitive:
//!
//! - single receive: the first message to arrive within the timeout
//! - batch receive: up to `batch_size` messages within the timeout
//! - listen: repeated batch cycles feeding a sequential handler
//!
//! All three share one accumulation primitive: a spawned pull task feeds a
//! rendezvous channel and races the caller's deadline; whichever settles
//! first wins, and the loser is told to stop. Every delivered message is
//! acknowledged the moment the engine takes ownership of it - before any
//! handler runs. Delivery is therefore at most once from the backend's view;
//! handlers that must not lose messages need to be idempotent upstream.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::error::{Error, Result};
use crate::messaging::{Listener, Message, MessageSource, PulledMessage, Shutdown};

/// Pause after a listen cycle that yielded nothing, to avoid a tight poll
/// loop against an idle subscription.
const EMPTY_CYCLE_BACKOFF: Duration = Duration::from_secs(1);

/// Messages collected per listen cycle.
const LISTEN_CYCLE_BATCH: usize = 10;

/// Wall-clock bound of one listen cycle.
const LISTEN_CYCLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Consumption engine over one message source.
///
/// Handler invocations and deliveries within a call are strictly ordered;
/// run several engines over disjoint subscriptions for parallelism.
pub struct Consumer<S> {
    source: Arc<S>,
}

impl<S: MessageSource + 'static> Consumer<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    /// Wait up to `timeout` for one message.
    ///
    /// The message is acknowledged before it is returned. Fails with
    /// `NoMessagesFound` when the timeout elapses first.
    pub async fn receive(&self, timeout: Duration) -> Result<Message> {
        let mut batch = self.accumulate(1, timeout).await?;
        match batch.pop() {
            Some(message) => Ok(message),
            None => Err(Error::NoMessagesFound),
        }
    }

    /// Collect up to `batch_size` messages within `timeout`.
    ///
    /// A timeout with at least one message collected returns that partial
    /// batch as a success; a timeout with none fails with `NoMessagesFound`.
    pub async fn receive_batch(
        &self,
        batch_size: usize,
        timeout: Duration,
    ) -> Result<Vec<Message>> {
        if batch_size == 0 {
            return Err(Error::Unsupported(
                "batch size must be non-zero".to_string(),
            ));
        }
        let batch = self.accumulate(batch_size, timeout).await?;
        if batch.is_empty() {
            return Err(Error::NoMessagesFound);
        }
        Ok(batch)
    }

    /// Consume the subscription until `shutdown` is signalled or the source
    /// fails, invoking `listener` for each message in delivery order.
    ///
    /// Shutdown is observed at cycle boundaries only; stopping can take up
    /// to one backoff interval plus one in-flight cycle.
    pub async fn listen(&self, mut listener: Listener, shutdown: Shutdown) -> Result<()> {
        tracing::info!("starting listener for messages");
        loop {
            if shutdown.is_signalled() {
                tracing::info!("listener shutting down");
                return Ok(());
            }

            let batch = self
                .accumulate(LISTEN_CYCLE_BATCH, LISTEN_CYCLE_TIMEOUT)
                .await?;
            if batch.is_empty() {
                tokio::time::sleep(EMPTY_CYCLE_BACKOFF).await;
                continue;
            }
            for message in batch {
                listener(message);
            }
        }
    }

    /// One bounded accumulation cycle: collect up to `limit` messages before
    /// the deadline, acknowledging each on receipt.
    ///
    /// The pull task and the deadline race; the losing side is signalled to
    /// stop and joined before this returns, so no pull outlives the call.
    async fn accumulate(&self, limit: usize, timeout: Duration) -> Result<Vec<Message>> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (msg_tx, mut msg_rx) = mpsc::channel::<Result<PulledMessage>>(1);
        let pull_task = tokio::spawn(pull_loop(Arc::clone(&self.source), msg_tx, stop_rx));

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut collected = Vec::new();
        let mut failure = None;
        while collected.len() < limit {
            tokio::select! {
                delivery = msg_rx.recv() => match delivery {
                    Some(Ok(pulled)) => match self.source.ack(&pulled.ack_id).await {
                        Ok(()) => collected.push(pulled.message),
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    },
                    Some(Err(e)) => {
                        failure = Some(e);
                        break;
                    }
                    None => break,
                },
                _ = &mut deadline => break,
            }
        }

        let _ = stop_tx.send(true);
        drop(msg_rx);
        let _ = pull_task.await;

        match failure {
            Some(e) => Err(e),
            None => Ok(collected),
        }
    }
}

/// Pulls until told to stop, handing each result to the accumulator. An
/// in-flight pull is abandoned when the stop signal fires; a pull error ends
/// the loop after being reported.
async fn pull_loop<S: MessageSource>(
    source: Arc<S>,
    tx: mpsc::Sender<Result<PulledMessage>>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        if *stop.borrow() {
            return;
        }
        tokio::select! {
            pulled = source.pull() => match pulled {
                Ok(Some(message)) => {
                    if tx.send(Ok(message)).await.is_err() {
                        return;
                    }
                }
                Ok(None) => continue,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            },
            _ = stop.changed() => return,
        }
    }
}

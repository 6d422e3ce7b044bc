// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The log engine: event queue, delivery loop, and retention loop.
//!
//! Producers append to an unbounded FIFO queue and never block on
//! destination I/O. A background delivery loop drains the queue in small
//! batches on a fixed pace; an optional retention loop applies the
//! configured cleanup policies. All destination I/O happens under the
//! dispatch lock, so delivery, flush, and retention never interleave
//! mid-operation and FIFO order holds across every path.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sluice_config::SluiceConfig;
use sluice_core::{
    format_error_chain, AccessMessage, AccessRequest, Category, LogMessage, SluiceError,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::route::RouteTable;

/// Most messages one delivery iteration drains.
const DELIVERY_BATCH: usize = 10;

/// Pause between delivery iterations.
const DELIVERY_PACE: Duration = Duration::from_millis(50);

/// Pause between retention sweeps.
const RETENTION_PERIOD: Duration = Duration::from_secs(30);

/// A running log service instance.
///
/// Cheap to share behind [`Arc`]; every method takes `&self`.
pub struct Engine {
    queue: Mutex<VecDeque<LogMessage>>,
    /// The dispatch lock. Holding it grants exclusive use of every sink.
    dispatcher: Mutex<Dispatcher>,
    cancel: CancellationToken,
    loops: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
}

impl Engine {
    /// Parse the routes, build the sinks, and spawn the background loops.
    ///
    /// The delivery loop always runs; the retention loop is spawned only
    /// when a retention policy has `auto_clean_up` enabled. Malformed routes
    /// and invalid sink destinations fail here, before anything is queued.
    pub async fn start(config: SluiceConfig) -> Result<Arc<Engine>, SluiceError> {
        let table = RouteTable::build(&config)?;
        let dispatcher = Dispatcher::new(table, &config)?;
        let sweeps = dispatcher.sweeps_enabled();

        let engine = Arc::new(Engine {
            queue: Mutex::new(VecDeque::new()),
            dispatcher: Mutex::new(dispatcher),
            cancel: CancellationToken::new(),
            loops: Mutex::new(Vec::new()),
            running: AtomicBool::new(true),
        });

        let mut handles = vec![tokio::spawn(delivery_loop(engine.clone()))];
        if sweeps {
            handles.push(tokio::spawn(retention_loop(engine.clone())));
        }
        engine.loops.lock().await.extend(handles);

        info!(retention = sweeps, "log engine started");
        Ok(engine)
    }

    /// Append a message to the queue. Never blocks on delivery I/O and
    /// never fails; delivery happens on the background loop or at the next
    /// flush.
    pub async fn enqueue(&self, message: LogMessage) {
        self.queue.lock().await.push_back(message);
    }

    /// Enqueue a plain message stamped with the current time.
    pub async fn log(
        &self,
        category: Category,
        source: impl Into<String>,
        text: impl Into<String>,
    ) {
        self.enqueue(LogMessage::new(category, source, text)).await;
    }

    /// Enqueue a web access event extracted from the request description.
    pub async fn log_access(&self, request: AccessRequest) {
        self.enqueue(AccessMessage::from_request(request).into_message())
            .await;
    }

    /// Enqueue a fatal-error message rendering the error and its `source()`
    /// chain.
    pub async fn log_error(
        &self,
        source: impl Into<String>,
        error: &(dyn std::error::Error + Send + Sync + 'static),
    ) {
        self.enqueue(LogMessage::new(
            Category::FatalError,
            source,
            format_error_chain(error),
        ))
        .await;
    }

    /// Like [`log_error`](Engine::log_error), with the composed access line
    /// of the request appended for context.
    pub async fn log_error_with_request(
        &self,
        source: impl Into<String>,
        error: &(dyn std::error::Error + Send + Sync + 'static),
        request: AccessRequest,
    ) {
        let context = AccessMessage::from_request(request).into_message();
        let text = format!("{}\n{}", format_error_chain(error), context.text);
        self.enqueue(LogMessage::new(Category::FatalError, source, text))
            .await;
    }

    /// Deliver every queued message on the caller's task.
    ///
    /// The whole queue is drained in one grab under the dispatch lock, so
    /// flush never interleaves with the delivery loop mid-drain. Destination
    /// failures are isolated per write; if any occurred, the total is
    /// reported as [`SluiceError::Delivery`] after all messages dispatched.
    pub async fn flush(&self) -> Result<(), SluiceError> {
        let mut dispatcher = self.dispatcher.lock().await;
        let drained: Vec<LogMessage> = {
            let mut queue = self.queue.lock().await;
            queue.drain(..).collect()
        };
        if drained.is_empty() {
            return Ok(());
        }

        let count = drained.len();
        let failed = dispatcher.dispatch_batch(&drained).await;
        debug!(count, failed, "flushed queued messages");
        if failed > 0 {
            Err(SluiceError::Delivery { failed })
        } else {
            Ok(())
        }
    }

    /// Flush, stop the background loops, and close every sink.
    ///
    /// Idempotent; a second call is a no-op returning `Ok`.
    pub async fn shutdown(&self) -> Result<(), SluiceError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let flushed = self.flush().await;
        self.cancel.cancel();

        let handles: Vec<JoinHandle<()>> = self.loops.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "log loop join failed");
            }
        }

        self.dispatcher.lock().await.close_all().await;
        info!("log engine stopped");
        flushed
    }

    /// False once shutdown has begun.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of messages queued and not yet delivered.
    pub async fn queued(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Token cancelled at shutdown. Auxiliary tasks serving this engine
    /// (like the loopback RPC host) tie their lifetime to it.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Tie a spawned task to the engine lifetime: shutdown joins it after
    /// cancelling the token. The task must watch
    /// [`cancel_token`](Engine::cancel_token) or the join will hang.
    pub async fn adopt_task(&self, handle: JoinHandle<()>) {
        self.loops.lock().await.push(handle);
    }

    /// One delivery iteration: drain the oldest batch and dispatch it.
    async fn deliver_next_batch(&self) {
        let mut dispatcher = self.dispatcher.lock().await;
        let batch: Vec<LogMessage> = {
            let mut queue = self.queue.lock().await;
            let take = queue.len().min(DELIVERY_BATCH);
            queue.drain(..take).collect()
        };
        if batch.is_empty() {
            return;
        }

        let failed = dispatcher.dispatch_batch(&batch).await;
        if failed > 0 {
            warn!(failed, "background delivery had destination failures");
        }
    }
}

/// Drains the queue in paced batches until shutdown.
async fn delivery_loop(engine: Arc<Engine>) {
    debug!("delivery loop running");
    loop {
        engine.deliver_next_batch().await;
        tokio::select! {
            _ = tokio::time::sleep(DELIVERY_PACE) => {}
            _ = engine.cancel.cancelled() => {
                debug!("delivery loop stopping");
                break;
            }
        }
    }
}

/// Sweeps retention immediately, then periodically until shutdown.
async fn retention_loop(engine: Arc<Engine>) {
    debug!("retention loop running");
    loop {
        engine.dispatcher.lock().await.sweep().await;
        tokio::select! {
            _ = tokio::time::sleep(RETENTION_PERIOD) => {}
            _ = engine.cancel.cancelled() => {
                debug!("retention loop stopping");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flush_on_an_empty_queue_is_a_no_op() {
        let engine = Engine::start(SluiceConfig::default()).await.unwrap();
        assert_eq!(engine.queued().await, 0);
        engine.flush().await.unwrap();
        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let engine = Engine::start(SluiceConfig::default()).await.unwrap();
        engine.log(Category::Information, "test", "one").await;
        engine.shutdown().await.unwrap();
        assert!(!engine.is_running());
        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn log_error_renders_the_source_chain() {
        let engine = Engine::start(SluiceConfig::default()).await.unwrap();
        let inner = std::io::Error::other("disk gone");
        let outer = std::io::Error::new(std::io::ErrorKind::BrokenPipe, inner);
        engine.log_error("writer", &outer).await;

        let queued = engine.queue.lock().await.clone();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].category, Category::FatalError);
        assert!(queued[0].text.contains("Caused by: disk gone"));
        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn log_error_with_request_appends_the_access_line() {
        let engine = Engine::start(SluiceConfig::default()).await.unwrap();
        let error = std::io::Error::other("boom");
        let request = AccessRequest {
            host_address: "10.0.0.9".to_string(),
            url: "http://example.com/x".to_string(),
            ..AccessRequest::default()
        };
        engine.log_error_with_request("handler", &error, request).await;

        let queued = engine.queue.lock().await.clone();
        assert!(queued[0].text.starts_with("boom\n"));
        assert!(queued[0].text.contains("IP=10.0.0.9, Url=http://example.com/x"));
        engine.shutdown().await.unwrap();
    }
}

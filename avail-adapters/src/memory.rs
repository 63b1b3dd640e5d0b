//! In-memory publisher.
//!
//! Keeps every sent message in a shared buffer and tracks how many producer
//! contexts are currently open. Availability and failures can be toggled at
//! runtime, which makes this the publisher of choice for tests and for
//! wiring the pipeline without a broker.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{AdapterError, Encoded, ProducerContext, PublishCapability};

/// A message captured by [`MemoryPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub destination: String,
    pub payload: Vec<u8>,
    pub content_type: &'static str,
}

#[derive(Debug, Default)]
struct Shared {
    destination: Option<String>,
    available: AtomicBool,
    fail_acquire: AtomicBool,
    fail_send: AtomicBool,
    fail_release: AtomicBool,
    stall_send: AtomicBool,
    open: AtomicUsize,
    acquired: AtomicUsize,
    released: AtomicUsize,
    sent: Mutex<Vec<SentMessage>>,
}

/// Publisher that records messages in memory.
///
/// Clones share the same buffer and counters.
#[derive(Debug, Clone)]
pub struct MemoryPublisher {
    shared: Arc<Shared>,
}

impl MemoryPublisher {
    /// Create an available publisher for `destination`.
    pub fn new(destination: impl Into<String>) -> Self {
        let shared = Shared {
            destination: Some(destination.into()),
            available: AtomicBool::new(true),
            ..Default::default()
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Create a publisher with no destination configured.
    pub fn unconfigured() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
        }
    }

    /// Mark the destination reachable or unreachable.
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }

    /// Make subsequent `acquire` calls fail.
    pub fn fail_acquire(&self, fail: bool) {
        self.shared.fail_acquire.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `send` calls fail.
    pub fn fail_sends(&self, fail: bool) {
        self.shared.fail_send.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `release` calls report an error.
    ///
    /// The context still counts as closed.
    pub fn fail_release(&self, fail: bool) {
        self.shared.fail_release.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `send` calls never complete.
    pub fn stall_sends(&self, stall: bool) {
        self.shared.stall_send.store(stall, Ordering::SeqCst);
    }

    /// All messages sent so far, in send order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.shared.sent.lock().clone()
    }

    /// Drain the sent messages.
    pub fn take_sent(&self) -> Vec<SentMessage> {
        std::mem::take(&mut *self.shared.sent.lock())
    }

    /// Contexts acquired but not yet released.
    pub fn open_contexts(&self) -> usize {
        self.shared.open.load(Ordering::SeqCst)
    }

    /// Total successful acquisitions.
    pub fn acquisitions(&self) -> usize {
        self.shared.acquired.load(Ordering::SeqCst)
    }

    /// Total releases.
    pub fn releases(&self) -> usize {
        self.shared.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PublishCapability for MemoryPublisher {
    fn destination(&self) -> Option<&str> {
        self.shared.destination.as_deref()
    }

    fn is_available(&self) -> bool {
        self.shared.destination.is_some() && self.shared.available.load(Ordering::SeqCst)
    }

    async fn acquire(&self) -> Result<Box<dyn ProducerContext>, AdapterError> {
        if self.shared.fail_acquire.load(Ordering::SeqCst) {
            return Err(AdapterError::Connection(
                "memory publisher refused connection".to_string(),
            ));
        }

        self.shared.open.fetch_add(1, Ordering::SeqCst);
        self.shared.acquired.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemoryContext {
            shared: self.shared.clone(),
            released: false,
        }))
    }
}

struct MemoryContext {
    shared: Arc<Shared>,
    released: bool,
}

#[async_trait]
impl ProducerContext for MemoryContext {
    async fn send(&mut self, destination: &str, message: &Encoded) -> Result<(), AdapterError> {
        if self.released {
            return Err(AdapterError::Publish("context already released".to_string()));
        }
        if self.shared.fail_send.load(Ordering::SeqCst) {
            return Err(AdapterError::Publish(format!(
                "memory publisher rejected message for {}",
                destination
            )));
        }
        if self.shared.stall_send.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        self.shared.sent.lock().push(SentMessage {
            destination: destination.to_string(),
            payload: message.bytes.clone(),
            content_type: message.content_type,
        });
        Ok(())
    }

    async fn release(&mut self) -> Result<(), AdapterError> {
        if self.released {
            return Ok(());
        }
        self.close();

        if self.shared.fail_release.load(Ordering::SeqCst) {
            return Err(AdapterError::Release(
                "memory publisher failed to flush".to_string(),
            ));
        }
        Ok(())
    }
}

impl MemoryContext {
    fn close(&mut self) {
        self.released = true;
        self.shared.open.fetch_sub(1, Ordering::SeqCst);
        self.shared.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for MemoryContext {
    fn drop(&mut self) {
        if !self.released {
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Encoding;
    use avail_types::AvailBatch;

    fn empty_message() -> Encoded {
        Encoding::Json.encode(&AvailBatch::new()).unwrap()
    }

    #[test]
    fn test_availability() {
        let publisher = MemoryPublisher::new("avail");
        assert!(publisher.is_available());
        assert_eq!(publisher.destination(), Some("avail"));

        publisher.set_available(false);
        assert!(!publisher.is_available());

        let unconfigured = MemoryPublisher::unconfigured();
        unconfigured.set_available(true);
        assert!(!unconfigured.is_available());
        assert_eq!(unconfigured.destination(), None);
    }

    #[tokio::test]
    async fn test_send_and_release() {
        let publisher = MemoryPublisher::new("avail");

        let mut context = publisher.acquire().await.unwrap();
        assert_eq!(publisher.open_contexts(), 1);

        context.send("avail", &empty_message()).await.unwrap();
        context.release().await.unwrap();
        context.release().await.unwrap();

        assert_eq!(publisher.open_contexts(), 0);
        assert_eq!(publisher.releases(), 1);

        let sent = publisher.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].destination, "avail");
        assert_eq!(sent[0].payload, b"[]");
        assert!(publisher.sent().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let publisher = MemoryPublisher::new("avail");

        publisher.fail_acquire(true);
        assert!(matches!(
            publisher.acquire().await,
            Err(AdapterError::Connection(_))
        ));
        assert_eq!(publisher.open_contexts(), 0);

        publisher.fail_acquire(false);
        publisher.fail_sends(true);
        let mut context = publisher.acquire().await.unwrap();
        let result = context.send("avail", &empty_message()).await;
        assert!(matches!(result, Err(AdapterError::Publish(_))));
        context.release().await.unwrap();

        assert_eq!(publisher.open_contexts(), 0);
        assert!(publisher.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failed_release_still_closes() {
        let publisher = MemoryPublisher::new("avail");
        publisher.fail_release(true);

        let mut context = publisher.acquire().await.unwrap();
        context.send("avail", &empty_message()).await.unwrap();
        assert!(matches!(
            context.release().await,
            Err(AdapterError::Release(_))
        ));

        assert_eq!(publisher.open_contexts(), 0);
        assert_eq!(publisher.releases(), 1);
        assert_eq!(publisher.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_context_is_closed() {
        let publisher = MemoryPublisher::new("avail");

        let context = publisher.acquire().await.unwrap();
        assert_eq!(publisher.open_contexts(), 1);
        drop(context);

        assert_eq!(publisher.open_contexts(), 0);
        assert_eq!(publisher.releases(), 1);
    }

    #[tokio::test]
    async fn test_send_after_release_is_rejected() {
        let publisher = MemoryPublisher::new("avail");
        let mut context = publisher.acquire().await.unwrap();
        context.release().await.unwrap();

        assert!(context.send("avail", &empty_message()).await.is_err());
    }
}

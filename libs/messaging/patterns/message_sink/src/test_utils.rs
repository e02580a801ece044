use crate::{Message, MessageSink, SinkError, SinkMetadata};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// A sink that just collects messages for testing with bounded storage
#[derive(Debug)]
pub struct CollectorSink {
    /// Bounded message queue to prevent memory leaks
    messages: Mutex<VecDeque<Message>>,
    /// Maximum number of messages to store
    max_messages: usize,
    fail_on_send: AtomicBool,
    backpressure_remaining: AtomicUsize,
    backpressure_delay: Mutex<Duration>,
    messages_sent: AtomicU64,
    messages_failed: AtomicU64,
    name: String,
}

impl CollectorSink {
    /// Create a new collector sink with default capacity
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    /// Create a new collector sink with specific capacity
    pub fn with_capacity(max_messages: usize) -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
            max_messages,
            fail_on_send: AtomicBool::new(false),
            backpressure_remaining: AtomicUsize::new(0),
            backpressure_delay: Mutex::new(Duration::ZERO),
            messages_sent: AtomicU64::new(0),
            messages_failed: AtomicU64::new(0),
            name: "test-collector".to_string(),
        }
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        let mut sink = Self::new();
        sink.name = name.into();
        sink
    }

    /// Get all received messages
    pub fn received_messages(&self) -> Vec<Message> {
        self.messages.lock().iter().cloned().collect()
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn clear_messages(&self) {
        self.messages.lock().clear();
    }

    /// Configure to fail the next send with a non-recoverable error
    pub fn fail_next_send(&self) {
        self.fail_on_send.store(true, Ordering::Relaxed);
    }

    /// Answer the next `times` sends with backpressure
    pub fn backpressure_next(&self, times: usize, retry_after: Duration) {
        *self.backpressure_delay.lock() = retry_after;
        self.backpressure_remaining.store(times, Ordering::Relaxed);
    }
}

impl Default for CollectorSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageSink for CollectorSink {
    async fn send(&self, message: Message) -> Result<(), SinkError> {
        let throttled = self
            .backpressure_remaining
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        if throttled {
            return Err(SinkError::backpressure(*self.backpressure_delay.lock()));
        }

        if self.fail_on_send.swap(false, Ordering::Relaxed) {
            self.messages_failed.fetch_add(1, Ordering::Relaxed);
            return Err(SinkError::Rejected("Simulated failure".to_string()));
        }

        // Check capacity and drop oldest if at limit
        {
            let mut messages = self.messages.lock();
            if messages.len() >= self.max_messages {
                messages.pop_front();
            }
            messages.push_back(message);
        }

        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn metadata(&self) -> SinkMetadata {
        let mut metadata = SinkMetadata::new(self.name.clone(), "collector")
            .with_endpoint("memory://test");
        metadata.messages_sent = self.messages_sent.load(Ordering::Relaxed);
        metadata.messages_failed = self.messages_failed.load(Ordering::Relaxed);
        metadata
    }
}

/// A sink that always fails for testing error conditions
#[derive(Debug)]
pub struct FailingSink {
    error_message: String,
}

impl FailingSink {
    pub fn new(error_message: impl Into<String>) -> Self {
        Self {
            error_message: error_message.into(),
        }
    }
}

impl Default for FailingSink {
    fn default() -> Self {
        Self::new("Simulated failure")
    }
}

#[async_trait]
impl MessageSink for FailingSink {
    async fn send(&self, _message: Message) -> Result<(), SinkError> {
        Err(SinkError::Rejected(self.error_message.clone()))
    }

    fn metadata(&self) -> SinkMetadata {
        let mut metadata = SinkMetadata::new("failing-sink", "test-failing");
        metadata.last_error = Some(self.error_message.clone());
        metadata
    }
}

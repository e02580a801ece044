/// Information about a sink for monitoring/debugging
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkMetadata {
    /// Human-readable sink name
    pub name: String,

    /// Sink type (jsonl, collector, ...)
    pub sink_type: String,

    /// Destination if applicable
    pub endpoint: Option<String>,

    /// Messages written successfully
    pub messages_sent: u64,

    /// Messages that failed to write
    pub messages_failed: u64,

    /// Last error if any
    pub last_error: Option<String>,
}

impl SinkMetadata {
    pub fn new(name: impl Into<String>, sink_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sink_type: sink_type.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

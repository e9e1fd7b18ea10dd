/// Default maximum length prefix accepted by readers: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Default maximum sub-object nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Default buffer size for the stream backend.
pub const DEFAULT_BUFFER_CAPACITY: usize = 8 * 1024;

/// Smallest buffer the stream writer will work with.
pub const MIN_BUFFER_CAPACITY: usize = 16;

/// Configuration shared by readers and writers.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CodecConfig {
    /// Maximum length prefix (strings, bytes, sub-objects). Default: 16 MiB.
    pub max_payload_size: usize,
    /// Maximum sub-object nesting depth. Default: 100.
    pub max_depth: usize,
    /// Stream backend buffer size: read chunk size for readers, commit
    /// threshold for writers. Default: 8 KiB.
    pub buffer_capacity: usize,
    /// When true, a final flush leaves the sink open instead of shutting it down.
    pub leave_open: bool,
}

impl CodecConfig {
    pub(crate) fn effective_buffer_capacity(&self) -> usize {
        self.buffer_capacity.max(MIN_BUFFER_CAPACITY)
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            max_depth: DEFAULT_MAX_DEPTH,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            leave_open: false,
        }
    }
}

//! Configuration and limits for WebSocket sessions.

use std::time::Duration;

/// Default size of the buffer handed to the transport on each receive.
pub const DEFAULT_RECEIVE_BUFFER_SIZE: usize = 16 * 1024;

/// Default bound on the close handshake.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Resource limits applied by the receive loop.
///
/// The reassembly buffer grows dynamically, so the only bound on inbound
/// memory is the optional message size cap configured here.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Limits {
    /// Maximum size of a complete message in bytes, after reassembly.
    ///
    /// Default: `None` (unbounded)
    pub max_message_size: Option<usize>,
}

impl Limits {
    /// Create limits with a message size cap.
    #[must_use]
    pub const fn new(max_message_size: usize) -> Self {
        Self {
            max_message_size: Some(max_message_size),
        }
    }

    /// Create limits with no message size cap.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            max_message_size: None,
        }
    }

    /// Validate that message size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`](crate::Error::MessageTooLarge) if
    /// `size` exceeds the configured maximum.
    pub const fn check_message_size(&self, size: usize) -> Result<(), crate::Error> {
        match self.max_message_size {
            Some(max) if size > max => Err(crate::Error::MessageTooLarge { size, max }),
            _ => Ok(()),
        }
    }
}

/// Timeout configuration for session operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// Maximum time for the transport handshake.
    ///
    /// Default: `None` (rely on caller cancellation)
    pub connect: Option<Duration>,

    /// Maximum time to wait for the peer to acknowledge a close, and for an
    /// in-flight close to finish during disposal.
    ///
    /// Default: 5 seconds
    pub close: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: None,
            close: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

/// WebSocket session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Resource limits.
    pub limits: Limits,

    /// Size of the chunk buffer used for each transport receive (in bytes).
    ///
    /// Messages larger than this arrive as several fragments and are
    /// reassembled. Zero is read as one byte.
    ///
    /// Default: 16 KB (16 * 1024)
    pub receive_buffer_size: usize,

    /// Timeout configuration.
    pub timeouts: Timeouts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            receive_buffer_size: DEFAULT_RECEIVE_BUFFER_SIZE,
            timeouts: Timeouts::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the receive buffer size. Zero is raised to one byte.
    #[must_use]
    pub const fn with_receive_buffer_size(mut self, size: usize) -> Self {
        self.receive_buffer_size = if size == 0 { 1 } else { size };
        self
    }

    /// Set a connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connect = Some(timeout);
        self
    }

    /// Set the close handshake timeout.
    #[must_use]
    pub const fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.close = timeout;
        self
    }
}

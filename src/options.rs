//! Configuration options for blockdir.

/// Default size of a block, which maps to one column value (1MB).
pub const DEFAULT_BLOCK_SIZE: u64 = 1024 * 1024;

/// Default host where the store is located.
pub const DEFAULT_HOST: &str = "localhost";

/// Default port where the store is listening.
pub const DEFAULT_PORT: u16 = 9160;

/// Default keyspace in which directories are stored.
pub const DEFAULT_KEYSPACE: &str = "lucene";

/// Directory configuration options.
///
/// The connection knobs (`host`, `port`, `framed`) are consumed by the
/// store backend when a session is established; the directory itself only
/// uses the schema names and the block/buffer sizes.
#[derive(Debug, Clone)]
pub struct Options {
    // === Connection ===
    /// Host where the store is located.
    pub host: String,

    /// Port where the store is listening.
    pub port: u16,

    /// Whether the transport prefixes messages with a 4-byte frame size.
    pub framed: bool,

    // === Schema ===
    /// Keyspace in which to find the column family.
    pub keyspace: String,

    /// Column family that denotes this directory.
    pub column_family: String,

    // === Sizing ===
    /// Maximum number of bytes stored in a single block column.
    pub block_size: u64,

    /// Size of the write-behind / read-ahead buffer. Ideally an integer
    /// multiple of `block_size`, which keeps round trips to one per buffer.
    pub buffer_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            framed: false,
            keyspace: DEFAULT_KEYSPACE.to_string(),
            column_family: "index".to_string(),
            block_size: DEFAULT_BLOCK_SIZE,
            buffer_size: DEFAULT_BLOCK_SIZE as usize,
        }
    }
}

impl Options {
    /// Create options for the given column family with defaults elsewhere.
    pub fn new(column_family: impl Into<String>) -> Self {
        Self {
            column_family: column_family.into(),
            ..Default::default()
        }
    }

    /// Validate the options.
    pub fn validate(&self) -> crate::Result<()> {
        if self.block_size == 0 {
            return Err(crate::Error::InvalidConfiguration(
                "block_size must be non-zero".into(),
            ));
        }

        if self.buffer_size == 0 {
            return Err(crate::Error::InvalidConfiguration(
                "buffer_size must be non-zero".into(),
            ));
        }

        if self.keyspace.is_empty() || self.column_family.is_empty() {
            return Err(crate::Error::InvalidConfiguration(
                "keyspace and column_family must be non-empty".into(),
            ));
        }

        Ok(())
    }
}

/// Builder for Options.
#[derive(Debug, Clone, Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the store host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.options.host = host.into();
        self
    }

    /// Set the store port.
    pub fn port(mut self, port: u16) -> Self {
        self.options.port = port;
        self
    }

    /// Set whether the transport is framed.
    pub fn framed(mut self, framed: bool) -> Self {
        self.options.framed = framed;
        self
    }

    /// Set the keyspace.
    pub fn keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.options.keyspace = keyspace.into();
        self
    }

    /// Set the column family.
    pub fn column_family(mut self, column_family: impl Into<String>) -> Self {
        self.options.column_family = column_family.into();
        self
    }

    /// Set the block size.
    pub fn block_size(mut self, size: u64) -> Self {
        self.options.block_size = size;
        self
    }

    /// Set the buffer size.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.options.buffer_size = size;
        self
    }

    /// Build the options.
    pub fn build(self) -> crate::Result<Options> {
        self.options.validate()?;
        Ok(self.options)
    }
}

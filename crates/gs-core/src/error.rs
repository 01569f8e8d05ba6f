//! Error types for the gsx GS plugin

use thiserror::Error;

/// Main error type for the plugin
#[derive(Error, Debug)]
pub enum GsError {
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Freeze error: {0}")]
    Freeze(#[from] FreezeError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No renderer is open")]
    NotOpen,

    #[error("Renderer construction failed: {0}")]
    RendererCreation(String),
}

/// Platform memory errors (vmalloc / fifo_alloc)
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Out of memory")]
    OutOfMemory,

    #[error("Invalid size 0x{size:x}: must be a non-zero multiple of the page size 0x{page:x}")]
    InvalidSize { size: usize, page: usize },

    #[error("Invalid repeat count {0}")]
    InvalidRepeat(usize),

    #[error("Mapping segment {segment} failed: {reason}")]
    Map { segment: usize, reason: String },

    #[error("Shared memory object could not be created: {0}")]
    SharedObject(String),
}

/// Graphics device errors
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Missing required entry point: {0}")]
    MissingEntryPoint(&'static str),

    #[error("Unsupported backend: {0}")]
    Unsupported(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Renderer has no device")]
    NoDevice,
}

/// Save-state (freeze/defrost) errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FreezeError {
    #[error("Freeze data pointer is null or empty")]
    NullData,

    #[error("Freeze buffer too small: needed {needed} bytes, got {got}")]
    BufferTooSmall { needed: usize, got: usize },

    #[error("Freeze header is corrupt")]
    BadHeader,

    #[error("Unsupported freeze version {0}")]
    VersionMismatch(u32),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Result type alias for plugin operations
pub type Result<T> = std::result::Result<T, GsError>;

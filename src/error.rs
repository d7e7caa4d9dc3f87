//! Error types and handling for topomap

/// Result type alias for topomap operations
pub type Result<T> = std::result::Result<T, TopomapError>;

/// Error types for topology export and import
#[derive(Debug, thiserror::Error)]
pub enum TopomapError {
    /// I/O related errors (file creation, extension, mmap, rename)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Memory mapping failures that carry no I/O source
    #[error("Memory error: {message}")]
    Memory { message: String },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// A write would run past the end of the region
    #[error("Insufficient space: requested {requested}, available {available}")]
    InsufficientSpace { requested: usize, available: usize },

    /// The region contents do not follow the topology layout
    #[error("Format error at offset {offset}: {message}")]
    Format { offset: u64, message: String },

    /// A component or data path handle does not resolve
    #[error("Not found: {what}")]
    NotFound { what: String },
}

impl TopomapError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create a memory error
    pub fn memory(message: impl Into<String>) -> Self {
        Self::Memory {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create an insufficient space error
    pub fn insufficient_space(requested: usize, available: usize) -> Self {
        Self::InsufficientSpace {
            requested,
            available,
        }
    }

    /// Create a format error anchored at a region offset
    pub fn format(offset: u64, message: impl Into<String>) -> Self {
        Self::Format {
            offset,
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Whether this error means the region bytes are malformed
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format { .. })
    }
}

impl From<std::io::Error> for TopomapError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}

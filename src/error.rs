//! Error types for assembly submission and polling.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while computing a request signature.
#[derive(Debug, Error)]
pub enum SignError {
    /// The auth secret is empty, so no MAC can be keyed from it.
    #[error("auth secret is empty")]
    EmptySecret,

    /// The algorithm name is not one of the supported HMAC digests.
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// A network-level failure: no HTTP response was obtained.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or its response could not be read.
    #[error("request to {url} failed: {message}")]
    Network {
        /// Target of the failed request.
        url: String,
        /// Underlying client error.
        message: String,
    },

    /// A multipart part could not be turned into a request body.
    #[error("invalid upload part '{field}': {message}")]
    InvalidPart {
        /// Form field name of the part.
        field: String,
        /// Why the part was rejected.
        message: String,
    },
}

/// Everything that can end an assembly run, plus build-time rejections.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// No response reached us.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A response arrived but its body is not a JSON status object.
    #[error("response with HTTP status {status} is not a valid assembly status: {source}")]
    InvalidResponse {
        /// HTTP status code of the response.
        status: u16,
        /// Parse failure.
        #[source]
        source: serde_json::Error,
    },

    /// A declared input file does not exist.
    #[error("input file for field '{field}' not found: {}", .path.display())]
    FileNotFound {
        /// Form field the file was declared under.
        field: String,
        /// Path that was looked up.
        path: PathBuf,
    },

    /// A declared input file exists but could not be opened.
    #[error("failed to open {}: {source}", .path.display())]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The service reported an error for the assembly.
    #[error("assembly failed with {code}{}", format_message(.message))]
    Service {
        /// Error code from the `error` field of the status.
        code: String,
        /// Human readable explanation, when the service sent one.
        message: Option<String>,
    },

    /// Polling gave up after the configured number of status fetches.
    #[error("assembly still running after {max_refresh} status checks")]
    MaxRefresh {
        /// The exhausted budget.
        max_refresh: u32,
    },

    /// A non-terminal status did not say where to poll.
    #[error("status response has no assembly_url to poll")]
    NoAssemblyUrl,

    /// The same form field was declared twice across files and streams.
    #[error("input field '{0}' is already declared")]
    DuplicateField(String),

    /// Signing the params failed.
    #[error("failed to sign params: {0}")]
    Signing(#[from] SignError),

    /// The params object could not be serialized.
    #[error("failed to serialize params: {0}")]
    Serialize(#[from] serde_json::Error),

    /// `run()` was called on a run that already started.
    #[error("assembly run was already started")]
    AlreadyStarted,
}

impl AssemblyError {
    /// Stable code for this error, suitable for logs and CLI output.
    ///
    /// Service errors keep the code the service sent.
    pub fn code(&self) -> &str {
        match self {
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::InvalidResponse { .. } => "INVALID_RESPONSE",
            Self::FileNotFound { .. } => "FILE_NOT_FOUND",
            Self::Io { .. } => "IO_ERROR",
            Self::Service { code, .. } => code,
            Self::MaxRefresh { .. } => "MAX_REFRESH",
            Self::NoAssemblyUrl => "NO_ASSEMBLY_URL",
            Self::DuplicateField(_) => "DUPLICATE_FIELD",
            Self::Signing(_) => "SIGNING_ERROR",
            Self::Serialize(_) => "SERIALIZE_ERROR",
            Self::AlreadyStarted => "ALREADY_STARTED",
        }
    }
}

fn format_message(message: &Option<String>) -> String {
    match message {
        Some(m) => format!(": {m}"),
        None => String::new(),
    }
}

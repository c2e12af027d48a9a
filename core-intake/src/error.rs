use bridge_traits::BridgeError;
use thiserror::Error;

/// Reasons a file is refused at intake. It never becomes an upload item.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{name}: unsupported file type, only pdf, doc, docx and txt are accepted")]
    UnsupportedFileType { name: String },

    #[error("{name}: {size_bytes} bytes exceeds the {limit_bytes} byte limit")]
    FileTooLarge {
        name: String,
        size_bytes: u64,
        limit_bytes: u64,
    },

    #[error("{name}: file is empty")]
    EmptyFile { name: String },

    #[error("{name}: a file with this name is already queued")]
    DuplicateName { name: String },
}

impl ValidationError {
    /// Name of the rejected file.
    pub fn file_name(&self) -> &str {
        match self {
            ValidationError::UnsupportedFileType { name }
            | ValidationError::FileTooLarge { name, .. }
            | ValidationError::EmptyFile { name }
            | ValidationError::DuplicateName { name } => name,
        }
    }
}

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Upload failed: {0}")]
    Transport(String),

    #[error("Remote parsing failed: {0}")]
    RemoteProcessing(String),

    #[error("Duplicate candidate detected: {candidate_name} ({candidate_id})")]
    DuplicateDetected {
        candidate_id: String,
        candidate_name: String,
    },

    #[error("status polling timed out after {attempts} attempts")]
    PollTimeout { attempts: u32 },

    #[error("Duplicate lookup failed for {name}: {message}")]
    LookupFailure { name: String, message: String },

    #[error("Upload item {0} not found")]
    ItemNotFound(String),

    #[error("Invalid item ID: {0}")]
    InvalidItemId(String),

    #[error("Invalid upload status: {0}")]
    InvalidStatus(String),

    #[error("A batch run is already in progress")]
    RunInProgress,

    #[error("No batch run is in progress")]
    NoActiveRun,

    #[error("A duplicate pre-check pass is already running")]
    PrecheckInProgress,

    #[error("Nothing to upload: no pending or duplicate items")]
    NothingToUpload,

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Category of {name} is locked while the item is {status}")]
    CategoryLocked { name: String, status: String },

    #[error("Invalid category label: {0}")]
    InvalidCategory(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, IntakeError>;

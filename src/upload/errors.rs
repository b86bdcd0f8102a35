use thiserror::Error;
use crate::utils::format_bytes;
use super::types::WorkflowPhase;

/// 本地校验错误，不会触达网络
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid file type {mime_type:?}, please upload an image file (JPG, PNG, etc.)")]
    InvalidType {
        mime_type: String,
    },

    #[error("File too large ({}), please upload an image smaller than {}", format_bytes(*size_bytes), format_bytes(*limit_bytes))]
    TooLarge {
        size_bytes: u64,
        limit_bytes: u64,
    },
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("No image selected")]
    NoCandidate,

    #[error("Operation not allowed while {0:?}")]
    InvalidPhase(WorkflowPhase),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload manager shut down")]
    ManagerShutdown,
}

pub type Result<T, E = WorkflowError> = std::result::Result<T, E>;

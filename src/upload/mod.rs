mod candidate;
mod errors;
mod manager;
mod manager_worker;
mod types;
mod workflow;

pub use candidate::{mime_type_for_path, validate, SelectedFile, UploadCandidate, DEFAULT_MAX_IMAGE_BYTES};
pub use errors::{Result, ValidationError, WorkflowError};
pub use manager::{UploadManager, UploadManagerHandle};
pub use types::{CandidateSummary, Discarded, SubmissionId, UploadEvent, WorkflowPhase, WorkflowSnapshot};
pub use workflow::{AnalysisRequest, UploadWorkflow};

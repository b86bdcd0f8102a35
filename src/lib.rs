pub mod api;
pub mod config;
pub mod history;
pub mod upload;
pub mod utils;

// 重新导出核心类型
pub use api::{
    Analysis,
    ApiClient,
    ApiError,
    DemoApi,
    DiagnosisResult,
    PlantApi,
    PlantProfile,
    ScanRecord,
    Source,
    TreatmentPlan,
};

pub use upload::{
    SelectedFile,
    SubmissionId,
    UploadCandidate,
    UploadEvent,
    UploadManager,
    UploadManagerHandle,
    UploadWorkflow,
    ValidationError,
    WorkflowError,
    WorkflowPhase,
    WorkflowSnapshot,
};

pub use history::{filter_records, HistoryStatus, HistoryWorkflow};
pub use config::{Config, Environment};

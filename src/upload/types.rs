use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;
use crate::api::{Analysis, ApiError, DiagnosisResult, PlantProfile};
use super::candidate::SelectedFile;
use super::errors::Result;

/// 一次分析提交的唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct SubmissionId(Uuid);

impl SubmissionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 上传流程所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum WorkflowPhase {
    /// 未选择图片
    #[default]
    Idle,
    /// 已选择图片，等待分析
    Selected,
    /// 分析中
    Submitting,
    /// 分析成功
    Succeeded,
    /// 分析失败
    Failed,
}

/// 展示层需要的候选图片信息
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSummary {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub preview_data_uri: Option<Arc<str>>,
}

/// 某一时刻的流程状态快照
#[derive(Debug, Clone)]
pub struct WorkflowSnapshot {
    pub phase: WorkflowPhase,
    pub candidate: Option<CandidateSummary>,
    pub result: Option<DiagnosisResult>,
    pub profile: Option<PlantProfile>,
    pub failure: Option<Arc<ApiError>>,
}

/// 被丢弃的资源：撤销了预览的图片、被取消的提交
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discarded {
    pub candidate: Option<String>,
    pub cancelled: Option<SubmissionId>,
}

#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// 阶段变更
    PhaseChanged {
        old_phase: WorkflowPhase,
        new_phase: WorkflowPhase,
    },

    /// 新图片通过校验
    CandidateSelected {
        file_name: String,
        size_bytes: u64,
    },

    /// 图片被移除或替换，预览已撤销
    PreviewRevoked {
        file_name: String,
    },

    /// 图片未通过校验
    ValidationFailed {
        error: String,
    },

    /// 开始分析
    AnalysisStarted {
        submission_id: SubmissionId,
    },

    /// 进行中的分析被取消
    AnalysisCancelled {
        submission_id: SubmissionId,
    },

    /// 分析完成
    AnalysisSucceeded {
        submission_id: SubmissionId,
        analysis: Analysis,
    },

    /// 分析失败
    AnalysisFailed {
        submission_id: SubmissionId,
        error: String,
    },
}

/// 上传管理器命令
pub enum ManagerCommand {
    /// 选择文件
    SelectFile {
        file: SelectedFile,
        reply: oneshot::Sender<Result<()>>,
    },

    /// 移除当前图片
    Remove {
        reply: oneshot::Sender<bool>,
    },

    /// 开始分析
    Analyze {
        reply: oneshot::Sender<Result<SubmissionId>>,
    },

    /// 获取状态快照
    Snapshot {
        reply: oneshot::Sender<WorkflowSnapshot>,
    },
}

// 静态断言确保类型是 Send 的
const _: () = {
    fn assert_send<T: Send>() {}
    fn assert_types() {
        assert_send::<UploadEvent>();
        assert_send::<WorkflowSnapshot>();
        assert_send::<ManagerCommand>();
    }
};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use crate::api::{Analysis, ApiError, DiagnosisResult, PlantProfile};
use super::candidate::{SelectedFile, UploadCandidate, DEFAULT_MAX_IMAGE_BYTES};
use super::errors::{Result, ValidationError, WorkflowError};
use super::types::{CandidateSummary, Discarded, SubmissionId, WorkflowPhase, WorkflowSnapshot};

struct Submission {
    id: SubmissionId,
    token: CancellationToken,
}

/// 交给适配器执行的一次分析请求
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub id: SubmissionId,
    pub candidate: UploadCandidate,
    pub token: CancellationToken,
    /// 被本次请求取代的旧提交
    pub restarted: Option<SubmissionId>,
}

/// 单张图片的上传分析流程
///
/// 所有状态转换都是同步的；网络调用由调用方执行，结果通过 [`complete`](Self::complete)
/// 回填。一个实例同一时间最多只有一个进行中的提交，`Submitting` 阶段与之一一对应。
pub struct UploadWorkflow {
    phase: WorkflowPhase,
    candidate: Option<UploadCandidate>,
    result: Option<DiagnosisResult>,
    profile: Option<PlantProfile>,
    failure: Option<Arc<ApiError>>,
    in_flight: Option<Submission>,
    max_image_bytes: u64,
}

impl Default for UploadWorkflow {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IMAGE_BYTES)
    }
}

impl UploadWorkflow {
    pub fn new(max_image_bytes: u64) -> Self {
        Self {
            phase: WorkflowPhase::Idle,
            candidate: None,
            result: None,
            profile: None,
            failure: None,
            in_flight: None,
            max_image_bytes,
        }
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.phase
    }

    pub fn candidate(&self) -> Option<&UploadCandidate> {
        self.candidate.as_ref()
    }

    pub fn result(&self) -> Option<&DiagnosisResult> {
        self.result.as_ref()
    }

    pub fn profile(&self) -> Option<&PlantProfile> {
        self.profile.as_ref()
    }

    pub fn failure(&self) -> Option<&ApiError> {
        self.failure.as_deref()
    }

    pub fn in_flight(&self) -> Option<SubmissionId> {
        self.in_flight.as_ref().map(|submission| submission.id)
    }

    pub fn max_image_bytes(&self) -> u64 {
        self.max_image_bytes
    }

    /// Offer a newly selected file.
    ///
    /// While `Submitting`, an invalid file leaves everything untouched; a valid
    /// one cancels the in-flight request. From `Succeeded`/`Failed` the previous
    /// outcome is cleared before the file is validated, and the phase returns to
    /// `Selected` even if the new file is rejected.
    pub fn select(&mut self, file: SelectedFile) -> Result<Discarded, ValidationError> {
        let mut discarded = Discarded::default();

        match self.phase {
            WorkflowPhase::Submitting => {
                let candidate = self.validate(file)?;
                discarded.cancelled = self.cancel_in_flight();
                discarded.candidate = self.replace_candidate(candidate);
            }
            WorkflowPhase::Succeeded | WorkflowPhase::Failed => {
                self.clear_outcome();
                self.phase = if self.candidate.is_some() {
                    WorkflowPhase::Selected
                } else {
                    WorkflowPhase::Idle
                };

                let candidate = self.validate(file)?;
                discarded.candidate = self.replace_candidate(candidate);
            }
            WorkflowPhase::Idle | WorkflowPhase::Selected => {
                let candidate = self.validate(file)?;
                discarded.candidate = self.replace_candidate(candidate);
            }
        }

        self.phase = WorkflowPhase::Selected;
        Ok(discarded)
    }

    /// 移除当前图片，回到 `Idle`。`Idle` 时返回 `None`
    pub fn remove(&mut self) -> Option<Discarded> {
        if self.phase == WorkflowPhase::Idle {
            return None;
        }

        let cancelled = self.cancel_in_flight();
        self.clear_outcome();

        let candidate = self.candidate.take().map(|mut candidate| {
            candidate.revoke_preview();
            candidate.file_name().to_string()
        });

        self.phase = WorkflowPhase::Idle;
        Some(Discarded { candidate, cancelled })
    }

    /// 开始分析。`Submitting` 时取消旧请求并用当前图片重新提交
    pub fn begin_analysis(&mut self) -> Result<AnalysisRequest> {
        match self.phase {
            WorkflowPhase::Idle => Err(WorkflowError::NoCandidate),
            WorkflowPhase::Succeeded | WorkflowPhase::Failed => {
                Err(WorkflowError::InvalidPhase(self.phase))
            }
            WorkflowPhase::Selected | WorkflowPhase::Submitting => {
                let candidate = self
                    .candidate
                    .clone()
                    .ok_or(WorkflowError::NoCandidate)?;

                let restarted = self.cancel_in_flight();
                let submission = Submission {
                    id: SubmissionId::new(),
                    token: CancellationToken::new(),
                };

                let request = AnalysisRequest {
                    id: submission.id,
                    candidate,
                    token: submission.token.clone(),
                    restarted,
                };

                self.in_flight = Some(submission);
                self.phase = WorkflowPhase::Submitting;

                Ok(request)
            }
        }
    }

    /// 回填分析结果，只接受当前进行中的提交。返回是否被采纳
    pub fn complete(&mut self, id: SubmissionId, outcome: crate::api::Result<Analysis>) -> bool {
        match &self.in_flight {
            Some(submission) if submission.id == id => {}
            _ => {
                tracing::debug!(submission_id = %id, "Ignoring stale analysis outcome");
                return false;
            }
        }

        self.in_flight = None;

        match outcome {
            Ok(analysis) => {
                self.result = Some(analysis.diagnosis);
                self.profile = Some(analysis.plant);
                self.failure = None;
                self.phase = WorkflowPhase::Succeeded;
            }
            Err(err) => {
                self.result = None;
                self.profile = None;
                self.failure = Some(Arc::new(err));
                self.phase = WorkflowPhase::Failed;
            }
        }

        true
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            phase: self.phase,
            candidate: self.candidate.as_ref().map(|candidate| CandidateSummary {
                file_name: candidate.file_name().to_string(),
                mime_type: candidate.mime_type().to_string(),
                size_bytes: candidate.size_bytes(),
                preview_data_uri: candidate.shared_preview(),
            }),
            result: self.result.clone(),
            profile: self.profile.clone(),
            failure: self.failure.clone(),
        }
    }

    fn validate(&self, file: SelectedFile) -> Result<UploadCandidate, ValidationError> {
        UploadCandidate::from_file(file, self.max_image_bytes)
    }

    fn replace_candidate(&mut self, candidate: UploadCandidate) -> Option<String> {
        self.candidate.replace(candidate).map(|mut old| {
            old.revoke_preview();
            old.file_name().to_string()
        })
    }

    fn cancel_in_flight(&mut self) -> Option<SubmissionId> {
        self.in_flight.take().map(|submission| {
            submission.token.cancel();
            submission.id
        })
    }

    fn clear_outcome(&mut self) {
        self.result = None;
        self.profile = None;
        self.failure = None;
    }
}

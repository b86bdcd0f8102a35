use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use crate::api::{Analysis, ApiError, PlantApi};
use super::candidate::SelectedFile;
use super::errors::Result;
use super::types::{Discarded, ManagerCommand, SubmissionId, UploadEvent, WorkflowPhase};
use super::workflow::{AnalysisRequest, UploadWorkflow};

type Completion = (SubmissionId, crate::api::Result<Analysis>);

/// 唯一持有 [`UploadWorkflow`] 的任务，所有状态修改都在这里串行执行
pub struct UploadManagerWorker {
    api: Arc<dyn PlantApi>,
    workflow: UploadWorkflow,
    event_tx: broadcast::Sender<UploadEvent>,
    completion_tx: mpsc::UnboundedSender<Completion>,
}

impl UploadManagerWorker {
    pub(crate) async fn run(
        api: Arc<dyn PlantApi>,
        max_image_bytes: u64,
        mut command_rx: mpsc::Receiver<ManagerCommand>,
        event_tx: broadcast::Sender<UploadEvent>,
    ) {
        let (completion_tx, mut completion_rx) = mpsc::unbounded_channel();
        let mut worker = Self {
            api,
            workflow: UploadWorkflow::new(max_image_bytes),
            event_tx,
            completion_tx,
        };

        // 主事件循环，句柄全部释放后退出
        loop {
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(command) => worker.handle_command(command),
                    None => break,
                },
                Some((submission_id, outcome)) = completion_rx.recv() => {
                    worker.handle_completion(submission_id, outcome);
                }
            }
        }

        // 退出前取消进行中的请求
        worker.workflow.remove();
    }

    fn handle_command(&mut self, command: ManagerCommand) {
        match command {
            ManagerCommand::SelectFile { file, reply } => {
                let _ = reply.send(self.select(file));
            }
            ManagerCommand::Remove { reply } => {
                let _ = reply.send(self.remove());
            }
            ManagerCommand::Analyze { reply } => {
                let _ = reply.send(self.analyze());
            }
            ManagerCommand::Snapshot { reply } => {
                let _ = reply.send(self.workflow.snapshot());
            }
        }
    }

    fn select(&mut self, file: SelectedFile) -> Result<()> {
        let old_phase = self.workflow.phase();
        let file_name = file.file_name.clone();
        let size_bytes = file.size_bytes();

        let outcome = self.workflow.select(file);
        match outcome {
            Ok(discarded) => {
                self.emit_discarded(discarded);
                tracing::info!(%file_name, size_bytes, "Image selected");
                self.emit(UploadEvent::CandidateSelected { file_name, size_bytes });
                self.emit_phase_change(old_phase);
                Ok(())
            }
            Err(err) => {
                tracing::info!(%file_name, error = %err, "Image rejected");
                self.emit(UploadEvent::ValidationFailed { error: err.to_string() });
                self.emit_phase_change(old_phase);
                Err(err.into())
            }
        }
    }

    fn remove(&mut self) -> bool {
        let old_phase = self.workflow.phase();

        match self.workflow.remove() {
            Some(discarded) => {
                self.emit_discarded(discarded);
                self.emit_phase_change(old_phase);
                true
            }
            None => false,
        }
    }

    fn analyze(&mut self) -> Result<SubmissionId> {
        let old_phase = self.workflow.phase();
        let request = self.workflow.begin_analysis()?;
        let submission_id = request.id;

        if let Some(restarted) = request.restarted {
            tracing::info!(%restarted, "Restarting analysis, previous request cancelled");
            self.emit(UploadEvent::AnalysisCancelled { submission_id: restarted });
        }

        tracing::info!(
            %submission_id,
            file_name = request.candidate.file_name(),
            size_bytes = request.candidate.size_bytes(),
            "Submitting image for analysis"
        );

        self.spawn_request(request);
        self.emit(UploadEvent::AnalysisStarted { submission_id });
        self.emit_phase_change(old_phase);

        Ok(submission_id)
    }

    fn spawn_request(&self, request: AnalysisRequest) {
        let api = self.api.clone();
        let completion_tx = self.completion_tx.clone();

        tokio::spawn(async move {
            let AnalysisRequest { id, candidate, token, .. } = request;

            // 执行，被取消时立即返回
            let outcome = tokio::select! {
                result = api.analyze(&candidate) => result,
                _ = token.cancelled() => Err(ApiError::Cancelled),
            };

            // 通知完成
            let _ = completion_tx.send((id, outcome));
        });
    }

    fn handle_completion(&mut self, submission_id: SubmissionId, outcome: crate::api::Result<Analysis>) {
        let old_phase = self.workflow.phase();
        let event = match &outcome {
            Ok(analysis) => UploadEvent::AnalysisSucceeded {
                submission_id,
                analysis: analysis.clone(),
            },
            Err(err) => UploadEvent::AnalysisFailed {
                submission_id,
                error: err.to_string(),
            },
        };

        if !self.workflow.complete(submission_id, outcome) {
            return;
        }

        match self.workflow.phase() {
            WorkflowPhase::Succeeded => tracing::info!(%submission_id, "Analysis succeeded"),
            _ => tracing::warn!(%submission_id, "Analysis failed"),
        }

        self.emit(event);
        self.emit_phase_change(old_phase);
    }

    fn emit_discarded(&self, discarded: Discarded) {
        if let Some(submission_id) = discarded.cancelled {
            tracing::info!(%submission_id, "In-flight analysis cancelled");
            self.emit(UploadEvent::AnalysisCancelled { submission_id });
        }

        if let Some(file_name) = discarded.candidate {
            self.emit(UploadEvent::PreviewRevoked { file_name });
        }
    }

    fn emit_phase_change(&self, old_phase: WorkflowPhase) {
        let new_phase = self.workflow.phase();
        if old_phase != new_phase {
            tracing::info!(?old_phase, ?new_phase, "Phase changed");
            self.emit(UploadEvent::PhaseChanged { old_phase, new_phase });
        }
    }

    fn emit(&self, event: UploadEvent) {
        // 没有订阅者时发送失败，忽略
        let _ = self.event_tx.send(event);
    }
}

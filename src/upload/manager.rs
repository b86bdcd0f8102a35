use std::path::Path;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use crate::api::PlantApi;
use super::candidate::SelectedFile;
use super::errors::{Result, WorkflowError};
use super::manager_worker::UploadManagerWorker;
use super::types::{ManagerCommand, SubmissionId, UploadEvent, WorkflowPhase, WorkflowSnapshot};

/// 上传流程的句柄，可以克隆后交给展示层
#[derive(Clone)]
pub struct UploadManager {
    command_tx: mpsc::Sender<ManagerCommand>,
    event_tx: broadcast::Sender<UploadEvent>,
    max_image_bytes: u64,
}

/// 上传管理器句柄 - 包含管理器和工作任务
pub struct UploadManagerHandle {
    pub manager: UploadManager,
    pub worker_handle: JoinHandle<()>,
}

impl UploadManagerHandle {
    pub async fn shutdown(self) -> Result<()> {
        drop(self.manager);
        self.worker_handle
            .await
            .map_err(|_| WorkflowError::ManagerShutdown)
    }
}

impl UploadManager {
    pub fn new(api: Arc<dyn PlantApi>, max_image_bytes: u64) -> UploadManagerHandle {
        let (command_tx, command_rx) = mpsc::channel(32);
        // 最大缓存 64 个事件
        let (event_tx, _) = broadcast::channel(64);

        let worker_handle = tokio::spawn(UploadManagerWorker::run(
            api,
            max_image_bytes,
            command_rx,
            event_tx.clone(),
        ));

        let manager = Self {
            command_tx,
            event_tx,
            max_image_bytes,
        };

        UploadManagerHandle {
            manager,
            worker_handle,
        }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> ManagerCommand) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| WorkflowError::ManagerShutdown)?;

        reply_rx.await.map_err(|_| WorkflowError::ManagerShutdown)
    }

    /// Select an in-memory file
    pub async fn select_file(&self, file: SelectedFile) -> Result<()> {
        self.request(|reply| ManagerCommand::SelectFile { file, reply }).await?
    }

    /// Read a file from disk and select it
    ///
    /// Type and size are checked before the file is read. A rejected path
    /// leaves the workflow untouched, same as a rejected in-memory file.
    pub async fn select_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = match SelectedFile::from_path(path, self.max_image_bytes).await {
            Ok(file) => file,
            Err(WorkflowError::Validation(err)) => {
                tracing::info!(path = %path.display(), error = %err, "Image rejected");
                let _ = self.event_tx.send(UploadEvent::ValidationFailed { error: err.to_string() });
                return Err(err.into());
            }
            Err(err) => return Err(err),
        };
        self.select_file(file).await
    }

    /// 移除当前图片，返回是否有图片被移除
    pub async fn remove(&self) -> Result<bool> {
        self.request(|reply| ManagerCommand::Remove { reply }).await
    }

    /// 开始分析，不等待结果
    pub async fn analyze(&self) -> Result<SubmissionId> {
        self.request(|reply| ManagerCommand::Analyze { reply }).await?
    }

    pub async fn snapshot(&self) -> Result<WorkflowSnapshot> {
        self.request(|reply| ManagerCommand::Snapshot { reply }).await
    }

    /// 等待分析结束，返回此时的快照
    ///
    /// 不在 `Submitting` 阶段时立即返回当前快照；分析被取消
    /// （换图或移除）时返回 `Selected` 或 `Idle` 的快照。
    pub async fn wait_for_settled(&self) -> Result<WorkflowSnapshot> {
        // 先订阅再取快照，避免错过事件
        let mut events = self.subscribe_events();

        loop {
            let snapshot = self.snapshot().await?;
            if snapshot.phase != WorkflowPhase::Submitting {
                return Ok(snapshot);
            }

            loop {
                match events.recv().await {
                    Ok(UploadEvent::PhaseChanged { new_phase, .. }) if new_phase != WorkflowPhase::Submitting => break,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => break,
                    Err(broadcast::error::RecvError::Closed) => return Err(WorkflowError::ManagerShutdown),
                }
            }
        }
    }

    /// 订阅事件
    ///
    /// 注意：
    /// - 如果接收速度跟不上发送速度，可能会丢失事件（lagged error）
    /// - 每个订阅者都会收到完整的事件副本
    pub fn subscribe_events(&self) -> broadcast::Receiver<UploadEvent> {
        self.event_tx.subscribe()
    }
}

use std::path::Path;
use std::sync::Arc;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use bytes::Bytes;
use tokio::io::AsyncReadExt;
use super::errors::{Result, ValidationError};

/// 图片大小上限 5MB
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// 用户选择的文件，尚未校验
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl SelectedFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// 异步读取磁盘文件，按扩展名推断 MIME 类型
    ///
    /// 类型和大小先按扩展名与文件元数据校验，通过后才读取内容；
    /// 读取量最多为 `max_bytes + 1`，超出即按过大处理。
    pub async fn from_path(path: impl AsRef<Path>, max_bytes: u64) -> Result<Self> {
        let path = path.as_ref();
        let mime_type = mime_type_for_path(path);
        check_type(mime_type)?;

        let metadata = tokio::fs::metadata(path).await?;
        check_size(metadata.len(), max_bytes)?;

        let file = tokio::fs::File::open(path).await?;
        let mut bytes = Vec::with_capacity(metadata.len() as usize);
        file.take(max_bytes.saturating_add(1)).read_to_end(&mut bytes).await?;
        check_size(bytes.len() as u64, max_bytes)?;

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("image")
            .to_string();

        Ok(Self {
            mime_type: mime_type.to_string(),
            file_name,
            bytes: Bytes::from(bytes),
        })
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

pub fn mime_type_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        _ => FALLBACK_MIME_TYPE,
    }
}

/// 先校验类型，再校验大小
pub fn validate(file: &SelectedFile, max_bytes: u64) -> Result<(), ValidationError> {
    check_type(&file.mime_type)?;
    check_size(file.size_bytes(), max_bytes)
}

fn check_type(mime_type: &str) -> Result<(), ValidationError> {
    if mime_type.to_ascii_lowercase().starts_with("image/") {
        Ok(())
    } else {
        Err(ValidationError::InvalidType {
            mime_type: mime_type.to_string(),
        })
    }
}

fn check_size(size_bytes: u64, max_bytes: u64) -> Result<(), ValidationError> {
    if size_bytes > max_bytes {
        Err(ValidationError::TooLarge {
            size_bytes,
            limit_bytes: max_bytes,
        })
    } else {
        Ok(())
    }
}

/// 通过校验、等待分析的图片
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    file_name: String,
    mime_type: String,
    file_bytes: Bytes,
    preview: Option<Arc<str>>,
}

impl UploadCandidate {
    pub fn from_file(file: SelectedFile, max_bytes: u64) -> Result<Self, ValidationError> {
        validate(&file, max_bytes)?;

        let preview = format!(
            "data:{};base64,{}",
            file.mime_type,
            BASE64_STANDARD.encode(&file.bytes)
        );

        Ok(Self {
            file_name: file.file_name,
            mime_type: file.mime_type,
            file_bytes: file.bytes,
            preview: Some(preview.into()),
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn file_bytes(&self) -> &Bytes {
        &self.file_bytes
    }

    pub fn size_bytes(&self) -> u64 {
        self.file_bytes.len() as u64
    }

    /// `None` once the preview has been revoked.
    pub fn preview_data_uri(&self) -> Option<&str> {
        self.preview.as_deref()
    }

    pub(crate) fn shared_preview(&self) -> Option<Arc<str>> {
        self.preview.clone()
    }

    pub fn revoke_preview(&mut self) {
        self.preview = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::WorkflowError;

    fn jpeg(size: usize) -> SelectedFile {
        SelectedFile::new("leaf.jpg", "image/jpeg", vec![0xFFu8; size])
    }

    #[test]
    fn test_validate_rejects_non_image() {
        let file = SelectedFile::new("notes.pdf", "application/pdf", vec![1, 2, 3]);
        assert_eq!(
            validate(&file, DEFAULT_MAX_IMAGE_BYTES),
            Err(ValidationError::InvalidType { mime_type: "application/pdf".into() })
        );
    }

    #[test]
    fn test_validate_type_checked_before_size() {
        let file = SelectedFile::new("video.mp4", "video/mp4", vec![0u8; 6 * 1024 * 1024]);
        assert!(matches!(
            validate(&file, DEFAULT_MAX_IMAGE_BYTES),
            Err(ValidationError::InvalidType { .. })
        ));
    }

    #[test]
    fn test_validate_size_boundary() {
        let limit = DEFAULT_MAX_IMAGE_BYTES as usize;
        assert!(validate(&jpeg(limit), DEFAULT_MAX_IMAGE_BYTES).is_ok());
        assert_eq!(
            validate(&jpeg(limit + 1), DEFAULT_MAX_IMAGE_BYTES),
            Err(ValidationError::TooLarge {
                size_bytes: DEFAULT_MAX_IMAGE_BYTES + 1,
                limit_bytes: DEFAULT_MAX_IMAGE_BYTES,
            })
        );
    }

    #[test]
    fn test_validation_messages() {
        let err = ValidationError::TooLarge { size_bytes: 6 * 1024 * 1024, limit_bytes: DEFAULT_MAX_IMAGE_BYTES };
        assert_eq!(
            err.to_string(),
            "File too large (6.00 MB), please upload an image smaller than 5.00 MB"
        );
    }

    #[test]
    fn test_candidate_preview_data_uri() {
        let file = SelectedFile::new("leaf.png", "image/png", b"abc".to_vec());
        let mut candidate = UploadCandidate::from_file(file, DEFAULT_MAX_IMAGE_BYTES).unwrap();

        assert_eq!(candidate.preview_data_uri(), Some("data:image/png;base64,YWJj"));
        assert_eq!(candidate.size_bytes(), 3);
        assert_eq!(candidate.mime_type(), "image/png");

        candidate.revoke_preview();
        assert_eq!(candidate.preview_data_uri(), None);
    }

    #[test]
    fn test_mime_type_for_path() {
        assert_eq!(mime_type_for_path(Path::new("a/B.JPG")), "image/jpeg");
        assert_eq!(mime_type_for_path(Path::new("leaf.webp")), "image/webp");
        assert_eq!(mime_type_for_path(Path::new("report.txt")), FALLBACK_MIME_TYPE);
        assert_eq!(mime_type_for_path(Path::new("no_extension")), FALLBACK_MIME_TYPE);
    }

    #[tokio::test]
    async fn test_selected_file_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaf.jpeg");
        tokio::fs::write(&path, vec![7u8; 2048]).await.unwrap();

        let file = SelectedFile::from_path(&path, DEFAULT_MAX_IMAGE_BYTES).await.unwrap();
        assert_eq!(file.file_name, "leaf.jpeg");
        assert_eq!(file.mime_type, "image/jpeg");
        assert_eq!(file.size_bytes(), 2048);
    }

    #[tokio::test]
    async fn test_selected_file_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = SelectedFile::from_path(dir.path().join("missing.png"), DEFAULT_MAX_IMAGE_BYTES)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Io(_)));
    }

    #[tokio::test]
    async fn test_from_path_rejects_non_image_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holiday.mp4");
        // 稀疏文件，只设置长度
        std::fs::File::create(&path).unwrap().set_len(64 * 1024 * 1024).unwrap();

        let err = SelectedFile::from_path(&path, DEFAULT_MAX_IMAGE_BYTES).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Validation(ValidationError::InvalidType { ref mime_type })
                if mime_type == FALLBACK_MIME_TYPE
        ));
    }

    #[tokio::test]
    async fn test_from_path_rejects_oversized_from_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.png");
        std::fs::File::create(&path).unwrap().set_len(64 * 1024 * 1024).unwrap();

        let err = SelectedFile::from_path(&path, DEFAULT_MAX_IMAGE_BYTES).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Validation(ValidationError::TooLarge { size_bytes, limit_bytes })
                if size_bytes == 64 * 1024 * 1024 && limit_bytes == DEFAULT_MAX_IMAGE_BYTES
        ));
    }

    #[tokio::test]
    async fn test_from_path_missing_non_image_reports_type() {
        // 类型校验不需要打开文件
        let dir = tempfile::tempdir().unwrap();
        let err = SelectedFile::from_path(dir.path().join("missing.mp4"), DEFAULT_MAX_IMAGE_BYTES)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(ValidationError::InvalidType { .. })));
    }
}

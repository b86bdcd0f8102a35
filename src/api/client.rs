use std::time::Duration;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;
use crate::config::Config;
use crate::upload::UploadCandidate;
use super::errors::{ApiError, Result};
use super::traits::PlantApi;
use super::types::{Analysis, PlantProfile, PredictionPayload, ScanRecord, TreatmentPlan};

/// multipart 表单中图片字段名
pub const IMAGE_FIELD: &str = "image";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(format!("Not a base url: {}", base_url)));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ApiError::InvalidRequest(err.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.base_url(), config.timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// 在 base url 后追加路径段，每段都会做百分号编码
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(format!("Not a base url: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let (client, request) = request.build_split();
        let request = request.map_err(|err| ApiError::InvalidRequest(err.to_string()))?;
        let method = request.method().clone();
        let url = request.url().clone();

        tracing::debug!(%method, %url, "Sending request");

        let response = client.execute(request).await.map_err(|err| {
            let err = ApiError::from(err);
            tracing::warn!(%method, %url, error = %err, "Request failed");
            err
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = Self::error_message(status, response.text().await.ok());
            tracing::warn!(%method, %url, status = status.as_u16(), %message, "Server rejected request");
            return Err(ApiError::server_error(status.as_u16(), message));
        }

        let body = response.bytes().await?;
        let payload = serde_json::from_slice(&body)?;

        Ok(payload)
    }

    fn error_message(status: StatusCode, body: Option<String>) -> String {
        match body {
            Some(text) if !text.trim().is_empty() => text,
            _ => status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string(),
        }
    }

    async fn predict(&self, candidate: &UploadCandidate) -> Result<PredictionPayload> {
        let part = Part::stream_with_length(candidate.file_bytes().clone(), candidate.size_bytes())
            .file_name(candidate.file_name().to_string())
            .mime_str(candidate.mime_type())
            .map_err(|err| ApiError::InvalidRequest(err.to_string()))?;
        let form = Form::new().part(IMAGE_FIELD, part);

        let url = self.endpoint(&["predict"])?;
        self.send_json(self.client.post(url).multipart(form)).await
    }
}

#[async_trait]
impl PlantApi for ApiClient {
    /// 预测结果缺少 `plant` 时按病害名查询植物信息；查询失败则整个分析失败，
    /// 成功的分析总是同时带有诊断和植物信息
    async fn analyze(&self, candidate: &UploadCandidate) -> Result<Analysis> {
        let payload = self.predict(candidate).await?;

        let plant = match payload.plant {
            Some(plant) => plant,
            None => {
                let plant_name = payload.diagnosis.plant_name();
                tracing::debug!(%plant_name, "Prediction carried no plant profile, looking it up");
                self.fetch_plant_info(&plant_name).await.inspect_err(|err| {
                    tracing::warn!(%plant_name, error = %err, "Plant profile lookup failed, discarding prediction");
                })?
            }
        };

        Ok(Analysis {
            diagnosis: payload.diagnosis,
            plant,
        })
    }

    async fn fetch_treatment(&self, disease_name: &str) -> Result<TreatmentPlan> {
        let url = self.endpoint(&["treatment", disease_name])?;
        self.send_json(self.client.get(url)).await
    }

    async fn fetch_plant_info(&self, plant_name: &str) -> Result<PlantProfile> {
        let url = self.endpoint(&["plant-info", plant_name])?;
        self.send_json(self.client.get(url)).await
    }

    async fn fetch_history(&self) -> Result<Vec<ScanRecord>> {
        let url = self.endpoint(&["history"])?;
        self.send_json(self.client.get(url)).await
    }

    async fn fetch_scan(&self, scan_id: &str) -> Result<ScanRecord> {
        let url = self.endpoint(&["history", scan_id])?;
        self.send_json(self.client.get(url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_and_encodes_segments() {
        let client = ApiClient::new("http://localhost:8000/api/", DEFAULT_TIMEOUT).unwrap();

        assert_eq!(
            client.endpoint(&["predict"]).unwrap().as_str(),
            "http://localhost:8000/api/predict"
        );
        assert_eq!(
            client.endpoint(&["treatment", "Tomato Late Blight"]).unwrap().as_str(),
            "http://localhost:8000/api/treatment/Tomato%20Late%20Blight"
        );
        assert_eq!(
            client.endpoint(&["history", "a/b"]).unwrap().as_str(),
            "http://localhost:8000/api/history/a%2Fb"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            ApiClient::new("not a url", DEFAULT_TIMEOUT),
            Err(ApiError::InvalidUrl(_))
        ));
        assert!(matches!(
            ApiClient::new("mailto:someone@example.com", DEFAULT_TIMEOUT),
            Err(ApiError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_error_message_falls_back_to_reason() {
        assert_eq!(
            ApiClient::error_message(StatusCode::NOT_FOUND, Some("  ".into())),
            "Not Found"
        );
        assert_eq!(
            ApiClient::error_message(StatusCode::INTERNAL_SERVER_ERROR, Some("boom".into())),
            "boom"
        );
    }
}

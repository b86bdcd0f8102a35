//! Offline stand-in for the diagnosis service.
//!
//! Answers every call with the same static data after a fixed delay, the way
//! the web front end behaved before it was wired to a backend.

use std::collections::BTreeMap;
use std::time::Duration;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use crate::upload::UploadCandidate;
use super::errors::{ApiError, Result};
use super::traits::PlantApi;
use super::types::{Analysis, DiagnosisResult, PlantProfile, ScanRecord, Source, TreatmentPlan};

#[derive(Debug, Clone)]
pub struct DemoApi {
    analyze_delay: Duration,
    history_delay: Duration,
}

impl Default for DemoApi {
    fn default() -> Self {
        Self {
            analyze_delay: Duration::from_secs(2),
            history_delay: Duration::from_secs(1),
        }
    }
}

impl DemoApi {
    pub fn new(analyze_delay: Duration) -> Self {
        Self {
            analyze_delay,
            history_delay: analyze_delay / 2,
        }
    }

    /// 不等待，测试用
    pub fn instant() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn sample_diagnosis() -> DiagnosisResult {
        DiagnosisResult {
            disease_name: "Tomato Late Blight".to_string(),
            confidence_ratio: 0.95,
            description: "Late blight is a devastating disease that affects tomato plants, \
                characterized by dark lesions on leaves and stems that spread rapidly under \
                cool, wet conditions."
                .to_string(),
            treatment_text: "Remove and destroy all infected plant parts. Apply copper-based \
                fungicides as a preventive measure. Ensure good air circulation and avoid \
                overhead watering."
                .to_string(),
            sources: vec![
                Source {
                    title: "Cornell University Plant Disease".to_string(),
                    url: "https://www.cornell.edu/plant-disease".to_string(),
                },
                Source {
                    title: "Plant MD Database".to_string(),
                    url: "https://www.example.com/plant-md".to_string(),
                },
            ],
        }
    }

    pub fn sample_plant() -> PlantProfile {
        let care_attributes = BTreeMap::from([
            ("water".to_string(), "Keep soil consistently moist but not soggy".to_string()),
            ("sunlight".to_string(), "Full sun (6-8 hours daily)".to_string()),
            ("temperature".to_string(), "65-85°F (18-29°C)".to_string()),
            ("airflow".to_string(), "Good circulation to prevent fungal issues".to_string()),
        ]);

        PlantProfile {
            common_name: "Tomato Plant".to_string(),
            scientific_name: "Solanum lycopersicum".to_string(),
            care_attributes,
            prevention_tips: vec![
                "Plant resistant varieties when possible".to_string(),
                "Provide adequate spacing between plants for airflow".to_string(),
                "Use drip irrigation or soaker hoses to keep foliage dry".to_string(),
                "Apply preventative fungicide during wet conditions".to_string(),
            ],
        }
    }

    pub fn sample_history() -> Vec<ScanRecord> {
        let record = |id: &str, disease: &str, image_url: &str, (y, m, d, h, min): (i32, u32, u32, u32, u32)| {
            ScanRecord {
                id: id.to_string(),
                disease_name: disease.to_string(),
                image_url: image_url.to_string(),
                timestamp_utc: Utc
                    .with_ymd_and_hms(y, m, d, h, min, 0)
                    .single()
                    .unwrap_or_default(),
                confidence: None,
            }
        };

        vec![
            record(
                "1",
                "Tomato Late Blight",
                "https://upload.wikimedia.org/wikipedia/commons/thumb/3/32/Tomato_late_blight.jpg/800px-Tomato_late_blight.jpg",
                (2023, 6, 15, 14, 32),
            ),
            record(
                "2",
                "Rose Black Spot",
                "https://upload.wikimedia.org/wikipedia/commons/thumb/7/7d/Black_spot_%28rose_disease%29.jpg/800px-Black_spot_%28rose_disease%29.jpg",
                (2023, 6, 10, 9, 17),
            ),
            record(
                "3",
                "Apple Cedar Rust",
                "https://upload.wikimedia.org/wikipedia/commons/thumb/f/f7/Cedar_apple_rust_on_apple_leaf.jpg/800px-Cedar_apple_rust_on_apple_leaf.jpg",
                (2023, 6, 1, 16, 45),
            ),
        ]
    }
}

#[async_trait]
impl PlantApi for DemoApi {
    async fn analyze(&self, candidate: &UploadCandidate) -> Result<Analysis> {
        tracing::debug!(file = candidate.file_name(), size = candidate.size_bytes(), "Demo analysis");
        tokio::time::sleep(self.analyze_delay).await;

        Ok(Analysis {
            diagnosis: Self::sample_diagnosis(),
            plant: Self::sample_plant(),
        })
    }

    async fn fetch_treatment(&self, disease_name: &str) -> Result<TreatmentPlan> {
        let diagnosis = Self::sample_diagnosis();
        let treatment = if disease_name.eq_ignore_ascii_case(&diagnosis.disease_name) {
            diagnosis.treatment_text
        } else {
            "No specific treatment found for this disease.".to_string()
        };

        Ok(TreatmentPlan {
            disease: disease_name.to_string(),
            treatment,
            steps: vec![
                "Remove all infected leaves and dispose of them properly.".to_string(),
                "Apply appropriate fungicide according to label instructions.".to_string(),
                "Improve air circulation around plants.".to_string(),
                "Water at the base of plants to avoid wetting foliage.".to_string(),
                "Rotate crops in future growing seasons.".to_string(),
            ],
        })
    }

    async fn fetch_plant_info(&self, _plant_name: &str) -> Result<PlantProfile> {
        Ok(Self::sample_plant())
    }

    async fn fetch_history(&self) -> Result<Vec<ScanRecord>> {
        tokio::time::sleep(self.history_delay).await;
        Ok(Self::sample_history())
    }

    async fn fetch_scan(&self, scan_id: &str) -> Result<ScanRecord> {
        Self::sample_history()
            .into_iter()
            .find(|record| record.id == scan_id)
            .ok_or_else(|| ApiError::server_error(404, "Scan not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_history_order() {
        let api = DemoApi::instant();
        let history = api.fetch_history().await.unwrap();
        let names: Vec<_> = history.iter().map(|r| r.disease_name.as_str()).collect();
        assert_eq!(names, ["Tomato Late Blight", "Rose Black Spot", "Apple Cedar Rust"]);
    }

    #[tokio::test]
    async fn test_demo_scan_not_found() {
        let api = DemoApi::instant();
        assert_eq!(api.fetch_scan("2").await.unwrap().disease_name, "Rose Black Spot");

        let err = api.fetch_scan("42").await.unwrap_err();
        assert_eq!(err.status_code(), Some(404));
    }

    #[tokio::test]
    async fn test_demo_treatment_fallback() {
        let api = DemoApi::instant();
        let plan = api.fetch_treatment("Rose Black Spot").await.unwrap();
        assert_eq!(plan.treatment, "No specific treatment found for this disease.");
        assert_eq!(plan.steps.len(), 5);
    }
}

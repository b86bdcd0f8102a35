use std::collections::BTreeMap;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use crate::utils::format_confidence;

// null 或缺省字段按默认值处理
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// care 对象里值为 null 的条目直接丢弃
fn deserialize_care<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Option<String>>>::deserialize(deserializer)?;

    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(category, advice)| advice.map(|advice| (category, advice)))
        .collect())
}

// 兼容不带时区的时间戳，按 UTC 处理
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|err| format!("Invalid timestamp {:?}: {}", raw, err))
}

/// 诊断依据的参考来源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
}

/// 一次分析得到的病害诊断结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    #[serde(rename = "disease")]
    pub disease_name: String,
    /// 置信度，0.0 ~ 1.0
    #[serde(rename = "confidence")]
    pub confidence_ratio: f64,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "treatment", default)]
    pub treatment_text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sources: Vec<Source>,
}

impl DiagnosisResult {
    pub fn confidence_percent(&self) -> f64 {
        self.confidence_ratio * 100.0
    }

    /// "复制结果" 使用的纯文本
    pub fn clipboard_text(&self) -> String {
        format!(
            "Disease: {}\nConfidence: {}\nDescription: {}\nTreatment: {}",
            self.disease_name,
            format_confidence(self.confidence_ratio),
            self.description,
            self.treatment_text,
        )
    }

    /// Plant name derived from the disease label, e.g. "Tomato Late Blight" or
    /// "Tomato___Late_blight" both give "tomato".
    pub fn plant_name(&self) -> String {
        let label = self.disease_name.trim();
        let plant = match label.split_once("___") {
            Some((crop, _)) => crop,
            None => label.split_whitespace().next().unwrap_or(label),
        };

        plant.replace('_', " ").trim().to_lowercase()
    }
}

/// 植物资料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantProfile {
    #[serde(rename = "name")]
    pub common_name: String,
    #[serde(default)]
    pub scientific_name: String,
    /// 养护类别 -> 建议，例如 water / sunlight / temperature / airflow
    #[serde(rename = "care", default, deserialize_with = "deserialize_care")]
    pub care_attributes: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub prevention_tips: Vec<String>,
}

/// 同一次提交产出的诊断结果和植物资料
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub diagnosis: DiagnosisResult,
    pub plant: PlantProfile,
}

/// `POST /predict` 的响应体
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PredictionPayload {
    #[serde(flatten)]
    pub diagnosis: DiagnosisResult,
    #[serde(default)]
    pub plant: Option<PlantProfile>,
}

/// `GET /treatment/{disease}` 的响应体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentPlan {
    pub disease: String,
    pub treatment: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub steps: Vec<String>,
}

/// 历史扫描记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub id: String,
    #[serde(rename = "disease")]
    pub disease_name: String,
    pub image_url: String,
    #[serde(rename = "timestamp", deserialize_with = "deserialize_timestamp")]
    pub timestamp_utc: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl ScanRecord {
    pub fn scanned_on_text(&self) -> String {
        format!("Scanned on {}", self.timestamp_utc.format("%b %d, %Y %I:%M %p"))
    }
}

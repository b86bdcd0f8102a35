mod client;
mod demo;
mod errors;
mod traits;
pub mod types;

pub use client::{ApiClient, DEFAULT_TIMEOUT, IMAGE_FIELD};
pub use demo::DemoApi;
pub use errors::{ApiError, Result};
pub use traits::PlantApi;
pub use types::{Analysis, DiagnosisResult, PlantProfile, ScanRecord, Source, TreatmentPlan};

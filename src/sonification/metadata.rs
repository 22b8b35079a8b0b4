//! Response metadata describing a generated artifact.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

use crate::sonification::fetcher::FetchResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingMetadata {
    /// Artifact name, resolvable through `GET /api/audio/{filename}`
    pub audio_url: String,
    pub processing_info: ProcessingInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingInfo {
    #[serde(serialize_with = "serialize_millis")]
    pub timestamp: DateTime<Utc>,
    /// Wall time from request start to metadata assembly, e.g. `"812ms"`
    pub processing_time: String,
    pub original_url: String,
    pub original_content_length: usize,
    pub processed_content_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub status_code: u16,
    pub file_name: String,
}

impl ProcessingMetadata {
    pub fn assemble(
        url: &str,
        fetched: &FetchResult,
        slice: &str,
        file_name: &str,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let elapsed_ms = (finished_at - started_at).num_milliseconds().max(0);
        Self {
            audio_url: file_name.to_string(),
            processing_info: ProcessingInfo {
                timestamp: started_at,
                processing_time: format!("{}ms", elapsed_ms),
                original_url: url.to_string(),
                original_content_length: fetched.content_length,
                processed_content_length: slice.chars().count(),
                content_type: fetched.content_type.clone(),
                status_code: fetched.status_code,
                file_name: file_name.to_string(),
            },
        }
    }
}

fn serialize_millis<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    #[test]
    fn serializes_with_camel_case_fields() {
        let started = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let finished = started + Duration::milliseconds(1234);
        let fetched = FetchResult::new("x".repeat(1000), Some("text/html".into()), 200);

        let metadata = ProcessingMetadata::assemble(
            "https://example.com/page",
            &fetched,
            &"x".repeat(300),
            "example.com.wav",
            started,
            finished,
        );

        assert_eq!(
            serde_json::to_value(&metadata).unwrap(),
            json!({
                "audioUrl": "example.com.wav",
                "processingInfo": {
                    "timestamp": "2024-05-01T12:00:00.000Z",
                    "processingTime": "1234ms",
                    "originalUrl": "https://example.com/page",
                    "originalContentLength": 1000,
                    "processedContentLength": 300,
                    "contentType": "text/html",
                    "statusCode": 200,
                    "fileName": "example.com.wav"
                }
            })
        );
    }

    #[test]
    fn omits_missing_content_type() {
        let started = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let fetched = FetchResult::new("plain".to_string(), None, 200);

        let metadata =
            ProcessingMetadata::assemble("https://example.com", &fetched, "plain", "example.com.wav", started, started);
        let value = serde_json::to_value(&metadata).unwrap();

        let info = value["processingInfo"].as_object().unwrap();
        assert!(!info.contains_key("contentType"));
        assert_eq!(info["processingTime"], "0ms");
    }
}

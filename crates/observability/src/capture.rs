//! Local snapshots of finished invocation spans.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attributes;
use crate::error::ObservabilityError;

/// Terminal status of a captured invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum CaptureStatus {
    Ok,
    Error {
        #[serde(rename = "type")]
        error_type: String,
        message: String,
    },
    Cancelled,
}

impl CaptureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureStatus::Ok => "ok",
            CaptureStatus::Error { .. } => "error",
            CaptureStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    #[default]
    Buffered,
    Streamed,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Buffered => "buffered",
            ResponseKind::Streamed => "streamed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedEvent {
    pub kind: String,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSummary {
    pub kind: ResponseKind,
    pub event_count: usize,
    #[serde(default)]
    pub completion: String,
    #[serde(default)]
    pub events: Vec<CapturedEvent>,
}

/// One invocation's span, attributes and response summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceCapture {
    pub span_name: String,
    pub trace_id: String,
    pub span_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub status: CaptureStatus,
    pub attributes: BTreeMap<String, String>,
    pub response: ResponseSummary,
}

impl TraceCapture {
    pub fn session_id(&self) -> Option<&str> {
        self.attributes.get(attributes::SESSION_ID).map(String::as_str)
    }

    pub fn is_ok(&self) -> bool {
        self.status == CaptureStatus::Ok
    }

    /// `trace-<session>-<UTC timestamp>-<span id>.json`
    pub fn file_name(&self) -> String {
        let session = self
            .session_id()
            .map(sanitize)
            .unwrap_or_else(|| "nosession".to_string());
        format!(
            "trace-{}-{}-{}.json",
            session,
            self.ended_at.format("%Y%m%dT%H%M%S%3f"),
            self.span_id
        )
    }

    pub fn to_pretty_json(&self) -> Result<String, ObservabilityError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write this capture as pretty JSON under `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, ObservabilityError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, self.to_pretty_json()?)?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self, ObservabilityError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn capture(session: Option<&str>) -> TraceCapture {
        let mut attrs = BTreeMap::new();
        attrs.insert(
            attributes::OPERATION_NAME.to_string(),
            "invoke_agent".to_string(),
        );
        if let Some(session) = session {
            attrs.insert(attributes::SESSION_ID.to_string(), session.to_string());
        }
        TraceCapture {
            span_name: "invoke_agent AGENT1".to_string(),
            trace_id: "4bf92f3577b34da6a3ce929d0e0e4736".to_string(),
            span_id: "00f067aa0ba902b7".to_string(),
            started_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            ended_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 2).unwrap(),
            duration_ms: 2000,
            status: CaptureStatus::Error {
                error_type: "TimeoutError".to_string(),
                message: "timed out".to_string(),
            },
            attributes: attrs,
            response: ResponseSummary {
                kind: ResponseKind::Streamed,
                event_count: 1,
                completion: "Hi".to_string(),
                events: vec![CapturedEvent {
                    kind: "chunk".to_string(),
                    elapsed_ms: 12,
                    text: Some("Hi".to_string()),
                }],
            },
        }
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            capture(Some("abc-123")).file_name(),
            "trace-abc-123-20240501T120002000-00f067aa0ba902b7.json"
        );
        assert_eq!(
            capture(None).file_name(),
            "trace-nosession-20240501T120002000-00f067aa0ba902b7.json"
        );
        assert!(capture(Some("../etc/passwd")).file_name().starts_with("trace-___etc_passwd-"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("traces");
        let original = capture(Some("abc-123"));
        let path = original.save(&target).unwrap();
        assert!(path.starts_with(&target));
        let loaded = TraceCapture::load(&path).unwrap();
        assert_eq!(loaded, original);
        assert_eq!(loaded.session_id(), Some("abc-123"));
        assert!(!loaded.is_ok());
    }

    #[test]
    fn test_status_json_shape() {
        let json = serde_json::to_value(capture(None)).unwrap();
        assert_eq!(json["status"]["code"], "error");
        assert_eq!(json["status"]["type"], "TimeoutError");
        assert_eq!(json["response"]["kind"], "streamed");
        let ok = serde_json::to_value(CaptureStatus::Ok).unwrap();
        assert_eq!(ok["code"], "ok");
    }

    #[test]
    fn test_load_missing_file() {
        let err = TraceCapture::load(Path::new("/nonexistent/trace.json")).unwrap_err();
        assert!(matches!(err, ObservabilityError::Io(_)));
    }
}

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::provision::ProvisionReport;

/// Response from a provisioning request.
#[derive(Debug, Serialize)]
pub struct ProvisionResponse {
    /// Correlates with the server log lines for this request
    pub request_id: Uuid,

    /// Rule file that was provisioned
    pub target: String,

    /// Whether anything changed on disk
    pub changed: bool,

    pub rules_changed: bool,
    pub config_changed: bool,

    /// Whether the monitoring engine was reloaded
    pub reloaded: bool,

    pub provisioned_at: DateTime<Utc>,
}

impl ProvisionResponse {
    /// Build a response from a completed provisioning report.
    pub fn from_report(request_id: Uuid, report: &ProvisionReport) -> Self {
        ProvisionResponse {
            request_id,
            target: report.path.display().to_string(),
            changed: report.outcome.changed(),
            rules_changed: report.outcome.rules_changed,
            config_changed: report.outcome.config_changed,
            reloaded: report.reloaded,
            provisioned_at: Utc::now(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub reload_endpoint: String,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,

    /// Set when the failure happened after the rule file was persisted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed: Option<bool>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        ErrorResponse {
            error: error.into(),
            code: code.into(),
            changed: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ErrorResponse::new(message, "BAD_REQUEST")
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        ErrorResponse::new(message, "INTERNAL_ERROR")
    }

    /// Mark that the persisted state changed despite the error.
    pub fn with_changed(mut self, changed: bool) -> Self {
        self.changed = Some(changed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::ProvisionOutcome;
    use std::path::PathBuf;

    #[test]
    fn test_provision_response_serialization() {
        let report = ProvisionReport {
            path: PathBuf::from("/rules/node.yaml"),
            outcome: ProvisionOutcome {
                rules_changed: false,
                config_changed: true,
            },
            reloaded: true,
        };

        let resp = ProvisionResponse::from_report(Uuid::new_v4(), &report);
        let json = serde_json::to_value(&resp).unwrap();

        assert_eq!(json["target"], "/rules/node.yaml");
        assert_eq!(json["changed"], true);
        assert_eq!(json["rules_changed"], false);
        assert_eq!(json["reloaded"], true);
    }

    #[test]
    fn test_error_response_omits_changed() {
        let json = serde_json::to_string(&ErrorResponse::bad_request("nope")).unwrap();
        assert!(!json.contains("changed"));

        let json =
            serde_json::to_string(&ErrorResponse::new("x", "RELOAD_FAILED").with_changed(true))
                .unwrap();
        assert!(json.contains("\"changed\":true"));
    }
}

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::status::CanonicalStatus;

/// Actor recorded in `ModifiedBy` when the reconciliation worker mutates a run.
pub const STATUS_CHECK_ACTOR: &str = "Status Check";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Platform {
    #[serde(rename = "AWS HealthOmics")]
    AwsHealthOmics,
    #[serde(rename = "Seqera Cloud")]
    SeqeraCloud,
}

impl Platform {
    pub const ALL: [Self; 2] = [Self::AwsHealthOmics, Self::SeqeraCloud];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AwsHealthOmics => "AWS HealthOmics",
            Self::SeqeraCloud => "Seqera Cloud",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "AWS HealthOmics" => Ok(Self::AwsHealthOmics),
            "Seqera Cloud" => Ok(Self::SeqeraCloud),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// Persisted laboratory run. Field names follow the record layout shared with
/// the API tier, so the JSON form is PascalCase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct LaboratoryRun {
    pub run_id: String,
    pub laboratory_id: String,
    pub organization_id: String,
    /// Kept as text so records with a platform this build does not know
    /// still load and can be reported as unsupported.
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub canonical_status: CanonicalStatus,
    #[serde(default)]
    pub workflow_name: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub settings: serde_json::Value,
    pub created_at: String,
    pub created_by: String,
    pub modified_at: String,
    pub modified_by: String,
    #[serde(default)]
    pub version: u64,
}

impl LaboratoryRun {
    pub fn platform(&self) -> Option<Platform> {
        self.platform.parse().ok()
    }

    /// Provider-side run id, treating blank strings as absent.
    pub fn external_run_id(&self) -> Option<&str> {
        self.external_run_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn status_differs(&self, observed: &str) -> bool {
        !self.status.trim().eq_ignore_ascii_case(observed.trim())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLaboratoryRun {
    pub run_id: Option<String>,
    pub laboratory_id: String,
    pub organization_id: String,
    pub platform: Platform,
    pub external_run_id: Option<String>,
    pub workspace_id: Option<String>,
    pub status: Option<String>,
    pub workflow_name: String,
    pub owner: String,
    pub settings: serde_json::Value,
    pub created_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(status: &str, external: Option<&str>) -> LaboratoryRun {
        LaboratoryRun {
            run_id: "r1".to_string(),
            laboratory_id: "lab".to_string(),
            organization_id: "org".to_string(),
            platform: "AWS HealthOmics".to_string(),
            external_run_id: external.map(ToString::to_string),
            workspace_id: None,
            status: status.to_string(),
            canonical_status: CanonicalStatus::Unknown,
            workflow_name: "rnaseq".to_string(),
            owner: "owner@lab".to_string(),
            settings: serde_json::json!({}),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            created_by: "owner@lab".to_string(),
            modified_at: "2026-01-01T00:00:00Z".to_string(),
            modified_by: "owner@lab".to_string(),
            version: 1,
        }
    }

    #[test]
    fn status_comparison_ignores_case_and_padding() {
        let record = run("RUNNING", Some("123"));
        assert!(!record.status_differs("running"));
        assert!(!record.status_differs(" Running "));
        assert!(record.status_differs("COMPLETED"));
    }

    #[test]
    fn blank_external_run_id_counts_as_absent() {
        assert_eq!(run("PENDING", Some("  ")).external_run_id(), None);
        assert_eq!(run("PENDING", None).external_run_id(), None);
        assert_eq!(run("PENDING", Some("9876")).external_run_id(), Some("9876"));
    }

    #[test]
    fn record_json_uses_pascal_case_and_keeps_unknown_platform() {
        let raw = serde_json::json!({
            "RunId": "r2",
            "LaboratoryId": "lab",
            "OrganizationId": "org",
            "Platform": "Local Cluster",
            "Status": "RUNNING",
            "CreatedAt": "2026-01-01T00:00:00Z",
            "CreatedBy": "a",
            "ModifiedAt": "2026-01-01T00:00:00Z",
            "ModifiedBy": "a"
        });
        let record: LaboratoryRun = serde_json::from_value(raw).expect("decode");
        assert_eq!(record.platform, "Local Cluster");
        assert_eq!(record.platform(), None);
        assert_eq!(record.version, 0);

        let encoded = serde_json::to_value(&record).expect("encode");
        assert_eq!(encoded["RunId"], "r2");
        assert!(encoded.get("ExternalRunId").is_none());
    }

    #[test]
    fn platform_round_trips_through_display_names() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>(), Ok(platform));
        }
        assert!("aws healthomics".parse::<Platform>().is_err());
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// One row of the CSV mapping file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct OrgMapping {
    #[serde(rename = "GitHub-Org-Name")]
    pub github_org_name: String,
    #[serde(rename = "Snyk-Org-Name")]
    pub snyk_org_name: String,
}

/// A GitHub organization the token's user belongs to. Keyed by `login`
/// when matching against the CSV mapping.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceOrg {
    pub id: i64,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A CSV row that resolved on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgMatch {
    pub github_org_name: String,
    pub snyk_org_id: String,
}

/// Integration name -> integration id, as returned by the Snyk v1
/// integrations endpoint.
pub type Integrations = HashMap<String, String>;

/// One entry of an org-data artifact, consumed by the importer's
/// `import:data` subcommand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrgImportData {
    pub name: String,
    #[serde(rename = "orgId")]
    pub org_id: String,
    pub integrations: Integrations,
    #[serde(rename = "groupId")]
    pub group_id: String,
}

/// On-disk shape of an org-data artifact: `{"orgData": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrgDataFile {
    #[serde(rename = "orgData")]
    pub org_data: Vec<OrgImportData>,
}

/// One repository to import. Repo-identifying fields beyond the two ids
/// are preserved verbatim through split/rewrite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportTarget {
    #[serde(rename = "orgId")]
    pub org_id: String,
    #[serde(rename = "integrationId")]
    pub integration_id: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// On-disk shape of a target-list artifact: `{"targets": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetList {
    pub targets: Vec<ImportTarget>,
}

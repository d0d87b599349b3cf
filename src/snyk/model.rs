use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of a Snyk REST collection response.
#[derive(Deserialize, Debug)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub links: PageLinks,
}

#[derive(Deserialize, Debug, Default)]
pub struct PageLinks {
    pub next: Option<String>,
}

/// A destination organization as listed by the REST groups/orgs endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnykOrg {
    pub id: String,
    pub attributes: SnykOrgAttributes,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnykOrgAttributes {
    pub name: String,
    pub slug: String,
}

/// Flat shape returned by the v1 org-creation endpoint.
#[derive(Deserialize, Debug)]
pub struct V1OrgResp {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
}

impl From<V1OrgResp> for SnykOrg {
    fn from(resp: V1OrgResp) -> Self {
        let slug = resp.slug.unwrap_or_else(|| resp.name.clone());
        SnykOrg {
            id: resp.id,
            attributes: SnykOrgAttributes {
                name: resp.name,
                slug,
            },
        }
    }
}

/// A repository target as listed by the REST targets endpoint. Kept
/// schemaless; the pipeline never inspects target internals here.
pub type SnykTarget = Value;

//! Joins CSV mapping rows against the two org rosters.
use std::collections::HashMap;
use tracing::info;

use crate::model::{OrgMapping, OrgMatch, SourceOrg};
use crate::snyk::model::SnykOrg;

/// Destination orgs indexed separately by slug and by name. Slug is
/// queried first; a value that is one org's slug and another org's name
/// resolves to the slug owner.
#[derive(Debug, Default)]
pub struct DestinationIndex {
    by_slug: HashMap<String, SnykOrg>,
    by_name: HashMap<String, SnykOrg>,
}

impl DestinationIndex {
    pub fn new(orgs: &[SnykOrg]) -> Self {
        let mut index = Self::default();
        for org in orgs {
            index
                .by_slug
                .insert(org.attributes.slug.clone(), org.clone());
            index
                .by_name
                .insert(org.attributes.name.clone(), org.clone());
        }
        index
    }

    pub fn resolve(&self, key: &str) -> Option<&SnykOrg> {
        self.by_slug.get(key).or_else(|| self.by_name.get(key))
    }
}

/// Produce a match per CSV row where both sides resolve. Unmatched rows
/// are dropped; output order equals row order.
pub fn match_orgs(
    rows: &[OrgMapping],
    source_orgs: &[SourceOrg],
    destination: &DestinationIndex,
) -> Vec<OrgMatch> {
    let by_login: HashMap<&str, &SourceOrg> = source_orgs
        .iter()
        .map(|org| (org.login.as_str(), org))
        .collect();

    let mut matches = Vec::new();
    for row in rows {
        let source = by_login.get(row.github_org_name.as_str());
        let dest = destination.resolve(&row.snyk_org_name);
        match (source, dest) {
            (Some(_), Some(org)) => matches.push(OrgMatch {
                github_org_name: row.github_org_name.clone(),
                snyk_org_id: org.id.clone(),
            }),
            _ => {
                info!(
                    github_org = %row.github_org_name,
                    snyk_org = %row.snyk_org_name,
                    "no match on one or both sides; skipping row"
                );
            }
        }
    }
    matches
}

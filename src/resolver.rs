//! Resolves the destination org for batches past the first, spreading a
//! large import across `{reference}-{n}` orgs.
use tracing::info;

use crate::snyk::model::SnykOrg;
use crate::snyk::{SnykApi, SnykError};

/// Find or create the org named `"{reference.name}-{batch_number}"`.
///
/// The roster is fetched fresh on every call rather than cached across
/// batches, so an org created for batch n is visible when batch n+1
/// resolves. Creation failures propagate to the caller.
pub async fn resolve_batch_org(
    api: &dyn SnykApi,
    reference: &SnykOrg,
    batch_number: u32,
    source_org_id: &str,
    group_id: &str,
) -> Result<SnykOrg, SnykError> {
    let expected = format!("{}-{}", reference.attributes.name, batch_number);
    let roster = api.list_orgs(group_id).await?;
    if let Some(existing) = roster
        .into_iter()
        .find(|org| org.attributes.name == expected)
    {
        info!(org = %expected, id = %existing.id, "reusing existing batch org");
        return Ok(existing);
    }
    info!(org = %expected, "batch org not found; creating");
    api.create_org(reference, source_org_id, batch_number, group_id)
        .await
}

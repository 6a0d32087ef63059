//! Writing graph fragments to the graph store.

use serde::Serialize;
use tracing::{debug, instrument, warn};

use sitegraph_shared::{GraphFragment, Result, SiteGraphError};
use sitegraph_storage::{RelationshipMerge, Storage};

/// Counts from one [`upsert`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistReport {
    pub nodes_upserted: usize,
    pub relationships_created: usize,
    pub relationships_matched: usize,
    /// Relationships whose endpoint nodes were missing from the store.
    pub relationships_failed: usize,
}

impl PersistReport {
    pub fn add(&mut self, other: &PersistReport) {
        self.nodes_upserted += other.nodes_upserted;
        self.relationships_created += other.relationships_created;
        self.relationships_matched += other.relationships_matched;
        self.relationships_failed += other.relationships_failed;
    }
}

/// Merge every node, then every relationship, of `fragment` into the store.
///
/// Node properties are overwritten on match. Relationship properties are set
/// on create only. A relationship with a missing endpoint is counted and
/// logged; it does not stop the remaining writes. Other storage errors do.
#[instrument(skip_all, fields(nodes = fragment.nodes.len(), relationships = fragment.relationships.len()))]
pub async fn upsert(storage: &Storage, fragment: &GraphFragment) -> Result<PersistReport> {
    let mut report = PersistReport::default();

    for node in &fragment.nodes {
        storage.merge_node(node).await?;
        report.nodes_upserted += 1;
    }

    for rel in &fragment.relationships {
        match storage.merge_relationship(rel).await {
            Ok(RelationshipMerge::Created) => report.relationships_created += 1,
            Ok(RelationshipMerge::Matched) => report.relationships_matched += 1,
            Err(e @ SiteGraphError::MissingEndpoint { .. }) => {
                warn!(from = %rel.from, to = %rel.to, rel_type = %rel.rel_type, error = %e, "relationship skipped");
                report.relationships_failed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    debug!(?report, "fragment persisted");
    Ok(report)
}

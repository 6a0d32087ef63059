//! Turso Embedded / libSQL storage layer (offline mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding two stores:
//! - the **resource store**: every captured page or binary, append-only,
//!   queried by origin URL and capture time
//! - the **graph store**: nodes keyed by label and typed relationships
//!   between them, written with merge (upsert) semantics
//!
//! **Access rules:**
//! - ingest and crawl runs: read-write via [`Storage::open`]
//! - inspection commands: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database, params};
use serde::Serialize;

use sitegraph_shared::{
    GraphNode, GraphRelationship, Resource, ResourceId, ResourceType, Result, SiteGraphError,
};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// Outcome of [`Storage::merge_relationship`] when both endpoints exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipMerge {
    /// A new relationship row was written.
    Created,
    /// A relationship with the same (from, type, to) already existed; left untouched.
    Matched,
}

/// Row counts of the graph store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub nodes: u64,
    pub relationships: u64,
}

fn db_err(e: libsql::Error) -> SiteGraphError {
    SiteGraphError::Storage(e.to_string())
}

/// Fixed-width UTC timestamp so lexical order equals chronological order.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SiteGraphError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SiteGraphError::Storage(format!(
                "database not found: {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        SiteGraphError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(SiteGraphError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Resource store
    // -----------------------------------------------------------------------

    /// Append a captured resource. Earlier captures of the same URL are kept.
    pub async fn insert_resource(&self, resource: &Resource) -> Result<()> {
        self.check_writable()?;
        let links = serde_json::to_string(&resource.outbound_links)
            .map_err(|e| SiteGraphError::Storage(format!("encode outbound links: {e}")))?;

        self.conn
            .execute(
                "INSERT INTO resources (id, root_url, origin_url, captured_at, resource_type,
                    outbound_links_json, title, meta_description, meta_keywords, raw_data,
                    normalized_text, fingerprint, language_code)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    resource.id.to_string(),
                    resource.root_url.as_str(),
                    resource.origin_url.as_str(),
                    timestamp(&resource.captured_at),
                    resource.resource_type.as_str(),
                    links,
                    resource.title.as_deref(),
                    resource.meta_description.as_deref(),
                    resource.meta_keywords.as_deref(),
                    resource.raw.clone(),
                    resource.normalized_text.as_deref(),
                    resource.fingerprint.as_str(),
                    resource.language_code.as_deref(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// The most recently captured resource for `origin_url`, if any.
    pub async fn find_latest(&self, origin_url: &str) -> Result<Option<Resource>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {RESOURCE_COLUMNS} FROM resources WHERE origin_url = ?1
                     ORDER BY captured_at DESC, id DESC LIMIT 1"
                ),
                params![origin_url],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_resource(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// Every stored capture of `origin_url`, newest first.
    pub async fn find_all(&self, origin_url: &str) -> Result<Vec<Resource>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {RESOURCE_COLUMNS} FROM resources WHERE origin_url = ?1
                     ORDER BY captured_at DESC, id DESC"
                ),
                params![origin_url],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_resource(&row)?);
        }
        Ok(results)
    }

    /// Number of stored resource captures.
    pub async fn resource_count(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM resources").await
    }

    // -----------------------------------------------------------------------
    // Graph store
    // -----------------------------------------------------------------------

    /// Create the node `label` or overwrite the properties of the existing one.
    pub async fn merge_node(&self, node: &GraphNode) -> Result<()> {
        self.check_writable()?;
        let props = encode_properties(&node.properties)?;
        let now = timestamp(&Utc::now());
        self.conn
            .execute(
                "INSERT INTO graph_nodes (label, properties_json, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(label) DO UPDATE SET
                   properties_json = excluded.properties_json,
                   updated_at = excluded.updated_at",
                params![node.label.as_str(), props, now],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Create the relationship unless one with the same (from, type, to) exists.
    ///
    /// The existence check and the insert are one statement, so concurrent
    /// writers cannot produce duplicates. Both endpoint nodes must already
    /// exist; otherwise [`SiteGraphError::MissingEndpoint`] is returned and
    /// nothing is written.
    pub async fn merge_relationship(&self, rel: &GraphRelationship) -> Result<RelationshipMerge> {
        self.check_writable()?;
        let props = encode_properties(&rel.properties)?;
        let now = timestamp(&Utc::now());

        let inserted = self
            .conn
            .execute(
                "INSERT INTO graph_relationships (from_label, rel_type, to_label, properties_json, created_at)
                 SELECT ?1, ?2, ?3, ?4, ?5
                 WHERE EXISTS (SELECT 1 FROM graph_nodes WHERE label = ?1)
                   AND EXISTS (SELECT 1 FROM graph_nodes WHERE label = ?3)
                 ON CONFLICT(from_label, rel_type, to_label) DO NOTHING",
                params![
                    rel.from.as_str(),
                    rel.rel_type.as_str(),
                    rel.to.as_str(),
                    props,
                    now
                ],
            )
            .await
            .map_err(db_err)?;

        if inserted > 0 {
            return Ok(RelationshipMerge::Created);
        }

        if !self.node_exists(&rel.from).await? || !self.node_exists(&rel.to).await? {
            return Err(SiteGraphError::MissingEndpoint {
                from: rel.from.clone(),
                to: rel.to.clone(),
            });
        }
        Ok(RelationshipMerge::Matched)
    }

    /// Look up a node by label.
    pub async fn get_node(&self, label: &str) -> Result<Option<GraphNode>> {
        let mut rows = self
            .conn
            .query(
                "SELECT label, properties_json FROM graph_nodes WHERE label = ?1",
                params![label],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_node(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// All nodes, ordered by label.
    pub async fn list_nodes(&self) -> Result<Vec<GraphNode>> {
        let mut rows = self
            .conn
            .query(
                "SELECT label, properties_json FROM graph_nodes ORDER BY label",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_node(&row)?);
        }
        Ok(results)
    }

    /// All relationships, in creation order.
    pub async fn list_relationships(&self) -> Result<Vec<GraphRelationship>> {
        let mut rows = self
            .conn
            .query(
                "SELECT from_label, rel_type, to_label, properties_json
                 FROM graph_relationships ORDER BY id",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(GraphRelationship {
                from: row.get::<String>(0).map_err(db_err)?,
                rel_type: row.get::<String>(1).map_err(db_err)?,
                to: row.get::<String>(2).map_err(db_err)?,
                properties: decode_properties(&row.get::<String>(3).map_err(db_err)?)?,
            });
        }
        Ok(results)
    }

    /// Node and relationship counts.
    pub async fn graph_stats(&self) -> Result<GraphStats> {
        Ok(GraphStats {
            nodes: self.count("SELECT COUNT(*) FROM graph_nodes").await?,
            relationships: self
                .count("SELECT COUNT(*) FROM graph_relationships")
                .await?,
        })
    }

    async fn node_exists(&self, label: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM graph_nodes WHERE label = ?1",
                params![label],
            )
            .await
            .map_err(db_err)?;
        Ok(rows.next().await.map_err(db_err)?.is_some())
    }

    async fn count(&self, sql: &str) -> Result<u64> {
        let mut rows = self.conn.query(sql, params![]).await.map_err(db_err)?;
        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(db_err)?.max(0) as u64),
            None => Ok(0),
        }
    }
}

const RESOURCE_COLUMNS: &str = "id, root_url, origin_url, captured_at, resource_type, \
     outbound_links_json, title, meta_description, meta_keywords, raw_data, \
     normalized_text, fingerprint, language_code";

fn encode_properties(properties: &[String]) -> Result<String> {
    serde_json::to_string(properties)
        .map_err(|e| SiteGraphError::Storage(format!("encode properties: {e}")))
}

fn decode_properties(json: &str) -> Result<Vec<String>> {
    serde_json::from_str(json)
        .map_err(|e| SiteGraphError::Storage(format!("corrupt properties: {e}")))
}

fn row_to_node(row: &libsql::Row) -> Result<GraphNode> {
    Ok(GraphNode {
        label: row.get::<String>(0).map_err(db_err)?,
        properties: decode_properties(&row.get::<String>(1).map_err(db_err)?)?,
    })
}

/// Convert a database row (selected with [`RESOURCE_COLUMNS`]) to a [`Resource`].
fn row_to_resource(row: &libsql::Row) -> Result<Resource> {
    let id: String = row.get(0).map_err(db_err)?;
    let captured_at: String = row.get(3).map_err(db_err)?;
    let resource_type: String = row.get(4).map_err(db_err)?;
    let links: String = row.get(5).map_err(db_err)?;

    Ok(Resource {
        id: id
            .parse::<ResourceId>()
            .map_err(|e| SiteGraphError::Storage(format!("invalid resource id: {e}")))?,
        root_url: row.get::<String>(1).map_err(db_err)?,
        origin_url: row.get::<String>(2).map_err(db_err)?,
        captured_at: DateTime::parse_from_rfc3339(&captured_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| SiteGraphError::Storage(format!("invalid date: {e}")))?,
        resource_type: resource_type
            .parse::<ResourceType>()
            .map_err(SiteGraphError::Storage)?,
        outbound_links: serde_json::from_str(&links)
            .map_err(|e| SiteGraphError::Storage(format!("corrupt outbound links: {e}")))?,
        title: row.get::<String>(6).ok(),
        meta_description: row.get::<String>(7).ok(),
        meta_keywords: row.get::<String>(8).ok(),
        raw: row.get::<Vec<u8>>(9).map_err(db_err)?,
        normalized_text: row.get::<String>(10).ok(),
        fingerprint: row.get::<String>(11).map_err(db_err)?,
        language_code: row.get::<String>(12).ok(),
    })
}

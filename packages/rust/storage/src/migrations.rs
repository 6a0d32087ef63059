//! SQL migration definitions for the sitegraph database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: resources, graph_nodes, graph_relationships",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Captured resources, one row per capture
CREATE TABLE IF NOT EXISTS resources (
    id                  TEXT PRIMARY KEY,
    root_url            TEXT NOT NULL,
    origin_url          TEXT NOT NULL,
    captured_at         TEXT NOT NULL,
    resource_type       TEXT NOT NULL,
    outbound_links_json TEXT NOT NULL DEFAULT '[]',
    title               TEXT,
    meta_description    TEXT,
    meta_keywords       TEXT,
    raw_data            BLOB NOT NULL,
    normalized_text     TEXT,
    fingerprint         TEXT NOT NULL,
    language_code       TEXT,
    UNIQUE(origin_url, captured_at)
);

CREATE INDEX IF NOT EXISTS idx_resources_origin_captured
    ON resources(origin_url, captured_at DESC);

-- Graph nodes, keyed by lemma label
CREATE TABLE IF NOT EXISTS graph_nodes (
    label           TEXT PRIMARY KEY,
    properties_json TEXT NOT NULL DEFAULT '[]',
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

-- Directed, typed relationships between existing nodes
CREATE TABLE IF NOT EXISTS graph_relationships (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    from_label      TEXT NOT NULL REFERENCES graph_nodes(label),
    rel_type        TEXT NOT NULL,
    to_label        TEXT NOT NULL REFERENCES graph_nodes(label),
    properties_json TEXT NOT NULL DEFAULT '[]',
    created_at      TEXT NOT NULL,
    UNIQUE(from_label, rel_type, to_label)
);

CREATE INDEX IF NOT EXISTS idx_relationships_to ON graph_relationships(to_label);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}

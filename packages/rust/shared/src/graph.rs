//! Property-graph fragment types produced by extraction and consumed by persistence.

use serde::{Deserialize, Serialize};

/// Relationship type used when no verb governs a noun pair.
pub const RELATES_TO: &str = "RELATES_TO";

/// A node identified by a noun lemma, carrying its bound adjective lemmas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub label: String,
    #[serde(default)]
    pub properties: Vec<String>,
}

/// A directed, typed edge between two node labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphRelationship {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(default)]
    pub properties: Vec<String>,
}

impl GraphRelationship {
    /// Identity of the edge in the store: `(from, type, to)`.
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.from, &self.rel_type, &self.to)
    }
}

/// Nodes and relationships extracted from one or more sentences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphFragment {
    pub nodes: Vec<GraphNode>,
    pub relationships: Vec<GraphRelationship>,
}

impl GraphFragment {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }

    /// Find a node by label.
    pub fn node(&self, label: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.label == label)
    }

    /// Merge another fragment into this one.
    ///
    /// Nodes with the same label are unified: their property lists are unioned,
    /// keeping first-seen order. Relationships are deduplicated by
    /// `(from, type, to)`; the first property list wins, mirroring the store's
    /// create-only relationship properties.
    pub fn merge(&mut self, other: GraphFragment) {
        for node in other.nodes {
            match self.nodes.iter_mut().find(|n| n.label == node.label) {
                Some(existing) => union_into(&mut existing.properties, node.properties),
                None => self.nodes.push(node),
            }
        }

        for rel in other.relationships {
            if !self.relationships.iter().any(|r| r.key() == rel.key()) {
                self.relationships.push(rel);
            }
        }
    }
}

/// Append every value of `extra` not already present in `target`.
pub fn union_into(target: &mut Vec<String>, extra: impl IntoIterator<Item = String>) {
    for value in extra {
        if !target.contains(&value) {
            target.push(value);
        }
    }
}

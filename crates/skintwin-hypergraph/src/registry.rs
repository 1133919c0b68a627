//! Materialized node registry (`database/hypergraph_nodes.json`).
//!
//! Written once by the build stage; enrichment and validation read it in
//! place of the original node tables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::classify::ClassifiedNodes;
use crate::model::NodeRecord;

pub const NODE_REGISTRY_VERSION: &str = "hypergraph_nodes_v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRegistry {
    pub version: String,
    pub generated_at: String,
    pub products: Vec<NodeRecord>,
    pub ingredients: Vec<NodeRecord>,
    pub suppliers: Vec<NodeRecord>,
    #[serde(default)]
    pub discarded: Vec<String>,
}

impl NodeRegistry {
    pub fn from_classified(nodes: &ClassifiedNodes, generated_at: &str) -> Self {
        NodeRegistry {
            version: NODE_REGISTRY_VERSION.to_string(),
            generated_at: generated_at.to_string(),
            products: nodes.products.clone(),
            ingredients: nodes.ingredients.values().cloned().collect(),
            suppliers: nodes.suppliers.values().cloned().collect(),
            discarded: nodes.discarded.clone(),
        }
    }

    pub fn index(&self) -> NodeIndex<'_> {
        fn by_id(nodes: &[NodeRecord]) -> BTreeMap<&str, &NodeRecord> {
            nodes.iter().map(|n| (n.id.as_str(), n)).collect()
        }
        NodeIndex {
            products: by_id(&self.products),
            ingredients: by_id(&self.ingredients),
            suppliers: by_id(&self.suppliers),
        }
    }
}

/// Borrowed id lookups over a [`NodeRegistry`].
#[derive(Debug, Default)]
pub struct NodeIndex<'a> {
    pub products: BTreeMap<&'a str, &'a NodeRecord>,
    pub ingredients: BTreeMap<&'a str, &'a NodeRecord>,
    pub suppliers: BTreeMap<&'a str, &'a NodeRecord>,
}

impl<'a> NodeIndex<'a> {
    pub fn product(&self, id: &str) -> Option<&'a NodeRecord> {
        self.products.get(id).copied()
    }

    pub fn ingredient(&self, id: &str) -> Option<&'a NodeRecord> {
        self.ingredients.get(id).copied()
    }

    pub fn supplier(&self, id: &str) -> Option<&'a NodeRecord> {
        self.suppliers.get(id).copied()
    }

    /// Display label for an ingredient, falling back to the raw id.
    pub fn ingredient_label<'b>(&self, id: &'b str) -> &'b str
    where
        'a: 'b,
    {
        self.ingredient(id).map(|n| n.label.as_str()).unwrap_or(id)
    }
}

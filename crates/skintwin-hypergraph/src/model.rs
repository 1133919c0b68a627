//! Node and edge records as they appear in materialized JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Entity type carried in `source_type` / `target_type`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    Ingredient,
    Product,
    Supplier,
    Formulation,
    Other(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Ingredient => "ingredient",
            NodeKind::Product => "product",
            NodeKind::Supplier => "supplier",
            NodeKind::Formulation => "formulation",
            NodeKind::Other(s) => s,
        }
    }
}

impl From<String> for NodeKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ingredient" => NodeKind::Ingredient,
            "product" => NodeKind::Product,
            "supplier" => NodeKind::Supplier,
            "formulation" => NodeKind::Formulation,
            _ => NodeKind::Other(s),
        }
    }
}

impl From<NodeKind> for String {
    fn from(k: NodeKind) -> Self {
        k.as_str().to_string()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relation kind carried in an edge's `type` field.
///
/// Kinds written by other tools (e.g. document links) are kept verbatim in
/// [`EdgeKind::Other`] so consolidated edge files round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EdgeKind {
    /// ingredient → product, weighted by concentration.
    IngredientInFormulation,
    /// supplier → ingredient.
    SupplierProvidesIngredient,
    /// product → formulation vessel.
    ProductHasFormulation,
    Other(String),
}

impl EdgeKind {
    pub fn as_str(&self) -> &str {
        match self {
            EdgeKind::IngredientInFormulation => "INGREDIENT_IN_FORMULATION",
            EdgeKind::SupplierProvidesIngredient => "SUPPLIER_PROVIDES_INGREDIENT",
            EdgeKind::ProductHasFormulation => "PRODUCT_HAS_FORMULATION",
            EdgeKind::Other(s) => s,
        }
    }
}

impl From<String> for EdgeKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "INGREDIENT_IN_FORMULATION" => EdgeKind::IngredientInFormulation,
            "SUPPLIER_PROVIDES_INGREDIENT" => EdgeKind::SupplierProvidesIngredient,
            "PRODUCT_HAS_FORMULATION" => EdgeKind::ProductHasFormulation,
            _ => EdgeKind::Other(s),
        }
    }
}

impl From<EdgeKind> for String {
    fn from(k: EdgeKind) -> Self {
        k.as_str().to_string()
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified node row (product, ingredient or supplier).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeset: Option<String>,
    /// Community id from external analysis; carried through unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modularity_class: Option<i64>,
}

/// `hypergraph_metadata` block written into every vessel this pipeline owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypergraphMetadata {
    pub node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modularity_class: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeset: Option<String>,
}

impl HypergraphMetadata {
    /// Metadata for `id`, taking passthrough fields from `node` when known.
    pub fn for_node(id: &str, node: Option<&NodeRecord>) -> Self {
        HypergraphMetadata {
            node_id: id.to_string(),
            modularity_class: node.and_then(|n| n.modularity_class),
            timeset: node.and_then(|n| n.timeset.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concentration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One materialized edge (`edges/<id>.json`, and an element of `all_edges.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    pub source_id: String,
    pub source_type: NodeKind,
    pub target_id: String,
    pub target_type: NodeKind,
    #[serde(default)]
    pub properties: EdgeProperties,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Deterministic edge id: `<prefix>_<source>_<target>`.
///
/// Two rows with the same endpoints collide on purpose; the later write wins
/// for per-edge files and the validator reports the collision.
pub fn edge_id(prefix: &str, source: &str, target: &str) -> String {
    format!("{prefix}_{source}_{target}")
}

impl EdgeRecord {
    pub fn formulation(
        prefix: &str,
        ingredient_id: &str,
        product_id: &str,
        concentration: f64,
        created_at: &str,
    ) -> Self {
        EdgeRecord {
            id: edge_id(prefix, ingredient_id, product_id),
            kind: EdgeKind::IngredientInFormulation,
            source_id: ingredient_id.to_string(),
            source_type: NodeKind::Ingredient,
            target_id: product_id.to_string(),
            target_type: NodeKind::Product,
            properties: EdgeProperties {
                concentration: Some(concentration),
                weight: Some(concentration),
                created_at: Some(created_at.to_string()),
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }

    pub fn supply(
        prefix: &str,
        supplier_id: &str,
        ingredient_id: &str,
        weight: f64,
        created_at: &str,
    ) -> Self {
        EdgeRecord {
            id: edge_id(prefix, supplier_id, ingredient_id),
            kind: EdgeKind::SupplierProvidesIngredient,
            source_id: supplier_id.to_string(),
            source_type: NodeKind::Supplier,
            target_id: ingredient_id.to_string(),
            target_type: NodeKind::Ingredient,
            properties: EdgeProperties {
                concentration: None,
                weight: Some(weight),
                created_at: Some(created_at.to_string()),
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }

    /// Concentration, treating a missing value as 0.
    pub fn concentration(&self) -> f64 {
        self.properties.concentration.unwrap_or(0.0)
    }

    pub fn is_formulation(&self) -> bool {
        self.kind == EdgeKind::IngredientInFormulation
    }

    pub fn is_supply(&self) -> bool {
        self.kind == EdgeKind::SupplierProvidesIngredient
    }
}

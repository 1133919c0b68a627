//! Node classification by id-prefix convention.
//!
//! Two node tables feed the hypergraph:
//! - Table A (product/ingredient nodes): products by one of several literal
//!   prefixes, ingredients by the ingredient prefix, anything else discarded,
//! - Table B (supplier/ingredient nodes): ingredients by the ingredient
//!   prefix, everything else is a supplier.
//!
//! An ingredient present in both tables keeps its Table-A record.

use serde::{Deserialize, Serialize};
use skintwin_ingest_tsv::{parse_int_prefix, Row};
use std::collections::BTreeMap;

use crate::model::NodeRecord;

pub const COL_ID: &str = "Id";
pub const COL_LABEL: &str = "Label";
pub const COL_TIMESET: &str = "timeset";
pub const COL_MODULARITY_CLASS: &str = "modularity_class";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub product_prefixes: Vec<String>,
    pub ingredient_prefix: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            product_prefixes: ["B19PRD", "B19", "B1930", "B1950"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ingredient_prefix: "R".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Product,
    Ingredient,
    Supplier,
    /// Table-A id matching no known prefix; invisible to later stages.
    Discarded,
}

impl ClassifierConfig {
    pub fn is_product(&self, id: &str) -> bool {
        self.product_prefixes.iter().any(|p| id.starts_with(p.as_str()))
    }

    pub fn is_ingredient(&self, id: &str) -> bool {
        id.starts_with(self.ingredient_prefix.as_str())
    }

    /// Classify an id read from the product/ingredient table.
    pub fn classify_product_table(&self, id: &str) -> Classification {
        if self.is_product(id) {
            Classification::Product
        } else if self.is_ingredient(id) {
            Classification::Ingredient
        } else {
            Classification::Discarded
        }
    }

    /// Classify an id read from the supplier/ingredient table.
    pub fn classify_supplier_table(&self, id: &str) -> Classification {
        if self.is_ingredient(id) {
            Classification::Ingredient
        } else {
            Classification::Supplier
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedNodes {
    pub products: Vec<NodeRecord>,
    pub ingredients: BTreeMap<String, NodeRecord>,
    pub suppliers: BTreeMap<String, NodeRecord>,
    /// Table-A ids that were neither product nor ingredient.
    pub discarded: Vec<String>,
}

impl ClassifiedNodes {
    pub fn total(&self) -> usize {
        self.products.len() + self.ingredients.len() + self.suppliers.len()
    }
}

fn node_from_row(row: &Row) -> Option<NodeRecord> {
    let id = row.field(COL_ID)?;
    let label = row.field(COL_LABEL)?;
    Some(NodeRecord {
        id: id.to_string(),
        label: label.to_string(),
        timeset: row.field(COL_TIMESET).map(str::to_string),
        modularity_class: parse_int_prefix(row.get(COL_MODULARITY_CLASS)),
    })
}

/// Split both node tables into products, ingredients and suppliers.
///
/// Rows without an id or label are skipped.
pub fn classify_nodes(
    table_a: &[Row],
    table_b: &[Row],
    config: &ClassifierConfig,
) -> ClassifiedNodes {
    let mut out = ClassifiedNodes::default();

    for node in table_a.iter().filter_map(node_from_row) {
        match config.classify_product_table(&node.id) {
            Classification::Product => out.products.push(node),
            Classification::Ingredient => {
                out.ingredients.insert(node.id.clone(), node);
            }
            _ => out.discarded.push(node.id),
        }
    }

    let mut from_b: BTreeMap<String, NodeRecord> = BTreeMap::new();
    for node in table_b.iter().filter_map(node_from_row) {
        match config.classify_supplier_table(&node.id) {
            Classification::Ingredient => {
                from_b.insert(node.id.clone(), node);
            }
            _ => {
                out.suppliers.insert(node.id.clone(), node);
            }
        }
    }
    for (id, node) in from_b {
        out.ingredients.entry(id).or_insert(node);
    }

    if !out.discarded.is_empty() {
        tracing::debug!(
            count = out.discarded.len(),
            "product/ingredient rows matched no known prefix"
        );
    }
    tracing::info!(
        products = out.products.len(),
        ingredients = out.ingredients.len(),
        suppliers = out.suppliers.len(),
        "categorized nodes"
    );
    out
}

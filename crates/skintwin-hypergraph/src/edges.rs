//! Edge processing: formulation and supply layers.
//!
//! Each layer is built in one pass over its rows (or over materialized edge
//! records). All accumulators live in the returned layer value.

use skintwin_ingest_tsv::{parse_number_or, Row};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::EdgeRecord;

pub const COL_SOURCE: &str = "Source";
pub const COL_TARGET: &str = "Target";
pub const COL_WEIGHT: &str = "Weight";

/// Concentration used when a formulation row has no usable weight.
pub const DEFAULT_CONCENTRATION: f64 = 0.0;
/// Weight used when a supply row has no usable weight.
pub const DEFAULT_SUPPLY_WEIGHT: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FormulationEdge {
    pub ingredient_id: String,
    pub product_id: String,
    pub concentration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupplyEdge {
    pub supplier_id: String,
    pub ingredient_id: String,
    pub weight: f64,
}

/// ingredient → product edges grouped by product, plus per-ingredient
/// usage counts and concentration maxima.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormulationLayer {
    /// Edges per product in source order.
    pub by_product: BTreeMap<String, Vec<FormulationEdge>>,
    /// One count per occurrence.
    pub usage: BTreeMap<String, u32>,
    pub max_concentration: BTreeMap<String, f64>,
}

impl FormulationLayer {
    fn push(&mut self, edge: FormulationEdge) {
        *self.usage.entry(edge.ingredient_id.clone()).or_insert(0) += 1;
        let max = self
            .max_concentration
            .entry(edge.ingredient_id.clone())
            .or_insert(0.0);
        *max = max.max(edge.concentration);
        self.by_product
            .entry(edge.product_id.clone())
            .or_default()
            .push(edge);
    }

    /// Build from `Source` (ingredient), `Target` (product), `Weight` rows.
    pub fn from_rows(rows: &[Row]) -> Self {
        let mut layer = FormulationLayer::default();
        for row in rows {
            let (Some(source), Some(target)) = (row.field(COL_SOURCE), row.field(COL_TARGET))
            else {
                continue;
            };
            layer.push(FormulationEdge {
                ingredient_id: source.to_string(),
                product_id: target.to_string(),
                concentration: parse_number_or(row.get(COL_WEIGHT), DEFAULT_CONCENTRATION),
            });
        }
        tracing::info!(
            edges = layer.edge_count(),
            ingredients = layer.usage.len(),
            products = layer.by_product.len(),
            "processed formulation edges"
        );
        layer
    }

    /// Rebuild from materialized edge records, ignoring other kinds.
    pub fn from_edges(edges: &[EdgeRecord]) -> Self {
        let mut layer = FormulationLayer::default();
        for edge in edges.iter().filter(|e| e.is_formulation()) {
            layer.push(FormulationEdge {
                ingredient_id: edge.source_id.clone(),
                product_id: edge.target_id.clone(),
                concentration: edge.concentration(),
            });
        }
        layer
    }

    pub fn edge_count(&self) -> usize {
        self.by_product.values().map(Vec::len).sum()
    }

    pub fn edges_for(&self, product_id: &str) -> &[FormulationEdge] {
        self.by_product
            .get(product_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn to_records(&self, edge_prefix: &str, created_at: &str) -> Vec<EdgeRecord> {
        self.by_product
            .values()
            .flatten()
            .map(|e| {
                EdgeRecord::formulation(
                    edge_prefix,
                    &e.ingredient_id,
                    &e.product_id,
                    e.concentration,
                    created_at,
                )
            })
            .collect()
    }
}

/// supplier → ingredient edges grouped by supplier, with the portfolio and
/// its transpose kept as sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SupplyLayer {
    pub by_supplier: BTreeMap<String, Vec<SupplyEdge>>,
    pub portfolio: BTreeMap<String, BTreeSet<String>>,
    pub suppliers_of: BTreeMap<String, BTreeSet<String>>,
}

impl SupplyLayer {
    fn push(&mut self, edge: SupplyEdge) {
        self.portfolio
            .entry(edge.supplier_id.clone())
            .or_default()
            .insert(edge.ingredient_id.clone());
        self.suppliers_of
            .entry(edge.ingredient_id.clone())
            .or_default()
            .insert(edge.supplier_id.clone());
        self.by_supplier
            .entry(edge.supplier_id.clone())
            .or_default()
            .push(edge);
    }

    /// Build from supply-table rows. The table lists the ingredient under
    /// `Source` and the supplier under `Target`.
    pub fn from_rows(rows: &[Row]) -> Self {
        let mut layer = SupplyLayer::default();
        for row in rows {
            let (Some(ingredient), Some(supplier)) =
                (row.field(COL_SOURCE), row.field(COL_TARGET))
            else {
                continue;
            };
            layer.push(SupplyEdge {
                supplier_id: supplier.to_string(),
                ingredient_id: ingredient.to_string(),
                weight: parse_number_or(row.get(COL_WEIGHT), DEFAULT_SUPPLY_WEIGHT),
            });
        }
        tracing::info!(
            edges = layer.edge_count(),
            suppliers = layer.portfolio.len(),
            ingredients = layer.suppliers_of.len(),
            "processed supply chain edges"
        );
        layer
    }

    pub fn from_edges(edges: &[EdgeRecord]) -> Self {
        let mut layer = SupplyLayer::default();
        for edge in edges.iter().filter(|e| e.is_supply()) {
            layer.push(SupplyEdge {
                supplier_id: edge.source_id.clone(),
                ingredient_id: edge.target_id.clone(),
                weight: edge.properties.weight.unwrap_or(DEFAULT_SUPPLY_WEIGHT),
            });
        }
        layer
    }

    pub fn edge_count(&self) -> usize {
        self.by_supplier.values().map(Vec::len).sum()
    }

    pub fn single_sourced_count(&self) -> usize {
        self.suppliers_of.values().filter(|s| s.len() == 1).count()
    }

    pub fn to_records(&self, edge_prefix: &str, created_at: &str) -> Vec<EdgeRecord> {
        self.by_supplier
            .values()
            .flatten()
            .map(|e| {
                EdgeRecord::supply(
                    edge_prefix,
                    &e.supplier_id,
                    &e.ingredient_id,
                    e.weight,
                    created_at,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skintwin_ingest_tsv::parse_tsv;

    #[test]
    fn formulation_rows_group_by_product_in_source_order() {
        let rows = parse_tsv(
            "Source\tTarget\tWeight\n\
             R001\tB19PRD01\t40.0\n\
             R002\tB19PRD01\t60.0\n\
             R001\tB19PRD02\t5\n",
        );
        let layer = FormulationLayer::from_rows(&rows);
        let ids: Vec<_> = layer
            .edges_for("B19PRD01")
            .iter()
            .map(|e| e.ingredient_id.as_str())
            .collect();
        assert_eq!(ids, ["R001", "R002"]);
        assert_eq!(layer.usage["R001"], 2);
        assert_eq!(layer.max_concentration["R001"], 40.0);
        assert_eq!(layer.edge_count(), 3);
    }

    #[test]
    fn missing_endpoints_are_skipped_and_bad_weights_default() {
        let rows = parse_tsv(
            "Source\tTarget\tWeight\n\
             R001\t\t10\n\
             \tB19PRD01\t10\n\
             R003\tB19PRD01\tabc\n\
             R004\tB19PRD01\n",
        );
        let layer = FormulationLayer::from_rows(&rows);
        assert_eq!(layer.edge_count(), 2);
        assert!(layer
            .edges_for("B19PRD01")
            .iter()
            .all(|e| e.concentration == DEFAULT_CONCENTRATION));
    }

    #[test]
    fn supply_portfolio_has_set_semantics() {
        let rows = parse_tsv(
            "Source\tTarget\tWeight\n\
             R001\tSUP1\t\n\
             R001\tSUP1\t2\n\
             R002\tSUP1\t\n\
             R001\tSUP2\t\n",
        );
        let layer = SupplyLayer::from_rows(&rows);
        assert_eq!(layer.portfolio["SUP1"].len(), 2);
        assert_eq!(layer.by_supplier["SUP1"].len(), 3);
        assert_eq!(layer.by_supplier["SUP1"][0].weight, DEFAULT_SUPPLY_WEIGHT);
        assert_eq!(layer.by_supplier["SUP1"][1].weight, 2.0);
        assert_eq!(layer.suppliers_of["R001"].len(), 2);
        assert_eq!(layer.single_sourced_count(), 1);
    }

    #[test]
    fn layers_rebuild_from_their_records() {
        let rows = parse_tsv("Source\tTarget\tWeight\nR001\tB19PRD01\t40\nR002\tB19PRD01\t60\n");
        let layer = FormulationLayer::from_rows(&rows);
        let mut records = layer.to_records("B19EDG", "t0");
        let supply = parse_tsv("Source\tTarget\nR001\tSUP1\n");
        records.extend(SupplyLayer::from_rows(&supply).to_records("B19EDG", "t0"));

        assert_eq!(FormulationLayer::from_edges(&records), layer);
        let rebuilt = SupplyLayer::from_edges(&records);
        assert_eq!(rebuilt.suppliers_of["R001"].len(), 1);
    }
}

//! Product and supplier enrichment.
//!
//! Every product and supplier that takes part in at least one edge ends up
//! with a vessel: existing vessels get their derived blocks merged in,
//! missing ones are synthesized with placeholder fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use skintwin_hypergraph::{
    product_stats, supplier_stats, ComplexityTier, FormulationLayer, HypergraphMetadata,
    NodeIndex, Population, PortfolioTier, SupplyLayer, TopIngredient,
};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::store::{
    id_file_name, index_by_id, labelled_file_name, sanitize_label, to_fields, Vessel,
    VesselKind, VesselStore, WriteOutcome, WritePolicy,
};
use crate::RunContext;

// =============================================================================
// Product blocks
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulationMetadata {
    pub ingredient_count: usize,
    pub total_concentration: f64,
    pub complexity_score: usize,
    pub ingredient_ids: Vec<String>,
    pub top_ingredients: Vec<TopIngredient>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductNetworkProperties {
    pub centrality_score: f64,
    pub complexity_tier: ComplexityTier,
    pub formulation_density: f64,
}

/// Keys the enrichment stage owns on a product vessel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDerivedFields {
    pub hypergraph_metadata: HypergraphMetadata,
    pub formulation_metadata: FormulationMetadata,
    pub network_properties: ProductNetworkProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSource {
    pub hypergraph_generated: bool,
    pub extraction_date: String,
}

/// A product vessel synthesized from edges alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProductVessel {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub product_type: String,
    pub form: String,
    pub category: String,
    pub ingredient_count: usize,
    pub source: GeneratedSource,
    #[serde(flatten)]
    pub derived: ProductDerivedFields,
}

// =============================================================================
// Supplier blocks
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierPortfolio {
    pub ingredient_count: usize,
    pub ingredient_ids: Vec<String>,
    pub specialization_index: f64,
    pub market_coverage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierNetworkProperties {
    pub centrality_score: f64,
    pub portfolio_size_tier: PortfolioTier,
    pub supply_chain_importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierDerivedFields {
    pub hypergraph_metadata: HypergraphMetadata,
    pub portfolio: SupplierPortfolio,
    pub network_properties: SupplierNetworkProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSupplierVessel {
    pub id: String,
    pub name: String,
    pub label: String,
    pub category: String,
    pub location: String,
    #[serde(flatten)]
    pub derived: SupplierDerivedFields,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub products_created: usize,
    pub products_merged: usize,
    pub suppliers_created: usize,
    pub suppliers_merged: usize,
}

fn tally(outcome: WriteOutcome, created: &mut usize, merged: &mut usize) {
    match outcome {
        WriteOutcome::Created => *created += 1,
        WriteOutcome::Merged => *merged += 1,
        WriteOutcome::SkippedExisting => {}
    }
}

pub fn product_fields(
    product_id: &str,
    formulations: &FormulationLayer,
    nodes: &NodeIndex<'_>,
    population: Population,
) -> ProductDerivedFields {
    let stats = product_stats(formulations.edges_for(product_id), population);
    ProductDerivedFields {
        hypergraph_metadata: HypergraphMetadata::for_node(product_id, nodes.product(product_id)),
        formulation_metadata: FormulationMetadata {
            ingredient_count: stats.ingredient_count,
            total_concentration: stats.total_concentration,
            complexity_score: stats.ingredient_count,
            ingredient_ids: stats.ingredient_ids,
            top_ingredients: stats.top_ingredients,
        },
        network_properties: ProductNetworkProperties {
            centrality_score: stats.centrality_score,
            complexity_tier: stats.complexity_tier,
            formulation_density: stats.formulation_density,
        },
    }
}

pub fn supplier_fields(
    supplier_id: &str,
    portfolio: &BTreeSet<String>,
    nodes: &NodeIndex<'_>,
    population: Population,
) -> SupplierDerivedFields {
    let stats = supplier_stats(portfolio, population);
    SupplierDerivedFields {
        hypergraph_metadata: HypergraphMetadata::for_node(
            supplier_id,
            nodes.supplier(supplier_id),
        ),
        portfolio: SupplierPortfolio {
            ingredient_count: stats.ingredient_count,
            ingredient_ids: stats.ingredient_ids,
            specialization_index: stats.specialization_index,
            market_coverage: stats.market_coverage,
        },
        network_properties: SupplierNetworkProperties {
            centrality_score: stats.specialization_index,
            portfolio_size_tier: stats.portfolio_size_tier,
            supply_chain_importance: stats.specialization_index,
        },
    }
}

/// Finds existing supplier vessels.
///
/// A vessel declaring the id of a known supplier is only ever matched by that
/// id. The file-name and label fallbacks consider the remaining vessels, and
/// each vessel is handed to at most one supplier.
pub struct SupplierLocator<'v> {
    vessels: &'v [Vessel],
    by_id: BTreeMap<&'v str, &'v Vessel>,
    known: BTreeSet<String>,
    claimed: BTreeSet<&'v Path>,
}

impl<'v> SupplierLocator<'v> {
    pub fn new<'k>(vessels: &'v [Vessel], known: impl IntoIterator<Item = &'k str>) -> Self {
        SupplierLocator {
            vessels,
            by_id: index_by_id(vessels),
            known: known.into_iter().map(str::to_string).collect(),
            claimed: BTreeSet::new(),
        }
    }

    /// By declared id, then by a file name containing the id, then by a file
    /// name containing the sanitized label.
    pub fn locate(&mut self, id: &str, label: &str, limit: usize) -> Option<&'v Vessel> {
        let found = self
            .by_id
            .get(id)
            .copied()
            .or_else(|| self.fallback(id, label, limit));
        if let Some(vessel) = found {
            self.claimed.insert(vessel.path.as_path());
        }
        found
    }

    fn fallback(&self, id: &str, label: &str, limit: usize) -> Option<&'v Vessel> {
        let free: Vec<&'v Vessel> = self
            .vessels
            .iter()
            .filter(|v| !self.claimed.contains(v.path.as_path()))
            .filter(|v| v.id().map_or(true, |other| !self.known.contains(other)))
            .collect();
        if let Some(v) = free.iter().find(|v| v.file_name().contains(id)) {
            return Some(*v);
        }
        let label = sanitize_label(label, limit);
        if label.is_empty() {
            return None;
        }
        free.into_iter().find(|v| v.file_name().contains(label.as_str()))
    }
}

/// Merge derived statistics into product and supplier vessels, creating the
/// ones that are missing. Requires the materialized edges and node registry.
pub fn enrich_vessels(
    store: &VesselStore,
    config: &PipelineConfig,
    ctx: &RunContext,
) -> Result<EnrichSummary> {
    let edges = store.load_edges()?;
    let registry = store.load_node_registry()?;
    let products = store.load_all(VesselKind::Product)?;
    let suppliers = store.load_all(VesselKind::Supplier)?;

    let nodes = registry.index();
    let formulations = FormulationLayer::from_edges(&edges);
    let supply = SupplyLayer::from_edges(&edges);
    let population = Population::resolve(registry.ingredients.len(), config.population_override);
    let mut summary = EnrichSummary::default();

    let product_dir = store.dir(VesselKind::Product);
    let products_by_id = index_by_id(&products);
    for product_id in formulations.by_product.keys() {
        let derived = product_fields(product_id, &formulations, &nodes, population);
        let outcome = match products_by_id.get(product_id.as_str()) {
            Some(vessel) => {
                let mut fields = to_fields(&derived, &vessel.path)?;
                if vessel.body.contains_key("ingredient_count") {
                    fields.insert(
                        "ingredient_count".to_string(),
                        Value::from(derived.formulation_metadata.ingredient_count),
                    );
                }
                store.write_vessel(
                    &vessel.path,
                    Some(&vessel.body),
                    fields,
                    WritePolicy::MergeDerivedFields,
                )?
            }
            None => {
                let path = product_dir.join(id_file_name(product_id));
                let label = nodes
                    .product(product_id)
                    .map(|n| n.label.clone())
                    .unwrap_or_else(|| config.ids.display_name_for(product_id));
                let vessel = NewProductVessel {
                    id: product_id.clone(),
                    label,
                    product_type: "Unknown".to_string(),
                    form: "Unknown".to_string(),
                    category: "treatment".to_string(),
                    ingredient_count: derived.formulation_metadata.ingredient_count,
                    source: GeneratedSource {
                        hypergraph_generated: true,
                        extraction_date: ctx.timestamp.clone(),
                    },
                    derived,
                };
                store.write_vessel(
                    &path,
                    None,
                    to_fields(&vessel, &path)?,
                    WritePolicy::MergeDerivedFields,
                )?
            }
        };
        tracing::debug!(id = %product_id, outcome = ?outcome, "enriched product");
        tally(
            outcome,
            &mut summary.products_created,
            &mut summary.products_merged,
        );
    }

    let supplier_dir = store.dir(VesselKind::Supplier);
    let mut locator = SupplierLocator::new(
        &suppliers,
        nodes
            .suppliers
            .keys()
            .copied()
            .chain(supply.portfolio.keys().map(String::as_str)),
    );
    for (supplier_id, portfolio) in &supply.portfolio {
        let label = nodes
            .supplier(supplier_id)
            .map(|n| n.label.as_str())
            .unwrap_or(supplier_id.as_str());
        let derived = supplier_fields(supplier_id, portfolio, &nodes, population);
        let outcome = match locator.locate(supplier_id, label, config.label_filename_limit) {
            Some(vessel) => store.write_vessel(
                &vessel.path,
                Some(&vessel.body),
                to_fields(&derived, &vessel.path)?,
                WritePolicy::MergeDerivedFields,
            )?,
            None => {
                let path = supplier_dir.join(labelled_file_name(
                    supplier_id,
                    label,
                    config.label_filename_limit,
                ));
                let vessel = NewSupplierVessel {
                    id: supplier_id.clone(),
                    name: label.to_string(),
                    label: label.to_string(),
                    category: "Unknown".to_string(),
                    location: config.default_supplier_location.clone(),
                    derived,
                };
                store.write_vessel(
                    &path,
                    None,
                    to_fields(&vessel, &path)?,
                    WritePolicy::MergeDerivedFields,
                )?
            }
        };
        tracing::debug!(id = %supplier_id, outcome = ?outcome, "enriched supplier");
        tally(
            outcome,
            &mut summary.suppliers_created,
            &mut summary.suppliers_merged,
        );
    }

    tracing::info!(
        products_created = summary.products_created,
        products_merged = summary.products_merged,
        suppliers_created = summary.suppliers_created,
        suppliers_merged = summary.suppliers_merged,
        "vessel enrichment complete"
    );
    Ok(summary)
}

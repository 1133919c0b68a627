//! Formulation enrichment.
//!
//! Each formulation vessel is reconciled against the formulation edge groups
//! through a [`ProductMatcher`]. A matched vessel has its ingredient list
//! replaced by one derived from the edges; curated per-ingredient detail in
//! the old list is not kept. Edge groups that no vessel matched get a new
//! formulation vessel.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use skintwin_hypergraph::stats::by_concentration_desc;
use skintwin_hypergraph::{FormulationEdge, FormulationLayer, NodeIndex, Population};

use crate::config::PipelineConfig;
use crate::error::{Result, VesselError};
use crate::store::{
    id_file_name, index_by_id, read_json, to_fields, Vessel, VesselKind, VesselStore,
    WriteOutcome, WritePolicy,
};

/// Ingredients above this concentration are placed in the aqueous phase.
pub const AQUEOUS_PHASE_ABOVE: f64 = 50.0;

// =============================================================================
// Matching
// =============================================================================

/// Resolves a formulation vessel's product reference to an edge-group key.
pub trait ProductMatcher {
    /// `keys` are the edge-group product ids in ascending order.
    fn match_product<'k>(&self, reference: &str, keys: &[&'k str]) -> Option<&'k str>;
}

/// Exact id equality, then substring containment in either direction.
///
/// When several keys contain (or are contained in) the reference, the first
/// key in ascending order wins. An empty reference matches nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatcher;

impl ProductMatcher for SubstringMatcher {
    fn match_product<'k>(&self, reference: &str, keys: &[&'k str]) -> Option<&'k str> {
        if reference.is_empty() {
            return None;
        }
        if let Some(k) = keys.iter().find(|k| **k == reference) {
            return Some(*k);
        }
        keys.iter()
            .find(|k| reference.contains(**k) || k.contains(reference))
            .copied()
    }
}

/// Explicit reference → product id table. References absent from the table
/// fall back to exact id equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingMatcher {
    pub mapping: BTreeMap<String, String>,
}

impl MappingMatcher {
    /// Load a JSON object of `{"<reference>": "<product id>"}` pairs.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(VesselError::MissingInput {
                path: path.to_path_buf(),
            });
        }
        Ok(MappingMatcher {
            mapping: read_json(path)?,
        })
    }
}

impl ProductMatcher for MappingMatcher {
    fn match_product<'k>(&self, reference: &str, keys: &[&'k str]) -> Option<&'k str> {
        let target = self
            .mapping
            .get(reference)
            .map(String::as_str)
            .unwrap_or(reference);
        keys.iter().find(|k| **k == target).copied()
    }
}

// =============================================================================
// Derivation
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulationIngredient {
    pub order: usize,
    pub inci_name: String,
    pub ingredient_id: String,
    pub concentration: f64,
    pub function: String,
    pub phase: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulationHypergraphMetadata {
    pub ingredient_count: usize,
    pub centrality_score: f64,
    pub network_density: f64,
}

/// Keys this stage owns on a formulation vessel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulationDerivedFields {
    pub ingredients: Vec<FormulationIngredient>,
    pub total_concentration: f64,
    pub complexity_score: usize,
    pub hypergraph_metadata: FormulationHypergraphMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFormulationVessel {
    pub id: String,
    pub product_reference: String,
    pub name: String,
    #[serde(flatten)]
    pub derived: FormulationDerivedFields,
}

pub fn phase_for(concentration: f64) -> &'static str {
    if concentration > AQUEOUS_PHASE_ABOVE {
        "aqueous"
    } else {
        "active"
    }
}

/// Display names for ingredients: the ingredient vessel's `inci_name` or
/// `label`, else the registry label, else the id.
pub struct IngredientNames<'a> {
    vessels: BTreeMap<&'a str, &'a Vessel>,
    nodes: &'a NodeIndex<'a>,
}

impl<'a> IngredientNames<'a> {
    pub fn new(vessels: &'a [Vessel], nodes: &'a NodeIndex<'a>) -> Self {
        IngredientNames {
            vessels: index_by_id(vessels),
            nodes,
        }
    }

    pub fn name_of(&self, id: &str) -> String {
        self.vessels
            .get(id)
            .and_then(|v| v.str_field("inci_name").or_else(|| v.str_field("label")))
            .unwrap_or_else(|| self.nodes.ingredient_label(id))
            .to_string()
    }
}

pub fn formulation_fields(
    edges: &[FormulationEdge],
    names: &IngredientNames<'_>,
    population: Population,
) -> FormulationDerivedFields {
    let ingredients: Vec<FormulationIngredient> = by_concentration_desc(edges)
        .into_iter()
        .enumerate()
        .map(|(i, e)| FormulationIngredient {
            order: i + 1,
            inci_name: names.name_of(&e.ingredient_id),
            ingredient_id: e.ingredient_id.clone(),
            concentration: e.concentration,
            function: "Unknown".to_string(),
            phase: phase_for(e.concentration).to_string(),
        })
        .collect();
    // Summed in edge order, matching the product's formulation_metadata.
    let total_concentration: f64 = edges.iter().map(|e| e.concentration).sum();
    let count = ingredients.len();
    FormulationDerivedFields {
        ingredients,
        total_concentration,
        complexity_score: count,
        hypergraph_metadata: FormulationHypergraphMetadata {
            ingredient_count: count,
            centrality_score: population.normalize(count as f64),
            network_density: total_concentration / 100.0,
        },
    }
}

// =============================================================================
// Stage
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormulationSummary {
    pub updated: usize,
    pub created: usize,
    /// Formulation vessels whose reference matched no edge group.
    pub unmatched: Vec<String>,
}

/// Re-derive formulation vessels from the materialized edge set.
pub fn update_formulations(
    store: &VesselStore,
    config: &PipelineConfig,
    matcher: &dyn ProductMatcher,
) -> Result<FormulationSummary> {
    let edges = store.load_edges()?;
    let registry = store.load_node_registry_if_present()?;
    let formulation_vessels = store.load_all(VesselKind::Formulation)?;
    let ingredient_vessels = store.load_all(VesselKind::Ingredient)?;

    let layer = FormulationLayer::from_edges(&edges);
    let nodes = registry.as_ref().map(|r| r.index()).unwrap_or_default();
    let names = IngredientNames::new(&ingredient_vessels, &nodes);
    let population_base = registry
        .as_ref()
        .map(|r| r.ingredients.len())
        .unwrap_or_else(|| layer.usage.len());
    let population = Population::resolve(population_base, config.population_override);
    let keys: Vec<&str> = layer.by_product.keys().map(String::as_str).collect();

    let mut summary = FormulationSummary::default();
    let mut matched: BTreeSet<&str> = BTreeSet::new();

    for vessel in &formulation_vessels {
        let reference = vessel
            .str_field("product_reference")
            .or_else(|| vessel.id())
            .unwrap_or_default();
        let Some(product_id) = matcher.match_product(reference, &keys) else {
            tracing::warn!(
                path = %vessel.path.display(),
                reference = %reference,
                "no formulation edges match this vessel"
            );
            summary
                .unmatched
                .push(vessel.id().unwrap_or(vessel.file_name()).to_string());
            continue;
        };
        matched.insert(product_id);

        let derived = formulation_fields(layer.edges_for(product_id), &names, population);
        store.write_vessel(
            &vessel.path,
            Some(&vessel.body),
            to_fields(&derived, &vessel.path)?,
            WritePolicy::MergeDerivedFields,
        )?;
        tracing::debug!(
            path = %vessel.path.display(),
            product = %product_id,
            ingredients = derived.complexity_score,
            "updated formulation"
        );
        summary.updated += 1;
    }

    let dir = store.dir(VesselKind::Formulation);
    let by_id = index_by_id(&formulation_vessels);
    for product_id in keys.iter().filter(|k| !matched.contains(**k)) {
        let id = config.ids.formulation_id_for(product_id);
        let path = dir.join(id_file_name(&id));
        let vessel = NewFormulationVessel {
            id: id.clone(),
            product_reference: product_id.to_string(),
            name: config.ids.display_name_for(product_id),
            derived: formulation_fields(layer.edges_for(product_id), &names, population),
        };
        let existing = by_id.get(id.as_str()).map(|v| &v.body);
        if store.write_vessel(
            &path,
            existing,
            to_fields(&vessel, &path)?,
            WritePolicy::CreateIfAbsent,
        )? == WriteOutcome::Created
        {
            tracing::debug!(id = %id, product = %product_id, "created formulation");
            summary.created += 1;
        }
    }

    tracing::info!(
        updated = summary.updated,
        created = summary.created,
        unmatched = summary.unmatched.len(),
        "formulation update complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VesselLayout;
    use crate::store::write_json;
    use serde_json::{json, Value};
    use skintwin_hypergraph::EdgeRecord;

    #[test]
    fn substring_matcher_prefers_exact_then_first_containing_key() {
        let keys = ["B19PRD01", "B19PRD010", "B19PRD_Day"];
        let m = SubstringMatcher;
        assert_eq!(m.match_product("B19PRD010", &keys), Some("B19PRD010"));
        // Both B19PRD01 and B19PRD010 contain "PRD01": first in key order wins.
        assert_eq!(m.match_product("PRD01", &keys), Some("B19PRD01"));
        assert_eq!(m.match_product("B19PRD_Day_Cream", &keys), Some("B19PRD_Day"));
        assert_eq!(m.match_product("", &keys), None);
        assert_eq!(m.match_product("ZZZ", &keys), None);
    }

    #[test]
    fn mapping_matcher_uses_the_table() {
        let m = MappingMatcher {
            mapping: [("Day Cream".to_string(), "B19PRD01".to_string())].into(),
        };
        let keys = ["B19PRD01", "B19PRD02"];
        assert_eq!(m.match_product("Day Cream", &keys), Some("B19PRD01"));
        assert_eq!(m.match_product("B19PRD02", &keys), Some("B19PRD02"));
        assert_eq!(m.match_product("PRD02", &keys), None);
    }

    #[test]
    fn phase_heuristic() {
        assert_eq!(phase_for(60.0), "aqueous");
        assert_eq!(phase_for(50.0), "active");
    }

    fn setup(edges: &[EdgeRecord]) -> (tempfile::TempDir, VesselStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = VesselStore::new(dir.path(), VesselLayout::default());
        store.write_all_edges(edges).unwrap();
        (dir, store)
    }

    #[test]
    fn simple_formulation_is_rewritten_in_concentration_order() {
        let (_dir, store) = setup(&[
            EdgeRecord::formulation("B19EDG", "R001", "B19PRD01", 40.0, "t0"),
            EdgeRecord::formulation("B19EDG", "R002", "B19PRD01", 60.0, "t0"),
        ]);
        let path = store.dir(VesselKind::Formulation).join("day_cream.json");
        write_json(
            &path,
            &json!({
                "id": "B19FRM01",
                "product_reference": "B19PRD01",
                "ingredients": [{"inci_name": "Old", "phase": "oil"}],
                "notes": "lab batch 7"
            }),
        )
        .unwrap();
        write_json(
            &store.dir(VesselKind::Ingredient).join("R002_Glycerin.json"),
            &json!({"id": "R002", "inci_name": "GLYCERIN"}),
        )
        .unwrap();

        let config = PipelineConfig::default();
        let summary = update_formulations(&store, &config, &SubstringMatcher).unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.created, 0);

        let body: Value = read_json(&path).unwrap();
        assert_eq!(body["notes"], "lab batch 7");
        assert_eq!(body["total_concentration"], 100.0);
        assert_eq!(body["complexity_score"], 2);
        let ingredients = body["ingredients"].as_array().unwrap();
        assert_eq!(ingredients.len(), 2);
        assert_eq!(ingredients[0]["ingredient_id"], "R002");
        assert_eq!(ingredients[0]["inci_name"], "GLYCERIN");
        assert_eq!(ingredients[0]["order"], 1);
        assert_eq!(ingredients[0]["phase"], "aqueous");
        assert_eq!(ingredients[1]["ingredient_id"], "R001");
        assert_eq!(ingredients[1]["inci_name"], "R001");
        assert_eq!(ingredients[1]["function"], "Unknown");
    }

    #[test]
    fn unmatched_edge_groups_get_new_formulations() {
        let (_dir, store) = setup(&[
            EdgeRecord::formulation("B19EDG", "R001", "B19PRD_Night_Serum", 12.5, "t0"),
        ]);
        let orphan = store.dir(VesselKind::Formulation).join("orphan.json");
        write_json(&orphan, &json!({"id": "F-LEGACY", "product_reference": "LEGACY"})).unwrap();

        let config = PipelineConfig::default();
        let summary = update_formulations(&store, &config, &SubstringMatcher).unwrap();
        assert_eq!(summary.created, 1);
        assert_eq!(summary.unmatched, ["F-LEGACY"]);

        let body: Value = read_json(
            &store
                .dir(VesselKind::Formulation)
                .join("B19FRM_Night_Serum.json"),
        )
        .unwrap();
        assert_eq!(body["product_reference"], "B19PRD_Night_Serum");
        assert_eq!(body["name"], "Night Serum");
        assert_eq!(body["ingredients"][0]["phase"], "active");
        assert_eq!(body["hypergraph_metadata"]["ingredient_count"], 1);

        // The new vessel matches directly on the next run.
        let again = update_formulations(&store, &config, &SubstringMatcher).unwrap();
        assert_eq!(again.created, 0);
        assert_eq!(again.updated, 1);
    }
}

//! Build stage: source tables → ingredient vessels, edge files, node registry
//! and run statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use skintwin_hypergraph::{
    classify_nodes, ingredient_stats, EdgeRecord, FormulationLayer, HypergraphMetadata,
    NodeRecord, NodeRegistry, Population, SupplyLayer,
};
use skintwin_ingest_tsv::read_table;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::store::{
    index_by_id, labelled_file_name, to_fields, write_json, VesselKind, VesselStore,
    WriteOutcome, WritePolicy,
};
use crate::RunContext;

pub const STATISTICS_VERSION: &str = "hypergraph_statistics_v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientNetworkProperties {
    pub usage_frequency: u32,
    pub max_concentration: f64,
    pub centrality_score: f64,
    pub clustering_coefficient: f64,
}

/// Body of a freshly created ingredient vessel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientVessel {
    pub id: String,
    pub inci_name: String,
    pub label: String,
    pub category: String,
    pub functions: Vec<String>,
    pub concentration_range: ConcentrationRange,
    pub network_properties: IngredientNetworkProperties,
    pub suppliers: Vec<String>,
    pub hypergraph_metadata: HypergraphMetadata,
}

impl IngredientVessel {
    pub fn derive(
        node: &NodeRecord,
        formulations: &FormulationLayer,
        supply: &SupplyLayer,
        population: Population,
    ) -> Self {
        let stats = ingredient_stats(&node.id, formulations, supply, population);
        IngredientVessel {
            id: node.id.clone(),
            inci_name: node.label.clone(),
            label: node.label.clone(),
            category: "Unknown".to_string(),
            functions: Vec::new(),
            concentration_range: ConcentrationRange {
                min: 0.0,
                max: stats.max_concentration,
            },
            network_properties: IngredientNetworkProperties {
                usage_frequency: stats.usage_frequency,
                max_concentration: stats.max_concentration,
                centrality_score: stats.centrality_score,
                clustering_coefficient: 0.0,
            },
            suppliers: stats.suppliers,
            hypergraph_metadata: HypergraphMetadata::for_node(&node.id, Some(node)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeTotalsV1 {
    pub products: usize,
    pub ingredients: usize,
    pub suppliers: usize,
    pub discarded: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeTotalsV1 {
    pub formulation: usize,
    pub supply: usize,
    /// Edges of other kinds carried over from the previous edge set.
    pub preserved: usize,
    pub total: usize,
}

/// `database/hypergraph_statistics.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypergraphStatisticsV1 {
    pub version: String,
    pub generated_at: String,
    pub population: usize,
    pub nodes: NodeTotalsV1,
    pub edges: EdgeTotalsV1,
    pub avg_product_ingredients: f64,
    pub avg_supplier_portfolio: f64,
    pub ingredients_with_suppliers: usize,
    pub single_sourced_ingredients: usize,
    /// Ingredient ids referenced by formulation or supply edges that no
    /// node table defines.
    pub unresolved_ingredients: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutcome {
    pub ingredients_created: usize,
    pub ingredients_skipped: usize,
    pub edges_written: usize,
    pub statistics: HypergraphStatisticsV1,
}

fn average(total: usize, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

/// Run the build stage over the store's source tables.
///
/// Missing tables are fatal. Existing ingredient vessels are left untouched;
/// the formulation and supply layers of the consolidated edge set are
/// regenerated and edges of any other kind are kept.
pub fn build_hypergraph(
    store: &VesselStore,
    config: &PipelineConfig,
    ctx: &RunContext,
) -> Result<BuildOutcome> {
    let layout = store.layout();
    let product_nodes = read_table(&store.source_table(&layout.product_nodes_table))?;
    let formulation_rows = read_table(&store.source_table(&layout.formulation_edges_table))?;
    let supplier_nodes = read_table(&store.source_table(&layout.supplier_nodes_table))?;
    let supply_rows = read_table(&store.source_table(&layout.supply_edges_table))?;
    let previous_edges = store.load_edges_if_present()?.unwrap_or_default();
    let existing_ingredients = store.load_all(VesselKind::Ingredient)?;

    let nodes = classify_nodes(&product_nodes, &supplier_nodes, &config.classifier);
    let formulations = FormulationLayer::from_rows(&formulation_rows);
    let supply = SupplyLayer::from_rows(&supply_rows);
    let population = Population::resolve(nodes.ingredients.len(), config.population_override);

    // Ingredient vessels (create-if-absent).
    let by_id = index_by_id(&existing_ingredients);
    let ingredient_dir = store.dir(VesselKind::Ingredient);
    let mut created = 0;
    let mut skipped = 0;
    for node in nodes.ingredients.values() {
        let path = ingredient_dir.join(labelled_file_name(
            &node.id,
            &node.label,
            config.label_filename_limit,
        ));
        let existing = by_id.get(node.id.as_str()).map(|v| &v.body);
        let vessel = IngredientVessel::derive(node, &formulations, &supply, population);
        match store.write_vessel(
            &path,
            existing,
            to_fields(&vessel, &path)?,
            WritePolicy::CreateIfAbsent,
        )? {
            WriteOutcome::Created => {
                tracing::debug!(id = %node.id, path = %path.display(), "created ingredient vessel");
                created += 1;
            }
            _ => skipped += 1,
        }
    }

    // Edges.
    let mut fresh = formulations.to_records(&config.ids.edge_prefix, &ctx.timestamp);
    fresh.extend(supply.to_records(&config.ids.edge_prefix, &ctx.timestamp));
    let preserved: Vec<EdgeRecord> = previous_edges
        .into_iter()
        .filter(|e| !e.is_formulation() && !e.is_supply())
        .collect();
    store.write_edge_files(&fresh)?;
    let edges_written = fresh.len();
    let preserved_count = preserved.len();
    let mut all_edges = fresh;
    all_edges.extend(preserved);
    store.write_all_edges(&all_edges)?;

    // Registry and statistics.
    store.write_node_registry(&NodeRegistry::from_classified(&nodes, &ctx.timestamp))?;

    let referenced: BTreeSet<&str> = formulations
        .usage
        .keys()
        .chain(supply.suppliers_of.keys())
        .map(String::as_str)
        .collect();
    let unresolved_ingredients: Vec<String> = referenced
        .into_iter()
        .filter(|id| !nodes.ingredients.contains_key(*id))
        .map(str::to_string)
        .collect();
    for id in &unresolved_ingredients {
        tracing::warn!(id = %id, "edge references an ingredient missing from the node tables");
    }

    let portfolio_total: usize = supply.portfolio.values().map(BTreeSet::len).sum();
    let statistics = HypergraphStatisticsV1 {
        version: STATISTICS_VERSION.to_string(),
        generated_at: ctx.timestamp.clone(),
        population: population.0,
        nodes: NodeTotalsV1 {
            products: nodes.products.len(),
            ingredients: nodes.ingredients.len(),
            suppliers: nodes.suppliers.len(),
            discarded: nodes.discarded.len(),
        },
        edges: EdgeTotalsV1 {
            formulation: formulations.edge_count(),
            supply: supply.edge_count(),
            preserved: preserved_count,
            total: all_edges.len(),
        },
        avg_product_ingredients: average(formulations.edge_count(), formulations.by_product.len()),
        avg_supplier_portfolio: average(portfolio_total, supply.portfolio.len()),
        ingredients_with_suppliers: supply.suppliers_of.len(),
        single_sourced_ingredients: supply.single_sourced_count(),
        unresolved_ingredients,
    };
    write_json(&store.database_file(&layout.statistics_file), &statistics)?;

    tracing::info!(
        ingredients_created = created,
        ingredients_skipped = skipped,
        edges = edges_written,
        preserved = preserved_count,
        "hypergraph build complete"
    );

    Ok(BuildOutcome {
        ingredients_created: created,
        ingredients_skipped: skipped,
        edges_written,
        statistics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VesselLayout;
    use crate::error::VesselError;
    use serde_json::Value;
    use std::path::Path;

    const PRODUCT_NODES: &str = "Id\tLabel\ttimeset\tmodularity_class\n\
        B19PRD01\tDay Cream\t\t2\n\
        R001\tAqua\t\t1\n\
        R002\tGlycerin\t\t1\n\
        X99\tStray\t\t\n";
    const FORMULATION_EDGES: &str = "Source\tTarget\tWeight\n\
        R001\tB19PRD01\t40.0\n\
        R002\tB19PRD01\t60.0\n";
    const SUPPLIER_NODES: &str = "Id\tLabel\n\
        SUP1\tChem Co\n\
        R002\tGlycerine (B)\n";
    const SUPPLY_EDGES: &str = "Source\tTarget\tWeight\n\
        R001\tSUP1\t\n\
        R009\tSUP1\t\n";

    fn seed(root: &Path) {
        let dir = root.join("examples");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("RAW-Nodes.csv"), PRODUCT_NODES).unwrap();
        std::fs::write(dir.join("RAW-Edges.csv"), FORMULATION_EDGES).unwrap();
        std::fs::write(dir.join("RSNodes.csv"), SUPPLIER_NODES).unwrap();
        std::fs::write(dir.join("RSEdges.csv"), SUPPLY_EDGES).unwrap();
    }

    fn setup() -> (tempfile::TempDir, VesselStore) {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let store = VesselStore::new(dir.path(), VesselLayout::default());
        (dir, store)
    }

    #[test]
    fn build_writes_vessels_edges_and_statistics() {
        let (_dir, store) = setup();
        let outcome =
            build_hypergraph(&store, &PipelineConfig::default(), &RunContext::at("t0")).unwrap();

        assert_eq!(outcome.ingredients_created, 2);
        assert_eq!(outcome.edges_written, 4);
        assert_eq!(outcome.statistics.nodes.discarded, 1);
        assert_eq!(outcome.statistics.unresolved_ingredients, ["R009"]);
        assert_eq!(outcome.statistics.population, 2);

        let glycerin: Value =
            crate::store::read_json(&store.dir(VesselKind::Ingredient).join("R002_Glycerin.json"))
                .unwrap();
        assert_eq!(glycerin["label"], "Glycerin");
        assert_eq!(glycerin["network_properties"]["usage_frequency"], 1);
        assert_eq!(glycerin["concentration_range"]["max"], 60.0);
        assert_eq!(glycerin["hypergraph_metadata"]["modularity_class"], 1);

        assert!(store.edges_dir().join("B19EDG_R001_B19PRD01.json").exists());
        assert!(store.edges_dir().join("B19EDG_SUP1_R001.json").exists());
        assert_eq!(store.load_edges().unwrap().len(), 4);

        let registry = store.load_node_registry().unwrap();
        assert_eq!(registry.products.len(), 1);
        assert_eq!(registry.discarded, ["X99"]);
    }

    #[test]
    fn rebuild_keeps_ingredient_files_byte_identical() {
        let (_dir, store) = setup();
        let config = PipelineConfig::default();
        build_hypergraph(&store, &config, &RunContext::at("t0")).unwrap();
        let path = store.dir(VesselKind::Ingredient).join("R001_Aqua.json");
        let before = std::fs::read(&path).unwrap();

        let second = build_hypergraph(&store, &config, &RunContext::at("t1")).unwrap();
        assert_eq!(second.ingredients_created, 0);
        assert_eq!(second.ingredients_skipped, 2);
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn existing_ingredient_under_another_name_is_not_duplicated() {
        let (_dir, store) = setup();
        let dir = store.dir(VesselKind::Ingredient);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("water.json"), "{\"id\": \"R001\"}").unwrap();

        let outcome =
            build_hypergraph(&store, &PipelineConfig::default(), &RunContext::at("t0")).unwrap();
        assert_eq!(outcome.ingredients_created, 1);
        assert!(!dir.join("R001_Aqua.json").exists());
    }

    #[test]
    fn foreign_edge_kinds_survive_a_rebuild() {
        let (_dir, store) = setup();
        std::fs::create_dir_all(store.edges_dir()).unwrap();
        std::fs::write(
            store.all_edges_path(),
            r#"[{"id": "B19EDG_B19PRD01_B19PIF01", "type": "PRODUCT_HAS_PIF",
                 "source_id": "B19PRD01", "source_type": "product",
                 "target_id": "B19PIF01", "target_type": "pif", "properties": {}}]"#,
        )
        .unwrap();

        let outcome =
            build_hypergraph(&store, &PipelineConfig::default(), &RunContext::at("t0")).unwrap();
        assert_eq!(outcome.statistics.edges.preserved, 1);
        let edges = store.load_edges().unwrap();
        assert_eq!(edges.len(), 5);
        assert!(edges.iter().any(|e| e.kind.as_str() == "PRODUCT_HAS_PIF"));
    }

    #[test]
    fn long_product_ids_do_not_abort_the_build() {
        let (dir, store) = setup();
        let product = format!("B19PRD_{}", "Long_Name_".repeat(26));
        std::fs::write(
            dir.path().join("examples").join("RAW-Edges.csv"),
            format!("Source\tTarget\tWeight\nR001\t{product}\t40\n"),
        )
        .unwrap();

        let outcome =
            build_hypergraph(&store, &PipelineConfig::default(), &RunContext::at("t0")).unwrap();
        assert_eq!(outcome.statistics.edges.formulation, 1);
        let edges = store.load_edges().unwrap();
        assert!(edges.iter().any(|e| e.target_id == product));
        let edge_file = crate::store::id_file_name(&format!("B19EDG_R001_{product}"));
        assert!(store.edges_dir().join(edge_file).exists());
    }

    #[test]
    fn missing_table_is_fatal() {
        let (dir, store) = setup();
        std::fs::remove_file(dir.path().join("examples").join("RSEdges.csv")).unwrap();
        let err = build_hypergraph(&store, &PipelineConfig::default(), &RunContext::at("t0"))
            .unwrap_err();
        assert!(matches!(err, VesselError::Table(_)));
        assert!(!store.all_edges_path().exists());
    }
}

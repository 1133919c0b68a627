//! Integration tests for the complete SKIN-TWIN pipeline
//!
//! Each test seeds a temporary vessel tree with the four source tables and
//! some hand-curated vessels, then runs the stages in order:
//! build → enrich → formulations → link → validate.
//!
//! Run with: cargo test --test integration_tests

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::tempdir;

use skintwin_vessels::store::{read_json, write_json};
use skintwin_vessels::{
    build_hypergraph, enrich_vessels, link_formulations, update_formulations,
    validate_hypergraph, PipelineConfig, RunContext, SubstringMatcher, VesselKind, VesselStore,
};

// ============================================================================
// Fixtures
// ============================================================================

const RAW_NODES: &str = "Id\tLabel\ttimeset\tmodularity_class\n\
    B19PRD01\tDay Cream\t\t4\n\
    B19PRD02\tNight Balm\t\t4\n\
    B19PRD03\tToner\t\t5\n\
    R001\tAqua\t\t1\n\
    R002\tGlycerin\t\t1\n\
    R003\tNiacinamide\t\t2\n\
    NOTE-1\tFree text row\t\t\n";

const RAW_EDGES: &str = "Source\tTarget\tWeight\n\
    R001\tB19PRD01\t40.0\n\
    R002\tB19PRD01\t60.0\n\
    R001\tB19PRD02\t70%\n\
    R003\tB19PRD02\t35\n\
    R001\tB19PRD03\t10\n\
    R004\tB19PRD03\tn/a\n";

const RS_NODES: &str = "Id\tLabel\n\
    SUP1\tCape Chemicals\n\
    SUP2\tKaroo Botanicals\n\
    R002\tGlycerol (RS)\n\
    R004\tAloe Extract\n";

const RS_EDGES: &str = "Source\tTarget\tWeight\n\
    R001\tSUP1\t\n\
    R002\tSUP1\t\n\
    R002\tSUP2\t\n\
    R004\tSUP2\t2\n";

fn seed(root: &Path) {
    let tables = root.join("examples");
    std::fs::create_dir_all(&tables).unwrap();
    std::fs::write(tables.join("RAW-Nodes.csv"), RAW_NODES).unwrap();
    std::fs::write(tables.join("RAW-Edges.csv"), RAW_EDGES).unwrap();
    std::fs::write(tables.join("RSNodes.csv"), RS_NODES).unwrap();
    std::fs::write(tables.join("RSEdges.csv"), RS_EDGES).unwrap();

    write_json(
        &root.join("products").join("B19PRD01.json"),
        &serde_json::json!({
            "id": "B19PRD01",
            "label": "Day Cream",
            "brand": "Acme",
            "claims": {"spf": 15}
        }),
    )
    .unwrap();
    write_json(
        &root.join("formulations").join("B19FRM02.json"),
        &serde_json::json!({
            "id": "B19FRM02",
            "product_reference": "B19PRD02 v1",
            "ingredients": [{"inci_name": "Old Aqua", "phase": "water"}],
            "lab_notes": "pilot batch"
        }),
    )
    .unwrap();
}

fn run_pipeline(store: &VesselStore, config: &PipelineConfig, at: &str) {
    let ctx = RunContext::at(at);
    build_hypergraph(store, config, &ctx).expect("build");
    enrich_vessels(store, config, &ctx).expect("enrich");
    update_formulations(store, config, &SubstringMatcher).expect("formulations");
    link_formulations(store, config, &ctx).expect("link");
}

fn vessel(store: &VesselStore, kind: VesselKind, file: &str) -> Value {
    read_json(&store.dir(kind).join(file)).expect("vessel should exist")
}

// ============================================================================
// End to end
// ============================================================================

#[test]
fn test_pipeline_materializes_every_entity() {
    let dir = tempdir().unwrap();
    seed(dir.path());
    let store = VesselStore::new(dir.path(), Default::default());
    let config = PipelineConfig::default();
    run_pipeline(&store, &config, "2026-01-01T00:00:00Z");

    // Merge precedence: the product/ingredient table label wins.
    let glycerin = vessel(&store, VesselKind::Ingredient, "R002_Glycerin.json");
    assert_eq!(glycerin["label"], "Glycerin");
    assert_eq!(glycerin["suppliers"], serde_json::json!(["SUP1", "SUP2"]));

    // Curated product: derived blocks merged, curated fields intact.
    let day_cream = vessel(&store, VesselKind::Product, "B19PRD01.json");
    assert_eq!(day_cream["brand"], "Acme");
    assert_eq!(day_cream["claims"]["spf"], 15);
    assert_eq!(day_cream["formulation_metadata"]["ingredient_count"], 2);
    assert_eq!(day_cream["formulation_metadata"]["total_concentration"], 100.0);

    // Products and suppliers seen only in edges get vessels.
    let toner = vessel(&store, VesselKind::Product, "B19PRD03.json");
    assert_eq!(toner["label"], "Toner");
    assert_eq!(toner["category"], "treatment");
    let karoo = vessel(&store, VesselKind::Supplier, "SUP2_Karoo_Botanicals.json");
    assert_eq!(karoo["portfolio"]["ingredient_ids"], serde_json::json!(["R002", "R004"]));

    // Simple formulation scenario.
    let frm01 = vessel(&store, VesselKind::Formulation, "B19FRM01.json");
    assert_eq!(frm01["product_reference"], "B19PRD01");
    assert_eq!(frm01["total_concentration"], 100.0);
    let order: Vec<_> = frm01["ingredients"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| (i["ingredient_id"].as_str().unwrap(), i["concentration"].as_f64().unwrap()))
        .collect();
    assert_eq!(order, [("R002", 60.0), ("R001", 40.0)]);

    // Fuzzy match rewrites the curated formulation, keeping unowned fields.
    let frm02 = vessel(&store, VesselKind::Formulation, "B19FRM02.json");
    assert_eq!(frm02["lab_notes"], "pilot batch");
    assert_eq!(frm02["ingredients"][0]["ingredient_id"], "R001");
    assert_eq!(frm02["ingredients"][0]["phase"], "aqueous");
    assert_eq!(frm02["total_concentration"], 105.0);

    // Every product links to its formulation.
    let links = store
        .load_edges()
        .unwrap()
        .into_iter()
        .filter(|e| e.kind.as_str() == "PRODUCT_HAS_FORMULATION")
        .count();
    assert_eq!(links, 3);
}

#[test]
fn test_validator_reports_overflow_and_single_sourcing() {
    let dir = tempdir().unwrap();
    seed(dir.path());
    let store = VesselStore::new(dir.path(), Default::default());
    let config = PipelineConfig::default();
    run_pipeline(&store, &config, "2026-01-01T00:00:00Z");

    let product_before = std::fs::read(store.dir(VesselKind::Product).join("B19PRD02.json")).unwrap();
    let report = validate_hypergraph(&store, &config, &RunContext::at("2026-01-01T00:05:00Z"))
        .expect("validation never fails on findings");

    // Overflow: reported, not corrected.
    let overflow = &report.integrity.concentration_overflows;
    assert_eq!(overflow.len(), 1);
    assert_eq!(overflow[0].product_id, "B19PRD02");
    approx::assert_relative_eq!(overflow[0].total_concentration, 105.0);
    assert_eq!(
        std::fs::read(store.dir(VesselKind::Product).join("B19PRD02.json")).unwrap(),
        product_before
    );
    let night_balm = vessel(&store, VesselKind::Product, "B19PRD02.json");
    assert_eq!(night_balm["formulation_metadata"]["total_concentration"], 105.0);

    // Single-sourcing: R001 comes only from SUP1 and is used by 3 products.
    let r001 = report
        .supply_risk
        .single_sourced
        .iter()
        .find(|s| s.id == "R001")
        .expect("R001 is single-sourced");
    assert_eq!(r001.supplier, "SUP1");
    assert_eq!(r001.usage, 3);
    let score = report
        .criticality
        .iter()
        .find(|c| c.id == "R001")
        .unwrap()
        .score;
    approx::assert_relative_eq!(score, 0.6 * 3.0 + 0.4 * (70.0 / 100.0));
    assert_eq!(report.criticality[0].id, "R001");
    assert!(report.supply_risk.no_supplier.contains(&"R003".to_string()));

    assert!(report
        .integrity
        .unresolved_references
        .as_ref()
        .is_some_and(|refs| refs.is_empty()));
    assert!(report.integrity.duplicate_edge_ids.is_empty());
    assert!(report.summary.error_count >= 1);
    assert!(store.database_file("hypergraph_analysis.json").exists());
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_rerun_is_idempotent() {
    let dir = tempdir().unwrap();
    seed(dir.path());
    let store = VesselStore::new(dir.path(), Default::default());
    let config = PipelineConfig::default();

    run_pipeline(&store, &config, "2026-01-01T00:00:00Z");
    let ingredient_dir = store.dir(VesselKind::Ingredient);
    let snapshot = |dir: &Path| -> BTreeMap<String, Vec<u8>> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .map(|p| (p.display().to_string(), std::fs::read(&p).unwrap()))
            .collect()
    };
    let ingredients_first = snapshot(&ingredient_dir);
    let products_first = snapshot(&store.dir(VesselKind::Product));
    let suppliers_first = snapshot(&store.dir(VesselKind::Supplier));

    run_pipeline(&store, &config, "2026-02-01T00:00:00Z");

    assert_eq!(snapshot(&ingredient_dir), ingredients_first);
    assert_eq!(snapshot(&store.dir(VesselKind::Product)), products_first);
    assert_eq!(snapshot(&store.dir(VesselKind::Supplier)), suppliers_first);
}

#[test]
fn test_product_totals_conserve_edge_concentrations() {
    let dir = tempdir().unwrap();
    seed(dir.path());
    let store = VesselStore::new(dir.path(), Default::default());
    run_pipeline(&store, &PipelineConfig::default(), "2026-01-01T00:00:00Z");

    let mut sums: BTreeMap<String, f64> = BTreeMap::new();
    for edge in store.load_edges().unwrap().iter().filter(|e| e.is_formulation()) {
        *sums.entry(edge.target_id.clone()).or_insert(0.0) += edge.concentration();
    }
    assert_eq!(sums.len(), 3);
    for (product, sum) in sums {
        let body = vessel(&store, VesselKind::Product, &format!("{product}.json"));
        let total = body["formulation_metadata"]["total_concentration"]
            .as_f64()
            .unwrap();
        assert_eq!(total, sum, "{product}");
    }
}

#[test]
fn test_missing_source_table_aborts_without_output() {
    let dir = tempdir().unwrap();
    seed(dir.path());
    std::fs::remove_file(dir.path().join("examples").join("RAW-Edges.csv")).unwrap();
    let store = VesselStore::new(dir.path(), Default::default());

    let result = build_hypergraph(&store, &PipelineConfig::default(), &RunContext::at("t0"));
    assert!(result.is_err());
    assert!(!store.all_edges_path().exists());
    assert!(!store.node_registry_path().exists());
}

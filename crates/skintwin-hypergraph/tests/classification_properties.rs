use proptest::prelude::*;
use skintwin_hypergraph::{classify_nodes, Classification, ClassifierConfig};
use skintwin_ingest_tsv::parse_tsv;
use std::collections::BTreeSet;

fn node_id() -> impl Strategy<Value = String> {
    prop_oneof![
        "B19PRD[0-9]{2}",
        "B19[A-Z]{2}",
        "R[0-9]{3}",
        "[A-Z]{3}[0-9]",
    ]
}

proptest! {
    #[test]
    fn every_table_a_id_is_classified_exactly_once(ids in prop::collection::vec(node_id(), 0..40)) {
        let mut text = String::from("Id\tLabel\n");
        for id in &ids {
            text.push_str(&format!("{id}\tlabel {id}\n"));
        }
        let rows = parse_tsv(&text);
        let config = ClassifierConfig::default();
        let nodes = classify_nodes(&rows, &[], &config);

        let products: BTreeSet<&str> = nodes.products.iter().map(|n| n.id.as_str()).collect();
        let ingredients: BTreeSet<&str> = nodes.ingredients.keys().map(String::as_str).collect();
        let discarded: BTreeSet<&str> = nodes.discarded.iter().map(String::as_str).collect();

        prop_assert!(products.is_disjoint(&ingredients));
        prop_assert!(products.is_disjoint(&discarded));
        prop_assert!(ingredients.is_disjoint(&discarded));

        for id in &ids {
            let expected = config.classify_product_table(id);
            let found = [
                (products.contains(id.as_str()), Classification::Product),
                (ingredients.contains(id.as_str()), Classification::Ingredient),
                (discarded.contains(id.as_str()), Classification::Discarded),
            ];
            let hits: Vec<_> = found.iter().filter(|(hit, _)| *hit).map(|(_, c)| *c).collect();
            prop_assert_eq!(hits, vec![expected]);
        }
    }

    #[test]
    fn table_a_wins_for_every_shared_ingredient(n in 1usize..20) {
        let mut a = String::from("Id\tLabel\n");
        let mut b = String::from("Id\tLabel\n");
        for i in 0..n {
            a.push_str(&format!("R{i:03}\tfrom-a\n"));
            b.push_str(&format!("R{i:03}\tfrom-b\n"));
        }
        let nodes = classify_nodes(&parse_tsv(&a), &parse_tsv(&b), &ClassifierConfig::default());
        prop_assert_eq!(nodes.ingredients.len(), n);
        prop_assert!(nodes.ingredients.values().all(|node| node.label == "from-a"));
    }
}

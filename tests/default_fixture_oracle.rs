#[path = "../src/test_support.rs"]
mod test_support;

use serde_json::{json, Value};
use test_support::init_tracing;
use unilink_rs::fixture::{aggregative_projection, default_fixture, id_projection};
use unilink_rs::{
    Dataset, DuplicatePolicy, Expression, IntraSourceOracle, OracleCase, OracleState, PairSet,
    ProjectedPair, RecordLinkageAlgorithm, Similarity,
};

fn field(name: &str) -> Expression {
    Expression::field(name)
}

fn exact_policy() -> DuplicatePolicy {
    DuplicatePolicy::new(
        Similarity::Min(vec![
            Similarity::Exact(field("first name")),
            Similarity::Exact(field("last name")),
            Similarity::Exact(field("age")),
        ]),
        1.0,
    )
}

fn typo_tolerant_policy() -> DuplicatePolicy {
    DuplicatePolicy::new(
        Similarity::Min(vec![
            Similarity::Exact(field("first name")),
            Similarity::DamerauLevenshtein(field("last name")),
            Similarity::Exact(field("age")),
        ]),
        0.7,
    )
}

fn age_tolerant_policy() -> DuplicatePolicy {
    DuplicatePolicy::new(
        Similarity::Min(vec![
            Similarity::Exact(field("first name")),
            Similarity::Exact(field("last name")),
            Similarity::NumericTolerance {
                expression: field("age"),
                max_difference: 5.0,
            },
        ]),
        0.75,
    )
}

fn lenient_policy() -> DuplicatePolicy {
    DuplicatePolicy::new(
        Similarity::Min(vec![
            Similarity::JaroWinkler(field("first name")),
            Similarity::DamerauLevenshtein(field("last name")),
            Similarity::NumericTolerance {
                expression: field("age"),
                max_difference: 5.0,
            },
        ]),
        0.7,
    )
}

/// Policies with the id pairs they must find, in canonical order
fn policies() -> Vec<(&'static str, DuplicatePolicy, Vec<(u64, u64)>)> {
    vec![
        ("exact", exact_policy(), vec![(0, 5)]),
        ("typo_tolerant", typo_tolerant_policy(), vec![(0, 5), (1, 6)]),
        ("age_tolerant", age_tolerant_policy(), vec![(0, 5), (7, 2)]),
        (
            "lenient",
            lenient_policy(),
            vec![(0, 5), (1, 6), (7, 2), (4, 8)],
        ),
    ]
}

fn algorithms() -> Vec<RecordLinkageAlgorithm> {
    vec![
        RecordLinkageAlgorithm::Naive,
        RecordLinkageAlgorithm::Blocking {
            keys: vec![field("first name"), field("last name")],
        },
        RecordLinkageAlgorithm::sorted_neighborhood(field("age"), 3),
    ]
}

fn id_pairs(ids: &[(u64, u64)]) -> PairSet {
    ids.iter()
        .map(|(smaller, bigger)| ProjectedPair::new(json!(smaller), json!(bigger)))
        .collect()
}

fn record(id: usize) -> Value {
    default_fixture().records()[id].value().clone()
}

#[test]
fn every_configuration_passes_against_the_linkage_engine() -> anyhow::Result<()> {
    init_tracing();
    let projections = [None, Some(id_projection()), Some(aggregative_projection())];

    for (name, policy, _) in policies() {
        for algorithm in algorithms() {
            for use_id in [false, true] {
                for projection in &projections {
                    let case = OracleCase::new(name, algorithm.clone(), policy.clone())
                        .with_id(use_id)
                        .with_result_projection(projection.clone())
                        .with_partitions(3);
                    let mut oracle = IntraSourceOracle::reference(case);
                    oracle.verify()?;
                    assert_eq!(oracle.state(), OracleState::Passed);
                }
            }
        }
    }
    Ok(())
}

#[test]
fn id_usage_reports_ids_in_structural_order() -> anyhow::Result<()> {
    for (name, policy, ids) in policies() {
        for algorithm in algorithms() {
            let case = OracleCase::new(name, algorithm.clone(), policy.clone()).with_id(true);
            let report = IntraSourceOracle::reference(case).verify()?;
            assert_eq!(report.expected, id_pairs(&ids), "{name} with {algorithm}");
        }
    }

    // record 7 (age 69) ranks before record 2 (age 70) despite its larger id
    let case = OracleCase::new("age_tolerant", RecordLinkageAlgorithm::Naive, age_tolerant_policy())
        .with_id(true);
    let report = IntraSourceOracle::reference(case).verify()?;
    assert!(report.actual.contains(&ProjectedPair::new(json!(7), json!(2))));
    assert!(!report.actual.contains(&ProjectedPair::new(json!(2), json!(7))));
    Ok(())
}

#[test]
fn identity_projection_reports_full_records() -> anyhow::Result<()> {
    let case = OracleCase::new("lenient", RecordLinkageAlgorithm::Naive, lenient_policy());
    let report = IntraSourceOracle::reference(case).verify()?;

    assert_eq!(report.expected.len(), 4);
    assert!(report
        .expected
        .contains(&ProjectedPair::new(record(0), record(5))));
    assert!(report
        .expected
        .contains(&ProjectedPair::new(record(4), record(8))));

    let unmatched = record(3);
    for pair in report.expected.iter() {
        assert_ne!(pair.smaller(), &unmatched);
        assert_ne!(pair.bigger(), &unmatched);
    }
    Ok(())
}

#[test]
fn name_variation_needs_a_tolerant_policy() -> anyhow::Result<()> {
    let strict = OracleCase::new("typo_tolerant", RecordLinkageAlgorithm::Naive, typo_tolerant_policy())
        .with_id(true);
    let report = IntraSourceOracle::reference(strict).verify()?;
    for pair in report.expected.iter() {
        assert_ne!(pair.smaller(), &json!(4));
        assert_ne!(pair.bigger(), &json!(8));
    }

    let lenient = OracleCase::new("lenient", RecordLinkageAlgorithm::Naive, lenient_policy())
        .with_id(true);
    let report = IntraSourceOracle::reference(lenient).verify()?;
    assert!(report.expected.contains(&ProjectedPair::new(json!(4), json!(8))));
    Ok(())
}

#[test]
fn aggregative_projection_keeps_only_configured_fields() -> anyhow::Result<()> {
    let case = OracleCase::new("lenient", RecordLinkageAlgorithm::Naive, lenient_policy())
        .with_id(true)
        .with_result_projection(Some(aggregative_projection()));
    let report = IntraSourceOracle::reference(case).verify()?;

    assert!(report
        .expected
        .contains(&ProjectedPair::new(
            json!({"name": "elma", "id": 4}),
            json!({"name": "elmar", "id": 8})
        )));
    for pair in report.actual.iter() {
        for side in [pair.smaller(), pair.bigger()] {
            let object = side.as_object().expect("aggregated side is an object");
            let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
            keys.sort_unstable();
            assert_eq!(keys, ["id", "name"]);
        }
    }
    Ok(())
}

#[test]
fn reverification_restarts_from_the_fixture() -> anyhow::Result<()> {
    let case = OracleCase::new("exact", RecordLinkageAlgorithm::Naive, exact_policy()).with_id(true);
    let mut oracle = IntraSourceOracle::reference(case);

    let first = oracle.verify()?;
    let second = oracle.verify()?;
    assert_eq!(first.expected, second.expected);
    assert_eq!(first.expected_evaluations, second.expected_evaluations);
    assert_eq!(oracle.state(), OracleState::Passed);
    Ok(())
}

#[test]
fn unbounded_window_matches_naive_linkage() -> anyhow::Result<()> {
    let wide = OracleCase::new(
        "wide",
        RecordLinkageAlgorithm::sorted_neighborhood(field("age"), usize::MAX),
        lenient_policy(),
    )
    .with_id(true);
    let naive = OracleCase::new("naive", RecordLinkageAlgorithm::Naive, lenient_policy()).with_id(true);

    let wide_report = IntraSourceOracle::reference(wide).verify()?;
    let naive_report = IntraSourceOracle::reference(naive).verify()?;
    assert_eq!(wide_report.actual, naive_report.actual);
    Ok(())
}

#[test]
fn identical_records_in_different_slots_form_one_pair() -> anyhow::Result<()> {
    let mut records = default_fixture().records().to_vec();
    records.push(records[3].clone());
    let fixture = Dataset::new(records);
    let dagmar = ProjectedPair::new(json!(3), json!(3));

    for algorithm in algorithms() {
        let case = OracleCase::new("exact", algorithm.clone(), exact_policy()).with_id(true);
        let report = IntraSourceOracle::reference(case)
            .with_fixture(fixture.clone())
            .verify()?;
        assert_eq!(report.expected, id_pairs(&[(0, 5), (3, 3)]), "{algorithm}");
        assert_eq!(report.actual.count(&dagmar), 1, "{algorithm}");
    }

    let case = OracleCase::new("exact", RecordLinkageAlgorithm::Naive, exact_policy());
    let report = IntraSourceOracle::reference(case).with_fixture(fixture).verify()?;
    assert_eq!(report.actual.count(&ProjectedPair::new(record(3), record(3))), 1);
    Ok(())
}

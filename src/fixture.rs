//! Default linkage fixture and the projections used to shape its results.
//!
//! The nine records form five groups: an exact duplicate, a last-name typo,
//! an age off by one, an unmatched singleton, and a first-name variation.

use crate::expression::Expression;
use crate::model::{Dataset, Record};
use serde_json::json;

fn person(id: u64, first_name: &str, last_name: &str, age: u64) -> Record {
    Record::new(json!({
        "id": id,
        "first name": first_name,
        "last name": last_name,
        "age": age,
    }))
}

/// The fixed nine-record dataset used for regression comparison
pub fn default_fixture() -> Dataset {
    Dataset::new(vec![
        person(0, "albert", "perfect duplicate", 80),
        person(1, "berta", "typo", 70),
        person(2, "charles", "age inaccurate", 70),
        person(3, "dagmar", "unmatched", 75),
        person(4, "elma", "first nameDiffers", 60),
        person(5, "albert", "perfect duplicate", 80),
        person(6, "berta", "tpyo", 70),
        person(7, "charles", "age inaccurate", 69),
        person(8, "elmar", "first nameDiffers", 60),
    ])
}

/// Extracts the stable `id` field
pub fn id_projection() -> Expression {
    Expression::field("id")
}

/// Keeps only the first name (as `name`) and the id
pub fn aggregative_projection() -> Expression {
    Expression::object([
        ("name", Expression::field("first name")),
        ("id", Expression::field("id")),
    ])
}

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

use unilink_rs::{Dataset, Record};

const FIRST_NAMES: [&str; 8] = [
    "albert", "berta", "charles", "dagmar", "elma", "frieda", "gustav", "hanna",
];
const LAST_NAMES: [&str; 8] = [
    "meyer", "schulz", "becker", "hoffmann", "koch", "richter", "wolf", "neumann",
];

/// Route `tracing` output through the test harness; honours `RUST_LOG`
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// People with ids `0..count`; each record is a perturbed copy of an earlier
/// one with probability `duplicate_probability`
#[allow(dead_code)]
pub fn generate_people(count: usize, duplicate_probability: f64, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut values: Vec<Value> = Vec::with_capacity(count);

    for id in 0..count {
        let value = if !values.is_empty() && rng.random_bool(duplicate_probability) {
            let original = values[rng.random_range(0..values.len())].clone();
            perturb(original, id, &mut rng)
        } else {
            json!({
                "id": id,
                "first name": FIRST_NAMES[rng.random_range(0..FIRST_NAMES.len())],
                "last name": LAST_NAMES[rng.random_range(0..LAST_NAMES.len())],
                "age": rng.random_range(18..90u64),
            })
        };
        values.push(value);
    }

    values.into_iter().map(Record::new).collect()
}

fn perturb(mut value: Value, id: usize, rng: &mut StdRng) -> Value {
    value["id"] = json!(id);
    match rng.random_range(0..4) {
        0 => {}
        1 => {
            if let Some(last) = value["last name"].as_str() {
                value["last name"] = json!(transpose(last, rng));
            }
        }
        2 => {
            if let Some(age) = value["age"].as_u64() {
                value["age"] = json!(age + rng.random_range(1..4u64));
            }
        }
        _ => {
            if let Some(first) = value["first name"].as_str() {
                value["first name"] = json!(format!("{first}r"));
            }
        }
    }
    value
}

fn transpose(text: &str, rng: &mut StdRng) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    if chars.len() >= 2 {
        let position = rng.random_range(0..chars.len() - 1);
        chars.swap(position, position + 1);
    }
    chars.into_iter().collect()
}

use std::path::Path;

use measured_data::data::store::save_json;
use measured_data::{FixtureStore, ObservationNode, ObservationType, ObservationVector, ObservedPoint};

const ENSEMBLE_SIZE: usize = 20;
/// Realization that "crashed" and left no results behind.
const FAILED_REALIZATION: usize = 7;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn realizations() -> impl Iterator<Item = usize> {
    (0..ENSEMBLE_SIZE).filter(|&nr| nr != FAILED_REALIZATION)
}

/// Well oil rate at five depths, observed at report step 1.
fn add_gen_data(store: FixtureStore, rng: &mut SimpleRng) -> FixtureStore {
    let truth = [120.0, 115.0, 98.0, 80.0, 61.0];
    let obs = ObservationVector::new(ObservationType::General, "WOPR").with_node(
        1,
        ObservationNode::new(truth.to_vec(), truth.iter().map(|v| 0.05 * v).collect()),
    );
    let mut store = store.with_observation("WOPR_OP1", obs);
    for nr in realizations() {
        let values = truth.iter().map(|&v| rng.gauss(v, 0.1 * v)).collect();
        store = store.with_gen_data("WOPR", 1, nr, values);
    }
    store
}

/// Field oil rate over ten time indices, observed at three of them.
fn add_summary_data(store: FixtureStore, rng: &mut SimpleRng) -> FixtureStore {
    let decline = |t: usize| 1000.0 * (-0.08 * t as f64).exp();
    let mut store = store.with_observation("FOPR", ObservationVector::new(ObservationType::Summary, "FOPR"));
    for t in [2, 5, 8] {
        store = store.with_summary_observation(
            "FOPR",
            t,
            ObservedPoint {
                value: decline(t) + rng.gauss(0.0, 10.0),
                std: 25.0,
            },
        );
    }
    for nr in realizations() {
        let scale = rng.gauss(1.0, 0.1);
        let series = (0..10).map(|t| scale * decline(t)).collect();
        store = store.with_summary_data("FOPR", nr, series);
    }
    store
}

/// Pressure in four grid blocks at report step 3. Block 2 never varies
/// across the ensemble and block 3 is observed far outside the ensemble.
fn add_block_data(store: FixtureStore, rng: &mut SimpleRng) -> FixtureStore {
    let obs = ObservationVector::new(ObservationType::Block, "PRESSURE").with_node(
        3,
        ObservationNode::new(vec![250.0, 245.0, 240.0, 400.0], vec![2.0, 2.0, 2.0, 2.0]),
    );
    let mut store = store.with_observation("RFT_PRES", obs);
    for nr in realizations() {
        let values = vec![
            rng.gauss(250.0, 5.0),
            rng.gauss(245.0, 5.0),
            240.0,
            rng.gauss(235.0, 5.0),
        ];
        store = store.with_block_data("RFT_PRES", 3, nr, values);
    }
    store
}

fn main() {
    env_logger::init();

    let mut rng = SimpleRng::new(42);
    let store = FixtureStore::new("default", ENSEMBLE_SIZE);
    let store = add_gen_data(store, &mut rng);
    let store = add_summary_data(store, &mut rng);
    let store = add_block_data(store, &mut rng);

    let output_path = std::env::args().nth(1).unwrap_or_else(|| "sample_store.json".to_string());
    save_json(&store, Path::new(&output_path)).expect("Failed to write store");

    println!(
        "Wrote case '{}' ({} realizations, {} observations) to {output_path}",
        store.case_name,
        store.ensemble_size,
        store.observations.len()
    );
}

use std::collections::HashMap;

use rand::{Rng as _, SeedableRng as _, rngs::StdRng};

use crate::{
    fa2::{self, Fa2Settings},
    hash::stable_hash64,
    model::Snapshot,
    overlap::{self, OverlapSettings},
};

/// Settings for the temporal layout of a snapshot sequence.
#[derive(Clone, Copy, Debug)]
pub struct LayoutSettings {
    /// Node sizing: `size = sqrt(size_min + size_factor * in_degree ^ size_power)`.
    pub size_min: f64,
    pub size_factor: f64,
    pub size_power: f64,

    /// Scales every iteration budget (force passes and overlap sweeps).
    pub iterations_factor: f64,
    pub scaling: f64,
    pub gravity: f64,
    pub lin_log: bool,
    pub strong_gravity: bool,
    pub barnes_hut: bool,
    pub overlap_removal: bool,
    pub seed: u64,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            size_min: 10.0,
            size_factor: 2.0,
            size_power: 1.0,
            iterations_factor: 1.0,
            scaling: 1.0,
            gravity: 0.01,
            lin_log: true,
            strong_gravity: true,
            barnes_hut: true,
            overlap_removal: true,
            seed: 0,
        }
    }
}

/// Positions carried from one snapshot to the next.
#[derive(Clone, Debug, Default)]
pub struct NodePositionIndex {
    map: HashMap<String, (f64, f64)>,
}

impl NodePositionIndex {
    pub fn get(&self, id: &str) -> Option<(f64, f64)> {
        self.map.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Lay out one snapshot in place: size nodes from their in-degree, seed
/// positions from `previous`, then run the force passes and overlap sweeps.
///
/// Pass failures are logged with `{snapshot, pass}` context and skipped;
/// downstream passes continue from whatever state the last good pass left.
/// Returns the position index to seed the next snapshot with.
pub fn layout_snapshot(
    snapshot: &mut Snapshot,
    previous: Option<&NodePositionIndex>,
    settings: &LayoutSettings,
    snapshot_index: usize,
) -> NodePositionIndex {
    let n = snapshot.nodes.len();
    let endpoints = snapshot.edge_endpoints();

    let mut degree = vec![0usize; n];
    let mut in_degree = vec![0usize; n];
    for (k, ep) in endpoints.iter().enumerate() {
        let Some((s, t)) = *ep else { continue };
        degree[s] += 1;
        degree[t] += 1;
        if snapshot.edges[k].directed {
            in_degree[t] += 1;
        } else {
            in_degree[s] += 1;
            in_degree[t] += 1;
        }
    }

    let sizes: Vec<f64> = in_degree
        .iter()
        .map(|&d| (settings.size_min + settings.size_factor * (d as f64).powf(settings.size_power)).sqrt())
        .collect();

    let mut positions = seed_positions(snapshot, previous, &endpoints, settings, snapshot_index);

    let masses: Vec<f64> = degree.iter().map(|&d| 1.0 + d as f64).collect();
    let edges: Vec<(u32, u32, f64)> = endpoints
        .iter()
        .flatten()
        .map(|&(s, t)| (s as u32, t as u32, 1.0))
        .collect();

    let f = settings.iterations_factor;
    let shared = Fa2Settings {
        lin_log_mode: settings.lin_log,
        outbound_attraction_distribution: false,
        edge_weight_influence: 0.0,
        scaling_ratio: settings.scaling,
        strong_gravity_mode: settings.strong_gravity,
        gravity: settings.gravity,
        ..Fa2Settings::default()
    };
    let force_passes = [
        ("fa2-rough", Fa2Settings {
            iterations: (100.0 * f) as u32,
            slow_down: 5.0,
            barnes_hut_optimize: settings.barnes_hut,
            barnes_hut_theta: 1.2,
            ..shared
        }),
        ("fa2-precision", Fa2Settings {
            iterations: (10.0 * f) as u32,
            slow_down: 20.0,
            barnes_hut_optimize: settings.barnes_hut,
            barnes_hut_theta: 0.3,
            ..shared
        }),
        ("fa2-refine", Fa2Settings {
            iterations: (2.0 * f) as u32,
            slow_down: 20.0,
            barnes_hut_optimize: false,
            barnes_hut_theta: 0.3,
            ..shared
        }),
    ];

    for (pass, cfg) in &force_passes {
        let mut attempt = positions.clone();
        match fa2::run(&mut attempt, &masses, &edges, cfg) {
            Ok(()) => positions = attempt,
            Err(e) => {
                tracing::warn!(snapshot = snapshot_index, pass, error = %e, "layout pass failed, skipping");
            }
        }
    }

    if settings.overlap_removal {
        let sweeps = [
            ("overlap-1", OverlapSettings {
                max_iterations: (120.0 * f) as u32,
                margin: 0.9,
                speed: 8.0,
                ..OverlapSettings::default()
            }),
            ("overlap-2", OverlapSettings {
                max_iterations: (80.0 * f) as u32,
                margin: 0.6,
                speed: 4.0,
                ..OverlapSettings::default()
            }),
            ("overlap-3", OverlapSettings {
                max_iterations: (40.0 * f) as u32,
                margin: 0.3,
                speed: 1.0,
                ..OverlapSettings::default()
            }),
        ];
        for (pass, cfg) in &sweeps {
            let mut attempt = positions.clone();
            match overlap::run(&mut attempt, &sizes, cfg) {
                Ok(()) => positions = attempt,
                Err(e) => {
                    tracing::warn!(snapshot = snapshot_index, pass, error = %e, "overlap sweep failed, skipping");
                }
            }
        }
    }

    let mut index = NodePositionIndex::default();
    for (i, node) in snapshot.nodes.iter_mut().enumerate() {
        node.x = Some(positions[i].0);
        node.y = Some(positions[i].1);
        node.size = Some(sizes[i]);
        index.map.insert(node.id.clone(), positions[i]);
    }
    index
}

/// Initial positions: inherit from the previous snapshot where possible,
/// place new nodes at the mean of their already-positioned neighbors, and
/// fall back to a random point in a `sqrt(order) * 100` square.
///
/// Neighbor means only read inherited positions and random fallbacks are
/// keyed on node ids, so the result does not depend on node order.
fn seed_positions(
    snapshot: &Snapshot,
    previous: Option<&NodePositionIndex>,
    endpoints: &[Option<(usize, usize)>],
    settings: &LayoutSettings,
    snapshot_index: usize,
) -> Vec<(f64, f64)> {
    let n = snapshot.nodes.len();
    let spreading = (n as f64).sqrt() * 100.0;

    let random_position = |id: &str| -> (f64, f64) {
        let key = stable_hash64(settings.seed.wrapping_add(snapshot_index as u64), id);
        let mut rng = StdRng::seed_from_u64(key);
        (
            (rng.r#gen::<f64>() - 0.5) * spreading,
            (rng.r#gen::<f64>() - 0.5) * spreading,
        )
    };

    let Some(previous) = previous else {
        return snapshot.nodes.iter().map(|node| random_position(&node.id)).collect();
    };

    let inherited: Vec<Option<(f64, f64)>> =
        snapshot.nodes.iter().map(|node| previous.get(&node.id)).collect();

    let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); n];
    for &(s, t) in endpoints.iter().flatten() {
        neighbors[s].push(t);
        neighbors[t].push(s);
    }

    snapshot
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            if let Some(pos) = inherited[i] {
                return pos;
            }
            let mut sum = (0.0, 0.0);
            let mut count = 0usize;
            let mut visited = std::collections::HashSet::new();
            for &j in &neighbors[i] {
                if !visited.insert(j) {
                    continue;
                }
                if let Some((x, y)) = inherited[j] {
                    sum.0 += x;
                    sum.1 += y;
                    count += 1;
                }
            }
            if count > 0 {
                (sum.0 / count as f64, sum.1 / count as f64)
            } else {
                random_position(&node.id)
            }
        })
        .collect()
}

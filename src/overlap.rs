use std::collections::HashSet;

use crate::error::{NetreelError, NetreelResult};

/// One anti-overlap sweep. The effective radius of a node is
/// `size * ratio + margin`; colliding pairs are pushed apart until no
/// collision remains or the iteration budget runs out.
#[derive(Clone, Copy, Debug)]
pub struct OverlapSettings {
    pub max_iterations: u32,
    pub margin: f64,
    pub ratio: f64,
    pub speed: f64,
    pub grid_size: usize,
}

impl Default for OverlapSettings {
    fn default() -> Self {
        Self { max_iterations: 120, margin: 0.9, ratio: 1.05, speed: 8.0, grid_size: 64 }
    }
}

/// Push overlapping nodes apart in place. Returns early once an iteration
/// finds no collision.
pub fn run(
    positions: &mut [(f64, f64)],
    sizes: &[f64],
    settings: &OverlapSettings,
) -> NetreelResult<()> {
    let n = positions.len();
    if sizes.len() != n {
        return Err(NetreelError::layout(format!(
            "sizes length {} does not match {} nodes",
            sizes.len(),
            n
        )));
    }
    if n < 2 || settings.grid_size == 0 {
        return Ok(());
    }

    let radii: Vec<f64> = sizes.iter().map(|s| s * settings.ratio + settings.margin).collect();
    // Large first sweeps anneal quickly, the last sweep settles gently.
    let step = (settings.speed * 0.1).min(1.0);

    let mut dx = vec![0.0f64; n];
    let mut dy = vec![0.0f64; n];

    for _ in 0..settings.max_iterations {
        dx.fill(0.0);
        dy.fill(0.0);

        let mut collided = false;
        for (i, j) in candidate_pairs(positions, &radii, settings.grid_size) {
            let x_dist = positions[i].0 - positions[j].0;
            let y_dist = positions[i].1 - positions[j].1;
            let dist = (x_dist * x_dist + y_dist * y_dist).sqrt();
            let required = radii[i] + radii[j];

            if dist >= required {
                continue;
            }
            collided = true;

            if dist > 0.0 {
                let f = (required - dist) / dist / 2.0;
                dx[i] += x_dist * f;
                dy[i] += y_dist * f;
                dx[j] -= x_dist * f;
                dy[j] -= y_dist * f;
            } else {
                // Coincident pair: separate along a node-indexed direction
                // so the outcome does not depend on iteration order.
                let angle = i as f64 * 2.399_963_229_728_653;
                let push = required / 2.0;
                dx[i] += angle.cos() * push;
                dy[i] += angle.sin() * push;
                dx[j] -= angle.cos() * push;
                dy[j] -= angle.sin() * push;
            }
        }

        if !collided {
            break;
        }
        for i in 0..n {
            positions[i].0 += dx[i] * step;
            positions[i].1 += dy[i] * step;
        }
    }

    if positions.iter().any(|p| !p.0.is_finite() || !p.1.is_finite()) {
        return Err(NetreelError::layout("overlap removal produced a non-finite position"));
    }
    Ok(())
}

/// Pairs of nodes sharing at least one grid cell, deduplicated, in
/// ascending (i, j) order.
fn candidate_pairs(
    positions: &[(f64, f64)],
    radii: &[f64],
    grid_size: usize,
) -> Vec<(usize, usize)> {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for (i, &(x, y)) in positions.iter().enumerate() {
        min_x = min_x.min(x - radii[i]);
        min_y = min_y.min(y - radii[i]);
        max_x = max_x.max(x + radii[i]);
        max_y = max_y.max(y + radii[i]);
    }

    let cell_w = ((max_x - min_x) / grid_size as f64).max(f64::EPSILON);
    let cell_h = ((max_y - min_y) / grid_size as f64).max(f64::EPSILON);

    let clamp_cell = |v: f64, cell: f64, origin: f64| -> usize {
        (((v - origin) / cell) as isize).clamp(0, grid_size as isize - 1) as usize
    };

    let mut cells: Vec<Vec<u32>> = vec![Vec::new(); grid_size * grid_size];
    for (i, &(x, y)) in positions.iter().enumerate() {
        let col0 = clamp_cell(x - radii[i], cell_w, min_x);
        let col1 = clamp_cell(x + radii[i], cell_w, min_x);
        let row0 = clamp_cell(y - radii[i], cell_h, min_y);
        let row1 = clamp_cell(y + radii[i], cell_h, min_y);
        for row in row0..=row1 {
            for col in col0..=col1 {
                cells[row * grid_size + col].push(i as u32);
            }
        }
    }

    let mut seen = HashSet::new();
    let mut pairs = Vec::new();
    for cell in &cells {
        for (a, &i) in cell.iter().enumerate() {
            for &j in &cell[a + 1..] {
                let key = if i < j { (i, j) } else { (j, i) };
                if seen.insert(key) {
                    pairs.push((key.0 as usize, key.1 as usize));
                }
            }
        }
    }
    pairs.sort_unstable();
    pairs
}

use rayon::prelude::*;

use crate::voronoi::FieldNode;

/// Additive node-density field at reduced resolution, normalized by node
/// count. `h_max` is the normalized maximum, kept for hypsometric keying.
#[derive(Clone, Debug)]
pub struct HeatField {
    pub width: usize,
    pub height: usize,
    pub ratio: f64,
    pub values: Vec<f64>,
    pub h_max: f64,
}

impl HeatField {
    /// Each node contributes `1 / (1 + (max(0, d - size)/spread)^2)` per
    /// pixel, everything measured in reduced-resolution pixels. Rows are
    /// accumulated in parallel.
    pub fn compute(
        nodes: &[FieldNode],
        full_width: u32,
        full_height: u32,
        spread_px: f64,
        resolution_max: f64,
    ) -> Self {
        let full = f64::from(full_width) * f64::from(full_height);
        let ratio = if full > resolution_max && full > 0.0 {
            (resolution_max / full).sqrt()
        } else {
            1.0
        };
        let width = ((f64::from(full_width) * ratio).ceil() as usize).max(1);
        let height = ((f64::from(full_height) * ratio).ceil() as usize).max(1);

        let spread_r = (spread_px * ratio).max(f64::EPSILON);
        let reduced: Vec<(f64, f64, f64)> = nodes
            .iter()
            .map(|n| (n.x * ratio, n.y * ratio, n.size * ratio))
            .collect();

        let mut values = vec![0.0f64; width * height];
        values
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                let py = y as f64 + 0.5;
                for (x, cell) in row.iter_mut().enumerate() {
                    let px = x as f64 + 0.5;
                    let mut sum = 0.0;
                    for &(nx, ny, nsize) in &reduced {
                        let d = ((px - nx).powi(2) + (py - ny).powi(2)).sqrt();
                        let outside = (d - nsize).max(0.0) / spread_r;
                        sum += 1.0 / (1.0 + outside * outside);
                    }
                    *cell = sum;
                }
            });

        if !nodes.is_empty() {
            let n = nodes.len() as f64;
            for v in &mut values {
                *v /= n;
            }
        }
        let h_max = values.iter().copied().fold(0.0f64, f64::max);

        Self { width, height, ratio, values, h_max }
    }

    /// Bilinear sample at full-resolution pixel coordinates.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        bilinear(&self.values, self.width, self.height, x * self.ratio - 0.5, y * self.ratio - 0.5)
    }
}

/// Per-pixel Lambert reflectance derived from a height field.
#[derive(Clone, Debug)]
pub struct Hillshade {
    pub width: usize,
    pub height: usize,
    ratio: f64,
    pub reflectance: Vec<f64>,
}

#[derive(Clone, Copy, Debug)]
pub struct HillshadeParams {
    /// Multiplies the terrain gradient before the slope is taken.
    pub strength: f64,
    /// Sun direction, radians.
    pub azimuth: f64,
    /// Sun height above the horizon, radians.
    pub elevation: f64,
}

impl Default for HillshadeParams {
    fn default() -> Self {
        Self {
            strength: 1.0,
            azimuth: 315.0_f64.to_radians(),
            elevation: 45.0_f64.to_radians(),
        }
    }
}

impl Hillshade {
    pub fn compute(heat: &HeatField, params: &HillshadeParams) -> Self {
        let (w, h) = (heat.width, heat.height);
        let z = params.strength * ((w * h) as f64).sqrt();
        let zenith = std::f64::consts::FRAC_PI_2 - params.elevation;

        let at = |x: isize, y: isize| -> f64 {
            let x = x.clamp(0, w as isize - 1) as usize;
            let y = y.clamp(0, h as isize - 1) as usize;
            heat.values[y * w + x]
        };

        let mut reflectance = vec![0.0f64; w * h];
        for y in 0..h as isize {
            for x in 0..w as isize {
                let dx = at(x - 1, y) - at(x + 1, y);
                let dy = at(x, y - 1) - at(x, y + 1);
                let slope = (z * (dx * dx + dy * dy).sqrt()).atan();
                let aspect = (-dy).atan2(-dx);
                let l = (std::f64::consts::PI - aspect - params.azimuth).cos()
                    * slope.sin()
                    * zenith.sin()
                    + slope.cos() * zenith.cos();
                reflectance[y as usize * w + x as usize] = l;
            }
        }

        Self { width: w, height: h, ratio: heat.ratio, reflectance }
    }

    /// Bilinear sample at full-resolution pixel coordinates.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        bilinear(
            &self.reflectance,
            self.width,
            self.height,
            x * self.ratio - 0.5,
            y * self.ratio - 0.5,
        )
    }
}

fn bilinear(values: &[f64], width: usize, height: usize, x: f64, y: f64) -> f64 {
    if width == 0 || height == 0 {
        return 0.0;
    }
    let x = x.clamp(0.0, width as f64 - 1.0);
    let y = y.clamp(0.0, height as f64 - 1.0);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let v00 = values[y0 * width + x0];
    let v10 = values[y0 * width + x1];
    let v01 = values[y1 * width + x0];
    let v11 = values[y1 * width + x1];
    let top = v00 + (v10 - v00) * fx;
    let bot = v01 + (v11 - v01) * fx;
    top + (bot - top) * fy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heatmap_is_nonnegative_and_peaks_at_the_node() {
        let nodes = [FieldNode { x: 16.0, y: 16.0, size: 2.0 }];
        let heat = HeatField::compute(&nodes, 32, 32, 4.0, 1e8);

        assert!(heat.values.iter().all(|&v| v >= 0.0));
        let peak = heat.sample(16.0, 16.0);
        assert!((peak - heat.h_max).abs() < 1e-9);
        // a single node inside its own disc contributes exactly 1, and the
        // count normalization divides by 1
        assert!((peak - 1.0).abs() < 1e-9);
        assert!(heat.sample(0.0, 0.0) < peak);
    }

    #[test]
    fn field_is_additive_across_nodes_before_normalization() {
        let a = [FieldNode { x: 10.0, y: 16.0, size: 1.0 }];
        let b = [FieldNode { x: 22.0, y: 16.0, size: 1.0 }];
        let both = [a[0], b[0]];

        let fa = HeatField::compute(&a, 32, 32, 5.0, 1e8);
        let fb = HeatField::compute(&b, 32, 32, 5.0, 1e8);
        let fab = HeatField::compute(&both, 32, 32, 5.0, 1e8);

        for i in 0..fab.values.len() {
            // 2 * normalized(both) == normalized(a) + normalized(b)
            let lhs = 2.0 * fab.values[i];
            let rhs = fa.values[i] + fb.values[i];
            assert!((lhs - rhs).abs() < 1e-12, "pixel {i}: {lhs} vs {rhs}");
        }
    }

    #[test]
    fn flat_field_shades_to_constant_reflectance() {
        let heat = HeatField {
            width: 8,
            height: 8,
            ratio: 1.0,
            values: vec![0.5; 64],
            h_max: 0.5,
        };
        let shade = Hillshade::compute(&heat, &HillshadeParams::default());
        let expected = (std::f64::consts::FRAC_PI_2 - 45.0_f64.to_radians()).cos();
        for &l in &shade.reflectance {
            assert!((l - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn slope_facing_the_sun_is_brighter_than_the_far_side() {
        // a ridge rising toward +x
        let mut values = vec![0.0f64; 64];
        for y in 0..8 {
            for x in 0..8 {
                values[y * 8 + x] = (x as f64 - 4.0).abs() * -0.1;
            }
        }
        let heat = HeatField { width: 8, height: 8, ratio: 1.0, values, h_max: 0.0 };
        let params = HillshadeParams {
            azimuth: 180.0_f64.to_radians(),
            ..HillshadeParams::default()
        };
        let shade = Hillshade::compute(&heat, &params);
        let west = shade.reflectance[4 * 8 + 1];
        let east = shade.reflectance[4 * 8 + 6];
        assert_ne!(west, east);
    }
}

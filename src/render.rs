use kurbo::{Point, Vec2};
use rand::{Rng as _, SeedableRng as _, rngs::StdRng};

use crate::{
    canvas::Canvas,
    color::{self, ColorRamp, Rgb},
    error::{NetreelError, NetreelResult},
    hash::stable_hash64,
    heatmap::{HeatField, Hillshade, HillshadeParams},
    labels::{self, CollisionBitmap, LabelCandidate},
    model::Snapshot,
    text::TextBrush,
    voronoi::{FieldNode, VoronoiField},
};

pub fn mm_to_px(mm: f64, dpi: f64) -> f64 {
    mm * dpi * 0.0393701
}

pub fn pt_to_px(pt: f64, dpi: f64) -> f64 {
    pt * dpi / 72.0
}

/// Image margins in millimetres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Margins {
    pub fn uniform(mm: f64) -> Self {
        Self { top: mm, right: mm, bottom: mm, left: mm }
    }
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform(10.0)
    }
}

/// How the graph is fitted into the drawable rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleMode {
    /// Independent x/y fits, then the smaller scale.
    BoundingBox,
    /// A single scale from the largest center distance plus node radius.
    InscribedCircle,
}

#[derive(Clone, Debug)]
pub struct RenderSettings {
    pub image_width_mm: f64,
    pub image_height_mm: f64,
    /// Internal raster density.
    pub rendering_dpi: f64,
    /// Final density; the frame is bilinearly resampled when it differs.
    pub output_dpi: f64,
    pub margins: Margins,

    pub flip_x: bool,
    pub flip_y: bool,
    /// Degrees, clockwise about the origin.
    pub rotate: f64,
    /// Blend between size-weighted barycenter (1.0) and the bounding-box
    /// center (0.0) when choosing the center of mass for rescaling.
    pub use_barycenter_ratio: f64,
    pub scale_mode: ScaleMode,

    pub background_color: Rgb,
    pub hillshade: bool,
    pub hillshade_color: Rgb,
    pub hillshade_strength: f64,
    pub sun_azimuth_deg: f64,
    pub sun_elevation_deg: f64,
    /// Key the hillshade layer color on heat height instead of a flat color.
    pub hypsometric: bool,

    pub heatmap_spread_mm: f64,
    pub heatmap_resolution_max: f64,
    pub voronoi_range_mm: f64,
    pub voronoi_resolution_max: f64,

    pub edge_thickness_mm: f64,
    pub edge_curved: bool,
    /// Dense polylines (~0.2 mm segments); the fast path uses ~2 mm.
    pub edge_high_quality: bool,
    /// Fixed edge color; endpoint colors are mixed when absent.
    pub edge_color: Option<Rgb>,

    pub node_size_factor: f64,
    pub node_stroke_mm: f64,
    pub node_stroke_color: Rgb,

    pub label_count: usize,
    pub label_font_min_pt: f64,
    pub label_font_max_pt: f64,
    pub label_pen_thickness_mm: f64,
    pub label_margin_mm: f64,
    pub label_border_mm: f64,
    pub label_border_color: Rgb,
    pub label_with_node_circle: bool,
    pub label_collision_resolution_max: f64,

    pub seed: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            image_width_mm: 200.0,
            image_height_mm: 200.0,
            rendering_dpi: 96.0,
            output_dpi: 96.0,
            margins: Margins::default(),
            flip_x: false,
            flip_y: false,
            rotate: 0.0,
            use_barycenter_ratio: 0.2,
            scale_mode: ScaleMode::BoundingBox,
            background_color: Rgb::WHITE,
            hillshade: true,
            hillshade_color: Rgb([186, 180, 168]),
            hillshade_strength: 1.0,
            sun_azimuth_deg: 315.0,
            sun_elevation_deg: 45.0,
            hypsometric: false,
            heatmap_spread_mm: 10.0,
            heatmap_resolution_max: 1e5,
            voronoi_range_mm: 5.0,
            voronoi_resolution_max: 1e8,
            edge_thickness_mm: 0.25,
            edge_curved: false,
            edge_high_quality: true,
            edge_color: None,
            node_size_factor: 1.0,
            node_stroke_mm: 0.2,
            node_stroke_color: Rgb::WHITE,
            label_count: 30,
            label_font_min_pt: 8.0,
            label_font_max_pt: 24.0,
            label_pen_thickness_mm: 0.35,
            label_margin_mm: 1.0,
            label_border_mm: 0.6,
            label_border_color: Rgb::WHITE,
            label_with_node_circle: true,
            label_collision_resolution_max: 1e7,
            seed: 0,
        }
    }
}

/// A rendered frame: premultiplied RGBA8, tightly packed, row-major.
#[derive(Clone, Debug)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

#[derive(Clone, Debug)]
struct RenderNode {
    id: String,
    label: String,
    pos: Point,
    size: f64,
    color: Rgb,
    vid: u32,
}

/// Fields derived from the current snapshot, rebuilt per render call.
#[derive(Default)]
struct Memo {
    voronoi: Option<VoronoiField>,
    heat: Option<HeatField>,
    shade: Option<Hillshade>,
    nodes_by_size: Option<Vec<usize>>,
    size_extent: Option<(f64, f64)>,
    visible_labels: Option<Vec<LabelCandidate>>,
}

pub struct Renderer {
    pub settings: RenderSettings,
    memo: Memo,
}

impl Renderer {
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings, memo: Memo::default() }
    }

    /// Render one snapshot. Layer failures are logged with the layer name
    /// and the layer is omitted; only whole-frame problems are returned as
    /// errors.
    pub fn render(&mut self, snapshot: &Snapshot, brush: Option<&dyn TextBrush>) -> NetreelResult<Frame> {
        self.memo = Memo::default();
        let s = &self.settings;
        let dpi = s.rendering_dpi;
        let width = mm_to_px(s.image_width_mm, dpi).round().max(1.0) as u32;
        let height = mm_to_px(s.image_height_mm, dpi).round().max(1.0) as u32;

        let nodes = self.prepare_nodes(snapshot, width, height);
        let endpoints = snapshot.edge_endpoints();

        let mut background =
            Canvas::filled(width, height, self.settings.background_color.premul(1.0));
        if self.settings.hillshade
            && let Err(e) = self.draw_hillshade(&mut background, &nodes, width, height)
        {
            tracing::warn!(layer = "hillshade", error = %e, "render layer failed, omitting");
        }

        let mut layered = Canvas::new(width, height);
        if let Err(e) = self.draw_edges(&mut layered, snapshot, &endpoints, &nodes, width, height) {
            tracing::warn!(layer = "edges", error = %e, "render layer failed, omitting");
        }
        if let Err(e) = self.draw_nodes(&mut layered, &nodes) {
            tracing::warn!(layer = "nodes", error = %e, "render layer failed, omitting");
        }
        match brush {
            Some(brush) => {
                if let Err(e) = self.draw_labels(&mut layered, &nodes, brush, width, height) {
                    tracing::warn!(layer = "labels", error = %e, "render layer failed, omitting");
                }
            }
            None => tracing::warn!(layer = "labels", "no text brush available, omitting labels"),
        }

        background.multiply_canvas(&layered)?;

        let out = if (self.settings.output_dpi - dpi).abs() > f64::EPSILON {
            let ow = mm_to_px(self.settings.image_width_mm, self.settings.output_dpi)
                .round()
                .max(1.0) as u32;
            let oh = mm_to_px(self.settings.image_height_mm, self.settings.output_dpi)
                .round()
                .max(1.0) as u32;
            background.resize_bilinear(ow, oh)
        } else {
            background
        };

        Ok(Frame { width: out.width, height: out.height, data: out.data, premultiplied: true })
    }

    /// Apply defaults for missing position/size/color/label, then flips,
    /// rotation, and the fit into the drawable rectangle.
    fn prepare_nodes(&self, snapshot: &Snapshot, width: u32, height: u32) -> Vec<RenderNode> {
        let s = &self.settings;
        let order = snapshot.nodes.len();
        let default_radius = 5.0 * (order as f64).sqrt();
        let (sin_r, cos_r) = s.rotate.to_radians().sin_cos();

        let mut nodes: Vec<RenderNode> = snapshot
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let (mut x, mut y) = match (n.x, n.y) {
                    (Some(x), Some(y)) => (x, y),
                    _ => {
                        let mut rng =
                            StdRng::seed_from_u64(stable_hash64(s.seed, &n.id));
                        let angle = rng.r#gen::<f64>() * std::f64::consts::TAU;
                        let r = default_radius * rng.r#gen::<f64>().sqrt();
                        (r * angle.cos(), r * angle.sin())
                    }
                };
                if s.flip_x {
                    x = -x;
                }
                if s.flip_y {
                    y = -y;
                }
                let (rx, ry) = (x * cos_r + y * sin_r, -x * sin_r + y * cos_r);
                RenderNode {
                    id: n.id.clone(),
                    label: n.label.clone(),
                    pos: Point::new(rx, ry),
                    size: n.size.unwrap_or(1.0).max(0.0),
                    color: n.color.unwrap_or(Rgb::NEUTRAL_GRAY),
                    vid: (i + 1) as u32,
                }
            })
            .collect();

        if nodes.is_empty() {
            return nodes;
        }

        let total_size: f64 = nodes.iter().map(|n| n.size).sum();
        let barycenter = if total_size > 0.0 {
            let sum = nodes
                .iter()
                .fold(Vec2::ZERO, |acc, n| acc + n.pos.to_vec2() * n.size);
            (sum / total_size).to_point()
        } else {
            Point::ZERO
        };
        let (min_x, max_x) = extent(nodes.iter().map(|n| n.pos.x));
        let (min_y, max_y) = extent(nodes.iter().map(|n| n.pos.y));
        let geocenter = Point::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);
        let ratio = s.use_barycenter_ratio.clamp(0.0, 1.0);
        let center = Point::new(
            ratio * barycenter.x + (1.0 - ratio) * geocenter.x,
            ratio * barycenter.y + (1.0 - ratio) * geocenter.y,
        );

        let dpi = s.rendering_dpi;
        let left = mm_to_px(s.margins.left, dpi);
        let top = mm_to_px(s.margins.top, dpi);
        let draw_w =
            (f64::from(width) - left - mm_to_px(s.margins.right, dpi)).max(1.0);
        let draw_h =
            (f64::from(height) - top - mm_to_px(s.margins.bottom, dpi)).max(1.0);

        let scale = match s.scale_mode {
            ScaleMode::BoundingBox => {
                let mx = nodes
                    .iter()
                    .map(|n| (n.pos.x - center.x).abs() + n.size)
                    .fold(0.0f64, f64::max);
                let my = nodes
                    .iter()
                    .map(|n| (n.pos.y - center.y).abs() + n.size)
                    .fold(0.0f64, f64::max);
                let sx = if mx > 0.0 { draw_w / 2.0 / mx } else { 1.0 };
                let sy = if my > 0.0 { draw_h / 2.0 / my } else { 1.0 };
                sx.min(sy)
            }
            ScaleMode::InscribedCircle => {
                let m = nodes
                    .iter()
                    .map(|n| (n.pos - center).hypot() + n.size)
                    .fold(0.0f64, f64::max);
                if m > 0.0 { draw_w.min(draw_h) / 2.0 / m } else { 1.0 }
            }
        };

        for n in &mut nodes {
            n.pos = Point::new(
                left + draw_w / 2.0 + (n.pos.x - center.x) * scale,
                top + draw_h / 2.0 + (n.pos.y - center.y) * scale,
            );
            n.size *= scale;
        }
        nodes
    }

    fn ensure_voronoi(&mut self, nodes: &[RenderNode], width: u32, height: u32) {
        if self.memo.voronoi.is_some() {
            return;
        }
        let field_nodes: Vec<FieldNode> = nodes
            .iter()
            .map(|n| FieldNode { x: n.pos.x, y: n.pos.y, size: n.size })
            .collect();
        let range_px = mm_to_px(self.settings.voronoi_range_mm, self.settings.rendering_dpi);
        self.memo.voronoi = Some(VoronoiField::compute(
            &field_nodes,
            width,
            height,
            range_px,
            self.settings.voronoi_resolution_max,
        ));
    }

    fn ensure_heat(&mut self, nodes: &[RenderNode], width: u32, height: u32) {
        if self.memo.heat.is_some() {
            return;
        }
        let field_nodes: Vec<FieldNode> = nodes
            .iter()
            .map(|n| FieldNode { x: n.pos.x, y: n.pos.y, size: n.size })
            .collect();
        let spread_px = mm_to_px(self.settings.heatmap_spread_mm, self.settings.rendering_dpi);
        self.memo.heat = Some(HeatField::compute(
            &field_nodes,
            width,
            height,
            spread_px,
            self.settings.heatmap_resolution_max,
        ));
    }

    fn draw_hillshade(
        &mut self,
        background: &mut Canvas,
        nodes: &[RenderNode],
        width: u32,
        height: u32,
    ) -> NetreelResult<()> {
        self.ensure_heat(nodes, width, height);
        let heat = self
            .memo
            .heat
            .as_ref()
            .ok_or_else(|| NetreelError::render("heat field missing after ensure"))?;
        if self.memo.shade.is_none() {
            let params = HillshadeParams {
                strength: self.settings.hillshade_strength,
                azimuth: self.settings.sun_azimuth_deg.to_radians(),
                elevation: self.settings.sun_elevation_deg.to_radians(),
            };
            self.memo.shade = Some(Hillshade::compute(heat, &params));
        }
        let heat = self
            .memo
            .heat
            .as_ref()
            .ok_or_else(|| NetreelError::render("heat field missing after ensure"))?;
        let shade = self
            .memo
            .shade
            .as_ref()
            .ok_or_else(|| NetreelError::render("hillshade missing after compute"))?;

        let ramp = self.settings.hypsometric.then(ColorRamp::hypsometric);
        let h_max = heat.h_max.max(f64::EPSILON);
        for y in 0..height {
            for x in 0..width {
                let px = f64::from(x) + 0.5;
                let py = f64::from(y) + 0.5;
                let l = shade.sample(px, py);
                let alpha = color::reflectance_alpha(l);
                let tint = match &ramp {
                    Some(ramp) => ramp.sample(heat.sample(px, py) / h_max),
                    None => self.settings.hillshade_color,
                };
                background.over_px(i64::from(x), i64::from(y), tint.premul(alpha), 1.0);
            }
        }
        Ok(())
    }

    fn draw_edges(
        &mut self,
        layered: &mut Canvas,
        snapshot: &Snapshot,
        endpoints: &[Option<(usize, usize)>],
        nodes: &[RenderNode],
        width: u32,
        height: u32,
    ) -> NetreelResult<()> {
        self.ensure_voronoi(nodes, width, height);
        let voronoi = self
            .memo
            .voronoi
            .as_ref()
            .ok_or_else(|| NetreelError::render("voronoi field missing after ensure"))?;
        let s = &self.settings;
        let dpi = s.rendering_dpi;

        let seg_px = mm_to_px(if s.edge_high_quality { 0.2 } else { 2.0 }, dpi).max(1.0);
        let thickness = mm_to_px(s.edge_thickness_mm, dpi).max(0.5);
        // curvature of the optional arc variant
        let bend = (std::f64::consts::PI / 12.0).tan();

        for (k, edge) in snapshot.edges.iter().enumerate() {
            let Some((src, dst)) = endpoints.get(k).copied().flatten() else {
                continue;
            };
            let a = nodes[src].pos;
            let b = nodes[dst].pos;
            let span = b - a;
            let d = span.hypot();
            if d < 1e-9 {
                continue;
            }
            let unit = span / d;
            let normal = Vec2::new(-unit.y, unit.x);

            let count = ((d / seg_px).ceil() as usize).max(1) + 1;
            let h_radius = d / (2.0 * bend);
            let flat_ratio = (d / h_radius).powi(2);

            let mut points = Vec::with_capacity(count);
            let mut opacity = Vec::with_capacity(count);
            for i in 0..count {
                let t = i as f64 / (count - 1) as f64;
                let mut p = a + span * t;
                if s.edge_curved {
                    let arg = (1.0 - (1.0 - t) * t * flat_ratio).max(0.0);
                    p += normal * (h_radius * (arg.sqrt() - 1.0));
                }
                let (vid, dist) = voronoi.sample(p.x, p.y);
                let o = if vid == nodes[src].vid || vid == nodes[dst].vid {
                    1.0
                } else {
                    let norm = f64::from(dist) / 255.0;
                    0.5 + 0.5 * (std::f64::consts::PI - norm * norm * std::f64::consts::PI).cos()
                };
                points.push(p);
                opacity.push(o);
            }

            let smoothed = smooth_opacity(&opacity);

            let color = s
                .edge_color
                .unwrap_or_else(|| nodes[src].color.mix(nodes[dst].color, 0.5));
            let key = format!("{}|{}|{}", edge.source, edge.target, k);
            let mut rng = StdRng::seed_from_u64(stable_hash64(s.seed, &key));

            for i in 0..count - 1 {
                let seg_thickness = thickness * (0.75 + 0.5 * rng.r#gen::<f64>());
                let wobble = normal * ((rng.r#gen::<f64>() - 0.5) * thickness * 0.6);
                let alpha = (smoothed[i] + smoothed[i + 1]) / 2.0 * edge.opacity.clamp(0.0, 1.0);
                if alpha <= 0.0 {
                    continue;
                }
                layered.fill_segment(
                    points[i] + wobble,
                    points[i + 1] + wobble,
                    seg_thickness,
                    color.premul(alpha),
                );
            }
        }
        Ok(())
    }

    fn ensure_node_order(&mut self, nodes: &[RenderNode]) {
        if self.memo.nodes_by_size.is_some() {
            return;
        }
        let mut order: Vec<usize> = (0..nodes.len()).collect();
        order.sort_by(|&a, &b| {
            nodes[b]
                .size
                .partial_cmp(&nodes[a].size)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    nodes[a]
                        .pos
                        .x
                        .partial_cmp(&nodes[b].pos.x)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
        self.memo.nodes_by_size = Some(order);
    }

    fn draw_nodes(&mut self, layered: &mut Canvas, nodes: &[RenderNode]) -> NetreelResult<()> {
        self.ensure_node_order(nodes);
        let order = self
            .memo
            .nodes_by_size
            .as_ref()
            .ok_or_else(|| NetreelError::render("node order missing after ensure"))?;
        let s = &self.settings;
        let stroke_px = mm_to_px(s.node_stroke_mm, s.rendering_dpi);

        // background-first: the largest nodes end up on top
        for &i in order.iter().rev() {
            let n = &nodes[i];
            let radius = (s.node_size_factor * n.size).max(stroke_px);
            if stroke_px > 0.0 {
                layered.fill_disc(n.pos, radius + stroke_px, s.node_stroke_color.premul(1.0));
            }
            layered.fill_disc(n.pos, radius, n.color.premul(1.0));
        }
        Ok(())
    }

    fn draw_labels(
        &mut self,
        layered: &mut Canvas,
        nodes: &[RenderNode],
        brush: &dyn TextBrush,
        width: u32,
        height: u32,
    ) -> NetreelResult<()> {
        self.ensure_node_order(nodes);
        if self.memo.size_extent.is_none() {
            let (lo, hi) = extent(nodes.iter().map(|n| n.size));
            self.memo.size_extent = Some((lo, hi));
        }

        let s = &self.settings;
        let dpi = s.rendering_dpi;
        let (min_size, max_size) = self
            .memo
            .size_extent
            .ok_or_else(|| NetreelError::render("size extent missing after ensure"))?;
        let order = self
            .memo
            .nodes_by_size
            .as_ref()
            .ok_or_else(|| NetreelError::render("node order missing after ensure"))?;

        if self.memo.visible_labels.is_none() {
            let pen_px = mm_to_px(s.label_pen_thickness_mm, dpi);
            let min_px = pt_to_px(s.label_font_min_pt, dpi);
            let max_px = pt_to_px(s.label_font_max_pt, dpi);

            let candidates: Vec<LabelCandidate> = order
                .iter()
                .filter(|&&i| !nodes[i].label.is_empty())
                .map(|&i| {
                    let n = &nodes[i];
                    let t = if max_size > min_size {
                        (n.size - min_size) / (max_size - min_size)
                    } else {
                        1.0
                    };
                    let desired = min_px + (max_px - min_px) * t;
                    let (weight, font_px) = labels::weight_and_size_for(desired, pen_px);
                    LabelCandidate {
                        node: i,
                        text: n.label.clone(),
                        x: n.pos.x,
                        y: n.pos.y,
                        node_radius: s.node_size_factor * n.size,
                        font_px,
                        weight,
                        width: brush.measure(&n.label, font_px),
                        height: brush.line_height(font_px),
                    }
                })
                .collect();

            let mut bitmap =
                CollisionBitmap::new(width, height, s.label_collision_resolution_max);
            let margin_px = mm_to_px(s.label_margin_mm, dpi);
            let kept = labels::select(
                &candidates,
                &mut bitmap,
                margin_px,
                s.label_with_node_circle,
                s.label_count,
            );
            self.memo.visible_labels =
                Some(kept.into_iter().map(|i| candidates[i].clone()).collect());
        }

        let visible = self
            .memo
            .visible_labels
            .as_ref()
            .ok_or_else(|| NetreelError::render("label selection missing after ensure"))?;
        let margin_px = mm_to_px(s.label_margin_mm, dpi);
        let border_px = mm_to_px(s.label_border_mm, dpi).max(0.0);
        let border_color = s.label_border_color.premul(1.0);

        for c in visible {
            let anchor = c.anchor(margin_px);
            if border_px > 0.0 {
                for (ox, oy) in [
                    (1.0, 0.0),
                    (-1.0, 0.0),
                    (0.0, 1.0),
                    (0.0, -1.0),
                    (0.7, 0.7),
                    (0.7, -0.7),
                    (-0.7, 0.7),
                    (-0.7, -0.7),
                ] {
                    let at = anchor + Vec2::new(ox, oy) * border_px;
                    brush.draw(layered, &c.text, c.font_px, at, border_color);
                }
            }
            let ink = color::label_color(nodes[c.node].color).premul(1.0);
            brush.draw(layered, &c.text, c.font_px, anchor, ink);
        }
        Ok(())
    }
}

fn extent(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in values {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if lo > hi { (0.0, 0.0) } else { (lo, hi) }
}

/// 5-tap weighted smoothing of per-point edge opacity, borders replicated.
fn smooth_opacity(values: &[f64]) -> Vec<f64> {
    const TAPS: [f64; 5] = [0.15, 0.25, 0.2, 0.25, 0.15];
    let n = values.len();
    (0..n)
        .map(|i| {
            TAPS.iter()
                .enumerate()
                .map(|(k, w)| {
                    let j = (i as isize + k as isize - 2).clamp(0, n as isize - 1) as usize;
                    w * values[j]
                })
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SnapshotNode;
    use crate::text::FixedAdvanceBrush;

    fn positioned(id: &str, x: f64, y: f64, size: f64) -> SnapshotNode {
        let mut n = SnapshotNode::new(id, id.to_uppercase());
        n.x = Some(x);
        n.y = Some(y);
        n.size = Some(size);
        n
    }

    fn snapshot(nodes: Vec<SnapshotNode>) -> Snapshot {
        Snapshot { start: 0.0, end: 1.0, nodes, edges: vec![] }
    }

    fn small_settings() -> RenderSettings {
        RenderSettings {
            image_width_mm: 40.0,
            image_height_mm: 40.0,
            rendering_dpi: 50.0,
            output_dpi: 50.0,
            margins: Margins::uniform(4.0),
            ..RenderSettings::default()
        }
    }

    #[test]
    fn unit_conversions_match_the_dpi() {
        assert!((mm_to_px(25.4, 100.0) - 100.000054).abs() < 1e-3);
        assert_eq!(pt_to_px(72.0, 96.0), 96.0);
    }

    #[test]
    fn smoothing_weights_sum_to_one_on_constant_input() {
        let out = smooth_opacity(&[0.5; 9]);
        for v in out {
            assert!((v - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn rescale_keeps_every_node_inside_the_drawable_rect() {
        let mut renderer = Renderer::new(small_settings());
        let snap = snapshot(vec![
            positioned("a", -500.0, -500.0, 10.0),
            positioned("b", 500.0, 400.0, 5.0),
            positioned("c", 20.0, -300.0, 1.0),
        ]);
        let dpi = renderer.settings.rendering_dpi;
        let width = mm_to_px(40.0, dpi).round() as u32;
        let nodes = renderer.prepare_nodes(&snap, width, width);

        let left = mm_to_px(4.0, dpi);
        let right = f64::from(width) - left;
        for n in &nodes {
            assert!(n.pos.x - n.size >= left - 1e-6, "node {} escapes left", n.id);
            assert!(n.pos.x + n.size <= right + 1e-6, "node {} escapes right", n.id);
            assert!(n.pos.y - n.size >= left - 1e-6);
            assert!(n.pos.y + n.size <= right + 1e-6);
        }
    }

    #[test]
    fn missing_positions_default_inside_the_seed_disc_deterministically() {
        let renderer = Renderer::new(small_settings());
        let snap = snapshot(vec![SnapshotNode::new("x", "X"), SnapshotNode::new("y", "Y")]);
        let nodes_a = renderer.prepare_nodes(&snap, 100, 100);
        let nodes_b = renderer.prepare_nodes(&snap, 100, 100);
        assert_eq!(nodes_a[0].pos, nodes_b[0].pos);
        assert_ne!(nodes_a[0].pos, nodes_a[1].pos);
    }

    #[test]
    fn render_twice_is_bit_identical() {
        let mut renderer = Renderer::new(small_settings());
        let snap = snapshot(vec![
            positioned("a", -10.0, 0.0, 4.0),
            positioned("b", 10.0, 0.0, 4.0),
        ]);
        let brush = FixedAdvanceBrush;
        let one = renderer.render(&snap, Some(&brush)).unwrap();
        let two = renderer.render(&snap, Some(&brush)).unwrap();
        assert_eq!(one.data, two.data);
        assert_eq!(one.width, two.width);
    }

    #[test]
    fn output_dpi_resamples_the_frame() {
        let mut renderer = Renderer::new(RenderSettings {
            output_dpi: 25.0,
            ..small_settings()
        });
        let snap = snapshot(vec![positioned("a", 0.0, 0.0, 4.0)]);
        let frame = renderer.render(&snap, None).unwrap();
        assert_eq!(frame.width, mm_to_px(40.0, 25.0).round() as u32);
    }

    #[test]
    fn flips_mirror_positions() {
        let mut settings = small_settings();
        settings.hillshade = false;
        let snap = snapshot(vec![
            positioned("l", -10.0, 0.0, 2.0),
            positioned("r", 10.0, 0.0, 2.0),
        ]);

        let plain = Renderer::new(settings.clone()).prepare_nodes(&snap, 100, 100);
        settings.flip_x = true;
        let flipped = Renderer::new(settings).prepare_nodes(&snap, 100, 100);

        assert!(plain[0].pos.x < plain[1].pos.x);
        assert!(flipped[0].pos.x > flipped[1].pos.x);
    }
}

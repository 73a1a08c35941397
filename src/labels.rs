use kurbo::Point;

/// Pen thickness per standard font weight, in hundredths of an em: the
/// stroke of a 400-weight glyph is roughly 0.07 em wide.
pub const WEIGHT_THICKNESS: [(u32, f64); 9] = [
    (100, 2.0),
    (200, 3.5),
    (300, 5.0),
    (400, 7.0),
    (500, 9.5),
    (600, 12.0),
    (700, 15.0),
    (800, 18.0),
    (900, 21.0),
];

/// Quantize a desired font size against a target pen thickness: each weight
/// implies the size at which its stroke matches `pen_px`; the weight whose
/// implied size is nearest `desired_px` wins and its size is used.
pub fn weight_and_size_for(desired_px: f64, pen_px: f64) -> (u32, f64) {
    let mut best = (400u32, desired_px);
    let mut best_gap = f64::INFINITY;
    for (weight, thickness) in WEIGHT_THICKNESS {
        let implied = pen_px * 100.0 / thickness;
        let gap = (implied - desired_px).abs();
        if gap < best_gap {
            best_gap = gap;
            best = (weight, implied);
        }
    }
    best
}

/// A label competing for screen space, in decreasing node-size order.
#[derive(Clone, Debug)]
pub struct LabelCandidate {
    pub node: usize,
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub node_radius: f64,
    pub font_px: f64,
    pub weight: u32,
    pub width: f64,
    pub height: f64,
}

impl LabelCandidate {
    /// Left end of the baseline: the text sits to the right of the node,
    /// vertically centered on it.
    pub fn anchor(&self, margin_px: f64) -> Point {
        Point::new(self.x + self.node_radius + margin_px, self.y + self.height * 0.35)
    }

    fn text_box(&self, margin_px: f64) -> (f64, f64, f64, f64) {
        let anchor = self.anchor(margin_px);
        (
            anchor.x - margin_px,
            self.y - self.height / 2.0 - margin_px,
            anchor.x + self.width + margin_px,
            self.y + self.height / 2.0 + margin_px,
        )
    }
}

/// One-bit collision mask at a capped resolution.
#[derive(Clone, Debug)]
pub struct CollisionBitmap {
    width: usize,
    height: usize,
    ratio: f64,
    bits: Vec<bool>,
}

impl CollisionBitmap {
    pub fn new(full_width: u32, full_height: u32, resolution_max: f64) -> Self {
        let full = f64::from(full_width) * f64::from(full_height);
        let ratio = if full > resolution_max && full > 0.0 {
            (resolution_max / full).sqrt()
        } else {
            1.0
        };
        let width = ((f64::from(full_width) * ratio).ceil() as usize).max(1);
        let height = ((f64::from(full_height) * ratio).ceil() as usize).max(1);
        Self { width, height, ratio, bits: vec![false; width * height] }
    }

    fn cell_range(&self, lo: f64, hi: f64, limit: usize) -> std::ops::RangeInclusive<usize> {
        let a = ((lo * self.ratio).floor() as isize).clamp(0, limit as isize - 1) as usize;
        let b = ((hi * self.ratio).ceil() as isize).clamp(0, limit as isize - 1) as usize;
        a..=b
    }

    fn rect_is_free(&self, x0: f64, y0: f64, x1: f64, y1: f64) -> bool {
        for y in self.cell_range(y0, y1, self.height) {
            for x in self.cell_range(x0, x1, self.width) {
                if self.bits[y * self.width + x] {
                    return false;
                }
            }
        }
        true
    }

    fn stamp_rect(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) {
        for y in self.cell_range(y0, y1, self.height) {
            for x in self.cell_range(x0, x1, self.width) {
                self.bits[y * self.width + x] = true;
            }
        }
    }

    fn disc_is_free(&self, cx: f64, cy: f64, r: f64) -> bool {
        for y in self.cell_range(cy - r, cy + r, self.height) {
            for x in self.cell_range(cx - r, cx + r, self.width) {
                let px = (x as f64 + 0.5) / self.ratio;
                let py = (y as f64 + 0.5) / self.ratio;
                if (px - cx).powi(2) + (py - cy).powi(2) <= r * r && self.bits[y * self.width + x] {
                    return false;
                }
            }
        }
        true
    }

    fn stamp_disc(&mut self, cx: f64, cy: f64, r: f64) {
        for y in self.cell_range(cy - r, cy + r, self.height) {
            for x in self.cell_range(cx - r, cx + r, self.width) {
                let px = (x as f64 + 0.5) / self.ratio;
                let py = (y as f64 + 0.5) / self.ratio;
                if (px - cx).powi(2) + (py - cy).powi(2) <= r * r {
                    self.bits[y * self.width + x] = true;
                }
            }
        }
    }
}

/// Greedily keep labels whose capsule (text box plus, optionally, the node
/// disc) touches no already-stamped pixel, stopping after `label_count`.
/// Returns indices into `candidates`, which must already be ordered by
/// decreasing node size (ties broken on x).
pub fn select(
    candidates: &[LabelCandidate],
    bitmap: &mut CollisionBitmap,
    margin_px: f64,
    with_node_circle: bool,
    label_count: usize,
) -> Vec<usize> {
    let mut kept = Vec::new();
    for (i, c) in candidates.iter().enumerate() {
        if kept.len() >= label_count {
            break;
        }
        let (x0, y0, x1, y1) = c.text_box(margin_px);
        let circle_r = c.node_radius + margin_px;

        let free = bitmap.rect_is_free(x0, y0, x1, y1)
            && (!with_node_circle || bitmap.disc_is_free(c.x, c.y, circle_r));
        if !free {
            continue;
        }

        bitmap.stamp_rect(x0, y0, x1, y1);
        if with_node_circle {
            bitmap.stamp_disc(c.x, c.y, circle_r);
        }
        kept.push(i);
    }
    kept
}

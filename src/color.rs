/// Plain sRGB color as stored on graph nodes and in render settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const WHITE: Rgb = Rgb([255, 255, 255]);
    pub const BLACK: Rgb = Rgb([0, 0, 0]);

    /// Fallback for nodes without a declared color.
    pub const NEUTRAL_GRAY: Rgb = Rgb([110, 110, 110]);

    /// Premultiplied RGBA8 at the given opacity.
    pub fn premul(self, alpha: f64) -> [u8; 4] {
        let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u16;
        let [r, g, b] = self.0;
        [
            ((u16::from(r) * a + 127) / 255) as u8,
            ((u16::from(g) * a + 127) / 255) as u8,
            ((u16::from(b) * a + 127) / 255) as u8,
            a as u8,
        ]
    }

    /// Mix two colors channel-wise, `t` in [0, 1] toward `other`.
    pub fn mix(self, other: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let lerp = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
        Rgb([
            lerp(self.0[0], other.0[0]),
            lerp(self.0[1], other.0[1]),
            lerp(self.0[2], other.0[2]),
        ])
    }
}

/// Derive a label ink color from a node color: same hue, but with chroma
/// clamped to [0, 70] and lightness to [2, 50] so text stays readable on a
/// light background.
pub fn label_color(c: Rgb) -> Rgb {
    let (l, ch, h) = rgb_to_lch(c);
    lch_to_rgb(l.clamp(2.0, 50.0), ch.clamp(0.0, 70.0), h)
}

/// Hillshade alpha from a Lambert reflectance value.
pub fn reflectance_alpha(l: f64) -> f64 {
    (0.2 + 0.8 * (1.4 * l).min(1.0)).max(0.0).powf(0.6)
}

/// Height-keyed color ramp. Stops are (t in [0,1], color), sorted by t.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ColorRamp {
    pub stops: Vec<(f64, Rgb)>,
}

impl ColorRamp {
    /// Terrain-like ramp used for the hypsometric background layer.
    pub fn hypsometric() -> Self {
        Self {
            stops: vec![
                (0.0, Rgb([243, 240, 233])),
                (0.25, Rgb([219, 223, 202])),
                (0.5, Rgb([189, 204, 170])),
                (0.75, Rgb([157, 175, 140])),
                (1.0, Rgb([126, 142, 114])),
            ],
        }
    }

    pub fn sample(&self, t: f64) -> Rgb {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let Some(first) = self.stops.first() else {
            return Rgb::WHITE;
        };
        if t <= first.0 {
            return first.1;
        }
        for pair in self.stops.windows(2) {
            let (t0, c0) = pair[0];
            let (t1, c1) = pair[1];
            if t <= t1 {
                let span = t1 - t0;
                let local = if span > 0.0 { (t - t0) / span } else { 1.0 };
                return c0.mix(c1, local);
            }
        }
        self.stops[self.stops.len() - 1].1
    }
}

// sRGB <-> CIE LCh(ab), D65 white point.

const WHITE_X: f64 = 0.95047;
const WHITE_Y: f64 = 1.0;
const WHITE_Z: f64 = 1.08883;

fn srgb_to_linear(c: u8) -> f64 {
    let c = f64::from(c) / 255.0;
    if c <= 0.04045 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) }
}

fn linear_to_srgb(c: f64) -> u8 {
    let c = c.clamp(0.0, 1.0);
    let c = if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (c * 255.0).round() as u8
}

fn lab_f(t: f64) -> f64 {
    const EPS: f64 = 216.0 / 24389.0;
    const KAPPA: f64 = 24389.0 / 27.0;
    if t > EPS { t.cbrt() } else { (KAPPA * t + 16.0) / 116.0 }
}

fn lab_f_inv(t: f64) -> f64 {
    const EPS: f64 = 6.0 / 29.0;
    if t > EPS { t * t * t } else { 3.0 * EPS * EPS * (t - 4.0 / 29.0) }
}

/// (lightness, chroma, hue in radians)
pub fn rgb_to_lch(c: Rgb) -> (f64, f64, f64) {
    let r = srgb_to_linear(c.0[0]);
    let g = srgb_to_linear(c.0[1]);
    let b = srgb_to_linear(c.0[2]);

    let x = 0.4124 * r + 0.3576 * g + 0.1805 * b;
    let y = 0.2126 * r + 0.7152 * g + 0.0722 * b;
    let z = 0.0193 * r + 0.1192 * g + 0.9505 * b;

    let fx = lab_f(x / WHITE_X);
    let fy = lab_f(y / WHITE_Y);
    let fz = lab_f(z / WHITE_Z);

    let l = 116.0 * fy - 16.0;
    let a = 500.0 * (fx - fy);
    let bb = 200.0 * (fy - fz);

    (l, (a * a + bb * bb).sqrt(), bb.atan2(a))
}

pub fn lch_to_rgb(l: f64, chroma: f64, hue: f64) -> Rgb {
    let a = chroma * hue.cos();
    let bb = chroma * hue.sin();

    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - bb / 200.0;

    let x = lab_f_inv(fx) * WHITE_X;
    let y = lab_f_inv(fy) * WHITE_Y;
    let z = lab_f_inv(fz) * WHITE_Z;

    let r = 3.2406 * x - 1.5372 * y - 0.4986 * z;
    let g = -0.9689 * x + 1.8758 * y + 0.0415 * z;
    let b = 0.0557 * x - 0.2040 * y + 1.0570 * z;

    Rgb([linear_to_srgb(r), linear_to_srgb(g), linear_to_srgb(b)])
}

use crate::types::*;
use std::collections::HashMap;
use tracing::debug;

/// Normalizes per-type activity and maps it to display colors.
pub struct ActivityColorMapper;

impl ActivityColorMapper {
    /// Activity is the type-specific degree already computed by the
    /// degree pass: tx count for blocks, input+output count for
    /// transactions, UTxO activity for addresses. Normalization is
    /// min-max scaled independently within each node-type group.
    pub fn compute(degrees: &[DegreeEntry], scheme: ColorScheme) -> Vec<ActivityEntry> {
        let mut bounds: HashMap<NodeKind, (f64, f64)> = HashMap::new();
        for entry in degrees {
            let raw = entry.type_degree as f64;
            let (min, max) = bounds.entry(entry.node_type).or_insert((raw, raw));
            *min = min.min(raw);
            *max = max.max(raw);
        }

        let entries: Vec<ActivityEntry> = degrees
            .iter()
            .map(|entry| {
                let raw = entry.type_degree as f64;
                let (min, max) = bounds[&entry.node_type];
                // All values identical: pin the whole group to the
                // midpoint instead of implying variation (and instead
                // of dividing by zero).
                let normalized = if max == min {
                    50.0
                } else {
                    (raw - min) / (max - min) * 100.0
                };
                let (h, s, l) = map_color_scheme(normalized, scheme);
                let (r, g, b) = hsl_to_rgb(h, s, l);
                ActivityEntry {
                    node_id: entry.node_id.clone(),
                    node_type: entry.node_type,
                    raw_value: raw,
                    normalized_value: normalized,
                    color_hex: rgb_to_hex(r, g, b),
                }
            })
            .collect();

        debug!(nodes = entries.len(), ?scheme, "activity metrics computed");
        entries
    }
}

/// Map a normalized activity value (0-100) to HSL under the scheme.
pub fn map_color_scheme(normalized: f64, scheme: ColorScheme) -> (f64, f64, f64) {
    let n = normalized.clamp(0.0, 100.0);
    match scheme {
        // Red (low) -> yellow -> green (high)
        ColorScheme::Heatmap => (n * 1.2, 100.0, 50.0),
        // Blue (low) -> purple -> red (high)
        ColorScheme::Activity => {
            let mut hue = 240.0 - n * 2.4;
            if hue < 0.0 {
                hue += 360.0;
            }
            (hue, 70.0 + n * 0.3, 50.0 - n * 0.15)
        }
        // Black (low) -> white (high); hue is irrelevant
        ColorScheme::Grayscale => (0.0, 0.0, n),
    }
}

/// Standard sector-based HSL -> RGB conversion.
/// h in degrees, s and l in percent.
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    let h = h.rem_euclid(360.0);
    let s = (s / 100.0).clamp(0.0, 1.0);
    let l = (l / 100.0).clamp(0.0, 1.0);

    let chroma = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let h_prime = h / 60.0;
    let x = chroma * (1.0 - (h_prime % 2.0 - 1.0).abs());
    let (r1, g1, b1) = match h_prime as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = l - chroma / 2.0;
    let to_byte = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (to_byte(r1), to_byte(g1), to_byte(b1))
}

pub fn rgb_to_hex(r: u8, g: u8, b: u8) -> String {
    format!("#{r:02X}{g:02X}{b:02X}")
}

//! View modes and overlay coloring.

use laguna_scene::Color;

/// Which overlay the parcels show.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ViewMode {
    /// Owner colors plus owner indicators.
    #[default]
    Land,
    /// Income gradient.
    Income,
    /// Buildings are the focus; parcel overlays are skipped.
    Buildings,
    /// Citizens are the focus; parcel overlays are skipped.
    Citizens,
}

impl ViewMode {
    pub fn shows_overlay(self) -> bool {
        matches!(self, ViewMode::Land | ViewMode::Income)
    }

    pub fn shows_indicators(self) -> bool {
        self == ViewMode::Land
    }
}

pub const SELECTION_COLOR: Color = Color::rgb(1.0, 0.84, 0.0);
pub const HOVER_COLOR: Color = Color::rgb(0.6, 0.85, 1.0);

const INCOME_LOW: Color = Color::from_hex(0x2c7bb6);
const INCOME_MID: Color = Color::from_hex(0xffffbf);
const INCOME_HIGH: Color = Color::from_hex(0xd7191c);

/// Three-stop gradient over the live `[min, max]` income range.
pub fn income_color(income: f64, min: f64, max: f64) -> Color {
    let span = max - min;
    let t = if span.is_finite() && span > f64::EPSILON {
        ((income - min) / span).clamp(0.0, 1.0) as f32
    } else {
        0.5
    };
    if t < 0.5 {
        INCOME_LOW.lerp(INCOME_MID, t * 2.0)
    } else {
        INCOME_MID.lerp(INCOME_HIGH, (t - 0.5) * 2.0)
    }
}

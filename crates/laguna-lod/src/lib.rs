//! Level-of-detail management: distance-based detail selection, throttled
//! recomputation, and polygon simplification.

mod controller;
mod simplify;

pub use controller::{LodBreakpoint, LodController, LodError, LodTable};
pub use simplify::{MIN_POINTS, UNIFORM_DECIMATION_RATIO, douglas_peucker, simplify, uniform_decimate};

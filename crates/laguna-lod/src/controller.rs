//! Distance-based detail selection with a throttled update clock.

use std::time::{Duration, Instant};

use glam::Vec3;

/// Errors from building a breakpoint table.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LodError {
    #[error("breakpoint table is empty")]
    Empty,
    #[error("breakpoint distances must be strictly increasing (at index {0})")]
    NotIncreasing(usize),
    #[error("reduction {value} at index {index} is outside (0, 1]")]
    ReductionOutOfRange { index: usize, value: f32 },
    #[error("reductions must not increase with distance (at index {0})")]
    ReductionIncreases(usize),
}

/// One row of the table: everything closer than `max_distance` gets `reduction`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodBreakpoint {
    pub max_distance: f32,
    pub reduction: f32,
}

impl LodBreakpoint {
    pub const fn new(max_distance: f32, reduction: f32) -> Self {
        Self {
            max_distance,
            reduction,
        }
    }
}

/// Ascending breakpoint table.
///
/// Distances strictly increase and reductions never increase, so detail is
/// monotonically non-increasing with distance.
#[derive(Clone, Debug, PartialEq)]
pub struct LodTable {
    breakpoints: Vec<LodBreakpoint>,
}

impl LodTable {
    /// Validate and build a table.
    pub fn new(breakpoints: Vec<LodBreakpoint>) -> Result<Self, LodError> {
        if breakpoints.is_empty() {
            return Err(LodError::Empty);
        }
        for (i, bp) in breakpoints.iter().enumerate() {
            if !(bp.reduction > 0.0 && bp.reduction <= 1.0) {
                return Err(LodError::ReductionOutOfRange {
                    index: i,
                    value: bp.reduction,
                });
            }
            if i > 0 {
                let prev = breakpoints[i - 1];
                if bp.max_distance.is_nan() || bp.max_distance <= prev.max_distance {
                    return Err(LodError::NotIncreasing(i));
                }
                if bp.reduction > prev.reduction {
                    return Err(LodError::ReductionIncreases(i));
                }
            }
        }
        Ok(Self { breakpoints })
    }

    /// Reduction for a distance: the first breakpoint whose bound exceeds it,
    /// or the last breakpoint beyond the table.
    pub fn reduction_at(&self, distance: f32) -> f32 {
        for bp in &self.breakpoints {
            if distance < bp.max_distance {
                return bp.reduction;
            }
        }
        self.breakpoints
            .last()
            .map(|bp| bp.reduction)
            .unwrap_or(1.0)
    }

    pub fn breakpoints(&self) -> &[LodBreakpoint] {
        &self.breakpoints
    }
}

impl Default for LodTable {
    /// 10/30/60/100/inf scene units map to 1.0/0.75/0.5/0.25/0.1.
    fn default() -> Self {
        Self {
            breakpoints: vec![
                LodBreakpoint::new(10.0, 1.0),
                LodBreakpoint::new(30.0, 0.75),
                LodBreakpoint::new(60.0, 0.5),
                LodBreakpoint::new(100.0, 0.25),
                LodBreakpoint::new(f32::INFINITY, 0.1),
            ],
        }
    }
}

/// Tracks the camera and answers detail queries.
#[derive(Clone, Debug)]
pub struct LodController {
    table: LodTable,
    camera: Vec3,
    update_interval: Duration,
    last_update: Option<Instant>,
    base_epsilon: f32,
}

impl LodController {
    pub fn new(table: LodTable, update_interval: Duration, base_epsilon: f32) -> Self {
        Self {
            table,
            camera: Vec3::ZERO,
            update_interval,
            last_update: None,
            base_epsilon,
        }
    }

    pub fn set_camera(&mut self, position: Vec3) {
        self.camera = position;
    }

    pub fn camera(&self) -> Vec3 {
        self.camera
    }

    /// Detail multiplier in `(0, 1]` for a scene position.
    pub fn detail_level(&self, position: Vec3) -> f32 {
        let distance = self.camera.distance(position);
        if distance.is_nan() {
            return self.table.reduction_at(f32::INFINITY);
        }
        self.table.reduction_at(distance)
    }

    /// Douglas-Peucker tolerance for a detail level, inversely proportional to it.
    pub fn epsilon_for(&self, detail: f32) -> f32 {
        self.base_epsilon / detail.max(f32::EPSILON)
    }

    /// Simplify a ring for the given detail level.
    pub fn simplify(&self, points: &[glam::Vec2], detail: f32) -> Vec<glam::Vec2> {
        crate::simplify::simplify(points, detail, self.epsilon_for(detail))
    }

    /// Returns `true` at most once per update interval. The first call always
    /// returns `true`.
    pub fn should_update(&mut self, now: Instant) -> bool {
        match self.last_update {
            Some(last) if now.saturating_duration_since(last) < self.update_interval => false,
            _ => {
                self.last_update = Some(now);
                true
            }
        }
    }

    pub fn table(&self) -> &LodTable {
        &self.table
    }
}

impl Default for LodController {
    fn default() -> Self {
        Self::new(LodTable::default(), Duration::from_millis(500), 0.05)
    }
}

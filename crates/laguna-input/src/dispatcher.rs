//! Throttled pointer dispatch with drag detection and self-protection.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use glam::Vec2;
use laguna_scene::{EntityId, MeshRegistry, Scene};
use thiserror::Error;

use crate::camera::Camera;
use crate::picking::{Hit, Picker};

/// Failure reported by an [`InteractionHandler`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HandlerError {
    #[error("handler failed: {0}")]
    Failed(String),
}

/// Receives hover and click notifications.
pub trait InteractionHandler {
    /// Called when the hovered entity changes.
    fn on_hover(&mut self, hit: Option<&Hit>) -> Result<(), HandlerError>;

    /// Called for a press and release without a drag in between.
    fn on_click(&mut self, hit: Option<&Hit>) -> Result<(), HandlerError>;
}

/// Raw pointer input in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Down { pos: Vec2, at: Instant },
    Move { pos: Vec2, at: Instant },
    Up { pos: Vec2, at: Instant },
}

impl PointerEvent {
    pub fn at(&self) -> Instant {
        match *self {
            PointerEvent::Down { at, .. } | PointerEvent::Move { at, .. } | PointerEvent::Up { at, .. } => at,
        }
    }

    pub fn pos(&self) -> Vec2 {
        match *self {
            PointerEvent::Down { pos, .. } | PointerEvent::Move { pos, .. } | PointerEvent::Up { pos, .. } => {
                pos
            }
        }
    }
}

/// What the dispatcher did with one event.
#[derive(Clone, Debug, PartialEq)]
pub enum InteractionOutcome {
    /// Consumed without notifying the handler.
    Ignored,
    /// Dropped by a throttle.
    Throttled,
    /// Dropped because the dispatcher is cooling down.
    Disabled,
    /// Hover target after a hit test.
    Hover(Option<EntityId>),
    Click(Option<Hit>),
    DragStarted,
    DragEnded,
}

/// Dispatcher tuning.
#[derive(Clone, Debug, PartialEq)]
pub struct DispatcherConfig {
    pub move_throttle: Duration,
    pub click_throttle: Duration,
    /// Pointer travel in pixels that turns a press into a drag.
    pub drag_threshold: f32,
    pub pick_tolerance: f32,
    /// Tolerance multiplier for the second picking pass.
    pub tolerance_multiplier: f32,
    /// Handler failures within `error_window` that disable the dispatcher.
    pub error_limit: usize,
    pub error_window: Duration,
    pub cooldown: Duration,
}

impl DispatcherConfig {
    /// Hit tests run at half the move rate.
    pub fn hover_interval(&self) -> Duration {
        self.move_throttle * 2
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            move_throttle: Duration::from_millis(16),
            click_throttle: Duration::from_millis(100),
            drag_threshold: 5.0,
            pick_tolerance: 0.25,
            tolerance_multiplier: 4.0,
            error_limit: 5,
            error_window: Duration::from_secs(10),
            cooldown: Duration::from_secs(5),
        }
    }
}

/// Read-only view of what can be picked.
pub struct PickContext<'a> {
    pub camera: &'a Camera,
    pub scene: &'a Scene,
    pub registries: &'a [&'a dyn MeshRegistry],
}

/// Lifetime counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    pub hit_tests: u64,
    pub handler_errors: u64,
    pub disables: u64,
}

#[derive(Clone, Copy, Debug)]
struct Press {
    origin: Vec2,
    dragging: bool,
}

/// Throttle gate: passes once per `interval`.
fn gate(last: &mut Option<Instant>, now: Instant, interval: Duration) -> bool {
    if last.is_some_and(|t| now.saturating_duration_since(t) < interval) {
        return false;
    }
    *last = Some(now);
    true
}

pub struct InteractionDispatcher {
    config: DispatcherConfig,
    picker: Picker,
    last_move: Option<Instant>,
    last_hit_test: Option<Instant>,
    last_click: Option<Instant>,
    press: Option<Press>,
    hovered: Option<EntityId>,
    errors: VecDeque<Instant>,
    disabled_until: Option<Instant>,
    stats: DispatcherStats,
}

impl InteractionDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        let picker = Picker::new(config.pick_tolerance);
        Self {
            config,
            picker,
            last_move: None,
            last_hit_test: None,
            last_click: None,
            press: None,
            hovered: None,
            errors: VecDeque::new(),
            disabled_until: None,
            stats: DispatcherStats::default(),
        }
    }

    /// Route one pointer event.
    pub fn handle(
        &mut self,
        event: PointerEvent,
        cx: &PickContext<'_>,
        handler: &mut dyn InteractionHandler,
    ) -> InteractionOutcome {
        let at = event.at();
        if self.is_disabled(at) {
            return InteractionOutcome::Disabled;
        }
        match event {
            PointerEvent::Down { pos, .. } => {
                self.press = Some(Press {
                    origin: pos,
                    dragging: false,
                });
                InteractionOutcome::Ignored
            }
            PointerEvent::Move { pos, at } => self.on_move(pos, at, cx, handler),
            PointerEvent::Up { pos, at } => self.on_up(pos, at, cx, handler),
        }
    }

    fn on_move(
        &mut self,
        pos: Vec2,
        at: Instant,
        cx: &PickContext<'_>,
        handler: &mut dyn InteractionHandler,
    ) -> InteractionOutcome {
        if let Some(press) = &mut self.press {
            if press.dragging {
                return InteractionOutcome::Ignored;
            }
            if press.origin.distance(pos) > self.config.drag_threshold {
                press.dragging = true;
                tracing::trace!("Drag started");
                return InteractionOutcome::DragStarted;
            }
        }

        if !gate(&mut self.last_move, at, self.config.move_throttle) {
            return InteractionOutcome::Throttled;
        }
        if !gate(&mut self.last_hit_test, at, self.config.hover_interval()) {
            return InteractionOutcome::Throttled;
        }

        let hit = self.pick(pos, cx);
        let target = hit.as_ref().map(|h| h.entity.clone());
        if target != self.hovered {
            self.hovered = target.clone();
            if let Err(error) = handler.on_hover(hit.as_ref()) {
                self.record_error(at, &error);
            }
        }
        InteractionOutcome::Hover(target)
    }

    fn on_up(
        &mut self,
        pos: Vec2,
        at: Instant,
        cx: &PickContext<'_>,
        handler: &mut dyn InteractionHandler,
    ) -> InteractionOutcome {
        if let Some(press) = self.press.take()
            && (press.dragging || press.origin.distance(pos) > self.config.drag_threshold)
        {
            tracing::trace!("Drag ended");
            return InteractionOutcome::DragEnded;
        }
        if !gate(&mut self.last_click, at, self.config.click_throttle) {
            return InteractionOutcome::Throttled;
        }

        let hit = self.pick(pos, cx);
        if let Err(error) = handler.on_click(hit.as_ref()) {
            self.record_error(at, &error);
        }
        InteractionOutcome::Click(hit)
    }

    fn pick(&mut self, pos: Vec2, cx: &PickContext<'_>) -> Option<Hit> {
        self.stats.hit_tests += 1;
        let ray = cx.camera.screen_ray(pos);
        self.picker
            .pick_two_pass(&ray, cx.scene, cx.registries, self.config.tolerance_multiplier)
    }

    fn record_error(&mut self, at: Instant, error: &HandlerError) {
        self.stats.handler_errors += 1;
        tracing::warn!(error = %error, "Interaction handler failed");

        while self
            .errors
            .front()
            .is_some_and(|t| at.saturating_duration_since(*t) > self.config.error_window)
        {
            self.errors.pop_front();
        }
        self.errors.push_back(at);

        if self.errors.len() >= self.config.error_limit {
            self.disabled_until = Some(at + self.config.cooldown);
            self.errors.clear();
            self.press = None;
            self.stats.disables += 1;
            tracing::info!(cooldown = ?self.config.cooldown, "Interaction disabled after repeated handler failures");
        }
    }

    /// Whether events at `now` are dropped. Re-enables once the cooldown has
    /// passed.
    pub fn is_disabled(&mut self, now: Instant) -> bool {
        match self.disabled_until {
            Some(until) if now < until => true,
            Some(_) => {
                self.disabled_until = None;
                tracing::info!("Interaction re-enabled");
                false
            }
            None => false,
        }
    }

    pub fn hovered(&self) -> Option<&EntityId> {
        self.hovered.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.press.is_some_and(|p| p.dragging)
    }

    pub fn picker(&self) -> &Picker {
        &self.picker
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn stats(&self) -> DispatcherStats {
        self.stats
    }
}

impl Default for InteractionDispatcher {
    fn default() -> Self {
        Self::new(DispatcherConfig::default())
    }
}

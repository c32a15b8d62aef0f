//! Click-vs-drag disambiguation and camera navigation.
//!
//! ```text
//! Idle --press (can drag)--> PendingClick --moved >= threshold--> Dragging
//!   ^                              |                                  |
//!   +------- release / leave ------+----------------------------------+
//! ```
//!
//! Any movement while pressed pans the camera, even before the threshold
//! is crossed. A release from `PendingClick` is a click; a release or leave
//! from `Dragging` ends the drag.

use crate::camera::{Camera, ViewportFrame};
use crate::config::ViewportConfig;
use crate::input::{KeyCommand, PointerIntent};
use kurbo::{Point, Vec2};

/// Notifications produced by the gesture controller.
///
/// Positions are local coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    MouseDown(Point),
    /// Pointer moved while no gesture was active.
    MouseMoving(Point),
    MouseUp(Point),
    Click(Point),
    DragThresholdStart,
    DragThresholdStop,
    CameraChanged,
}

/// Where the current gesture stands.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    /// Pressed, not yet moved past the click threshold.
    PendingClick { down_pointer: Point, down_local: Point },
    /// Moved past the click threshold; release will not click.
    Dragging { down_pointer: Point, down_local: Point },
}

impl GestureState {
    fn anchor(&self) -> Option<(Point, Point)> {
        match *self {
            GestureState::Idle => None,
            GestureState::PendingClick { down_pointer, down_local }
            | GestureState::Dragging { down_pointer, down_local } => Some((down_pointer, down_local)),
        }
    }
}

/// State the controller borrows from its owner for one input event.
pub struct GestureContext<'a> {
    pub camera: &'a mut Camera,
    pub frame: &'a ViewportFrame,
    pub config: &'a ViewportConfig,
    /// Whether a press at the given local position may start a gesture.
    pub can_drag: &'a mut dyn FnMut(Point) -> bool,
}

impl GestureContext<'_> {
    fn to_local(&self, global: Point) -> Point {
        self.camera.to_local(self.frame, global)
    }
}

/// Turns pointer intents into gesture events and camera movement.
#[derive(Debug, Clone, Default)]
pub struct GestureController {
    state: GestureState,
    /// Global position of the last valid press, kept even if no gesture started.
    press_pointer: Option<Point>,
    /// Last known global pointer position.
    last_pointer: Option<Point>,
    /// Local position of the last hover movement.
    last_local: Point,
}

impl GestureController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, GestureState::Dragging { .. })
    }

    pub fn last_pointer(&self) -> Option<Point> {
        self.last_pointer
    }

    pub fn last_local(&self) -> Point {
        self.last_local
    }

    /// Process one intent.
    pub fn handle(&mut self, intent: PointerIntent, ctx: &mut GestureContext<'_>, events: &mut Vec<GestureEvent>) {
        match intent {
            PointerIntent::Press(position) => self.press(position, ctx, events),
            PointerIntent::Move(position) => self.move_to(position, ctx, events),
            PointerIntent::Release(position) => self.release(position, ctx, events),
            PointerIntent::Leave => self.stop(events),
            PointerIntent::Regrip(position) => self.regrip(position, ctx, events),
            PointerIntent::Zoom { anchor, amount } => {
                ctx.camera.zoom_about(ctx.frame, anchor, amount, ctx.config);
                events.push(GestureEvent::CameraChanged);
            }
            PointerIntent::Pan(delta) => {
                ctx.camera.pan(delta);
                events.push(GestureEvent::CameraChanged);
            }
        }
    }

    /// Process a keyboard command. History commands are not handled here.
    pub fn key(&mut self, command: KeyCommand, ctx: &mut GestureContext<'_>, events: &mut Vec<GestureEvent>) {
        match command {
            KeyCommand::Pan(direction) => {
                let delta: Vec2 = direction * (ctx.config.key_move_speed / ctx.camera.scale);
                self.handle(PointerIntent::Pan(delta), ctx, events);
                // Keep hover/drag state in step with what is now under the pointer.
                if let Some(pointer) = self.last_pointer {
                    self.handle(PointerIntent::Move(pointer), ctx, events);
                }
            }
            KeyCommand::Zoom(direction) => {
                let anchor = self.last_pointer.unwrap_or_else(|| ctx.frame.center());
                let amount = direction * ctx.config.key_zoom_speed;
                self.handle(PointerIntent::Zoom { anchor, amount }, ctx, events);
            }
            KeyCommand::Click => {
                if let Some(pointer) = self.last_pointer {
                    self.handle(PointerIntent::Press(pointer), ctx, events);
                    self.handle(PointerIntent::Release(pointer), ctx, events);
                }
            }
            KeyCommand::Undo | KeyCommand::Redo => {}
        }
    }

    fn press(&mut self, position: Point, ctx: &mut GestureContext<'_>, events: &mut Vec<GestureEvent>) {
        let local = ctx.to_local(position);
        self.press_pointer = Some(position);
        self.last_pointer = Some(position);
        if (ctx.can_drag)(local) {
            self.state = GestureState::PendingClick {
                down_pointer: position,
                down_local: local,
            };
        }
        events.push(GestureEvent::MouseDown(local));
    }

    fn move_to(&mut self, position: Point, ctx: &mut GestureContext<'_>, events: &mut Vec<GestureEvent>) {
        self.last_pointer = Some(position);
        let local = ctx.to_local(position);

        let Some((down_pointer, down_local)) = self.state.anchor() else {
            self.last_local = local;
            events.push(GestureEvent::MouseMoving(local));
            return;
        };

        // Pan so the local point grabbed at press time is back under the pointer.
        let delta = local - down_local;
        if delta != Vec2::ZERO {
            ctx.camera.pan(delta);
            events.push(GestureEvent::CameraChanged);
        }

        let exceeded = (position - down_pointer).hypot() >= ctx.config.click_distance_threshold;
        if exceeded && matches!(self.state, GestureState::PendingClick { .. }) {
            self.state = GestureState::Dragging { down_pointer, down_local };
            events.push(GestureEvent::DragThresholdStart);
        }
    }

    fn release(&mut self, position: Point, ctx: &mut GestureContext<'_>, events: &mut Vec<GestureEvent>) {
        if self.state.anchor().is_some() && self.last_pointer != Some(position) {
            self.move_to(position, ctx, events);
        }

        let local = ctx.to_local(position);
        let was_pending = matches!(self.state, GestureState::PendingClick { .. });
        self.stop(events);

        let moved_far = self
            .press_pointer
            .take()
            .is_none_or(|down| (position - down).hypot() >= ctx.config.click_distance_threshold);
        if was_pending && !moved_far {
            events.push(GestureEvent::Click(local));
        }
        events.push(GestureEvent::MouseUp(local));
    }

    /// End the current gesture without clicking.
    fn stop(&mut self, events: &mut Vec<GestureEvent>) {
        if self.is_dragging() {
            events.push(GestureEvent::DragThresholdStop);
        }
        self.state = GestureState::Idle;
    }

    /// Re-anchor the gesture at a new touch centroid and rule out a click.
    ///
    /// Without a gesture in progress this only tracks the pointer; a regrip
    /// never starts a gesture of its own.
    fn regrip(&mut self, position: Point, ctx: &mut GestureContext<'_>, events: &mut Vec<GestureEvent>) {
        if self.state == GestureState::Idle {
            self.last_pointer = Some(position);
            self.last_local = ctx.to_local(position);
            return;
        }

        let local = ctx.to_local(position);
        let was_dragging = self.is_dragging();
        self.press_pointer = Some(position);
        self.last_pointer = Some(position);
        self.state = GestureState::Dragging {
            down_pointer: position,
            down_local: local,
        };
        if !was_dragging {
            events.push(GestureEvent::DragThresholdStart);
        }
    }
}

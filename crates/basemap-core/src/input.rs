//! Normalized mouse/touch/keyboard input.
//!
//! Hosts translate their native events into the types here. Mouse, touch
//! and keyboard all reduce to [`PointerIntent`]s, which the gesture
//! controller consumes.

use crate::element::ElementId;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

/// What the pointer was over when the event was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputTarget {
    /// The map surface itself.
    Surface,
    /// A tracked element that may intercept input.
    Element(ElementId),
}

/// A mouse button or movement event in global coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MouseInput {
    pub position: Point,
    pub button: MouseButton,
    pub target: InputTarget,
}

impl MouseInput {
    /// Primary-button event raised on the surface itself.
    pub fn on_surface(position: Point) -> Self {
        Self {
            position,
            button: MouseButton::Left,
            target: InputTarget::Surface,
        }
    }

    /// Only primary-button presses on the surface start or end a gesture.
    pub fn is_valid_press(&self) -> bool {
        self.button == MouseButton::Left && self.target == InputTarget::Surface
    }
}

/// A scroll wheel event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelInput {
    pub position: Point,
    pub delta_y: f64,
    pub target: InputTarget,
    /// Whether the target scrolls its own content.
    pub target_scrollable: bool,
}

impl WheelInput {
    /// Scrolling over an element with its own scrollbar scrolls that element instead.
    pub fn zooms_map(&self) -> bool {
        self.target == InputTarget::Surface || !self.target_scrollable
    }
}

/// The active touches of a touch event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchInput {
    pub touches: Vec<Point>,
    pub target: InputTarget,
}

impl TouchInput {
    pub fn on_surface(touches: Vec<Point>) -> Self {
        Self {
            touches,
            target: InputTarget::Surface,
        }
    }

    /// Touches that start on a tracked element belong to that element.
    pub fn is_on_surface(&self) -> bool {
        self.target == InputTarget::Surface
    }

    /// Mean position of the active touches.
    pub fn centroid(&self) -> Option<Point> {
        if self.touches.is_empty() {
            return None;
        }
        let sum = self
            .touches
            .iter()
            .fold(Vec2::ZERO, |acc, p| acc + p.to_vec2());
        Some((sum / self.touches.len() as f64).to_point())
    }

    /// Distance between the first two touches.
    pub fn spread(&self) -> Option<f64> {
        match self.touches.as_slice() {
            [a, b, ..] => Some(a.distance(*b)),
            _ => None,
        }
    }
}

/// A key press, using DOM-style key names (`"ArrowLeft"`, `"a"`, `"Enter"`, `" "`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInput {
    pub key: String,
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl KeyInput {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_ctrl(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            modifiers: Modifiers {
                ctrl: true,
                ..Modifiers::default()
            },
        }
    }
}

/// Keyboard commands understood by the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyCommand {
    /// Pan by a unit vector; opposing keys cancel, orthogonal keys combine.
    Pan(Vec2),
    /// Zoom about the last pointer position. `1.0` zooms out, `-1.0` zooms in.
    Zoom(f64),
    /// Click at the last pointer position.
    Click,
    Undo,
    Redo,
}

impl KeyCommand {
    /// Map a key press to commands.
    pub fn parse(input: &KeyInput) -> Vec<KeyCommand> {
        let key = input.key.to_ascii_lowercase();
        let mods = input.modifiers;
        if mods.ctrl || mods.meta {
            return match key.as_str() {
                "z" => vec![KeyCommand::Undo],
                "y" => vec![KeyCommand::Redo],
                _ => Vec::new(),
            };
        }

        let mut commands = Vec::new();
        match key.as_str() {
            "enter" | " " | "spacebar" => commands.push(KeyCommand::Click),
            "q" => commands.push(KeyCommand::Zoom(1.0)),
            "e" => commands.push(KeyCommand::Zoom(-1.0)),
            _ => {}
        }

        let held = |names: &[&str]| -> f64 {
            if names.contains(&key.as_str()) { 1.0 } else { 0.0 }
        };
        // Moving "left" slides the map right, revealing what is to the left.
        let pan = Vec2::new(
            held(&["arrowleft", "a"]) - held(&["arrowright", "d"]),
            held(&["arrowup", "w"]) - held(&["arrowdown", "s"]),
        );
        if pan != Vec2::ZERO {
            commands.push(KeyCommand::Pan(pan));
        }
        commands
    }
}

/// The single input vocabulary of the gesture controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerIntent {
    /// Primary press on the surface, in global coordinates.
    Press(Point),
    Move(Point),
    /// Primary release on the surface.
    Release(Point),
    /// The pointer left the surface.
    Leave,
    /// The number of touching fingers changed mid-gesture.
    Regrip(Point),
    /// Zoom about a global anchor by an amount (positive zooms out).
    Zoom { anchor: Point, amount: f64 },
    /// Pan the camera by a local-space delta.
    Pan(Vec2),
}

/// Per-gesture touch bookkeeping.
///
/// Turns raw touch lists into intents: the centroid acts as the pointer,
/// pinch distance changes become zooms, and a change in finger count
/// becomes a [`PointerIntent::Regrip`]. Moves and lifts are ignored
/// unless the gesture started on the surface.
#[derive(Debug, Clone, Default)]
pub struct TouchTracker {
    active: bool,
    previous_count: usize,
    previous_spread: Option<f64>,
    last_centroid: Option<Point>,
}

impl TouchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative spread change since the previous sample, in percent.
    fn pinch_amount(&mut self, input: &TouchInput) -> Option<f64> {
        let spread = input.spread();
        let amount = match (self.previous_spread, spread) {
            (Some(before), Some(now)) if before > 0.0 => Some((now / before - 1.0) * 100.0),
            _ => None,
        };
        self.previous_spread = spread;
        amount.filter(|a| *a != 0.0)
    }

    /// Whether a surface touch gesture is running.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// A finger went down. Touches on tracked elements are left to them.
    pub fn start(&mut self, input: &TouchInput) -> Vec<PointerIntent> {
        if !self.active && !input.is_on_surface() {
            return Vec::new();
        }
        let Some(centroid) = input.centroid() else {
            return Vec::new();
        };
        self.active = true;
        let intent = if self.previous_count > 0 && self.previous_count != input.touches.len() {
            PointerIntent::Regrip(centroid)
        } else {
            PointerIntent::Press(centroid)
        };
        self.previous_count = input.touches.len();
        self.last_centroid = Some(centroid);
        // Sample the spread now so the first move has no spurious pinch.
        self.previous_spread = input.spread();
        vec![intent]
    }

    /// Fingers moved. `pinch_divisor` converts the pinch percentage into a zoom amount.
    pub fn moved(&mut self, input: &TouchInput, pinch_divisor: f64) -> Vec<PointerIntent> {
        if !self.active {
            return Vec::new();
        }
        let Some(centroid) = input.centroid() else {
            return Vec::new();
        };
        let mut intents = Vec::new();
        if let Some(pinch) = self.pinch_amount(input) {
            intents.push(PointerIntent::Zoom {
                anchor: centroid,
                amount: -pinch / pinch_divisor,
            });
        }
        if input.touches.len() == self.previous_count {
            intents.push(PointerIntent::Move(centroid));
        } else {
            intents.push(PointerIntent::Regrip(centroid));
        }
        self.previous_count = input.touches.len();
        self.last_centroid = Some(centroid);
        intents
    }

    /// Fingers lifted. `input` holds the touches still down.
    pub fn ended(&mut self, input: &TouchInput) -> Vec<PointerIntent> {
        if !self.active {
            return Vec::new();
        }
        if !input.touches.is_empty() {
            // The next move sees the new finger count and regrips.
            return Vec::new();
        }
        let release = self.last_centroid.map(PointerIntent::Release);
        *self = Self::default();
        release.into_iter().collect()
    }
}

//! Camera module for pan/zoom transforms.
//!
//! Global coordinates are screen pixels. Local coordinates live on the
//! unbounded map. The two are related by
//! `global = origin + (local + offset) * scale`, where `origin` is the
//! top-left corner of the viewport in global space.

use crate::config::ViewportConfig;
use kurbo::{Affine, Point, Size, Vec2};
use serde::{Deserialize, Serialize};

/// The viewport rectangle in global screen space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportFrame {
    /// Top-left corner of the viewport.
    pub origin: Point,
    /// Size of the viewport in pixels.
    pub size: Size,
}

impl Default for ViewportFrame {
    fn default() -> Self {
        Self {
            origin: Point::ZERO,
            size: Size::new(800.0, 600.0),
        }
    }
}

impl ViewportFrame {
    pub fn new(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    /// Global position of the viewport center.
    pub fn center(&self) -> Point {
        self.origin + self.size.to_vec2() / 2.0
    }
}

/// Camera manages the view transform for the map.
///
/// `offset` is expressed in local units and is unbounded. `scale` is always
/// kept within the configured bounds; out-of-range requests saturate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Current translation offset (pan), in local units.
    pub offset: Vec2,
    /// Current zoom level.
    pub scale: f64,
}

impl Camera {
    /// Create a camera, clamping `scale` into the configured bounds.
    pub fn new(offset: Vec2, scale: f64, config: &ViewportConfig) -> Self {
        Self {
            offset,
            scale: config.clamp_scale(scale),
        }
    }

    /// Camera at the configured default offset and scale.
    pub fn with_defaults(config: &ViewportConfig) -> Self {
        Self::new(config.default_offset(), config.default_scale, config)
    }

    /// Get the affine transform applied to the map layer.
    ///
    /// Maps local coordinates to coordinates relative to the frame origin.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset * self.scale) * Affine::scale(self.scale)
    }

    /// Convert a global point to local coordinates.
    pub fn to_local(&self, frame: &ViewportFrame, global: Point) -> Point {
        ((global - frame.origin) / self.scale - self.offset).to_point()
    }

    /// Convert a local point to global coordinates.
    pub fn to_global(&self, frame: &ViewportFrame, local: Point) -> Point {
        frame.origin + (local.to_vec2() + self.offset) * self.scale
    }

    /// Local coordinates currently shown at the viewport center.
    pub fn center_coords(&self, frame: &ViewportFrame) -> Point {
        self.to_local(frame, frame.center())
    }

    /// Pan the camera by a delta in local units.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Set the scale, saturating at the configured bounds.
    pub fn set_scale(&mut self, scale: f64, config: &ViewportConfig) {
        self.scale = config.clamp_scale(scale);
    }

    /// Zoom about a global anchor point, keeping it visually fixed.
    ///
    /// Positive amounts zoom out. Returns the compensating pan that was
    /// applied to the offset.
    pub fn zoom_about(
        &mut self,
        frame: &ViewportFrame,
        anchor: Point,
        amount: f64,
        config: &ViewportConfig,
    ) -> Vec2 {
        let old_scale = self.scale;
        self.set_scale(old_scale * (1.0 - amount * config.scroll_speed), config);

        // The anchor's local position is taken under the new scale.
        let local = self.to_local(frame, anchor);
        let compensation = (local.to_vec2() + self.offset) * ((old_scale - self.scale) / old_scale);
        self.pan(compensation);
        compensation
    }

    /// Bring a local position to the viewport center at scale 1.
    ///
    /// With `move_up`, the position is shifted up by a third of the vertical
    /// space left around an element of `size`.
    pub fn focus(&mut self, frame: &ViewportFrame, position: Point, size: Size, move_up: bool) -> Vec2 {
        self.scale = 1.0;
        let lift = if move_up {
            (frame.size.height - size.height) / 3.0
        } else {
            0.0
        };
        let target = position + Vec2::new(0.0, lift);
        let delta = self.center_coords(frame) - target;
        self.pan(delta);
        delta
    }

    /// Whether a local point lies inside the highlighted map area.
    pub fn is_within_map(local: Point, config: &ViewportConfig) -> bool {
        // The highlighted square spans [0, 2 * map_size]; the default offset centers it.
        let extent = config.map_size * 2.0;
        (0.0..=extent).contains(&local.x) && (0.0..=extent).contains(&local.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> ViewportFrame {
        ViewportFrame::new(Point::new(20.0, 10.0), Size::new(800.0, 600.0))
    }

    fn assert_close(a: Point, b: Point, eps: f64) {
        assert!((a.x - b.x).abs() < eps, "{a:?} != {b:?}");
        assert!((a.y - b.y).abs() < eps, "{a:?} != {b:?}");
    }

    #[test]
    fn test_default_camera() {
        let config = ViewportConfig::default();
        let camera = Camera::with_defaults(&config);
        assert_eq!(camera.offset, Vec2::new(-10000.0, -10000.0));
        assert!((camera.scale - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_to_local_with_offset_and_scale() {
        let config = ViewportConfig::default();
        let camera = Camera::new(Vec2::new(5.0, -5.0), 2.0, &config);
        let local = camera.to_local(&frame(), Point::new(120.0, 210.0));
        // (120 - 20) / 2 - 5 = 45, (210 - 10) / 2 + 5 = 105
        assert_close(local, Point::new(45.0, 105.0), 1e-12);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let config = ViewportConfig::default();
        let camera = Camera::new(Vec2::new(30.0, -20.0), 1.5, &config);

        let global = Point::new(123.0, 456.0);
        let local = camera.to_local(&frame(), global);
        let back = camera.to_global(&frame(), local);
        assert_close(back, global, 1e-10);
    }

    #[test]
    fn test_transform_matches_to_global() {
        let config = ViewportConfig::default();
        let camera = Camera::new(Vec2::new(-40.0, 12.0), 0.75, &config);
        let local = Point::new(300.0, -80.0);
        let via_affine = frame().origin + (camera.transform() * local).to_vec2();
        assert_close(via_affine, camera.to_global(&frame(), local), 1e-10);
    }

    #[test]
    fn test_center_coords() {
        let config = ViewportConfig::default();
        let camera = Camera::new(Vec2::ZERO, 1.0, &config);
        assert_close(camera.center_coords(&frame()), Point::new(400.0, 300.0), 1e-12);
    }

    #[test]
    fn test_zoom_keeps_anchor_fixed() {
        let config = ViewportConfig::default();
        let anchors = [Point::new(0.0, 0.0), Point::new(400.0, 300.0), Point::new(777.0, 13.0)];
        for anchor in anchors {
            for amount in [0.1, -0.3, 0.5, -2.0] {
                let mut camera = Camera::new(Vec2::new(-123.0, 456.0), 1.7, &config);
                let before = camera.to_local(&frame(), anchor);
                camera.zoom_about(&frame(), anchor, amount, &config);
                let after = camera.to_local(&frame(), anchor);
                assert_close(before, after, 1e-9);
            }
        }
    }

    #[test]
    fn test_zoom_from_default_camera() {
        let config = ViewportConfig::default();
        let origin_frame = ViewportFrame::new(Point::ZERO, Size::new(800.0, 600.0));
        let mut camera = Camera::with_defaults(&config);

        let pan = camera.zoom_about(&origin_frame, Point::ZERO, 0.1, &config);

        assert!((camera.scale - 0.9).abs() < 1e-4);
        // toLocal(0,0) under scale 0.9 is 10000, plus offset -10000 gives zero pan.
        assert!(pan.x.abs() < 1e-4 && pan.y.abs() < 1e-4);
        assert!((camera.offset.x + 10000.0).abs() < 1e-4);
        assert!((camera.offset.y + 10000.0).abs() < 1e-4);
    }

    #[test]
    fn test_zoom_compensation_formula() {
        let config = ViewportConfig::default();
        let origin_frame = ViewportFrame::new(Point::ZERO, Size::new(800.0, 600.0));
        let mut camera = Camera::with_defaults(&config);

        camera.zoom_about(&origin_frame, Point::new(400.0, 300.0), 0.1, &config);

        // (anchor / 0.9) * (1 - 0.9) / 1
        assert!((camera.offset.x - (-10000.0 + 400.0 / 0.9 * 0.1)).abs() < 1e-4);
        assert!((camera.offset.y - (-10000.0 + 300.0 / 0.9 * 0.1)).abs() < 1e-4);
    }

    #[test]
    fn test_zoom_clamp() {
        let config = ViewportConfig::default();
        let mut camera = Camera::new(Vec2::ZERO, 1.0, &config);
        camera.zoom_about(&frame(), Point::ZERO, 0.9999, &config);
        assert!((camera.scale - config.min_scale).abs() < f64::EPSILON);

        camera.scale = 50.0;
        camera.zoom_about(&frame(), Point::ZERO, -10.0, &config);
        assert!((camera.scale - config.max_scale).abs() < f64::EPSILON);
    }

    #[test]
    fn test_new_clamps_scale() {
        let config = ViewportConfig::default();
        let camera = Camera::new(Vec2::ZERO, 1e6, &config);
        assert!((camera.scale - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pan() {
        let config = ViewportConfig::default();
        let mut camera = Camera::new(Vec2::ZERO, 1.0, &config);
        camera.pan(Vec2::new(10.0, 20.0));
        assert!((camera.offset.x - 10.0).abs() < f64::EPSILON);
        assert!((camera.offset.y - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_focus_centers_position() {
        let config = ViewportConfig::default();
        let mut camera = Camera::new(Vec2::new(3.0, 4.0), 2.5, &config);
        let target = Point::new(500.0, -250.0);

        camera.focus(&frame(), target, Size::new(100.0, 60.0), false);

        assert!((camera.scale - 1.0).abs() < f64::EPSILON);
        assert_close(camera.center_coords(&frame()), target, 1e-9);
    }

    #[test]
    fn test_focus_move_up() {
        let config = ViewportConfig::default();
        let mut camera = Camera::new(Vec2::ZERO, 1.0, &config);
        let target = Point::new(0.0, 0.0);

        camera.focus(&frame(), target, Size::new(100.0, 300.0), true);

        // (600 - 300) / 3 = 100 below the element is at the center.
        assert_close(camera.center_coords(&frame()), Point::new(0.0, 100.0), 1e-9);
    }

    #[test]
    fn test_within_map() {
        let config = ViewportConfig::default();
        assert!(Camera::is_within_map(Point::new(10000.0, 10000.0), &config));
        assert!(!Camera::is_within_map(Point::new(-1.0, 5.0), &config));
        assert!(!Camera::is_within_map(Point::new(5.0, 20001.0), &config));
    }
}

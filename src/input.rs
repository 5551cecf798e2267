use std::sync::Arc;

use glam::{Vec3, Vec4};
use parking_lot::RwLock;

use crate::state::RenderState;

/// How far the light swings as the pointer crosses the canvas.
pub const POINTER_SENSITIVITY: f32 = 3.0;

/// Maps a pointer position inside the canvas to a unit light direction.
///
/// The position is first normalized to device coordinates (Y flipped, since
/// screen Y grows downward), then scaled on X/Y while Z stays fixed at -1.0.
/// The fixed Z keeps the vector norm strictly positive, so the final
/// normalization can never divide by zero.
pub fn light_direction_from_pointer(x: f32, y: f32, width: f32, height: f32) -> Vec3 {
    debug_assert!(width > 0.0 && height > 0.0, "canvas has zero area");
    let ndc_x = (x / width) * 2.0 - 1.0;
    let ndc_y = 1.0 - (y / height) * 2.0;
    Vec3::new(
        ndc_x * POINTER_SENSITIVITY,
        ndc_y * POINTER_SENSITIVITY,
        -1.0,
    )
    .normalize()
}

/// Converts three slider channels in `[0, 255]` to an opaque RGBA color.
pub fn color_from_sliders(red: u8, green: u8, blue: u8) -> Vec4 {
    Vec4::new(
        red as f32 / 255.0,
        green as f32 / 255.0,
        blue as f32 / 255.0,
        1.0,
    )
}

/// Converts an object color back to the integer channels shown by the swatch.
pub fn swatch_rgb(color: Vec4) -> (u8, u8, u8) {
    let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
    (channel(color.x), channel(color.y), channel(color.z))
}

/// Visual feedback collaborator. The wasm front end backs this with a DOM
/// element's background color; the native binary logs the value.
pub trait Swatch {
    fn set_rgb(&self, red: u8, green: u8, blue: u8);
}

/// Collaborator that schedules a redraw after a uniform write.
pub trait RedrawScheduler {
    fn request_redraw(&self);
}

/// Handler for pointer movement over the drawing surface.
///
/// Holds an explicit reference to the shared render state instead of
/// capturing it ambiently; the platform event wiring forwards raw coordinates
/// into [`PointerLightHandler::handle`].
pub struct PointerLightHandler<R: RedrawScheduler> {
    state: Arc<RwLock<RenderState>>,
    redraw: R,
}

impl<R: RedrawScheduler> PointerLightHandler<R> {
    pub fn new(state: Arc<RwLock<RenderState>>, redraw: R) -> Self {
        Self { state, redraw }
    }

    /// Maps the pointer position to a light direction, writes it to the
    /// shared state and requests a redraw. Returns the new direction.
    pub fn handle(&self, x: f32, y: f32, width: f32, height: f32) -> Vec3 {
        let direction = light_direction_from_pointer(x, y, width, height);
        self.state.write().set_light_direction(direction);
        self.redraw.request_redraw();
        direction
    }
}

/// Handler for the three color slider inputs.
///
/// The slider values are the source of truth: callers read all three channels
/// at event time and pass them in, so a change to any one slider refreshes
/// the whole color.
pub struct ColorSliderHandler<S: Swatch, R: RedrawScheduler> {
    state: Arc<RwLock<RenderState>>,
    swatch: S,
    redraw: R,
}

impl<S: Swatch, R: RedrawScheduler> ColorSliderHandler<S, R> {
    pub fn new(state: Arc<RwLock<RenderState>>, swatch: S, redraw: R) -> Self {
        Self {
            state,
            swatch,
            redraw,
        }
    }

    /// Writes the object color, updates the swatch and requests a redraw.
    /// Returns the color that was stored.
    pub fn handle(&self, red: u8, green: u8, blue: u8) -> Vec4 {
        let color = color_from_sliders(red, green, blue);
        self.state.write().set_object_color(color);
        let (r, g, b) = swatch_rgb(color);
        self.swatch.set_rgb(r, g, b);
        self.redraw.request_redraw();
        color
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingRedraw(Arc<AtomicU32>);

    impl RedrawScheduler for CountingRedraw {
        fn request_redraw(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct RecordingSwatch(Arc<RwLock<(u8, u8, u8)>>);

    impl Swatch for RecordingSwatch {
        fn set_rgb(&self, red: u8, green: u8, blue: u8) {
            *self.0.write() = (red, green, blue);
        }
    }

    #[test]
    fn pointer_mapping_always_yields_unit_vectors() {
        let (width, height) = (800.0, 600.0);
        for x in [0.0, 137.0, 400.0, 799.0, 800.0] {
            for y in [0.0, 29.0, 300.0, 599.0, 600.0] {
                let direction = light_direction_from_pointer(x, y, width, height);
                assert_abs_diff_eq!(direction.length(), 1.0, epsilon = 1e-5);
                // Z stays negative: the light never flips behind the view.
                assert!(direction.z < 0.0);
            }
        }
    }

    #[test]
    fn canvas_center_points_straight_back() {
        let direction = light_direction_from_pointer(400.0, 300.0, 800.0, 600.0);
        assert_abs_diff_eq!(
            direction.distance(Vec3::new(0.0, 0.0, -1.0)),
            0.0,
            epsilon = 1e-6
        );
    }

    #[test]
    fn pointer_quadrants_have_expected_signs() {
        let (width, height) = (640.0, 480.0);
        let top_right = light_direction_from_pointer(640.0, 0.0, width, height);
        assert!(top_right.x > 0.0 && top_right.y > 0.0);
        let bottom_left = light_direction_from_pointer(0.0, 480.0, width, height);
        assert!(bottom_left.x < 0.0 && bottom_left.y < 0.0);
    }

    #[test]
    fn slider_colors_divide_exactly() {
        assert_eq!(color_from_sliders(0, 0, 0), Vec4::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!(
            color_from_sliders(255, 255, 255),
            Vec4::new(1.0, 1.0, 1.0, 1.0)
        );
        let color = color_from_sliders(51, 102, 204);
        assert_abs_diff_eq!(color.x, 0.2, epsilon = 1e-6);
        assert_abs_diff_eq!(color.y, 0.4, epsilon = 1e-6);
        assert_abs_diff_eq!(color.z, 0.8, epsilon = 1e-6);
        assert_eq!(color.w, 1.0);
    }

    #[test]
    fn swatch_roundtrips_slider_values() {
        for channels in [(0u8, 0u8, 0u8), (255, 255, 255), (17, 130, 201)] {
            let color = color_from_sliders(channels.0, channels.1, channels.2);
            assert_eq!(swatch_rgb(color), channels);
        }
    }

    #[test]
    fn pointer_handler_updates_state_and_redraws() {
        let state = Arc::new(RwLock::new(RenderState::new(1.0)));
        let redraws = Arc::new(AtomicU32::new(0));
        let handler =
            PointerLightHandler::new(Arc::clone(&state), CountingRedraw(Arc::clone(&redraws)));

        let direction = handler.handle(400.0, 300.0, 800.0, 600.0);
        assert_eq!(state.read().light_direction(), direction);
        assert_eq!(redraws.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn color_handler_updates_state_swatch_and_redraws() {
        let state = Arc::new(RwLock::new(RenderState::new(1.0)));
        let redraws = Arc::new(AtomicU32::new(0));
        let recorded = Arc::new(RwLock::new((0u8, 0u8, 0u8)));
        let handler = ColorSliderHandler::new(
            Arc::clone(&state),
            RecordingSwatch(Arc::clone(&recorded)),
            CountingRedraw(Arc::clone(&redraws)),
        );

        let color = handler.handle(10, 20, 30);
        assert_eq!(state.read().object_color(), color);
        assert_eq!(*recorded.read(), (10, 20, 30));
        assert_eq!(redraws.load(Ordering::SeqCst), 1);
    }
}

use std::f32::consts::{FRAC_PI_4, FRAC_PI_6};

use glam::{Mat3, Mat4, Vec3, Vec4};

/// Light color applied to the diffuse term. Fixed at startup.
pub const LIGHT_COLOR: Vec4 = Vec4::new(1.0, 1.0, 1.0, 1.0);
/// Ambient floor added before the object color is applied. Fixed at startup.
pub const AMBIENT_COLOR: Vec4 = Vec4::new(0.1, 0.1, 0.1, 1.0);
/// Object color before the user touches anything.
pub const DEFAULT_OBJECT_COLOR: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);

// Fixed view: sphere pushed back along -Z and tilted toward the camera.
const VIEW_OFFSET: f32 = -5.0;
const VIEW_TILT: f32 = FRAC_PI_6;
const FOV_Y: f32 = FRAC_PI_4;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 100.0;

/// Model-view and projection matrices plus the derived normal matrix.
///
/// The normal matrix is the inverse-transpose of the model-view's upper 3x3
/// and is recomputed by every mutation of the model-view, so the two can
/// never drift apart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformState {
    model_view: Mat4,
    projection: Mat4,
    normal: Mat3,
}

impl TransformState {
    pub fn new(model_view: Mat4, projection: Mat4) -> Self {
        Self {
            model_view,
            projection,
            normal: normal_matrix(model_view),
        }
    }

    /// The fixed view used by the viewer: translate back, tilt, perspective.
    pub fn fixed_view(aspect: f32) -> Self {
        let model_view = Mat4::from_translation(Vec3::new(0.0, 0.0, VIEW_OFFSET))
            * Mat4::from_rotation_x(VIEW_TILT);
        let projection = Mat4::perspective_rh_gl(FOV_Y, aspect.max(0.01), Z_NEAR, Z_FAR);
        Self::new(model_view, projection)
    }

    pub fn set_model_view(&mut self, model_view: Mat4) {
        self.model_view = model_view;
        self.normal = normal_matrix(model_view);
    }

    pub fn set_projection(&mut self, projection: Mat4) {
        self.projection = projection;
    }

    pub fn model_view(&self) -> Mat4 {
        self.model_view
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn normal(&self) -> Mat3 {
        self.normal
    }
}

fn normal_matrix(model_view: Mat4) -> Mat3 {
    Mat3::from_mat4(model_view).inverse().transpose()
}

/// Uniform state consumed by the shading program.
///
/// Owned by whichever front end drives the renderer and handed to the
/// interaction handlers by reference; there are no ambient globals. Only the
/// light direction and object color change after startup.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    pub transform: TransformState,
    light_direction: Vec3,
    object_color: Vec4,
}

impl RenderState {
    pub fn new(aspect: f32) -> Self {
        Self {
            transform: TransformState::fixed_view(aspect),
            light_direction: Vec3::ONE.normalize(),
            object_color: DEFAULT_OBJECT_COLOR,
        }
    }

    /// Current light direction, always unit length.
    pub fn light_direction(&self) -> Vec3 {
        self.light_direction
    }

    /// Stores a new light direction, normalized. A zero vector cannot be
    /// produced by the pointer mapping (its Z component is fixed), so a
    /// degenerate update is ignored rather than poisoning the state with NaN.
    pub fn set_light_direction(&mut self, direction: Vec3) {
        if let Some(unit) = direction.try_normalize() {
            self.light_direction = unit;
        }
    }

    pub fn object_color(&self) -> Vec4 {
        self.object_color
    }

    pub fn set_object_color(&mut self, color: Vec4) {
        self.object_color = color;
    }

    /// Rebuilds the projection for a new surface aspect ratio. The model-view
    /// (and with it the normal matrix) is left untouched.
    pub fn set_aspect(&mut self, aspect: f32) {
        self.transform
            .set_projection(Mat4::perspective_rh_gl(FOV_Y, aspect.max(0.01), Z_NEAR, Z_FAR));
    }
}

/// CPU mirror of the fragment stage's diffuse term, used by tests.
pub(crate) fn lambert_intensity(normal: Vec3, light_direction: Vec3) -> f32 {
    normal.dot(-light_direction).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn normal_matrix_tracks_model_view_changes() {
        let mut transform = TransformState::fixed_view(1.0);
        // Non-uniform scale is the case a plain rotation copy would get wrong.
        transform.set_model_view(Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0)));
        let transformed = transform.normal() * Vec3::X;
        assert_abs_diff_eq!(transformed.x, 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(transformed.y, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(transformed.z, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn rotation_normal_matrix_matches_rotation() {
        let rotation = Mat4::from_rotation_y(0.7);
        let transform = TransformState::new(rotation, Mat4::IDENTITY);
        let expected = Mat3::from_mat4(rotation) * Vec3::Z;
        let actual = transform.normal() * Vec3::Z;
        assert_abs_diff_eq!(actual.distance(expected), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn light_direction_is_normalized_on_update() {
        let mut state = RenderState::new(1.0);
        state.set_light_direction(Vec3::new(3.0, 0.0, -4.0));
        assert_abs_diff_eq!(state.light_direction().length(), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(state.light_direction().x, 0.6, epsilon = 1e-6);
    }

    #[test]
    fn degenerate_light_direction_is_ignored() {
        let mut state = RenderState::new(1.0);
        let before = state.light_direction();
        state.set_light_direction(Vec3::ZERO);
        assert_eq!(state.light_direction(), before);
    }

    #[test]
    fn intensity_is_clamped_at_zero() {
        let normal = Vec3::Y;
        // Light shining along +Y hits a +Y normal head on.
        assert_abs_diff_eq!(lambert_intensity(normal, -Vec3::Y), 1.0, epsilon = 1e-6);
        // Light from behind must not go negative; the surface gets ambient only.
        assert_eq!(lambert_intensity(normal, Vec3::Y), 0.0);
        let grazing = Vec3::new(1.0, 0.2, 0.0).normalize();
        assert!(lambert_intensity(normal, grazing) >= 0.0);
    }

    #[test]
    fn default_state_matches_startup_constants() {
        let state = RenderState::new(16.0 / 9.0);
        assert_eq!(state.object_color(), DEFAULT_OBJECT_COLOR);
        assert_abs_diff_eq!(state.light_direction().length(), 1.0, epsilon = 1e-6);
    }
}

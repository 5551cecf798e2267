//! Interactive shaded-sphere viewer.
//!
//! The crate renders a single UV sphere lit by a directional light that
//! follows the pointer, with the object color driven by three RGB inputs.
//! The mesh generation, uniform state and shading pipeline are platform
//! independent; only surface acquisition and event wiring differ between the
//! native winit front end and the browser canvas front end.

pub mod input;
pub mod mesh;
pub mod render;
pub mod state;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use input::{
    color_from_sliders, light_direction_from_pointer, swatch_rgb, ColorSliderHandler,
    PointerLightHandler, RedrawScheduler, Swatch,
};
pub use mesh::{generate_sphere, MeshParamError, SphereMesh};
pub use render::Renderer;
pub use state::{RenderState, TransformState};

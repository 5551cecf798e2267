#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use gloo_events::EventListener;
use parking_lot::RwLock;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlCanvasElement, HtmlElement, HtmlInputElement, MouseEvent};

use crate::input::{ColorSliderHandler, PointerLightHandler, RedrawScheduler, Swatch};
use crate::mesh::generate_sphere;
use crate::render::Renderer;
use crate::state::RenderState;

const SPHERE_RADIUS: f32 = 1.0;
const SPHERE_BANDS: u32 = 30;

/// Entry point for the browser build.
///
/// Looks up the canvas, the three color sliders and the swatch element by id,
/// initializes the GPU renderer and wires the DOM events. The listeners stay
/// attached for the lifetime of the page.
#[wasm_bindgen]
pub async fn run(
    canvas_id: String,
    red_slider_id: String,
    green_slider_id: String,
    blue_slider_id: String,
    swatch_id: String,
) -> Result<(), JsValue> {
    console_error_panic_hook::set_once();

    setup(
        &canvas_id,
        &red_slider_id,
        &green_slider_id,
        &blue_slider_id,
        &swatch_id,
    )
    .await
    .map_err(|err| JsValue::from_str(&format!("{err:?}")))
}

async fn setup(
    canvas_id: &str,
    red_slider_id: &str,
    green_slider_id: &str,
    blue_slider_id: &str,
    swatch_id: &str,
) -> Result<()> {
    let document = web_sys::window()
        .and_then(|window| window.document())
        .ok_or_else(|| anyhow!("document not available"))?;

    let canvas: HtmlCanvasElement = lookup(&document, canvas_id)?;
    let red: HtmlInputElement = lookup(&document, red_slider_id)?;
    let green: HtmlInputElement = lookup(&document, green_slider_id)?;
    let blue: HtmlInputElement = lookup(&document, blue_slider_id)?;
    let swatch: HtmlElement = lookup(&document, swatch_id)?;

    let mesh = generate_sphere(SPHERE_RADIUS, SPHERE_BANDS, SPHERE_BANDS)?;
    let renderer = Renderer::new(canvas.clone(), &mesh).await?;
    let state = Arc::new(RwLock::new(RenderState::new(renderer.aspect())));
    let renderer = Rc::new(RefCell::new(renderer));

    let redraw = CanvasRedraw {
        renderer: Rc::clone(&renderer),
        state: Arc::clone(&state),
    };

    // Pointer movement drives the light direction.
    {
        let handler = PointerLightHandler::new(Arc::clone(&state), redraw.clone());
        let canvas_ref = canvas.clone();
        EventListener::new(&canvas, "mousemove", move |event| {
            let event = event.dyn_ref::<MouseEvent>().unwrap();
            let rect = canvas_ref.get_bounding_client_rect();
            let x = event.client_x() as f32 - rect.left() as f32;
            let y = event.client_y() as f32 - rect.top() as f32;
            handler.handle(
                x,
                y,
                canvas_ref.width() as f32,
                canvas_ref.height() as f32,
            );
        })
        .forget();
    }

    // Track the canvas's pixel size: reconfigure the surface and rebuild the
    // projection whenever it changes, then draw a fresh frame.
    {
        let window = web_sys::window().ok_or_else(|| anyhow!("window not available"))?;
        let canvas_ref = canvas.clone();
        let renderer_ref = Rc::clone(&renderer);
        let state_ref = Arc::clone(&state);
        let redraw_ref = redraw.clone();
        EventListener::new(&window, "resize", move |_| {
            let new_size = (canvas_ref.width(), canvas_ref.height());
            {
                let mut renderer = renderer_ref.borrow_mut();
                if new_size == renderer.size() {
                    return;
                }
                renderer.resize(new_size);
                state_ref.write().set_aspect(renderer.aspect());
            }
            redraw_ref.request_redraw();
        })
        .forget();
    }

    // The sliders are the source of truth for the object color: every input
    // event re-reads all three channels.
    let color_handler = Rc::new(ColorSliderHandler::new(
        Arc::clone(&state),
        ElementSwatch { element: swatch },
        redraw.clone(),
    ));
    for slider in [&red, &green, &blue] {
        let handler = Rc::clone(&color_handler);
        let (red, green, blue) = (red.clone(), green.clone(), blue.clone());
        EventListener::new(slider, "input", move |_| {
            handler.handle(
                slider_value(&red),
                slider_value(&green),
                slider_value(&blue),
            );
        })
        .forget();
    }

    // Initial frame: apply the sliders' starting values, which also paints
    // the swatch and draws the first frame.
    color_handler.handle(
        slider_value(&red),
        slider_value(&green),
        slider_value(&blue),
    );
    Ok(())
}

fn lookup<T: JsCast>(document: &Document, id: &str) -> Result<T> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| anyhow!("element #{id} not found"))?
        .dyn_into::<T>()
        .map_err(|_| anyhow!("element #{id} has an unexpected type"))
}

fn slider_value(input: &HtmlInputElement) -> u8 {
    input
        .value()
        .parse::<f32>()
        .map(|value| value.clamp(0.0, 255.0) as u8)
        .unwrap_or(0)
}

/// Synchronous redraw: handlers run to completion on the single event
/// thread, so the frame is rendered before the next event is processed.
struct CanvasRedraw {
    renderer: Rc<RefCell<Renderer>>,
    state: Arc<RwLock<RenderState>>,
}

impl Clone for CanvasRedraw {
    fn clone(&self) -> Self {
        Self {
            renderer: Rc::clone(&self.renderer),
            state: Arc::clone(&self.state),
        }
    }
}

impl RedrawScheduler for CanvasRedraw {
    fn request_redraw(&self) {
        let snapshot = self.state.read().clone();
        let mut renderer = self.renderer.borrow_mut();
        renderer.update_state(&snapshot);
        if let Err(err) = renderer.render() {
            web_sys::console::error_1(&JsValue::from_str(&format!("render failed: {err}")));
        }
    }
}

/// Swatch backed by a DOM element's background color.
struct ElementSwatch {
    element: HtmlElement,
}

impl Swatch for ElementSwatch {
    fn set_rgb(&self, red: u8, green: u8, blue: u8) {
        let _ = self
            .element
            .style()
            .set_property("background-color", &format!("rgb({red}, {green}, {blue})"));
    }
}

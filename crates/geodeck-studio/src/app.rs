use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use geodeck_engine::deck::{InteractiveState, PointerEvent};
use geodeck_engine::device::{GlContext, SoftwareContext};
use geodeck_engine::glam::DVec2;
use geodeck_engine::host::{DeckOverlay, HostMap};
use geodeck_engine::{DeckProps, DeckPropsUpdate};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalPosition;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorIcon, Window, WindowId};

use crate::config::StudioConfig;
use crate::demo::{describe, DemoData};
use crate::gpu::{PresentOptions, PresentOutcome, Presenter};
use crate::map::{DragButton, SlippyMap};

/// Wheel zoom levels per scroll line.
const ZOOM_PER_LINE: f64 = 0.5;
const ZOOM_PER_PIXEL: f64 = 1.0 / 240.0;

/// Opens the window and blocks until it closes.
pub fn run(config: StudioConfig, present: PresentOptions) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    let mut studio = Studio::new(config, present).context("failed to set up the deck")?;

    event_loop
        .run_app(&mut studio)
        .context("winit event loop terminated with error")?;

    Ok(())
}

struct WindowEntry {
    window: Arc<Window>,
    presenter: Presenter,
}

/// The host: one window, one slippy map, one deck overlay on top.
struct Studio {
    config: StudioConfig,
    present: PresentOptions,
    entry: Option<WindowEntry>,
    map: SlippyMap,
    overlay: DeckOverlay<SoftwareContext>,
    demo: DemoData,
    started: Instant,
    pointer: Option<DVec2>,
    exit_requested: bool,
}

impl Studio {
    fn new(config: StudioConfig, present: PresentOptions) -> Result<Self> {
        let (width, height) = (config.initial_size.width, config.initial_size.height);
        let vs = config.initial_view_state;
        let demo = DemoData::generate(
            [vs.longitude, vs.latitude],
            config.seed,
            config.stop_count,
            config.trip_count,
            config.sample_count,
        );

        let mut props = DeckProps::default();
        props.apply(deck_props(&demo, &config));
        let overlay = DeckOverlay::new(SoftwareContext::new(width, height, 1.0), props, config.overlay)?;

        Ok(Self {
            map: SlippyMap::new(vs, (width, height), 1.0),
            config,
            present,
            entry: None,
            overlay,
            demo,
            started: Instant::now(),
            pointer: None,
            exit_requested: false,
        })
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);
        let window = Arc::new(event_loop.create_window(attrs).context("failed to create window")?);
        let presenter = pollster::block_on(Presenter::new(Arc::clone(&window), self.present.clone()))?;

        let logical = window.inner_size().to_logical::<f64>(window.scale_factor());
        self.map.resize((logical.width, logical.height), window.scale_factor());
        self.overlay.attach(&mut self.map)?;
        window.request_redraw();

        self.entry = Some(WindowEntry { window, presenter });
        Ok(())
    }

    fn request_exit(&mut self, event_loop: &ActiveEventLoop) {
        if !self.exit_requested && self.overlay.is_attached() {
            self.overlay.detach(&mut self.map);
            log::debug!("map listeners left: {}", self.map.listener_count());
        }
        self.exit_requested = true;
        event_loop.exit();
    }

    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(err) = self.overlay.process_events(&self.map) {
            log::error!("host event failed: {err}");
        }
        let seconds = self.started.elapsed().as_secs_f64();
        let layers = self.demo.layers(seconds, self.config.trip_speed);
        if let Err(err) = self.overlay.set_props(DeckPropsUpdate::new().layers(layers), &self.map) {
            log::error!("frame update failed: {err}");
        }

        let Some(entry) = self.entry.as_mut() else {
            return;
        };
        let gl = self.overlay.deck().gl();
        let (width, height) = gl.drawing_buffer_size();
        let outcome = entry
            .presenter
            .present(&gl.to_rgba_top_down(), width, height, self.config.background);
        if outcome == PresentOutcome::Lost {
            log::error!("surface lost for good, exiting");
            self.request_exit(event_loop);
        }
    }

    fn pointer_moved(&mut self, pixel: DVec2) {
        self.pointer = Some(pixel);
        if self.map.drag_to(pixel) {
            self.set_dragging(true);
        } else if !self.map.is_pressed() {
            self.pointer_event(PointerEvent::hover(pixel.x, pixel.y));
        }
    }

    fn button(&mut self, button: MouseButton, state: ElementState) {
        let Some(pixel) = self.pointer else {
            return;
        };
        let drag_button = match button {
            MouseButton::Left => DragButton::Pan,
            MouseButton::Right => DragButton::Rotate,
            _ => return,
        };
        match state {
            ElementState::Pressed => self.map.press(drag_button, pixel),
            ElementState::Released => {
                if self.map.release() {
                    self.pointer_event(PointerEvent::click(pixel.x, pixel.y));
                }
                self.set_dragging(false);
            }
        }
    }

    fn wheel(&mut self, delta: MouseScrollDelta, scale_factor: f64) {
        let zoom = match delta {
            MouseScrollDelta::LineDelta(_, y) => y as f64 * ZOOM_PER_LINE,
            MouseScrollDelta::PixelDelta(p) => p.to_logical::<f64>(scale_factor).y * ZOOM_PER_PIXEL,
        };
        let (width, height) = self.map.size();
        let pixel = self.pointer.unwrap_or(DVec2::new(width / 2.0, height / 2.0));
        self.map.zoom_at(pixel, zoom);
    }

    fn pointer_event(&mut self, event: PointerEvent) {
        if let Err(err) = self.overlay.deck_mut().handle_pointer_event(&event) {
            log::warn!("pick failed: {err}");
        }
        self.apply_cursor();
    }

    fn set_dragging(&mut self, is_dragging: bool) {
        let deck = self.overlay.deck_mut();
        let state = deck.interactive_state();
        if state.is_dragging != is_dragging {
            deck.set_interactive_state(InteractiveState { is_dragging, ..state });
            self.apply_cursor();
        }
    }

    fn apply_cursor(&self) {
        let Some(entry) = &self.entry else {
            return;
        };
        let icon = match self.overlay.deck().cursor() {
            "grab" => CursorIcon::Grab,
            "grabbing" => CursorIcon::Grabbing,
            "pointer" => CursorIcon::Pointer,
            _ => CursorIcon::Default,
        };
        entry.window.set_cursor(icon);
    }
}

/// Studio props: demo layers plus logging callbacks.
fn deck_props(demo: &DemoData, config: &StudioConfig) -> DeckPropsUpdate {
    let last_hover: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
    DeckPropsUpdate::new()
        .id("geodeck-studio".to_string())
        .layers(demo.layers(0.0, config.trip_speed))
        .picking_radius(3.0)
        .get_cursor(|state| {
            let cursor = if state.is_dragging {
                "grabbing"
            } else if state.is_hovering {
                "pointer"
            } else {
                "grab"
            };
            cursor.to_string()
        })
        .on_layer_hover(move |primary, _, _| {
            let text = primary.map(describe);
            let mut last = last_hover.borrow_mut();
            if *last != text {
                if let Some(text) = &text {
                    log::info!("hover {text}");
                }
                *last = text;
            }
        })
        .on_layer_click(|primary, all, _| match primary {
            Some(info) => log::info!("click {} ({} layers under the pointer)", describe(info), all.len()),
            None => log::info!("click on empty map"),
        })
        .on_load(|| log::info!("first frame drawn"))
        .on_error(|err| log::error!("layer error: {err}"))
}

impl ApplicationHandler for Studio {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() {
            return;
        }
        if let Err(e) = self.create_window(event_loop) {
            log::error!("failed to create window: {e:#}");
            self.request_exit(event_loop);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }
        event_loop.set_control_flow(ControlFlow::Wait);

        // Trips animate, so every frame is a new one.
        if let Some(entry) = &self.entry {
            entry.window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if self.exit_requested {
            return;
        }
        let Some(scale_factor) = self.entry.as_ref().map(|e| e.window.scale_factor()) else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => self.request_exit(event_loop),

            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(entry) = self.entry.as_mut() {
                    let size = entry.window.inner_size();
                    entry.presenter.resize(size);
                    let logical = size.to_logical::<f64>(scale_factor);
                    self.map.resize((logical.width, logical.height), scale_factor);
                    entry.window.request_redraw();
                }
            }

            WindowEvent::CursorMoved { position, .. } => self.pointer_moved(to_logical(position, scale_factor)),

            WindowEvent::CursorLeft { .. } => {
                self.pointer = None;
                self.pointer_event(PointerEvent::leave());
            }

            WindowEvent::MouseInput { state, button, .. } => self.button(button, state),

            WindowEvent::MouseWheel { delta, .. } => self.wheel(delta, scale_factor),

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    self.request_exit(event_loop);
                }
            }

            WindowEvent::RedrawRequested => self.frame(event_loop),

            _ => {}
        }
    }
}

fn to_logical(position: PhysicalPosition<f64>, scale_factor: f64) -> DVec2 {
    let logical = position.to_logical::<f64>(scale_factor);
    DVec2::new(logical.x, logical.y)
}

use std::rc::Rc;

use crate::coords::Rect;
use crate::device::GlContext;
use crate::error::DeckError;
use crate::layer::PickInfo;
use crate::manager::{DrawPass, LayerManager, LayerManagerProps, PickRectRequest, PickRequest};
use crate::pick::PickMode;
use crate::render::{PassStats, RenderStats};
use crate::time::FrameTime;
use crate::view::{View, ViewManager, ViewStates};
use crate::viewport::Viewport;

use super::events::{InteractiveState, PointerEvent, PointerEventKind, ViewStateChange};
use super::props::{DeckProps, DeckPropsUpdate};

const DEFAULT_VIEW_ID: &str = "default-view";
const STATS_INTERVAL: f64 = 1.0;

/// Point pick through the Deck.
#[derive(Debug, Clone, Default)]
pub struct PickOptions<'a> {
    pub x: f64,
    pub y: f64,
    /// Defaults to the `picking_radius` prop.
    pub radius: Option<f64>,
    pub layer_ids: Option<&'a [&'a str]>,
}

/// Rectangle pick through the Deck.
#[derive(Debug, Clone, Default)]
pub struct PickRectOptions<'a> {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub layer_ids: Option<&'a [&'a str]>,
    pub max_objects: Option<usize>,
}

/// Owns one layer manager and one view manager and runs the frame.
pub struct Deck<G: GlContext> {
    props: DeckProps,
    /// Tracked camera; only present when the host gave an initial one.
    view_state: Option<ViewStates>,
    interactive_state: InteractiveState,
    width: f64,
    height: f64,
    needs_redraw: Option<String>,
    cursor: String,
    layer_manager: LayerManager<G>,
    view_manager: ViewManager,
    last_stats_log: f64,
    loaded: bool,
}

impl<G: GlContext> Deck<G> {
    pub fn new(gl: G, props: DeckProps) -> Result<Self, DeckError> {
        let (width, height) = gl.canvas_size();
        let mut view_manager = ViewManager::new();
        view_manager.set_size(width, height)?;

        let mut deck = Self {
            view_state: props.initial_view_state.clone(),
            props: DeckProps::default(),
            interactive_state: InteractiveState::default(),
            width: 0.0,
            height: 0.0,
            needs_redraw: Some("Initial render".to_string()),
            cursor: String::new(),
            layer_manager: LayerManager::new(gl),
            view_manager,
            last_stats_log: 0.0,
            loaded: false,
        };
        deck.props.apply(props.into());
        deck.cursor = (deck.props.get_cursor)(&deck.interactive_state);
        deck.apply_props()?;
        Ok(deck)
    }

    // ── accessors ───────────────────────────────────────────────────────

    pub fn props(&self) -> &DeckProps {
        &self.props
    }

    pub fn layer_manager(&self) -> &LayerManager<G> {
        &self.layer_manager
    }

    pub fn layer_manager_mut(&mut self) -> &mut LayerManager<G> {
        &mut self.layer_manager
    }

    pub fn view_manager(&self) -> &ViewManager {
        &self.view_manager
    }

    pub fn gl(&self) -> &G {
        self.layer_manager.gl()
    }

    pub fn gl_mut(&mut self) -> &mut G {
        self.layer_manager.gl_mut()
    }

    pub fn stats(&self) -> &RenderStats {
        &self.layer_manager.context().stats
    }

    pub fn cursor(&self) -> &str {
        &self.cursor
    }

    pub fn interactive_state(&self) -> InteractiveState {
        self.interactive_state
    }

    /// Camera tracked by the Deck, when uncontrolled.
    pub fn view_state(&self) -> Option<&ViewStates> {
        self.view_state.as_ref()
    }

    pub fn get_viewports(&self, rect: Option<Rect>) -> Vec<Rc<Viewport>> {
        self.view_manager.get_viewports(rect)
    }

    pub fn get_views(&self) -> &[View] {
        self.view_manager.views()
    }

    // ── props ───────────────────────────────────────────────────────────

    /// Merges `update` over the current props and forwards them.
    ///
    /// Layer errors are returned after everything was forwarded; the other
    /// layers of the list are live regardless.
    pub fn set_props(&mut self, update: DeckPropsUpdate) -> Result<(), DeckError> {
        self.layer_manager.context_mut().stats.set_props_count += 1;

        if let Some(Some(initial)) = &update.initial_view_state {
            if self.props.initial_view_state.as_ref() != Some(initial) {
                self.view_state = Some(initial.clone());
            }
        }
        self.props.apply(update);
        self.apply_props()
    }

    fn apply_props(&mut self) -> Result<(), DeckError> {
        self.view_manager.set_views(self.resolved_views())?;
        if let Some(view_states) = self.props.view_state.clone().or_else(|| self.view_state.clone()) {
            self.view_manager.set_view_states(view_states)?;
        }

        self.layer_manager.set_props(LayerManagerProps {
            layers: self.props.layers.clone(),
            layer_filter: self.props.layer_filter.clone(),
            draw_picking_colors: self.props.draw_picking_colors,
            user_data: self.props.user_data.clone(),
            use_device_pixels: self.props.use_device_pixels,
        })?;
        Ok(())
    }

    fn resolved_views(&self) -> Vec<View> {
        let mut views = if self.props.views.is_empty() {
            vec![View::map_view(DEFAULT_VIEW_ID)]
        } else {
            self.props.views.clone()
        };
        if let (Some(controller), Some(first)) = (self.props.controller, views.first_mut()) {
            first.controller = Some(controller);
        }
        views
    }

    // ── redraw ──────────────────────────────────────────────────────────

    /// Asks for a redraw on the next frame.
    pub fn set_needs_redraw(&mut self, reason: &str) {
        if self.needs_redraw.is_none() {
            self.needs_redraw = Some(reason.to_string());
        }
    }

    /// Why the next frame must draw, if it must. With `clear`, the reason is
    /// consumed from every source at once.
    pub fn needs_redraw(&mut self, clear: bool) -> Option<String> {
        if self.props.animate {
            return Some("Deck._animate".to_string());
        }
        let own = if clear {
            self.needs_redraw.take()
        } else {
            self.needs_redraw.clone()
        };
        let views = self.view_manager.needs_redraw(clear);
        let layers = self.layer_manager.needs_redraw(clear);
        own.or(views).or(layers)
    }

    /// Runs one frame: resize check, layer updates, then a draw if one is
    /// due. Returns the redraw reason of a drawn frame.
    pub fn render_frame(&mut self, frame: FrameTime) -> Result<Option<String>, DeckError> {
        if frame.elapsed - self.last_stats_log >= STATS_INTERVAL {
            self.last_stats_log = frame.elapsed;
            self.layer_manager.context_mut().stats.log_summary();
        }

        self.check_size()?;
        self.update_cursor();

        if let Err(err) = self.layer_manager.update_layers() {
            self.report(&DeckError::from(err));
        }
        self.layer_manager.set_animation(frame);

        if !self.loaded {
            self.loaded = true;
            if let Some(on_load) = self.props.on_load.clone() {
                on_load();
            }
        }

        let Some(reason) = self.needs_redraw(true) else {
            return Ok(None);
        };
        self.layer_manager.context_mut().stats.redraw_count += 1;

        match self.props.custom_render.clone() {
            Some(custom_render) => custom_render(&reason),
            None => {
                self.draw_layers(&reason)?;
            }
        }
        Ok(Some(reason))
    }

    /// Draws immediately when forced or when a redraw is due.
    pub fn redraw(&mut self, force: bool) -> Result<Option<String>, DeckError> {
        let reason = if force {
            self.needs_redraw(true);
            Some("Redraw forced".to_string())
        } else {
            self.needs_redraw(true)
        };
        if let Some(reason) = &reason {
            self.draw_layers(reason)?;
        }
        Ok(reason)
    }

    /// Screen pass over every viewport, bracketed by the render callbacks.
    pub fn draw_layers(&mut self, redraw_reason: &str) -> Result<Vec<PassStats>, DeckError> {
        if let Some(on_before_render) = self.props.on_before_render.clone() {
            on_before_render(redraw_reason);
        }
        let viewports = self.view_manager.get_viewports(None);
        let views = self.view_manager.views().to_vec();
        let stats = self.layer_manager.draw_layers(DrawPass {
            pass: "screen",
            viewports: &viewports,
            views: &views,
            redraw_reason,
            custom_render: self.props.custom_render.is_some(),
            parameters: self.props.parameters,
        })?;
        if let Some(on_after_render) = self.props.on_after_render.clone() {
            on_after_render(redraw_reason);
        }
        Ok(stats)
    }

    fn check_size(&mut self) -> Result<(), DeckError> {
        let (width, height) = self.layer_manager.gl().canvas_size();
        if width == self.width && height == self.height {
            return Ok(());
        }
        log::debug!("canvas resized to {width}x{height}");
        self.width = width;
        self.height = height;
        self.view_manager.set_size(width, height)?;
        self.set_needs_redraw("Size changed");
        if let Some(on_resize) = self.props.on_resize.clone() {
            on_resize(width, height);
        }
        Ok(())
    }

    fn update_cursor(&mut self) {
        self.cursor = (self.props.get_cursor)(&self.interactive_state);
    }

    fn report(&self, err: &DeckError) {
        match &self.props.on_error {
            Some(on_error) => on_error(err),
            None => log::error!("{err}"),
        }
    }

    // ── interaction ─────────────────────────────────────────────────────

    pub fn set_interactive_state(&mut self, state: InteractiveState) {
        self.interactive_state = state;
        self.update_cursor();
    }

    /// Applies a controller-proposed camera. The callback may replace it;
    /// the result is tracked only when an initial camera was given and the
    /// host does not control the camera.
    pub fn handle_view_state_change(&mut self, change: ViewStateChange) -> Result<(), DeckError> {
        self.set_interactive_state(change.interactive_state);
        let view_state = match &self.props.on_view_state_change {
            Some(callback) => callback(&change).unwrap_or(change.view_state),
            None => change.view_state,
        };
        if self.props.view_state.is_some() {
            return Ok(());
        }

        let single_view = self.view_manager.views().len() <= 1;
        let Some(tracked) = self.view_state.as_mut() else {
            return Ok(());
        };
        if single_view {
            tracked.shared = view_state;
            tracked.by_view.remove(&change.view_id);
        } else {
            tracked.set(change.view_id, view_state);
        }
        let states = tracked.clone();
        self.view_manager.set_view_states(states)?;
        Ok(())
    }

    /// Routes pointer input to picks and the layer callbacks.
    ///
    /// Events without a position, and moves while a button is down, are
    /// ignored.
    pub fn handle_pointer_event(&mut self, event: &PointerEvent) -> Result<(), DeckError> {
        if event.kind == PointerEventKind::Leave {
            let radius = self.props.picking_radius;
            self.layer_manager.pick_object(PickRequest {
                x: -1.0,
                y: -1.0,
                radius,
                layer_ids: None,
                viewports: &[],
                views: &[],
                mode: PickMode::Hover,
                depth: 1,
            })?;
            self.interactive_state.is_hovering = false;
            self.update_cursor();
            if let Some(on_hover) = self.props.on_layer_hover.clone() {
                on_hover(None, &[], event);
            }
            return Ok(());
        }

        let Some(position) = event.position else {
            return Ok(());
        };
        let (mode, callback) = match event.kind {
            PointerEventKind::Click => (PickMode::Click, self.props.on_layer_click.clone()),
            PointerEventKind::Move if event.buttons == 0 => (PickMode::Hover, self.props.on_layer_hover.clone()),
            _ => return Ok(()),
        };

        let viewports = self
            .view_manager
            .get_viewports(Some(Rect::new(position.x, position.y, 1.0, 1.0)));
        let views = self.view_manager.views().to_vec();
        let infos = self.layer_manager.pick_object(PickRequest {
            x: position.x,
            y: position.y,
            radius: self.props.picking_radius,
            layer_ids: None,
            viewports: &viewports,
            views: &views,
            mode,
            depth: 1,
        })?;

        let primary = infos.iter().find(|info| info.index >= 0);
        if mode == PickMode::Hover {
            self.interactive_state.is_hovering = primary.is_some();
            self.update_cursor();
        }
        if let Some(callback) = callback {
            callback(primary, &infos, event);
        }
        Ok(())
    }

    // ── picking ─────────────────────────────────────────────────────────

    /// Top-most object at a point.
    pub fn pick_object(&mut self, opts: PickOptions<'_>) -> Result<Option<PickInfo>, DeckError> {
        Ok(self.pick(opts, 1)?.into_iter().next())
    }

    /// Up to `depth` objects stacked at a point, top-most first.
    pub fn pick_multiple_objects(&mut self, opts: PickOptions<'_>, depth: Option<usize>) -> Result<Vec<PickInfo>, DeckError> {
        self.pick(opts, depth.unwrap_or(10))
    }

    /// Every object visible in a rectangle.
    pub fn pick_objects(&mut self, opts: PickRectOptions<'_>) -> Result<Vec<PickInfo>, DeckError> {
        let viewports = self
            .view_manager
            .get_viewports(Some(Rect::new(opts.x, opts.y, opts.width, opts.height)));
        let views = self.view_manager.views().to_vec();
        self.layer_manager.pick_objects(PickRectRequest {
            x: opts.x,
            y: opts.y,
            width: opts.width,
            height: opts.height,
            layer_ids: opts.layer_ids,
            viewports: &viewports,
            views: &views,
            max_objects: opts.max_objects,
        })
    }

    fn pick(&mut self, opts: PickOptions<'_>, depth: usize) -> Result<Vec<PickInfo>, DeckError> {
        let viewports = self
            .view_manager
            .get_viewports(Some(Rect::new(opts.x, opts.y, 1.0, 1.0)));
        let views = self.view_manager.views().to_vec();
        self.layer_manager.pick_object(PickRequest {
            x: opts.x,
            y: opts.y,
            radius: opts.radius.unwrap_or(self.props.picking_radius),
            layer_ids: opts.layer_ids,
            viewports: &viewports,
            views: &views,
            mode: PickMode::Query,
            depth,
        })
    }

    /// Finalizes every layer and releases shared resources.
    pub fn finalize(&mut self) {
        log::debug!("finalizing deck {}", self.props.id);
        self.layer_manager.finalize();
    }
}

use std::any::Any;
use std::rc::Rc;

use crate::device::GlParameters;
use crate::error::DeckError;
use crate::layer::{LayerList, PickInfo};
use crate::render::LayerFilter;
use crate::view::{ControllerOptions, View, ViewState, ViewStates};

use super::events::{InteractiveState, PointerEvent, ViewStateChange};

pub type ResizeCallback = Rc<dyn Fn(f64, f64)>;
/// Receives the redraw reason.
pub type RenderCallback = Rc<dyn Fn(&str)>;
/// May return a replacement for the proposed state.
pub type ViewStateCallback = Rc<dyn Fn(&ViewStateChange) -> Option<ViewState>>;
/// `(primary, all, event)`; `primary` is the first info with an object.
pub type PickCallback = Rc<dyn Fn(Option<&PickInfo>, &[PickInfo], &PointerEvent)>;
pub type LoadCallback = Rc<dyn Fn()>;
pub type ErrorCallback = Rc<dyn Fn(&DeckError)>;
pub type CursorCallback = Rc<dyn Fn(&InteractiveState) -> String>;

/// Everything the host configures on a Deck.
#[derive(Clone)]
pub struct DeckProps {
    pub id: String,
    pub layers: LayerList,
    pub layer_filter: Option<LayerFilter>,
    /// Empty means a single full-canvas map view.
    pub views: Vec<View>,
    /// Controlled camera. Shadows the internally tracked one.
    pub view_state: Option<ViewStates>,
    /// Uncontrolled starting camera; the Deck tracks changes from here.
    pub initial_view_state: Option<ViewStates>,
    /// Applied to the first view.
    pub controller: Option<ControllerOptions>,
    pub picking_radius: f64,
    pub use_device_pixels: bool,
    /// Screen pass parameters.
    pub parameters: GlParameters,
    /// Redraw every frame.
    pub animate: bool,
    pub draw_picking_colors: bool,
    pub user_data: Option<Rc<dyn Any>>,
    /// Host-driven drawing: receives the reason and calls
    /// `Deck::draw_layers` itself.
    pub custom_render: Option<RenderCallback>,
    pub get_cursor: CursorCallback,
    pub on_resize: Option<ResizeCallback>,
    pub on_view_state_change: Option<ViewStateCallback>,
    pub on_before_render: Option<RenderCallback>,
    pub on_after_render: Option<RenderCallback>,
    pub on_layer_click: Option<PickCallback>,
    pub on_layer_hover: Option<PickCallback>,
    pub on_load: Option<LoadCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl Default for DeckProps {
    fn default() -> Self {
        Self {
            id: "deckgl-overlay".to_string(),
            layers: LayerList::empty(),
            layer_filter: None,
            views: Vec::new(),
            view_state: None,
            initial_view_state: None,
            controller: None,
            picking_radius: 0.0,
            use_device_pixels: true,
            parameters: GlParameters::default(),
            animate: false,
            draw_picking_colors: false,
            user_data: None,
            custom_render: None,
            get_cursor: Rc::new(|state: &InteractiveState| {
                (if state.is_dragging { "grabbing" } else { "grab" }).to_string()
            }),
            on_resize: None,
            on_view_state_change: None,
            on_before_render: None,
            on_after_render: None,
            on_layer_click: None,
            on_layer_hover: None,
            on_load: None,
            on_error: None,
        }
    }
}

/// A partial [`DeckProps`]; unset fields keep their current value.
#[derive(Clone, Default)]
pub struct DeckPropsUpdate {
    pub id: Option<String>,
    pub layers: Option<LayerList>,
    pub layer_filter: Option<Option<LayerFilter>>,
    pub views: Option<Vec<View>>,
    pub view_state: Option<Option<ViewStates>>,
    pub initial_view_state: Option<Option<ViewStates>>,
    pub controller: Option<Option<ControllerOptions>>,
    pub picking_radius: Option<f64>,
    pub use_device_pixels: Option<bool>,
    pub parameters: Option<GlParameters>,
    pub animate: Option<bool>,
    pub draw_picking_colors: Option<bool>,
    pub user_data: Option<Option<Rc<dyn Any>>>,
    pub custom_render: Option<Option<RenderCallback>>,
    pub get_cursor: Option<CursorCallback>,
    pub on_resize: Option<Option<ResizeCallback>>,
    pub on_view_state_change: Option<Option<ViewStateCallback>>,
    pub on_before_render: Option<Option<RenderCallback>>,
    pub on_after_render: Option<Option<RenderCallback>>,
    pub on_layer_click: Option<Option<PickCallback>>,
    pub on_layer_hover: Option<Option<PickCallback>>,
    pub on_load: Option<Option<LoadCallback>>,
    pub on_error: Option<Option<ErrorCallback>>,
}

macro_rules! value_setters {
    ($($name:ident: $ty:ty),* $(,)?) => {
        $(
            pub fn $name(mut self, value: $ty) -> Self {
                self.$name = Some(value.into());
                self
            }
        )*
    };
}

macro_rules! callback_setters {
    ($($name:ident: $alias:ident = [$($sig:tt)+]);* $(;)?) => {
        $(
            pub fn $name(mut self, callback: impl $($sig)+ + 'static) -> Self {
                self.$name = Some(Some(Rc::new(callback) as $alias));
                self
            }
        )*
    };
}

impl DeckPropsUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    value_setters! {
        id: String,
        layers: LayerList,
        views: Vec<View>,
        picking_radius: f64,
        use_device_pixels: bool,
        parameters: GlParameters,
        animate: bool,
        draw_picking_colors: bool,
    }

    pub fn view_state(mut self, view_state: impl Into<ViewStates>) -> Self {
        self.view_state = Some(Some(view_state.into()));
        self
    }

    /// Hands camera control back to the Deck.
    pub fn clear_view_state(mut self) -> Self {
        self.view_state = Some(None);
        self
    }

    pub fn initial_view_state(mut self, view_state: impl Into<ViewStates>) -> Self {
        self.initial_view_state = Some(Some(view_state.into()));
        self
    }

    pub fn controller(mut self, controller: Option<ControllerOptions>) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn layer_filter(mut self, filter: Option<LayerFilter>) -> Self {
        self.layer_filter = Some(filter);
        self
    }

    pub fn user_data(mut self, user_data: Option<Rc<dyn Any>>) -> Self {
        self.user_data = Some(user_data);
        self
    }

    pub fn get_cursor(mut self, callback: impl Fn(&InteractiveState) -> String + 'static) -> Self {
        self.get_cursor = Some(Rc::new(callback));
        self
    }

    callback_setters! {
        custom_render: RenderCallback = [Fn(&str)];
        on_resize: ResizeCallback = [Fn(f64, f64)];
        on_view_state_change: ViewStateCallback = [Fn(&ViewStateChange) -> Option<ViewState>];
        on_before_render: RenderCallback = [Fn(&str)];
        on_after_render: RenderCallback = [Fn(&str)];
        on_layer_click: PickCallback = [Fn(Option<&PickInfo>, &[PickInfo], &PointerEvent)];
        on_layer_hover: PickCallback = [Fn(Option<&PickInfo>, &[PickInfo], &PointerEvent)];
        on_load: LoadCallback = [Fn()];
        on_error: ErrorCallback = [Fn(&DeckError)];
    }

    /// Fields set in `later` override those of `self`.
    pub fn merged(mut self, later: DeckPropsUpdate) -> Self {
        macro_rules! take {
            ($this:ident, $later:ident; $($field:ident),*) => {
                $( if $later.$field.is_some() { $this.$field = $later.$field; } )*
            };
        }
        take!(
            self, later;
            id, layers, layer_filter, views, view_state, initial_view_state, controller, picking_radius,
            use_device_pixels, parameters, animate, draw_picking_colors, user_data, custom_render, get_cursor,
            on_resize, on_view_state_change, on_before_render, on_after_render, on_layer_click, on_layer_hover,
            on_load, on_error
        );
        self
    }
}

impl DeckProps {
    /// Shallow merge: every field set in `update` replaces the current one.
    pub fn apply(&mut self, update: DeckPropsUpdate) {
        macro_rules! apply {
            ($this:ident, $update:ident; $($field:ident),*) => {
                $( if let Some(value) = $update.$field { $this.$field = value; } )*
            };
        }
        apply!(
            self, update;
            id, layers, layer_filter, views, view_state, initial_view_state, controller, picking_radius,
            use_device_pixels, parameters, animate, draw_picking_colors, user_data, custom_render, get_cursor,
            on_resize, on_view_state_change, on_before_render, on_after_render, on_layer_click, on_layer_hover,
            on_load, on_error
        );
    }
}

impl From<DeckProps> for DeckPropsUpdate {
    fn from(props: DeckProps) -> Self {
        Self {
            id: Some(props.id),
            layers: Some(props.layers),
            layer_filter: Some(props.layer_filter),
            views: Some(props.views),
            view_state: Some(props.view_state),
            initial_view_state: Some(props.initial_view_state),
            controller: Some(props.controller),
            picking_radius: Some(props.picking_radius),
            use_device_pixels: Some(props.use_device_pixels),
            parameters: Some(props.parameters),
            animate: Some(props.animate),
            draw_picking_colors: Some(props.draw_picking_colors),
            user_data: Some(props.user_data),
            custom_render: Some(props.custom_render),
            get_cursor: Some(props.get_cursor),
            on_resize: Some(props.on_resize),
            on_view_state_change: Some(props.on_view_state_change),
            on_before_render: Some(props.on_before_render),
            on_after_render: Some(props.on_after_render),
            on_layer_click: Some(props.on_layer_click),
            on_layer_hover: Some(props.on_layer_hover),
            on_load: Some(props.on_load),
            on_error: Some(props.on_error),
        }
    }
}

use std::cell::RefCell;
use std::rc::Rc;

use crate::deck::{Deck, DeckProps, DeckPropsUpdate};
use crate::device::GlContext;
use crate::error::DeckError;
use crate::render::clear_canvas;
use crate::time::FrameClock;
use crate::view::ViewState;

use super::map::{HostEventKind, HostMap, ListenerKey};

/// How the overlay follows its host.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OverlayOptions {
    /// Added to the host zoom. Hosts with 256-px tiles use `-1.0`.
    pub zoom_offset: f64,
    /// Hide layers while the host camera moves.
    pub hide_on_move: bool,
    /// Lowest host zoom (before `zoom_offset`) at which layers are drawn.
    /// Further out the canvas stays blank.
    pub min_zoom: Option<f64>,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            zoom_offset: 0.0,
            hide_on_move: false,
            min_zoom: None,
        }
    }
}

/// A Deck that mirrors a [`HostMap`]'s camera.
///
/// Host listeners only queue events; [`DeckOverlay::process_events`] applies
/// them, so the host can emit while it is borrowed.
pub struct DeckOverlay<G: GlContext> {
    deck: Deck<G>,
    options: OverlayOptions,
    inbox: Rc<RefCell<Vec<HostEventKind>>>,
    keys: Vec<ListenerKey>,
    visible: bool,
    /// The canvas was blanked for a host zoom below `min_zoom`.
    zoomed_out: bool,
    clock: FrameClock,
}

impl<G: GlContext> DeckOverlay<G> {
    pub fn new(gl: G, props: DeckProps, options: OverlayOptions) -> Result<Self, DeckError> {
        Ok(Self {
            deck: Deck::new(gl, props)?,
            options,
            inbox: Rc::new(RefCell::new(Vec::new())),
            keys: Vec::new(),
            visible: true,
            zoomed_out: false,
            clock: FrameClock::new(),
        })
    }

    pub fn deck(&self) -> &Deck<G> {
        &self.deck
    }

    pub fn deck_mut(&mut self) -> &mut Deck<G> {
        &mut self.deck
    }

    pub fn options(&self) -> OverlayOptions {
        self.options
    }

    pub fn is_attached(&self) -> bool {
        !self.keys.is_empty()
    }

    /// `false` while hidden for a camera move.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Subscribes to every host event kind and renders once.
    pub fn attach<M: HostMap>(&mut self, map: &mut M) -> Result<(), DeckError> {
        if self.is_attached() {
            log::warn!("overlay {} is already attached", self.deck.props().id);
            return Ok(());
        }
        for kind in HostEventKind::ALL {
            let inbox = Rc::clone(&self.inbox);
            let key = map.subscribe(kind, Rc::new(move |kind| inbox.borrow_mut().push(kind)));
            self.keys.push(key);
        }
        log::debug!("overlay {} attached", self.deck.props().id);
        self.resize(map);
        self.render(map)?;
        Ok(())
    }

    /// Removes exactly the listeners added by [`attach`](Self::attach) and
    /// finalizes the Deck.
    pub fn detach<M: HostMap>(&mut self, map: &mut M) {
        for key in self.keys.drain(..) {
            if !map.unsubscribe(key) {
                log::warn!("host listener {key:?} was already removed");
            }
        }
        self.inbox.borrow_mut().clear();
        self.deck.finalize();
        log::debug!("overlay {} detached", self.deck.props().id);
    }

    /// Shallow-merges `update` into the Deck props and re-renders. The id is
    /// never cleared.
    pub fn set_props<M: HostMap>(&mut self, mut update: DeckPropsUpdate, map: &M) -> Result<(), DeckError> {
        if update.id.as_deref().is_some_and(str::is_empty) {
            update.id = None;
        }
        let result = self.deck.set_props(update);
        self.render(map)?;
        result
    }

    /// Applies host events queued since the last call. A failing event does
    /// not stop the ones after it; the first error is returned.
    pub fn process_events<M: HostMap>(&mut self, map: &M) -> Result<(), DeckError> {
        let events = std::mem::take(&mut *self.inbox.borrow_mut());
        let mut first_error = None;
        for kind in events {
            if let Err(err) = self.handle_event(kind, map) {
                log::warn!("host event {kind:?} failed: {err}");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn handle_event<M: HostMap>(&mut self, kind: HostEventKind, map: &M) -> Result<(), DeckError> {
        log::trace!("host event {kind:?}");
        match kind {
            HostEventKind::SizeChange => {
                self.resize(map);
                self.deck.set_needs_redraw("Map resized");
                self.render(map)?;
            }
            HostEventKind::ZoomEnd | HostEventKind::RotateEnd | HostEventKind::MoveEnd => {
                self.show();
                self.render(map)?;
            }
            HostEventKind::MoveStart => self.hide(),
            HostEventKind::CenterChange => {
                self.render(map)?;
            }
        }
        Ok(())
    }

    /// Pushes the host camera into the Deck and draws if a redraw is due.
    /// Returns the redraw reason of a drawn frame.
    pub fn render<M: HostMap>(&mut self, map: &M) -> Result<Option<String>, DeckError> {
        let view_state = self.host_view_state(map);
        if self.deck.props().view_state.as_ref().map(|states| &states.shared) != Some(&view_state) {
            self.deck.set_props(DeckPropsUpdate::new().view_state(view_state))?;
        }
        if !self.visible {
            return Ok(None);
        }
        if self.options.min_zoom.is_some_and(|min| map.view_state().zoom < min) {
            if !self.zoomed_out {
                log::debug!("host zoom below the overlay minimum, blanking");
                self.zoomed_out = true;
                self.clock.pause();
                clear_canvas(self.deck.gl_mut())?;
            }
            return Ok(None);
        }
        if self.zoomed_out {
            self.zoomed_out = false;
            self.deck.set_needs_redraw("Zoomed into range");
        }
        self.deck.render_frame(self.clock.tick())
    }

    fn host_view_state(&self, map: &impl HostMap) -> ViewState {
        let mut view_state = map.view_state();
        view_state.zoom += self.options.zoom_offset;
        view_state
    }

    fn resize(&mut self, map: &impl HostMap) {
        let (width, height) = map.size();
        self.deck.gl_mut().set_canvas_size(width, height, map.pixel_ratio());
    }

    fn hide(&mut self) {
        if self.options.hide_on_move {
            self.visible = false;
            self.clock.pause();
        }
    }

    fn show(&mut self) {
        if self.options.hide_on_move && !self.visible {
            self.visible = true;
            self.deck.set_needs_redraw("Overlay shown");
        }
    }
}

//! The Deck: top-level façade over the view manager and the layer manager.
//!
//! Hosts push props with [`Deck::set_props`], drive frames with
//! [`Deck::render_frame`] and forward pointer input to
//! [`Deck::handle_pointer_event`]. Results come back through the callbacks in
//! [`DeckProps`].

mod deck;
mod events;
mod props;

pub use deck::{Deck, PickOptions, PickRectOptions};
pub use events::{InteractiveState, PointerEvent, PointerEventKind, ViewStateChange};
pub use props::{
    CursorCallback, DeckProps, DeckPropsUpdate, ErrorCallback, LoadCallback, PickCallback, RenderCallback,
    ResizeCallback, ViewStateCallback,
};

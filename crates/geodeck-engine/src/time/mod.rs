//! Frame timing for the render loop.
//!
//! The host drives frames; the engine never schedules its own. One `FrameClock`
//! per Deck produces the `FrameTime` handed to `Deck::render_frame`, which layers
//! see as animation props.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};

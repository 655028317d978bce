#![deny(unsafe_op_in_unsafe_fn)]

//! Input normalization for the playdeck front end.
//!
//! Hardware transitions (GPIO button pad, quadrature rotary encoder), voice
//! verbs and REST commands are all normalized into canonical [`InputEvent`]s
//! and enqueued on the [`EventBus`]. Producers run on their own threads and
//! only ever enqueue; the UI main loop is the single consumer.

pub mod bus;
pub mod event;
pub mod gpio;
pub mod repeat;
pub mod rotary;

pub use bus::{EventBus, EventSender};
pub use event::{Direction, InputEvent, Key, KeyAction, KeySource};
pub use gpio::{GpioKeypad, KeypadConfig};
pub use repeat::RepeatTimer;
pub use rotary::{QuadratureDecoder, RotaryConfig, RotaryEncoder, Rotation, RotationEmitter};

#![deny(unsafe_op_in_unsafe_fn)]

//! Widget tree, interactive controls and directional focus navigation for
//! the playdeck front end.
//!
//! Canonical events from `playdeck-input` drive a retained component tree:
//! containers fan events out to ordered children, leaf controls run the
//! shared press/select state machine, and declared exit coordinates move
//! focus under four-direction remote input. Screens, renderers and backend
//! clients live in sibling crates and compose what is here.

pub mod app;
pub mod config;
pub mod control;
pub mod controls;
pub mod logging;
pub mod navigation;
pub mod widget;

pub use app::EventPump;
pub use config::{ControlTuning, UiConfig};
pub use control::{ControlCore, KeyOutcome, Release, ReleasePolicy};
pub use controls::{MultiStateButton, PushButton, Slider, ToggleButton};
pub use navigation::{landing_point, ExitTargets, DEFAULT_EXIT_MARGIN};
pub use widget::{shared, Component, EventCtx, Panel};

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bus::EventSender;
use crate::event::{InputEvent, Key, KeyAction};

/// Confirmed rotation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Clockwise,
    Anticlockwise,
}

/// GPIO assignment and tuning for the rotary encoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotaryConfig {
    #[serde(default = "default_chip")]
    pub chip: String,
    pub pin_a: u32,
    pub pin_b: u32,
    pub button_pin: u32,
    /// Consecutive same-direction provisional ticks required before a
    /// rotation is confirmed.
    #[serde(default = "default_jitter_tolerance")]
    pub jitter_tolerance: u8,
    /// Delay between the synthetic key-down and its matching key-up.
    #[serde(default = "default_emit_gap_ms")]
    pub emit_gap_ms: u64,
    /// Bounce window for the push-button channel, in milliseconds.
    #[serde(default = "default_bounce_ms")]
    pub bounce_ms: u64,
    #[serde(default = "default_clockwise_key")]
    pub clockwise_key: Key,
    #[serde(default = "default_anticlockwise_key")]
    pub anticlockwise_key: Key,
}

fn default_chip() -> String {
    "/dev/gpiochip0".to_string()
}

fn default_jitter_tolerance() -> u8 {
    2
}

fn default_emit_gap_ms() -> u64 {
    100
}

fn default_bounce_ms() -> u64 {
    200
}

fn default_clockwise_key() -> Key {
    Key::VolumeUp
}

fn default_anticlockwise_key() -> Key {
    Key::VolumeDown
}

impl Default for RotaryConfig {
    fn default() -> Self {
        Self {
            chip: default_chip(),
            pin_a: 17,
            pin_b: 27,
            button_pin: 22,
            jitter_tolerance: default_jitter_tolerance(),
            emit_gap_ms: default_emit_gap_ms(),
            bounce_ms: default_bounce_ms(),
            clockwise_key: default_clockwise_key(),
            anticlockwise_key: default_anticlockwise_key(),
        }
    }
}

impl RotaryConfig {
    pub fn emit_gap(&self) -> Duration {
        Duration::from_millis(self.emit_gap_ms)
    }

    pub fn bounce_window(&self) -> Duration {
        Duration::from_millis(self.bounce_ms)
    }
}

/// Quadrature transition decoder with jitter filtering.
///
/// Tracks the last sampled 3-bit code `(A, B, A xor B)`. Each new sample
/// yields `delta = (code - last) mod 4`: 1 is a provisional clockwise tick,
/// 3 a provisional anticlockwise tick, anything else is noise and ignored.
/// A reversing tick spends itself zeroing the opposite counter; a rotation
/// is confirmed only once a counter reaches the jitter tolerance, which
/// resets it.
#[derive(Debug)]
pub struct QuadratureDecoder {
    last_code: u8,
    clockwise_ticks: u8,
    anticlockwise_ticks: u8,
    jitter_tolerance: u8,
}

impl QuadratureDecoder {
    pub fn new(jitter_tolerance: u8) -> Self {
        Self {
            last_code: code(false, false),
            clockwise_ticks: 0,
            anticlockwise_ticks: 0,
            jitter_tolerance: jitter_tolerance.max(1),
        }
    }

    /// Re-seed the tracked code from the current pin levels without
    /// producing a tick. Used once at adapter start.
    pub fn reset_position(&mut self, a: bool, b: bool) {
        self.last_code = code(a, b);
        self.clockwise_ticks = 0;
        self.anticlockwise_ticks = 0;
    }

    /// Feed one sampled pin state. Returns a direction only when a rotation
    /// is confirmed.
    pub fn sample(&mut self, a: bool, b: bool) -> Option<Rotation> {
        let new_code = code(a, b);
        let delta = delta(self.last_code, new_code);
        self.last_code = new_code;
        match delta {
            1 => {
                if self.anticlockwise_ticks > 0 {
                    // Reversal: the tick spends itself wiping the pending
                    // opposite count instead of accumulating.
                    self.anticlockwise_ticks = 0;
                } else {
                    self.clockwise_ticks += 1;
                    if self.clockwise_ticks >= self.jitter_tolerance {
                        self.clockwise_ticks = 0;
                        return Some(Rotation::Clockwise);
                    }
                }
            }
            3 => {
                if self.clockwise_ticks > 0 {
                    self.clockwise_ticks = 0;
                } else {
                    self.anticlockwise_ticks += 1;
                    if self.anticlockwise_ticks >= self.jitter_tolerance {
                        self.anticlockwise_ticks = 0;
                        return Some(Rotation::Anticlockwise);
                    }
                }
            }
            _ => {}
        }
        None
    }

    #[cfg(test)]
    pub(crate) fn ticks(&self) -> (u8, u8) {
        (self.clockwise_ticks, self.anticlockwise_ticks)
    }
}

pub(crate) fn code(a: bool, b: bool) -> u8 {
    (u8::from(a) << 2) | (u8::from(b) << 1) | u8::from(a ^ b)
}

pub(crate) fn delta(last: u8, new: u8) -> u8 {
    new.wrapping_sub(last) & 0b11
}

/// Serialized key emission for confirmed rotations and the push button.
///
/// The down goes out immediately on the caller's thread; the matching up is
/// handed to a short-lived worker that sleeps out the emit gap, so decode
/// callbacks never block. The gate mutex keeps rotation and button
/// emissions from interleaving a mismatched down/up pair.
#[derive(Clone)]
pub struct RotationEmitter {
    sender: EventSender,
    gate: Arc<Mutex<()>>,
    gap: Duration,
    clockwise_key: Key,
    anticlockwise_key: Key,
}

impl RotationEmitter {
    pub fn new(sender: EventSender, gap: Duration, clockwise_key: Key, anticlockwise_key: Key) -> Self {
        Self {
            sender,
            gate: Arc::new(Mutex::new(())),
            gap,
            clockwise_key,
            anticlockwise_key,
        }
    }

    pub fn emit(&self, rotation: Rotation) {
        let key = match rotation {
            Rotation::Clockwise => self.clockwise_key,
            Rotation::Anticlockwise => self.anticlockwise_key,
        };
        {
            let _guard = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
            self.sender.send(InputEvent::keypad(key, KeyAction::Down));
        }

        let sender = self.sender.clone();
        let gate = Arc::clone(&self.gate);
        let gap = self.gap;
        let spawned = thread::Builder::new()
            .name("playdeck-rotary-up".to_string())
            .spawn(move || {
                thread::sleep(gap);
                let _guard = gate.lock().unwrap_or_else(PoisonError::into_inner);
                sender.send(InputEvent::keypad(key, KeyAction::release()));
            });
        if spawned.is_err() {
            // Thread spawn failed; complete the pair inline rather than
            // leaving a key stuck down.
            tracing::warn!("rotary up-worker spawn failed, emitting up inline");
            let _guard = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
            self.sender.send(InputEvent::keypad(key, KeyAction::release()));
        }
    }

    /// Push-button transition on the encoder shaft, under the same gate.
    pub fn emit_button(&self, pressed: bool) {
        let action = if pressed {
            KeyAction::Down
        } else {
            KeyAction::release()
        };
        let _guard = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.sender.send(InputEvent::keypad(Key::Select, action));
    }
}

#[cfg(target_os = "linux")]
mod platform {
    use std::os::unix::io::AsRawFd;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};
    use std::time::Instant;

    use anyhow::{Context, Result};
    use linux_embedded_hal::gpio_cdev::{
        Chip, EventRequestFlags, EventType, LineEventHandle, LineRequestFlags,
    };

    use super::{QuadratureDecoder, RotaryConfig, RotationEmitter};
    use crate::bus::EventSender;
    use crate::gpio::{poll_ready, DebounceFilter};

    const POLL_TIMEOUT_MS: i32 = 100;

    /// Rotary encoder adapter: two quadrature lines plus a push button.
    ///
    /// Decode and button channels run on their own reader threads. Init
    /// failure degrades to an inert adapter: logged, no threads, no events.
    pub struct RotaryEncoder {
        stop: Arc<AtomicBool>,
        decode: Option<JoinHandle<()>>,
        button: Option<JoinHandle<()>>,
    }

    impl RotaryEncoder {
        pub fn new(cfg: &RotaryConfig, sender: EventSender) -> Self {
            match Self::try_start(cfg, sender) {
                Ok(encoder) => encoder,
                Err(err) => {
                    tracing::warn!("rotary encoder unavailable, input disabled: {:#}", err);
                    Self {
                        stop: Arc::new(AtomicBool::new(true)),
                        decode: None,
                        button: None,
                    }
                }
            }
        }

        pub fn is_active(&self) -> bool {
            self.decode.is_some()
        }

        /// Stop both reader threads and release the GPIO lines.
        pub fn shutdown(&mut self) {
            self.stop.store(true, Ordering::Relaxed);
            if let Some(handle) = self.decode.take() {
                let _ = handle.join();
            }
            if let Some(handle) = self.button.take() {
                let _ = handle.join();
            }
        }

        fn try_start(cfg: &RotaryConfig, sender: EventSender) -> Result<Self> {
            let mut chip = Chip::new(&cfg.chip)
                .with_context(|| format!("opening GPIO chip {}", cfg.chip))?;
            let events_a = edge_events(&mut chip, cfg.pin_a, "playdeck-rotary-a")?;
            let events_b = edge_events(&mut chip, cfg.pin_b, "playdeck-rotary-b")?;
            let events_btn = edge_events(&mut chip, cfg.button_pin, "playdeck-rotary-btn")?;

            let emitter = RotationEmitter::new(
                sender,
                cfg.emit_gap(),
                cfg.clockwise_key,
                cfg.anticlockwise_key,
            );
            let stop = Arc::new(AtomicBool::new(false));

            let decode = {
                let stop = Arc::clone(&stop);
                let emitter = emitter.clone();
                let tolerance = cfg.jitter_tolerance;
                thread::Builder::new()
                    .name("playdeck-rotary".to_string())
                    .spawn(move || decode_loop(events_a, events_b, tolerance, emitter, stop))
                    .context("spawning rotary decode thread")?
            };
            let button = {
                let stop = Arc::clone(&stop);
                let window = cfg.bounce_window();
                thread::Builder::new()
                    .name("playdeck-rotary-button".to_string())
                    .spawn(move || button_loop(events_btn, window, emitter, stop))
                    .context("spawning rotary button thread")?
            };

            Ok(Self {
                stop,
                decode: Some(decode),
                button: Some(button),
            })
        }
    }

    impl Drop for RotaryEncoder {
        fn drop(&mut self) {
            self.shutdown();
        }
    }

    fn edge_events(chip: &mut Chip, pin: u32, consumer: &str) -> Result<LineEventHandle> {
        let line = chip
            .get_line(pin)
            .with_context(|| format!("requesting GPIO line {pin}"))?;
        line.events(
            LineRequestFlags::INPUT,
            EventRequestFlags::BOTH_EDGES,
            consumer,
        )
        .with_context(|| format!("configuring edge events on line {pin}"))
    }

    fn decode_loop(
        mut events_a: LineEventHandle,
        mut events_b: LineEventHandle,
        jitter_tolerance: u8,
        emitter: RotationEmitter,
        stop: Arc<AtomicBool>,
    ) {
        let mut level_a = events_a.get_value().map(|v| v != 0).unwrap_or(false);
        let mut level_b = events_b.get_value().map(|v| v != 0).unwrap_or(false);
        let mut decoder = QuadratureDecoder::new(jitter_tolerance);
        decoder.reset_position(level_a, level_b);

        let mut fds = [
            libc::pollfd {
                fd: events_a.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
            libc::pollfd {
                fd: events_b.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
        ];

        while !stop.load(Ordering::Relaxed) {
            if poll_ready(&mut fds, POLL_TIMEOUT_MS) == 0 {
                continue;
            }
            for index in 0..fds.len() {
                if fds[index].revents & libc::POLLIN == 0 {
                    continue;
                }
                fds[index].revents = 0;
                let (handle, level) = if index == 0 {
                    (&mut events_a, &mut level_a)
                } else {
                    (&mut events_b, &mut level_b)
                };
                match handle.get_event() {
                    Ok(event) => {
                        *level = matches!(event.event_type(), EventType::RisingEdge);
                    }
                    Err(err) => {
                        tracing::debug!("rotary edge read failed: {err}");
                        continue;
                    }
                }
                if let Some(rotation) = decoder.sample(level_a, level_b) {
                    emitter.emit(rotation);
                }
            }
        }
    }

    fn button_loop(
        mut events: LineEventHandle,
        window: std::time::Duration,
        emitter: RotationEmitter,
        stop: Arc<AtomicBool>,
    ) {
        let mut filter = DebounceFilter::new(window);
        let mut pressed = events.get_value().map(|v| v == 0).unwrap_or(false);
        let mut fds = [libc::pollfd {
            fd: events.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        }];

        while !stop.load(Ordering::Relaxed) {
            if poll_ready(&mut fds, POLL_TIMEOUT_MS) == 0 {
                continue;
            }
            fds[0].revents = 0;
            if let Err(err) = events.get_event() {
                tracing::debug!("rotary button edge read failed: {err}");
                continue;
            }
            if !filter.accept(Instant::now()) {
                continue;
            }
            let now_pressed = match events.get_value() {
                Ok(value) => value == 0,
                Err(err) => {
                    tracing::debug!("rotary button level read failed: {err}");
                    continue;
                }
            };
            if now_pressed != pressed {
                pressed = now_pressed;
                emitter.emit_button(pressed);
            }
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod platform {
    use super::RotaryConfig;
    use crate::bus::EventSender;

    /// Inert stand-in for non-Linux hosts; there is no GPIO to read.
    pub struct RotaryEncoder;

    impl RotaryEncoder {
        pub fn new(_cfg: &RotaryConfig, _sender: EventSender) -> Self {
            tracing::warn!("rotary encoder is only available on Linux; input disabled");
            Self
        }

        pub fn is_active(&self) -> bool {
            false
        }

        pub fn shutdown(&mut self) {}
    }
}

pub use platform::RotaryEncoder;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::event::InputEvent;
    use proptest::prelude::*;

    // Clockwise single-step sample order starting from (false, false).
    const CLOCKWISE: [(bool, bool); 4] = [(true, false), (true, true), (false, true), (false, false)];
    // Anticlockwise is the same ring walked the other way.
    const ANTICLOCKWISE: [(bool, bool); 4] =
        [(false, true), (true, true), (true, false), (false, false)];

    #[test]
    fn tolerance_one_confirms_every_step() {
        let mut decoder = QuadratureDecoder::new(1);
        for (a, b) in CLOCKWISE {
            assert_eq!(decoder.sample(a, b), Some(Rotation::Clockwise));
        }
    }

    #[test]
    fn tolerance_two_needs_two_consecutive_ticks() {
        let mut decoder = QuadratureDecoder::new(2);
        assert_eq!(decoder.sample(true, false), None);
        assert_eq!(decoder.sample(true, true), Some(Rotation::Clockwise));
        // Counter reset after confirmation: next tick is provisional again.
        assert_eq!(decoder.sample(false, true), None);
        assert_eq!(decoder.sample(false, false), Some(Rotation::Clockwise));
    }

    #[test]
    fn fewer_ticks_than_tolerance_confirm_nothing() {
        let mut decoder = QuadratureDecoder::new(3);
        assert_eq!(decoder.sample(true, false), None);
        assert_eq!(decoder.sample(true, true), None);
        assert_eq!(decoder.ticks(), (2, 0));
    }

    #[test]
    fn reversal_resets_the_opposite_counter() {
        let mut decoder = QuadratureDecoder::new(2);
        // One provisional clockwise tick, then one anticlockwise: both
        // counters end at zero and nothing is confirmed.
        assert_eq!(decoder.sample(true, false), None);
        assert_eq!(decoder.ticks(), (1, 0));
        assert_eq!(decoder.sample(false, false), None);
        assert_eq!(decoder.ticks(), (0, 0));
        assert_eq!(decoder.sample(true, false), None);
        assert_eq!(decoder.ticks(), (1, 0));
    }

    #[test]
    fn two_position_jump_is_noise() {
        let mut decoder = QuadratureDecoder::new(1);
        // Both lines flip at once: delta 2, ignored.
        assert_eq!(decoder.sample(true, true), None);
        assert_eq!(decoder.ticks(), (0, 0));
    }

    #[test]
    fn repeated_sample_is_noise() {
        let mut decoder = QuadratureDecoder::new(1);
        assert_eq!(decoder.sample(false, false), None);
        assert_eq!(decoder.ticks(), (0, 0));
    }

    #[test]
    fn reset_position_clears_state() {
        let mut decoder = QuadratureDecoder::new(2);
        decoder.sample(true, false);
        decoder.reset_position(true, true);
        assert_eq!(decoder.ticks(), (0, 0));
        // The re-seeded position means the next ring step is one tick.
        assert_eq!(decoder.sample(false, true), None);
        assert_eq!(decoder.ticks(), (1, 0));
    }

    #[test]
    fn anticlockwise_ring_confirms_anticlockwise() {
        let mut decoder = QuadratureDecoder::new(2);
        assert_eq!(decoder.sample(ANTICLOCKWISE[0].0, ANTICLOCKWISE[0].1), None);
        assert_eq!(
            decoder.sample(ANTICLOCKWISE[1].0, ANTICLOCKWISE[1].1),
            Some(Rotation::Anticlockwise)
        );
    }

    proptest! {
        // Single-line transitions can only ever produce deltas 0, 1 or 3;
        // delta 2 requires both lines to flip inside one sample, which edge
        // callbacks never deliver.
        #[test]
        fn single_line_deltas_are_never_two(ops in proptest::collection::vec(0u8..3, 1..64)) {
            let mut a = false;
            let mut b = false;
            let mut last = code(a, b);
            for op in ops {
                match op {
                    0 => a = !a,
                    1 => b = !b,
                    _ => {}
                }
                let next = code(a, b);
                let d = delta(last, next);
                prop_assert!(d == 0 || d == 1 || d == 3, "delta {} out of range", d);
                last = next;
            }
        }
    }

    #[test]
    fn emitter_sends_down_then_one_up_after_gap() {
        let bus = EventBus::new();
        let emitter = RotationEmitter::new(
            bus.sender(),
            Duration::from_millis(30),
            Key::VolumeUp,
            Key::VolumeDown,
        );
        emitter.emit(Rotation::Clockwise);

        assert_eq!(
            bus.recv_timeout(Duration::from_millis(200)),
            Some(InputEvent::keypad(Key::VolumeUp, KeyAction::Down))
        );
        assert_eq!(
            bus.recv_timeout(Duration::from_millis(500)),
            Some(InputEvent::keypad(Key::VolumeUp, KeyAction::release()))
        );
        // Exactly one up: nothing else arrives.
        assert_eq!(bus.recv_timeout(Duration::from_millis(100)), None);
    }

    #[test]
    fn emitter_maps_anticlockwise_to_configured_key() {
        let bus = EventBus::new();
        let emitter = RotationEmitter::new(
            bus.sender(),
            Duration::from_millis(10),
            Key::Right,
            Key::Left,
        );
        emitter.emit(Rotation::Anticlockwise);
        assert_eq!(
            bus.recv_timeout(Duration::from_millis(200)),
            Some(InputEvent::keypad(Key::Left, KeyAction::Down))
        );
        assert_eq!(
            bus.recv_timeout(Duration::from_millis(500)),
            Some(InputEvent::keypad(Key::Left, KeyAction::release()))
        );
    }

    #[test]
    fn emitter_button_sends_select_pair() {
        let bus = EventBus::new();
        let emitter = RotationEmitter::new(
            bus.sender(),
            Duration::from_millis(10),
            Key::VolumeUp,
            Key::VolumeDown,
        );
        emitter.emit_button(true);
        emitter.emit_button(false);
        assert_eq!(
            bus.try_recv(),
            Some(InputEvent::keypad(Key::Select, KeyAction::Down))
        );
        assert_eq!(
            bus.try_recv(),
            Some(InputEvent::keypad(Key::Select, KeyAction::release()))
        );
    }

    #[test]
    fn tolerance_two_scenario_emits_one_pair_then_none_on_reversal() {
        let bus = EventBus::new();
        let emitter = RotationEmitter::new(
            bus.sender(),
            Duration::from_millis(10),
            Key::VolumeUp,
            Key::VolumeDown,
        );
        let mut decoder = QuadratureDecoder::new(2);

        // Two clockwise ticks: exactly one down/up pair.
        for (a, b) in &CLOCKWISE[..2] {
            if let Some(rotation) = decoder.sample(*a, *b) {
                emitter.emit(rotation);
            }
        }
        assert_eq!(
            bus.recv_timeout(Duration::from_millis(200)),
            Some(InputEvent::keypad(Key::VolumeUp, KeyAction::Down))
        );
        assert_eq!(
            bus.recv_timeout(Duration::from_millis(500)),
            Some(InputEvent::keypad(Key::VolumeUp, KeyAction::release()))
        );

        // One clockwise then one anticlockwise tick: nothing, and both
        // counters are back at zero.
        assert_eq!(decoder.sample(false, true), None);
        assert_eq!(decoder.ticks(), (1, 0));
        assert_eq!(decoder.sample(true, true), None);
        assert_eq!(decoder.ticks(), (0, 0));
        assert_eq!(bus.recv_timeout(Duration::from_millis(100)), None);
    }

    #[test]
    fn rotary_config_round_trip() {
        let cfg = RotaryConfig {
            jitter_tolerance: 4,
            clockwise_key: Key::Right,
            anticlockwise_key: Key::Left,
            ..RotaryConfig::default()
        };
        let json = serde_json::to_string(&cfg).expect("serialize rotary config");
        let decoded: RotaryConfig = serde_json::from_str(&json).expect("deserialize rotary config");
        assert_eq!(decoded.jitter_tolerance, 4);
        assert_eq!(decoded.clockwise_key, Key::Right);
        assert_eq!(decoded.emit_gap(), Duration::from_millis(100));
    }
}

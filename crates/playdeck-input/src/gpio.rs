use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::event::Key;

/// GPIO assignment for the directional button pad.
///
/// Buttons are active-low (pressed = 0, released = 1); pull-ups are
/// configured via /boot/config.txt, which the installer sets up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeypadConfig {
    #[serde(default = "default_chip")]
    pub chip: String,
    pub up_pin: u32,
    pub down_pin: u32,
    pub left_pin: u32,
    pub right_pin: u32,
    pub select_pin: u32,
    pub back_pin: u32,
    /// Bounce window applied to every button line, in milliseconds.
    #[serde(default = "default_bounce_ms")]
    pub bounce_ms: u64,
}

fn default_chip() -> String {
    "/dev/gpiochip0".to_string()
}

fn default_bounce_ms() -> u64 {
    200
}

impl Default for KeypadConfig {
    fn default() -> Self {
        // Waveshare HAT joystick/button layout.
        Self {
            chip: default_chip(),
            up_pin: 6,
            down_pin: 19,
            left_pin: 5,
            right_pin: 26,
            select_pin: 13,
            back_pin: 21,
            bounce_ms: default_bounce_ms(),
        }
    }
}

impl KeypadConfig {
    pub(crate) fn bindings(&self) -> [(Key, u32); 6] {
        [
            (Key::Up, self.up_pin),
            (Key::Down, self.down_pin),
            (Key::Left, self.left_pin),
            (Key::Right, self.right_pin),
            (Key::Select, self.select_pin),
            (Key::Back, self.back_pin),
        ]
    }

    pub fn bounce_window(&self) -> Duration {
        Duration::from_millis(self.bounce_ms)
    }
}

/// Fixed-window contact-bounce filter.
///
/// The first edge is accepted and opens the window; every edge inside the
/// window is discarded. Callers re-read the settled line level after an
/// accepted edge, so a discarded bounce can never desync logical state.
#[derive(Debug)]
pub(crate) struct DebounceFilter {
    window: Duration,
    last_accept: Option<Instant>,
}

impl DebounceFilter {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            last_accept: None,
        }
    }

    pub(crate) fn accept(&mut self, now: Instant) -> bool {
        match self.last_accept {
            Some(last) if now.duration_since(last) < self.window => false,
            _ => {
                self.last_accept = Some(now);
                true
            }
        }
    }
}

/// Wait for readability on any of `fds`, marking `revents` in place.
/// Returns the number of ready descriptors (0 on timeout).
#[cfg(target_os = "linux")]
pub(crate) fn poll_ready(fds: &mut [libc::pollfd], timeout_ms: i32) -> usize {
    let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
    if rc <= 0 {
        0
    } else {
        rc as usize
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
        Chip, EventRequestFlags, LineEventHandle, LineRequestFlags,
    };

    use super::{poll_ready, DebounceFilter, KeypadConfig};
    use crate::bus::EventSender;
    use crate::event::{InputEvent, Key, KeyAction};

    const POLL_TIMEOUT_MS: i32 = 100;

    struct ButtonLine {
        key: Key,
        events: LineEventHandle,
        filter: DebounceFilter,
        pressed: bool,
    }

    /// Edge-driven button pad adapter.
    ///
    /// One reader thread watches every configured line for both edges and
    /// emits a canonical down (active level) / up (inactive level) pair per
    /// press. Init failure degrades to an inert pad: logged, no thread, no
    /// events, no propagation.
    pub struct GpioKeypad {
        stop: Arc<AtomicBool>,
        reader: Option<JoinHandle<()>>,
    }

    impl GpioKeypad {
        pub fn new(cfg: &KeypadConfig, sender: EventSender) -> Self {
            match Self::try_start(cfg, sender) {
                Ok(pad) => pad,
                Err(err) => {
                    tracing::warn!("button pad unavailable, input disabled: {:#}", err);
                    Self {
                        stop: Arc::new(AtomicBool::new(true)),
                        reader: None,
                    }
                }
            }
        }

        pub fn is_active(&self) -> bool {
            self.reader.is_some()
        }

        /// Stop the reader thread and release the GPIO lines.
        pub fn shutdown(&mut self) {
            self.stop.store(true, Ordering::Relaxed);
            if let Some(handle) = self.reader.take() {
                let _ = handle.join();
            }
        }

        fn try_start(cfg: &KeypadConfig, sender: EventSender) -> Result<Self> {
            let mut chip = Chip::new(&cfg.chip)
                .with_context(|| format!("opening GPIO chip {}", cfg.chip))?;
            let window = cfg.bounce_window();
            let mut lines = Vec::new();
            for (key, pin) in cfg.bindings() {
                let line = chip
                    .get_line(pin)
                    .with_context(|| format!("requesting GPIO line {pin}"))?;
                let events = line
                    .events(
                        LineRequestFlags::INPUT,
                        EventRequestFlags::BOTH_EDGES,
                        "playdeck-keypad",
                    )
                    .with_context(|| format!("configuring edge events on line {pin}"))?;
                let pressed = events
                    .get_value()
                    .with_context(|| format!("reading initial level of line {pin}"))?
                    == 0;
                lines.push(ButtonLine {
                    key,
                    events,
                    filter: DebounceFilter::new(window),
                    pressed,
                });
            }

            let stop = Arc::new(AtomicBool::new(false));
            let stop_flag = Arc::clone(&stop);
            let reader = thread::Builder::new()
                .name("playdeck-keypad".to_string())
                .spawn(move || read_loop(lines, sender, stop_flag))
                .context("spawning keypad reader thread")?;

            Ok(Self {
                stop,
                reader: Some(reader),
            })
        }
    }

    impl Drop for GpioKeypad {
        fn drop(&mut self) {
            self.shutdown();
        }
    }

    fn read_loop(mut lines: Vec<ButtonLine>, sender: EventSender, stop: Arc<AtomicBool>) {
        let mut fds: Vec<libc::pollfd> = lines
            .iter()
            .map(|line| libc::pollfd {
                fd: line.events.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();

        while !stop.load(Ordering::Relaxed) {
            if poll_ready(&mut fds, POLL_TIMEOUT_MS) == 0 {
                // Quiet period: sweep up any transition whose edge landed
                // inside a bounce window and was discarded, so a key can
                // never stay logically down after the contact settled.
                for line in &mut lines {
                    sync_level(line, &sender);
                }
                continue;
            }
            for (index, fd) in fds.iter_mut().enumerate() {
                if fd.revents & libc::POLLIN == 0 {
                    continue;
                }
                fd.revents = 0;
                let line = &mut lines[index];
                // Drain the kernel's edge record, then trust the settled
                // level rather than the edge polarity.
                if let Err(err) = line.events.get_event() {
                    tracing::debug!("GPIO event read failed for {:?}: {err}", line.key);
                    continue;
                }
                sync_level(line, &sender);
            }
        }
    }

    /// Re-read the settled level and emit the canonical transition if the
    /// logical state drifted. The bounce window is consulted only when the
    /// level actually changed, so bounces never starve a real transition.
    fn sync_level(line: &mut ButtonLine, sender: &EventSender) {
        let pressed = match line.events.get_value() {
            Ok(value) => value == 0,
            Err(err) => {
                tracing::debug!("GPIO level read failed for {:?}: {err}", line.key);
                return;
            }
        };
        if pressed == line.pressed {
            return;
        }
        if !line.filter.accept(Instant::now()) {
            return;
        }
        line.pressed = pressed;
        let action = if pressed {
            KeyAction::Down
        } else {
            KeyAction::release()
        };
        sender.send(InputEvent::keypad(line.key, action));
    }
}

#[cfg(not(target_os = "linux"))]
mod platform {
    use super::KeypadConfig;
    use crate::bus::EventSender;

    /// Inert stand-in for non-Linux hosts; there is no GPIO to read.
    pub struct GpioKeypad;

    impl GpioKeypad {
        pub fn new(_cfg: &KeypadConfig, _sender: EventSender) -> Self {
            tracing::warn!("GPIO keypad is only available on Linux; input disabled");
            Self
        }

        pub fn is_active(&self) -> bool {
            false
        }

        pub fn shutdown(&mut self) {}
    }
}

pub use platform::GpioKeypad;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debounce_accepts_first_edge() {
        let mut filter = DebounceFilter::new(Duration::from_millis(200));
        assert!(filter.accept(Instant::now()));
    }

    #[test]
    fn debounce_discards_edges_inside_window() {
        let mut filter = DebounceFilter::new(Duration::from_millis(200));
        let t0 = Instant::now();
        assert!(filter.accept(t0));
        assert!(!filter.accept(t0 + Duration::from_millis(50)));
        assert!(!filter.accept(t0 + Duration::from_millis(199)));
        assert!(filter.accept(t0 + Duration::from_millis(200)));
    }

    #[test]
    fn debounce_reopens_after_window() {
        let mut filter = DebounceFilter::new(Duration::from_millis(100));
        let t0 = Instant::now();
        assert!(filter.accept(t0));
        assert!(filter.accept(t0 + Duration::from_millis(150)));
        assert!(!filter.accept(t0 + Duration::from_millis(200)));
    }

    #[test]
    fn keypad_config_default_binds_six_keys() {
        let cfg = KeypadConfig::default();
        let bindings = cfg.bindings();
        assert_eq!(bindings.len(), 6);
        assert!(bindings.iter().any(|(key, _)| *key == Key::Select));
        assert_eq!(cfg.bounce_window(), Duration::from_millis(200));
    }

    #[test]
    fn keypad_config_round_trip() {
        let cfg = KeypadConfig {
            chip: "/dev/gpiochip1".to_string(),
            bounce_ms: 120,
            ..KeypadConfig::default()
        };
        let json = serde_json::to_string(&cfg).expect("serialize keypad config");
        let decoded: KeypadConfig = serde_json::from_str(&json).expect("deserialize keypad config");
        assert_eq!(decoded.chip, "/dev/gpiochip1");
        assert_eq!(decoded.bounce_ms, 120);
        assert_eq!(decoded.up_pin, cfg.up_pin);
    }
}

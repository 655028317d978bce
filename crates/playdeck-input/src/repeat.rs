use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::bus::EventSender;
use crate::event::{InputEvent, Key, KeyAction};

const CANCEL_POLL: Duration = Duration::from_millis(10);

/// Press-and-hold key repeat.
///
/// While running, a worker thread sends a down/up pair for the held key at
/// the configured interval. `start` on a running timer is the documented
/// cancel-then-start; `cancel` flips the running flag and joins the worker
/// before returning, so a restart can never race a stale worker.
pub struct RepeatTimer {
    sender: EventSender,
    interval: Duration,
    worker: Option<Worker>,
}

struct Worker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl RepeatTimer {
    pub fn new(sender: EventSender, interval: Duration) -> Self {
        Self {
            sender,
            interval,
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Begin repeating `key`. Any previous worker is cancelled first.
    pub fn start(&mut self, key: Key) {
        self.cancel();

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let sender = self.sender.clone();
        let interval = self.interval;
        let spawned = thread::Builder::new()
            .name("playdeck-repeat".to_string())
            .spawn(move || {
                while flag.load(Ordering::Relaxed) {
                    sender.send(InputEvent::keypad(key, KeyAction::Down));
                    sender.send(InputEvent::keypad(key, KeyAction::release()));
                    // Sliced sleep keeps cancellation responsive.
                    let mut slept = Duration::ZERO;
                    while slept < interval && flag.load(Ordering::Relaxed) {
                        let step = CANCEL_POLL.min(interval - slept);
                        thread::sleep(step);
                        slept += step;
                    }
                }
            });
        match spawned {
            Ok(handle) => self.worker = Some(Worker { running, handle }),
            Err(err) => tracing::warn!("repeat worker spawn failed: {err}"),
        }
    }

    /// Stop repeating. Joins the worker; safe to call when idle.
    pub fn cancel(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.running.store(false, Ordering::Relaxed);
            let _ = worker.handle.join();
        }
    }
}

impl Drop for RepeatTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use embedded_graphics::draw_target::DrawTarget;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::Point;
use playdeck_input::{EventBus, EventSender, InputEvent};

use crate::widget::{Component, EventCtx, Panel};

const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Single-threaded main loop: drains the event bus into the widget tree,
/// ticks refresh once per frame and draws. Event handling and drawing never
/// run concurrently; producer threads only ever enqueue.
pub struct EventPump<D: DrawTarget<Color = Rgb565>> {
    bus: EventBus,
    root: Panel<D>,
    frame_interval: Duration,
}

impl<D: DrawTarget<Color = Rgb565>> EventPump<D> {
    pub fn new(root: Panel<D>) -> Self {
        Self {
            bus: EventBus::new(),
            root,
            frame_interval: DEFAULT_FRAME_INTERVAL,
        }
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Producer handle for adapters, REST handlers and the voice assistant.
    pub fn sender(&self) -> EventSender {
        self.bus.sender()
    }

    pub fn root(&self) -> &Panel<D> {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Panel<D> {
        &mut self.root
    }

    /// Programmatic focus: ask whichever control contains `point` to become
    /// selected. Used by screens, REST handlers and the voice assistant.
    pub fn post_select_at(&self, point: Point) {
        self.bus.sender().send(InputEvent::SelectAt { point });
    }

    /// Drain every pending event (including ones posted while draining,
    /// such as navigation redeliveries), then tick refresh once.
    pub fn tick(&mut self) {
        while let Some(event) = self.bus.try_recv() {
            self.dispatch(&event);
        }
        self.root.refresh();
    }

    /// One frame: drain, refresh, draw.
    pub fn run_frame(&mut self, target: &mut D) -> Result<(), D::Error> {
        self.tick();
        self.root.draw(target)
    }

    /// Frame loop until `stop` flips. Blocks on the bus between frames so an
    /// idle deck wakes only on input or the frame tick.
    pub fn run(&mut self, target: &mut D, stop: &AtomicBool) -> Result<(), D::Error> {
        while !stop.load(Ordering::Relaxed) {
            let frame_deadline = Instant::now() + self.frame_interval;
            loop {
                let Some(remaining) = frame_deadline.checked_duration_since(Instant::now()) else {
                    break;
                };
                match self.bus.recv_timeout(remaining) {
                    Some(event) => self.dispatch(&event),
                    None => break,
                }
            }
            self.root.refresh();
            self.root.draw(target)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, event: &InputEvent) {
        // A focus request owns the selection: whatever held it before is
        // dropped first, keeping at most one control selected per screen.
        if matches!(event, InputEvent::SelectAt { .. }) {
            self.root.clear_selection();
        }
        let mut ctx = EventCtx::new(self.bus.sender());
        // A visible modal dialog takes every event exclusively; the obscured
        // background tree must not see input while it is up.
        if let Some(modal) = self.root.first_visible_modal() {
            tracing::trace!(?event, "dispatching to modal");
            modal.borrow_mut().handle_event(event, &mut ctx);
        } else {
            self.root.handle_event(event, &mut ctx);
        }
    }
}

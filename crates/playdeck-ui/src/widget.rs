use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use embedded_graphics::draw_target::DrawTarget;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::Point;
use embedded_graphics::primitives::Rectangle;
use playdeck_input::{EventSender, InputEvent};

/// Colors shared by the stock controls.
pub mod palette {
    use embedded_graphics::pixelcolor::Rgb565;
    use embedded_graphics::prelude::RgbColor;

    pub const BACKGROUND: Rgb565 = Rgb565::BLACK;
    pub const FRAME: Rgb565 = Rgb565::WHITE;
    pub const TEXT: Rgb565 = Rgb565::WHITE;
    pub const SELECTED: Rgb565 = Rgb565::CYAN;
    pub const PRESSED: Rgb565 = Rgb565::YELLOW;
    pub const KNOB_ALERT: Rgb565 = Rgb565::MAGENTA;
    pub const DISABLED: Rgb565 = Rgb565::new(10, 20, 10);
}

/// Dispatch context handed down the tree with every event.
///
/// Carries the bus producer handle so any node can post synthetic events
/// (select-at-point redelivery, programmatic focus) and a timestamp frozen
/// at dispatch so every control in one fan-out sees the same clock.
pub struct EventCtx {
    sender: EventSender,
    now: Instant,
}

impl EventCtx {
    pub fn new(sender: EventSender) -> Self {
        Self::at(sender, Instant::now())
    }

    pub fn at(sender: EventSender, now: Instant) -> Self {
        Self { sender, now }
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    /// Enqueue a synthetic event behind everything already in flight.
    pub fn post(&mut self, event: InputEvent) {
        self.sender.send(event);
    }
}

/// A node in the widget tree.
///
/// Containers fan calls out to ordered children; leaves hold the actual
/// control state. Drawing goes through whatever target the compositor
/// hands in.
pub trait Component<D: DrawTarget<Color = Rgb565>> {
    fn bounds(&self) -> Rectangle;

    fn is_visible(&self) -> bool;

    fn set_visible(&mut self, visible: bool);

    fn is_enabled(&self) -> bool {
        true
    }

    /// Consume one canonical event. Invisible nodes must ignore it.
    fn handle_event(&mut self, event: &InputEvent, ctx: &mut EventCtx);

    /// Per-frame tick, independent of input.
    fn refresh(&mut self) {}

    fn draw(&self, target: &mut D) -> Result<(), D::Error>;

    /// Drop any selection held in this subtree.
    fn clear_selection(&mut self) {}

    /// Whether this node claims exclusive input while visible.
    fn is_modal(&self) -> bool {
        false
    }
}

/// Convenience for building screens: wrap a component for shared ownership.
pub fn shared<T>(component: T) -> Rc<RefCell<T>> {
    Rc::new(RefCell::new(component))
}

/// Ordered container of components.
///
/// Child order defines both paint order and event fan-out order. Children
/// are pushed once per screen composition and mutated in place afterwards.
pub struct Panel<D: DrawTarget<Color = Rgb565>> {
    bounds: Rectangle,
    visible: bool,
    modal: bool,
    children: Vec<Rc<RefCell<dyn Component<D>>>>,
}

impl<D: DrawTarget<Color = Rgb565>> Panel<D> {
    pub fn new(bounds: Rectangle) -> Self {
        Self {
            bounds,
            visible: true,
            modal: false,
            children: Vec::new(),
        }
    }

    /// A panel that claims exclusive input while visible (dialogs, popups).
    pub fn new_modal(bounds: Rectangle) -> Self {
        let mut panel = Self::new(bounds);
        panel.modal = true;
        panel
    }

    pub fn push(&mut self, child: Rc<RefCell<dyn Component<D>>>) {
        self.children.push(child);
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// First direct child that is visible and modal, if any. The pump uses
    /// this to gate input away from the obscured background tree.
    pub fn first_visible_modal(&self) -> Option<Rc<RefCell<dyn Component<D>>>> {
        self.children
            .iter()
            .find(|child| {
                let child = child.borrow();
                child.is_modal() && child.is_visible()
            })
            .cloned()
    }

    /// Hit test: does any visible child contain `point`?
    pub fn child_at(&self, point: Point) -> Option<Rc<RefCell<dyn Component<D>>>> {
        use embedded_graphics::primitives::ContainsPoint;
        self.children
            .iter()
            .find(|child| {
                let child = child.borrow();
                child.is_visible() && child.bounds().contains(point)
            })
            .cloned()
    }
}

impl<D: DrawTarget<Color = Rgb565>> Component<D> for Panel<D> {
    fn bounds(&self) -> Rectangle {
        self.bounds
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        for child in &self.children {
            child.borrow_mut().set_visible(visible);
        }
    }

    fn handle_event(&mut self, event: &InputEvent, ctx: &mut EventCtx) {
        if !self.visible {
            return;
        }
        // Every child sees the event; one child's disinterest (or failure,
        // which handlers log internally) never blocks its siblings.
        for child in &self.children {
            child.borrow_mut().handle_event(event, ctx);
        }
    }

    fn refresh(&mut self) {
        for child in &self.children {
            child.borrow_mut().refresh();
        }
    }

    fn draw(&self, target: &mut D) -> Result<(), D::Error> {
        if !self.visible {
            return Ok(());
        }
        for child in &self.children {
            let child = child.borrow();
            if child.is_visible() {
                child.draw(target)?;
            }
        }
        Ok(())
    }

    fn clear_selection(&mut self) {
        for child in &self.children {
            child.borrow_mut().clear_selection();
        }
    }

    fn is_modal(&self) -> bool {
        self.modal
    }
}

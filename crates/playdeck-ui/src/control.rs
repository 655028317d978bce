use std::time::{Duration, Instant};

use embedded_graphics::prelude::Point;
use embedded_graphics::primitives::{ContainsPoint, Rectangle};
use playdeck_input::{Direction, InputEvent, Key, KeyAction};

use crate::navigation::ExitTargets;
use crate::widget::EventCtx;

pub const DEFAULT_LONG_PRESS: Duration = Duration::from_millis(600);

/// What a release does to the selection state.
///
/// One control core serves every visual variant; the policy object is the
/// per-variant difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleasePolicy {
    /// Momentary, pointer-tap style: release drops back to Idle.
    ReturnToIdle,
    /// Momentary, remote/keyboard style: release keeps the selection.
    StaySelected,
    /// Toggle style: stays selected, and an abandoned press (focus moved
    /// away while still down) reports cancel instead of release.
    Toggle,
}

/// Payload delivered to release listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Release {
    pub long_press: bool,
}

/// What a key did to a control, reported back to the owning variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Ignored,
    Pressed,
    Released(Release),
    Navigated(Direction),
}

type PressListener = Box<dyn FnMut()>;
type ReleaseListener = Box<dyn FnMut(Release)>;
type LabelListener = Box<dyn FnMut(&str)>;
type CancelListener = Box<dyn FnMut()>;

/// Activation state machine shared by every interactive control.
///
/// States are Idle, Pressed, Selected and SelectedAndPressed, tracked as
/// the `selected`/`clicked` pair. Within one control a down is always
/// matched by exactly one up before the next down is accepted.
pub struct ControlCore {
    bounds: Rectangle,
    visible: bool,
    enabled: bool,
    selected: bool,
    clicked: bool,
    pressed_at: Option<Instant>,
    long_press_threshold: Duration,
    label: String,
    exits: ExitTargets,
    remote_navigable: bool,
    release_policy: ReleasePolicy,
    press_listeners: Vec<PressListener>,
    release_listeners: Vec<ReleaseListener>,
    label_listeners: Vec<LabelListener>,
    cancel_listeners: Vec<CancelListener>,
}

impl ControlCore {
    pub fn new(bounds: Rectangle, label: impl Into<String>, policy: ReleasePolicy) -> Self {
        Self {
            bounds,
            visible: true,
            enabled: true,
            selected: false,
            clicked: false,
            pressed_at: None,
            long_press_threshold: DEFAULT_LONG_PRESS,
            label: label.into(),
            exits: ExitTargets::default(),
            remote_navigable: true,
            release_policy: policy,
            press_listeners: Vec::new(),
            release_listeners: Vec::new(),
            label_listeners: Vec::new(),
            cancel_listeners: Vec::new(),
        }
    }

    pub fn bounds(&self) -> Rectangle {
        self.bounds
    }

    pub fn set_bounds(&mut self, bounds: Rectangle) {
        self.bounds = bounds;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Disabled controls stay in the tree (drawn, inert) but ignore every
    /// activation transition.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn is_clicked(&self) -> bool {
        self.clicked
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn release_policy(&self) -> ReleasePolicy {
        self.release_policy
    }

    pub fn set_long_press_threshold(&mut self, threshold: Duration) {
        self.long_press_threshold = threshold;
    }

    /// Capability flag: whether directional keys move focus off this
    /// control. Explicit, not inferred from wired exits.
    pub fn set_remote_navigable(&mut self, navigable: bool) {
        self.remote_navigable = navigable;
    }

    pub fn exit(&self, direction: Direction) -> Option<Point> {
        self.exits.get(direction)
    }

    pub fn set_exit(&mut self, direction: Direction, point: Point) {
        self.exits.set(direction, point);
    }

    pub fn clear_exits(&mut self) {
        self.exits.clear();
    }

    pub fn on_press(&mut self, listener: impl FnMut() + 'static) {
        self.press_listeners.push(Box::new(listener));
    }

    pub fn on_release(&mut self, listener: impl FnMut(Release) + 'static) {
        self.release_listeners.push(Box::new(listener));
    }

    pub fn on_label(&mut self, listener: impl FnMut(&str) + 'static) {
        self.label_listeners.push(Box::new(listener));
    }

    pub fn on_cancel(&mut self, listener: impl FnMut() + 'static) {
        self.cancel_listeners.push(Box::new(listener));
    }

    pub fn has_release_listeners(&self) -> bool {
        !self.release_listeners.is_empty()
    }

    /// Change the visible caption, notifying label listeners on change.
    pub fn set_label(&mut self, label: impl Into<String>) {
        let label = label.into();
        if label == self.label {
            return;
        }
        self.label = label;
        for listener in &mut self.label_listeners {
            listener(&self.label);
        }
    }

    /// Change the caption without notifying anyone. Used when the face is
    /// resynchronized to external truth rather than user action.
    pub fn set_label_silent(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// Begin a press. Re-entrant presses (already down) are a guarded
    /// no-op and fire nothing.
    pub fn activate_down(&mut self, now: Instant) -> bool {
        if !self.enabled || self.clicked {
            return false;
        }
        self.clicked = true;
        self.pressed_at = Some(now);
        for listener in &mut self.press_listeners {
            listener();
        }
        true
    }

    /// Complete a press. `forced_long` lets sources that resolved duration
    /// themselves (REST, voice) assert a long press regardless of elapsed
    /// time.
    pub fn activate_up(&mut self, now: Instant, forced_long: bool) -> Option<Release> {
        if !self.clicked {
            return None;
        }
        self.clicked = false;
        let elapsed_long = self
            .pressed_at
            .take()
            .map(|pressed| now.duration_since(pressed) >= self.long_press_threshold)
            .unwrap_or(false);
        self.selected = !matches!(self.release_policy, ReleasePolicy::ReturnToIdle);
        let release = Release {
            long_press: forced_long || elapsed_long,
        };
        for listener in &mut self.release_listeners {
            listener(release);
        }
        Some(release)
    }

    /// Select-at-point: become selected when the point falls inside the
    /// bounding box. A miss is silently nothing.
    pub fn select_at(&mut self, point: Point) -> bool {
        if self.enabled && self.visible && !self.selected && self.bounds.contains(point) {
            self.selected = true;
            true
        } else {
            false
        }
    }

    /// Drop back to Idle. A plain deselect fires no listeners; an
    /// abandoned toggle press (still down, never released) fires cancel.
    pub fn deselect(&mut self) {
        if self.clicked {
            self.clicked = false;
            self.pressed_at = None;
            if matches!(self.release_policy, ReleasePolicy::Toggle) {
                for listener in &mut self.cancel_listeners {
                    listener();
                }
            }
        }
        self.selected = false;
    }

    /// Shared key handling for every control variant.
    ///
    /// Select drives the press machinery on the selected control;
    /// directional key-ups move focus out through the declared exits. A
    /// missing exit still deselects and selects nothing, by contract.
    pub fn handle_key(&mut self, key: Key, action: KeyAction, ctx: &mut EventCtx) -> KeyOutcome {
        if !self.enabled || !self.visible {
            return KeyOutcome::Ignored;
        }
        match action {
            KeyAction::Down => {
                if key == Key::Select && self.selected && self.activate_down(ctx.now()) {
                    return KeyOutcome::Pressed;
                }
                KeyOutcome::Ignored
            }
            KeyAction::Up { long_press } => {
                if key == Key::Select {
                    if let Some(release) = self.activate_up(ctx.now(), long_press) {
                        return KeyOutcome::Released(release);
                    }
                    return KeyOutcome::Ignored;
                }
                if let Some(direction) = key.direction() {
                    if self.selected && self.remote_navigable {
                        let target = self.exits.get(direction);
                        self.deselect();
                        if let Some(point) = target {
                            ctx.post(InputEvent::SelectAt { point });
                        }
                        return KeyOutcome::Navigated(direction);
                    }
                }
                KeyOutcome::Ignored
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::prelude::Size;
    use playdeck_input::EventBus;
    use std::cell::Cell;
    use std::rc::Rc;

    fn bounds() -> Rectangle {
        Rectangle::new(Point::new(10, 10), Size::new(40, 20))
    }

    fn core(policy: ReleasePolicy) -> ControlCore {
        ControlCore::new(bounds(), "PLAY", policy)
    }

    #[test]
    fn quick_release_is_not_a_long_press() {
        let mut control = core(ReleasePolicy::StaySelected);
        let seen = Rc::new(Cell::new(None));
        let seen_in = seen.clone();
        control.on_release(move |release| seen_in.set(Some(release.long_press)));

        let t0 = Instant::now();
        assert!(control.activate_down(t0));
        control.activate_up(t0 + Duration::from_millis(100), false);
        assert_eq!(seen.get(), Some(false));
        assert!(control.is_selected());
        assert!(!control.is_clicked());
    }

    #[test]
    fn release_at_threshold_is_a_long_press() {
        let mut control = core(ReleasePolicy::StaySelected);
        let seen = Rc::new(Cell::new(None));
        let seen_in = seen.clone();
        control.on_release(move |release| seen_in.set(Some(release.long_press)));

        let t0 = Instant::now();
        control.activate_down(t0);
        control.activate_up(t0 + DEFAULT_LONG_PRESS, false);
        assert_eq!(seen.get(), Some(true));
    }

    #[test]
    fn reentrant_press_fires_no_duplicate_notification() {
        let mut control = core(ReleasePolicy::StaySelected);
        let presses = Rc::new(Cell::new(0));
        let presses_in = presses.clone();
        control.on_press(move || presses_in.set(presses_in.get() + 1));

        let t0 = Instant::now();
        assert!(control.activate_down(t0));
        assert!(!control.activate_down(t0 + Duration::from_millis(5)));
        assert_eq!(presses.get(), 1);
        assert!(control.is_clicked());
    }

    #[test]
    fn return_to_idle_policy_drops_selection_on_release() {
        let mut control = core(ReleasePolicy::ReturnToIdle);
        control.select_at(Point::new(15, 15));
        let t0 = Instant::now();
        control.activate_down(t0);
        control.activate_up(t0 + Duration::from_millis(50), false);
        assert!(!control.is_selected());
    }

    #[test]
    fn forced_long_flag_overrides_elapsed_time() {
        let mut control = core(ReleasePolicy::StaySelected);
        let t0 = Instant::now();
        control.activate_down(t0);
        let release = control
            .activate_up(t0 + Duration::from_millis(10), true)
            .expect("release");
        assert!(release.long_press);
    }

    #[test]
    fn disabled_control_ignores_activation() {
        let mut control = core(ReleasePolicy::StaySelected);
        control.set_enabled(false);
        assert!(!control.activate_down(Instant::now()));
        assert!(!control.select_at(Point::new(15, 15)));
    }

    #[test]
    fn select_at_requires_point_inside_bounds() {
        let mut control = core(ReleasePolicy::StaySelected);
        assert!(!control.select_at(Point::new(5, 5)));
        assert!(control.select_at(Point::new(15, 15)));
        // Already selected: a second request is nothing.
        assert!(!control.select_at(Point::new(15, 15)));
    }

    #[test]
    fn deselect_without_press_fires_nothing() {
        let mut control = core(ReleasePolicy::Toggle);
        let cancels = Rc::new(Cell::new(0));
        let cancels_in = cancels.clone();
        control.on_cancel(move || cancels_in.set(cancels_in.get() + 1));

        control.select_at(Point::new(15, 15));
        control.deselect();
        assert_eq!(cancels.get(), 0);
        assert!(!control.is_selected());
    }

    #[test]
    fn abandoned_toggle_press_fires_cancel_not_release() {
        let mut control = core(ReleasePolicy::Toggle);
        let cancels = Rc::new(Cell::new(0));
        let releases = Rc::new(Cell::new(0));
        let cancels_in = cancels.clone();
        let releases_in = releases.clone();
        control.on_cancel(move || cancels_in.set(cancels_in.get() + 1));
        control.on_release(move |_| releases_in.set(releases_in.get() + 1));

        control.select_at(Point::new(15, 15));
        control.activate_down(Instant::now());
        control.deselect();
        assert_eq!(cancels.get(), 1);
        assert_eq!(releases.get(), 0);
        assert!(!control.is_clicked());
    }

    #[test]
    fn abandoned_momentary_press_fires_no_cancel() {
        let mut control = core(ReleasePolicy::StaySelected);
        let cancels = Rc::new(Cell::new(0));
        let cancels_in = cancels.clone();
        control.on_cancel(move || cancels_in.set(cancels_in.get() + 1));

        control.select_at(Point::new(15, 15));
        control.activate_down(Instant::now());
        control.deselect();
        assert_eq!(cancels.get(), 0);
    }

    #[test]
    fn label_listeners_fire_on_change_only() {
        let mut control = core(ReleasePolicy::StaySelected);
        let changes = Rc::new(Cell::new(0));
        let changes_in = changes.clone();
        control.on_label(move |_| changes_in.set(changes_in.get() + 1));

        control.set_label("PLAY");
        assert_eq!(changes.get(), 0);
        control.set_label("PAUSE");
        assert_eq!(changes.get(), 1);
        control.set_label_silent("STOP");
        assert_eq!(changes.get(), 1);
        assert_eq!(control.label(), "STOP");
    }

    #[test]
    fn directional_up_with_exit_posts_select_at() {
        let bus = EventBus::new();
        let mut control = core(ReleasePolicy::StaySelected);
        control.select_at(Point::new(15, 15));
        control.set_exit(Direction::Right, Point::new(80, 15));

        let mut ctx = EventCtx::new(bus.sender());
        let outcome = control.handle_key(Key::Right, KeyAction::release(), &mut ctx);
        assert_eq!(outcome, KeyOutcome::Navigated(Direction::Right));
        assert!(!control.is_selected());
        assert_eq!(
            bus.try_recv(),
            Some(InputEvent::SelectAt {
                point: Point::new(80, 15)
            })
        );
    }

    #[test]
    fn directional_up_without_exit_deselects_and_posts_nothing() {
        let bus = EventBus::new();
        let mut control = core(ReleasePolicy::StaySelected);
        control.select_at(Point::new(15, 15));

        let mut ctx = EventCtx::new(bus.sender());
        let outcome = control.handle_key(Key::Left, KeyAction::release(), &mut ctx);
        assert_eq!(outcome, KeyOutcome::Navigated(Direction::Left));
        assert!(!control.is_selected());
        assert_eq!(bus.try_recv(), None);
    }

    #[test]
    fn non_navigable_control_keeps_selection_on_arrows() {
        let bus = EventBus::new();
        let mut control = core(ReleasePolicy::StaySelected);
        control.set_remote_navigable(false);
        control.select_at(Point::new(15, 15));
        control.set_exit(Direction::Right, Point::new(80, 15));

        let mut ctx = EventCtx::new(bus.sender());
        let outcome = control.handle_key(Key::Right, KeyAction::release(), &mut ctx);
        assert_eq!(outcome, KeyOutcome::Ignored);
        assert!(control.is_selected());
        assert_eq!(bus.try_recv(), None);
    }

    #[test]
    fn select_key_only_presses_the_selected_control() {
        let bus = EventBus::new();
        let mut control = core(ReleasePolicy::StaySelected);
        let mut ctx = EventCtx::new(bus.sender());

        // Not selected: Select down is ignored.
        let outcome = control.handle_key(Key::Select, KeyAction::Down, &mut ctx);
        assert_eq!(outcome, KeyOutcome::Ignored);

        control.select_at(Point::new(15, 15));
        let outcome = control.handle_key(Key::Select, KeyAction::Down, &mut ctx);
        assert_eq!(outcome, KeyOutcome::Pressed);
        let outcome = control.handle_key(Key::Select, KeyAction::release(), &mut ctx);
        assert!(matches!(outcome, KeyOutcome::Released(_)));
    }
}

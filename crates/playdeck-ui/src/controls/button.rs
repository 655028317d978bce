use embedded_graphics::draw_target::DrawTarget;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::primitives::Rectangle;
use playdeck_input::{InputEvent, Key, KeyAction};

use super::draw_control_frame;
use crate::control::{ControlCore, KeyOutcome, Release, ReleasePolicy};
use crate::widget::{Component, EventCtx};

/// Momentary button.
///
/// The default is the remote/keyboard flavor that keeps its selection after
/// a release; `pointer_style` drops back to Idle the way a touch tap does.
pub struct PushButton {
    core: ControlCore,
}

impl PushButton {
    pub fn new(label: impl Into<String>, bounds: Rectangle) -> Self {
        Self {
            core: ControlCore::new(bounds, label, ReleasePolicy::StaySelected),
        }
    }

    pub fn pointer_style(label: impl Into<String>, bounds: Rectangle) -> Self {
        Self {
            core: ControlCore::new(bounds, label, ReleasePolicy::ReturnToIdle),
        }
    }

    pub fn core(&self) -> &ControlCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut ControlCore {
        &mut self.core
    }
}

impl<D: DrawTarget<Color = Rgb565>> Component<D> for PushButton {
    fn bounds(&self) -> Rectangle {
        self.core.bounds()
    }

    fn is_visible(&self) -> bool {
        self.core.is_visible()
    }

    fn set_visible(&mut self, visible: bool) {
        self.core.set_visible(visible);
    }

    fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    fn handle_event(&mut self, event: &InputEvent, ctx: &mut EventCtx) {
        if !self.core.is_visible() {
            return;
        }
        match event {
            InputEvent::Key { key, action, .. } => {
                self.core.handle_key(*key, *action, ctx);
            }
            InputEvent::SelectAt { point } => {
                self.core.select_at(*point);
            }
            _ => {}
        }
    }

    fn draw(&self, target: &mut D) -> Result<(), D::Error> {
        draw_control_frame(&self.core, target)
    }

    fn clear_selection(&mut self) {
        self.core.deselect();
    }
}

/// Two-phase toggle.
///
/// Stays selected after a release so a later tap reads as "cancel" instead
/// of a fresh press; an abandoned press reports through cancel listeners.
pub struct ToggleButton {
    core: ControlCore,
}

impl ToggleButton {
    pub fn new(label: impl Into<String>, bounds: Rectangle) -> Self {
        Self {
            core: ControlCore::new(bounds, label, ReleasePolicy::Toggle),
        }
    }

    pub fn core(&self) -> &ControlCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut ControlCore {
        &mut self.core
    }
}

impl<D: DrawTarget<Color = Rgb565>> Component<D> for ToggleButton {
    fn bounds(&self) -> Rectangle {
        self.core.bounds()
    }

    fn is_visible(&self) -> bool {
        self.core.is_visible()
    }

    fn set_visible(&mut self, visible: bool) {
        self.core.set_visible(visible);
    }

    fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    fn handle_event(&mut self, event: &InputEvent, ctx: &mut EventCtx) {
        if !self.core.is_visible() {
            return;
        }
        match event {
            InputEvent::Key { key, action, .. } => {
                self.core.handle_key(*key, *action, ctx);
            }
            InputEvent::SelectAt { point } => {
                self.core.select_at(*point);
            }
            _ => {}
        }
    }

    fn draw(&self, target: &mut D) -> Result<(), D::Error> {
        draw_control_frame(&self.core, target)
    }

    fn clear_selection(&mut self) {
        self.core.deselect();
    }
}

/// Button with N mutually exclusive display states.
///
/// With release listeners registered, each release advances the face index
/// mod N. Without any, the control is display-only: activation keys are
/// ignored and `draw_state` resynchronizes the face to external truth
/// (actual playback state) without firing anything.
pub struct MultiStateButton {
    core: ControlCore,
    states: Vec<String>,
    index: usize,
}

impl MultiStateButton {
    pub fn new<S: Into<String>>(states: Vec<S>, bounds: Rectangle) -> Self {
        let states: Vec<String> = states.into_iter().map(Into::into).collect();
        debug_assert!(!states.is_empty(), "a multi-state button needs faces");
        let label = states.first().cloned().unwrap_or_default();
        Self {
            core: ControlCore::new(bounds, label, ReleasePolicy::StaySelected),
            states,
            index: 0,
        }
    }

    pub fn core(&self) -> &ControlCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut ControlCore {
        &mut self.core
    }

    pub fn state_index(&self) -> usize {
        self.index
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Resynchronize the face without firing any listener. Out-of-range
    /// indexes are ignored.
    pub fn draw_state(&mut self, index: usize) {
        if let Some(label) = self.states.get(index) {
            self.index = index;
            let label = label.clone();
            self.core.set_label_silent(label);
        }
    }

    fn advance(&mut self) {
        self.index = (self.index + 1) % self.states.len();
        let label = self.states[self.index].clone();
        self.core.set_label(label);
    }
}

impl<D: DrawTarget<Color = Rgb565>> Component<D> for MultiStateButton {
    fn bounds(&self) -> Rectangle {
        self.core.bounds()
    }

    fn is_visible(&self) -> bool {
        self.core.is_visible()
    }

    fn set_visible(&mut self, visible: bool) {
        self.core.set_visible(visible);
    }

    fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    fn handle_event(&mut self, event: &InputEvent, ctx: &mut EventCtx) {
        if !self.core.is_visible() {
            return;
        }
        match event {
            InputEvent::Key { key, action, .. } => {
                // Display-only faces ignore activation entirely.
                if *key == Key::Select && !self.core.has_release_listeners() {
                    return;
                }
                if let KeyOutcome::Released(Release { .. }) =
                    self.core.handle_key(*key, *action, ctx)
                {
                    self.advance();
                }
            }
            InputEvent::SelectAt { point } => {
                self.core.select_at(*point);
            }
            _ => {}
        }
    }

    fn draw(&self, target: &mut D) -> Result<(), D::Error> {
        draw_control_frame(&self.core, target)
    }

    fn clear_selection(&mut self) {
        self.core.deselect();
    }
}

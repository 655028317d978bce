use embedded_graphics::draw_target::DrawTarget;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use playdeck_input::{InputEvent, Key, KeyAction};

use crate::control::{ControlCore, ReleasePolicy};
use crate::widget::{palette, Component, EventCtx};

const KNOB_WIDTH: u32 = 3;
const DEFAULT_STEP: u8 = 5;

type MotionListener = Box<dyn FnMut(u8)>;

/// Horizontal level slider (volume, seek).
///
/// Shares the press/select core with the buttons and adds a position in
/// 0..=100. Keyed steps apply while Selected without requiring a press;
/// pointer drags come in through `drag_to` while Pressed and fire motion
/// listeners continuously. The slider owns its adjust axis: Left/Right
/// never navigate away, vertical keys exit through the declared targets.
pub struct Slider {
    core: ControlCore,
    position: u8,
    step: u8,
    knob_selected: bool,
    motion_listeners: Vec<MotionListener>,
}

impl Slider {
    pub fn new(bounds: Rectangle) -> Self {
        Self {
            core: ControlCore::new(bounds, "", ReleasePolicy::StaySelected),
            position: 0,
            step: DEFAULT_STEP,
            knob_selected: false,
            motion_listeners: Vec::new(),
        }
    }

    pub fn core(&self) -> &ControlCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut ControlCore {
        &mut self.core
    }

    pub fn position(&self) -> u8 {
        self.position
    }

    /// Resynchronize the position to external truth without firing motion
    /// listeners.
    pub fn set_position(&mut self, position: u8) {
        self.position = position.min(100);
    }

    pub fn set_step(&mut self, step: u8) {
        self.step = step.max(1);
    }

    /// Orthogonal knob sub-state: swaps the rendered glyph for mute-style
    /// overlays. Independent of selection and pressing.
    pub fn set_knob_selected(&mut self, knob_selected: bool) {
        self.knob_selected = knob_selected;
    }

    pub fn is_knob_selected(&self) -> bool {
        self.knob_selected
    }

    pub fn on_motion(&mut self, listener: impl FnMut(u8) + 'static) {
        self.motion_listeners.push(Box::new(listener));
    }

    /// Pointer drag while pressed: recompute the position from the x
    /// coordinate and notify motion listeners. Ignored when not pressed.
    pub fn drag_to(&mut self, x: i32) {
        if !self.core.is_clicked() {
            return;
        }
        let bounds = self.core.bounds();
        let width = bounds.size.width.saturating_sub(1).max(1) as i64;
        let offset = (x as i64 - bounds.top_left.x as i64).clamp(0, width);
        let position = (offset * 100 / width) as u8;
        self.apply_position(position);
    }

    fn step_by(&mut self, increase: bool) {
        let position = if increase {
            self.position.saturating_add(self.step).min(100)
        } else {
            self.position.saturating_sub(self.step)
        };
        self.apply_position(position);
    }

    fn apply_position(&mut self, position: u8) {
        if position == self.position {
            return;
        }
        self.position = position;
        for listener in &mut self.motion_listeners {
            listener(position);
        }
    }

    fn knob_rect(&self) -> Rectangle {
        let bounds = self.core.bounds();
        let travel = bounds.size.width.saturating_sub(KNOB_WIDTH).max(1) as i64;
        let knob_x = bounds.top_left.x as i64 + travel * i64::from(self.position) / 100;
        Rectangle::new(
            Point::new(knob_x as i32, bounds.top_left.y),
            Size::new(KNOB_WIDTH, bounds.size.height),
        )
    }
}

impl<D: DrawTarget<Color = Rgb565>> Component<D> for Slider {
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
                if matches!(key, Key::Left | Key::Right)
                    && self.core.is_selected()
                    && self.core.is_enabled()
                {
                    // The adjust axis is consumed outright; its key-ups must
                    // not fall through into focus navigation.
                    if *action == KeyAction::Down {
                        self.step_by(*key == Key::Right);
                    }
                    return;
                }
                self.core.handle_key(*key, *action, ctx);
            }
            InputEvent::SelectAt { point } => {
                self.core.select_at(*point);
            }
            _ => {}
        }
    }

    fn draw(&self, target: &mut D) -> Result<(), D::Error> {
        let bounds = self.core.bounds();
        let track_color = if !self.core.is_enabled() {
            palette::DISABLED
        } else if self.core.is_selected() {
            palette::SELECTED
        } else {
            palette::FRAME
        };
        let mid_y = bounds.top_left.y + bounds.size.height as i32 / 2;
        Rectangle::new(
            Point::new(bounds.top_left.x, mid_y),
            Size::new(bounds.size.width, 1),
        )
        .into_styled(PrimitiveStyle::with_fill(track_color))
        .draw(target)?;

        let knob_color = if self.knob_selected {
            palette::KNOB_ALERT
        } else if self.core.is_clicked() {
            palette::PRESSED
        } else {
            track_color
        };
        self.knob_rect()
            .into_styled(PrimitiveStyle::with_fill(knob_color))
            .draw(target)?;
        Ok(())
    }

    fn clear_selection(&mut self) {
        self.core.deselect();
    }
}

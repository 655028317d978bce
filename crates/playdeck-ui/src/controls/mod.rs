//! Stock interactive controls built on [`ControlCore`].

pub mod button;
pub mod slider;

pub use button::{MultiStateButton, PushButton, ToggleButton};
pub use slider::Slider;

use embedded_graphics::draw_target::DrawTarget;
use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyleBuilder, Rectangle};
use embedded_graphics::text::{Baseline, Text};

use crate::control::ControlCore;
use crate::widget::palette;

const CHAR_WIDTH: i32 = 6;
const LINE_HEIGHT: i32 = 10;

/// Filled, bordered face plus centered caption shared by the button family.
pub(crate) fn draw_control_frame<D: DrawTarget<Color = Rgb565>>(
    core: &ControlCore,
    target: &mut D,
) -> Result<(), D::Error> {
    let bounds = core.bounds();
    let fill = if core.is_clicked() {
        palette::PRESSED
    } else {
        palette::BACKGROUND
    };
    let border = if !core.is_enabled() {
        palette::DISABLED
    } else if core.is_selected() {
        palette::SELECTED
    } else {
        palette::FRAME
    };
    let style = PrimitiveStyleBuilder::new()
        .fill_color(fill)
        .stroke_color(border)
        .stroke_width(1)
        .build();
    bounds.into_styled(style).draw(target)?;

    let text = if core.is_enabled() {
        palette::TEXT
    } else {
        palette::DISABLED
    };
    draw_centered_label(core.label(), bounds, text, target)
}

pub(crate) fn draw_centered_label<D: DrawTarget<Color = Rgb565>>(
    label: &str,
    bounds: Rectangle,
    color: Rgb565,
    target: &mut D,
) -> Result<(), D::Error> {
    if label.is_empty() {
        return Ok(());
    }
    let text_width = label.chars().count() as i32 * CHAR_WIDTH;
    let x = bounds.top_left.x + (bounds.size.width as i32 - text_width).max(0) / 2;
    let y = bounds.top_left.y + (bounds.size.height as i32 - LINE_HEIGHT).max(0) / 2;
    let style = MonoTextStyle::new(&FONT_6X10, color);
    Text::with_baseline(label, Point::new(x, y), style, Baseline::Top).draw(target)?;
    Ok(())
}

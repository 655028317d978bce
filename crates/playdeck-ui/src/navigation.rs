use embedded_graphics::prelude::Point;
use embedded_graphics::primitives::Rectangle;
use playdeck_input::Direction;

/// Default inset used by composition passes when deriving landing points.
pub const DEFAULT_EXIT_MARGIN: u32 = 4;

/// Declared exit coordinates for directional focus movement.
///
/// Plain screen coordinates, not references: a screen's composition pass
/// assigns them once from the current positions of intended neighbors and
/// rebuilds them wholesale after relayout. Nothing checks that a target
/// still lands inside a control; a stale or unset edge simply selects
/// nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitTargets {
    pub top: Option<Point>,
    pub bottom: Option<Point>,
    pub left: Option<Point>,
    pub right: Option<Point>,
}

impl ExitTargets {
    pub fn get(&self, direction: Direction) -> Option<Point> {
        match direction {
            Direction::Up => self.top,
            Direction::Down => self.bottom,
            Direction::Left => self.left,
            Direction::Right => self.right,
        }
    }

    pub fn set(&mut self, direction: Direction, point: Point) {
        match direction {
            Direction::Up => self.top = Some(point),
            Direction::Down => self.bottom = Some(point),
            Direction::Left => self.left = Some(point),
            Direction::Right => self.right = Some(point),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A point a small margin inside `bounds`' top-left corner.
///
/// Aiming inside the corner rather than at the edge keeps the hit test
/// reliable when the neighbor shifts by a pixel or two between layouts.
pub fn landing_point(bounds: Rectangle, margin: u32) -> Point {
    let inset_x = margin.min(bounds.size.width.saturating_sub(1) / 2) as i32;
    let inset_y = margin.min(bounds.size.height.saturating_sub(1) / 2) as i32;
    bounds.top_left + Point::new(inset_x, inset_y)
}

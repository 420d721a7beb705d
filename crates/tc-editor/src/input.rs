//! Input abstraction layer.
//!
//! Pointer positions arrive already normalized to stage space (the editor
//! canvas spans `[0, 1]²`, top-left origin). Slider controls arrive as
//! absolute values.

use kurbo::Point;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub alt: bool,
    pub ctrl: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        alt: false,
        ctrl: false,
        meta: false,
    };

    pub const SHIFT: Self = Self {
        shift: true,
        ..Self::NONE
    };
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerDown { at: Point, modifiers: Modifiers },
    PointerMove { at: Point, modifiers: Modifiers },
    PointerUp { at: Point },
    /// Zoom slider / pinch: absolute zoom.
    Zoom { zoom: f64 },
    /// Rotation slider: absolute degrees.
    Rotate { degrees: f64 },
}

impl InputEvent {
    pub fn down(x: f64, y: f64) -> Self {
        Self::PointerDown {
            at: Point::new(x, y),
            modifiers: Modifiers::NONE,
        }
    }

    pub fn moved(x: f64, y: f64) -> Self {
        Self::PointerMove {
            at: Point::new(x, y),
            modifiers: Modifiers::NONE,
        }
    }

    pub fn up(x: f64, y: f64) -> Self {
        Self::PointerUp { at: Point::new(x, y) }
    }

    pub fn position(&self) -> Option<Point> {
        match self {
            Self::PointerDown { at, .. } | Self::PointerMove { at, .. } | Self::PointerUp { at } => {
                Some(*at)
            }
            _ => None,
        }
    }

    /// Pointer-up ends the live interaction and flushes pending commits.
    pub fn ends_interaction(&self) -> bool {
        matches!(self, Self::PointerUp { .. })
    }
}

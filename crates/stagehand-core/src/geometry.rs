#![forbid(unsafe_code)]

//! Geometric primitives and program-bounds decoding.
//!
//! A standalone program sizes its window from the `width`, `height`, `x` and
//! `y` parameters. Each may be an absolute integer, a percentage of the
//! matching screen dimension (`"50%"`), or `"*"` for the whole dimension.

use crate::error::ProgramError;
use crate::parameters::Parameters;

/// Default window width when no `width` parameter is given.
pub const DEFAULT_WIDTH: u32 = 754;
/// Default window height when no `height` parameter is given.
pub const DEFAULT_HEIGHT: u32 = 492;
/// Default horizontal offset.
pub const DEFAULT_X: i32 = 16;
/// Default vertical offset.
pub const DEFAULT_Y: i32 = 40;

/// A width/height pair in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    /// Create a new size.
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether either dimension is zero.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A positioned rectangle (origin at the top-left of the screen).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The rectangle's size.
    #[inline]
    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Decode a single size parameter.
///
/// `None` yields `default`. `"*"` is shorthand for `"100%"`; a trailing `%`
/// scales `max` (rounded to the nearest integer); anything else must parse as
/// an integer.
pub fn decode_size(
    name: &'static str,
    value: Option<&str>,
    default: i64,
    max: u32,
) -> Result<i64, ProgramError> {
    let Some(raw) = value else {
        return Ok(default);
    };
    let raw = raw.trim();
    let raw = if raw == "*" { "100%" } else { raw };
    if let Some(percent) = raw.strip_suffix('%') {
        let percent: f64 = percent
            .trim()
            .parse()
            .map_err(|_| ProgramError::invalid(name, format!("bad percentage {raw:?}")))?;
        Ok((percent / 100.0 * f64::from(max)).round() as i64)
    } else {
        raw.parse()
            .map_err(|_| ProgramError::invalid(name, format!("expected an integer, got {raw:?}")))
    }
}

/// Compute the bounds of a standalone program window.
///
/// A window that fills the screen along an axis gets a zero default offset on
/// that axis so it is not pushed off screen.
pub fn program_bounds(params: &Parameters, screen: Size) -> Result<Rect, ProgramError> {
    let width = decode_size(
        "width",
        params.get("width"),
        i64::from(DEFAULT_WIDTH),
        screen.width,
    )?;
    let height = decode_size(
        "height",
        params.get("height"),
        i64::from(DEFAULT_HEIGHT),
        screen.height,
    )?;
    let default_x = if width >= i64::from(screen.width) { 0 } else { DEFAULT_X };
    let default_y = if height >= i64::from(screen.height) { 0 } else { DEFAULT_Y };
    let x = decode_size("x", params.get("x"), i64::from(default_x), screen.width)?;
    let y = decode_size("y", params.get("y"), i64::from(default_y), screen.height)?;

    let width = u32::try_from(width)
        .map_err(|_| ProgramError::invalid("width", format!("out of range: {width}")))?;
    let height = u32::try_from(height)
        .map_err(|_| ProgramError::invalid("height", format!("out of range: {height}")))?;
    let x = i32::try_from(x).map_err(|_| ProgramError::invalid("x", format!("out of range: {x}")))?;
    let y = i32::try_from(y).map_err(|_| ProgramError::invalid("y", format!("out of range: {y}")))?;
    Ok(Rect::new(x, y, width, height))
}

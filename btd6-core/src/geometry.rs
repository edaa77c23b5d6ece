//! Screen coordinates, rectangles and resolution scaling.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

static COORDINATE_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?P<x>\d+), (?P<y>\d+)").expect("coordinate pair regex"));

/// A pixel position, stored in JSON as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn scaled(self, from: Resolution, to: Resolution) -> Self {
        Self {
            x: scale_axis(self.x, from.width, to.width),
            y: scale_axis(self.y, from.height, to.height),
        }
    }

    /// Euclidean distance, used to snap detected icons to map slots.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        dx.hypot(dy)
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl From<Point> for (i32, i32) {
    fn from(point: Point) -> Self {
        (point.x, point.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.x, self.y)
    }
}

/// An axis-aligned area, stored in JSON as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(i32, i32, i32, i32)", into = "(i32, i32, i32, i32)")]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    #[must_use]
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    #[must_use]
    pub fn scaled(self, from: Resolution, to: Resolution) -> Self {
        let top_left = Point::new(self.x1, self.y1).scaled(from, to);
        let bottom_right = Point::new(self.x2, self.y2).scaled(from, to);
        Self::new(top_left.x, top_left.y, bottom_right.x, bottom_right.y)
    }
}

impl From<(i32, i32, i32, i32)> for Rect {
    fn from((x1, y1, x2, y2): (i32, i32, i32, i32)) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<Rect> for (i32, i32, i32, i32) {
    fn from(rect: Rect) -> Self {
        (rect.x1, rect.y1, rect.x2, rect.y2)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid resolution {0:?}; expected <width>x<height>")]
pub struct ResolutionParseError(pub String);

/// Screen size in pixels, written as `WxH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn center(self) -> Point {
        Point::new(
            scale_axis(1, 2, i64::from(self.width)),
            scale_axis(1, 2, i64::from(self.height)),
        )
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = ResolutionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, height) = s
            .split_once('x')
            .ok_or_else(|| ResolutionParseError(s.to_string()))?;
        let parse = |v: &str| {
            v.parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ResolutionParseError(s.to_string()))
        };
        Ok(Self::new(parse(width)?, parse(height)?))
    }
}

/// `round(value * target / native)` with ties to even.
#[allow(clippy::cast_possible_truncation)]
fn scale_axis(value: impl Into<i64>, native: impl Into<i64>, target: impl Into<i64>) -> i32 {
    let native = native.into();
    if native == 0 {
        return 0;
    }
    #[allow(clippy::cast_precision_loss)]
    let scaled = value.into() as f64 * target.into() as f64 / native as f64;
    scaled.round_ties_even() as i32
}

/// Rewrites every `<x>, <y>` pair in `text` from `native` to `target` resolution.
#[must_use]
pub fn rescale_coordinate_pairs(text: &str, native: Resolution, target: Resolution) -> String {
    if native == target {
        return text.to_string();
    }
    COORDINATE_PAIR
        .replace_all(text, |caps: &Captures<'_>| {
            let x = caps["x"].parse::<i64>().unwrap_or_default();
            let y = caps["y"].parse::<i64>().unwrap_or_default();
            format!(
                "{}, {}",
                scale_axis(x, native.width, target.width),
                scale_axis(y, native.height, target.height)
            )
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_parses_and_displays() {
        let res: Resolution = "1920x1080".parse().unwrap();
        assert_eq!(res, Resolution::new(1920, 1080));
        assert_eq!(res.to_string(), "1920x1080");
        assert!("1920".parse::<Resolution>().is_err());
        assert!("0x1080".parse::<Resolution>().is_err());
    }

    #[test]
    fn point_round_trips_through_json_array() {
        let point: Point = serde_json::from_str("[12, 34]").unwrap();
        assert_eq!(point, Point::new(12, 34));
        assert_eq!(serde_json::to_string(&point).unwrap(), "[12,34]");
        let rect: Rect = serde_json::from_str("[1, 2, 3, 4]").unwrap();
        assert_eq!(rect, Rect::new(1, 2, 3, 4));
    }

    #[test]
    fn scaling_halves_coordinates() {
        let from = Resolution::new(2560, 1440);
        let to = Resolution::new(1280, 720);
        assert_eq!(Point::new(500, 301).scaled(from, to), Point::new(250, 150));
        assert_eq!(
            Rect::new(10, 20, 30, 41).scaled(from, to),
            Rect::new(5, 10, 15, 20)
        );
    }

    #[test]
    fn rescales_pairs_inside_text() {
        let text = "place dart dart0 at 500, 500\nremove obstacle at 1000, 200 for 500\n";
        let out = rescale_coordinate_pairs(
            text,
            Resolution::new(2560, 1440),
            Resolution::new(1920, 1080),
        );
        assert_eq!(
            out,
            "place dart dart0 at 375, 375\nremove obstacle at 750, 150 for 500\n"
        );
    }

    #[test]
    fn center_of_resolution() {
        assert_eq!(Resolution::new(2560, 1440).center(), Point::new(1280, 720));
    }
}

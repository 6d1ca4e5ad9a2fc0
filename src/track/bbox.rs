//! Integer pixel boxes and IoU.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned pixel rectangle with `x1 <= x2` and `y1 <= y2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// Build a box from any two corners; swapped corners are normalized.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f64 {
        self.width() as f64 * self.height() as f64
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.x1 as f64 + self.x2 as f64) / 2.0,
            (self.y1 as f64 + self.y2 as f64) / 2.0,
        )
    }

    /// Measurement form `[cx, cy, scale, aspect]` where scale is the area.
    pub fn to_z(&self) -> [f64; 4] {
        let (cx, cy) = self.center();
        let w = self.width() as f64;
        let h = self.height() as f64;
        let aspect = if h != 0.0 { w / h } else { 1.0 };
        [cx, cy, w * h, aspect]
    }

    /// Inverse of `to_z`, rounded to pixels. Non-positive area or aspect
    /// collapses to a zero-size box at the center.
    pub fn from_z(z: &[f64; 4]) -> Self {
        let [cx, cy, scale, aspect] = *z;
        if !(scale > 0.0 && aspect > 0.0) || !cx.is_finite() || !cy.is_finite() {
            let (x, y) = (round_px(cx), round_px(cy));
            return Self::new(x, y, x, y);
        }
        let w = (scale * aspect).sqrt();
        let h = scale / w;
        Self::new(
            round_px(cx - w / 2.0),
            round_px(cy - h / 2.0),
            round_px(cx + w / 2.0),
            round_px(cy + h / 2.0),
        )
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x1 + dx, self.y1 + dy, self.x2 + dx, self.y2 + dy)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}

fn round_px(v: f64) -> i32 {
    if v.is_finite() {
        v.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32
    } else {
        0
    }
}

/// Intersection over union. Disjoint or degenerate pairs yield 0.0.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f64 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let intersection = (x2 - x1) as f64 * (y2 - y1) as f64;
    let union = a.area() + b.area() - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// IoU matrix with one row per detection and one column per track box.
pub fn iou_matrix(detections: &[BoundingBox], tracks: &[BoundingBox]) -> Vec<Vec<f64>> {
    detections
        .iter()
        .map(|det| tracks.iter().map(|trk| iou(det, trk)).collect())
        .collect()
}

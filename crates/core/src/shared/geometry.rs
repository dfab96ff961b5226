/// A 2D point in integer pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Divides both coordinates by `scale`, rounding to the nearest pixel.
    pub fn unscaled(&self, scale: f64) -> Point {
        Point {
            x: (self.x as f64 / scale).round() as i32,
            y: (self.y as f64 / scale).round() as i32,
        }
    }
}

/// Axis-aligned rectangle: top-left corner plus size, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct BBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge, saturating at `i32::MAX`.
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn iou(&self, other: &BBox) -> f64 {
        let ix1 = self.x.max(other.x) as i64;
        let iy1 = self.y.max(other.y) as i64;
        let ix2 = self.right().min(other.right()) as i64;
        let iy2 = self.bottom().min(other.bottom()) as i64;

        let inter = (ix2 - ix1).max(0) as f64 * (iy2 - iy1).max(0) as f64;
        if inter == 0.0 {
            return 0.0;
        }

        let area_a = self.area() as f64;
        let area_b = other.area() as f64;
        inter / (area_a + area_b - inter)
    }

    /// Divides every component by `scale`, rounding to the nearest pixel.
    pub fn unscaled(&self, scale: f64) -> BBox {
        BBox {
            x: (self.x as f64 / scale).round() as i32,
            y: (self.y as f64 / scale).round() as i32,
            width: (self.width as f64 / scale).round() as i32,
            height: (self.height as f64 / scale).round() as i32,
        }
    }

    /// Intersection with `[0, width) x [0, height)`.
    ///
    /// A box lying entirely outside the frame comes back empty.
    pub fn clamped(&self, width: u32, height: u32) -> BBox {
        let max_x = width.min(i32::MAX as u32) as i32;
        let max_y = height.min(i32::MAX as u32) as i32;
        let x1 = self.x.clamp(0, max_x);
        let y1 = self.y.clamp(0, max_y);
        let x2 = self.right().clamp(0, max_x);
        let y2 = self.bottom().clamp(0, max_y);
        BBox {
            x: x1.min(max_x.saturating_sub(1).max(0)),
            y: y1.min(max_y.saturating_sub(1).max(0)),
            width: (x2 - x1).max(0),
            height: (y2 - y1).max(0),
        }
    }
}

/// Unweighted mean of a landmark set, or `None` when there are no points.
pub fn landmark_centroid(points: &[Point]) -> Option<(f64, f64)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let sx: f64 = points.iter().map(|p| p.x as f64).sum();
    let sy: f64 = points.iter().map(|p| p.y as f64).sum();
    Some((sx / n, sy / n))
}

//! 几何图形模块

use std::ops::Sub;

/// 2D 点（客户区坐标）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let d = *self - *other;
        (d.dx * d.dx + d.dy * d.dy).sqrt()
    }
}

/// 两点之间的位移
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Delta {
    pub dx: f32,
    pub dy: f32,
}

impl Sub for Point {
    type Output = Delta;

    fn sub(self, rhs: Point) -> Delta {
        Delta {
            dx: self.x - rhs.x,
            dy: self.y - rhs.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_is_end_minus_start() {
        let d = Point::new(110.0, 250.0) - Point::new(100.0, 100.0);
        assert_eq!(d, Delta { dx: 10.0, dy: 150.0 });
        assert_eq!(Point::new(0.0, 0.0).distance(&Point::new(3.0, 4.0)), 5.0);
    }
}

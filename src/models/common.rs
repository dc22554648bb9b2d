use std::ops::{Add, Mul, Sub};

/// 平面上の2次元位置（単位: フィート）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    pub x: f64, // ft
    pub y: f64, // ft
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self::new(0.0, 0.0)
    }

    /// 指定角度（度, +x軸から反時計回り）の単位ベクトル
    pub fn unit_from_angle(angle_deg: f64) -> Self {
        let angle_rad = math_utils::deg_to_rad(angle_deg);
        Self::new(angle_rad.cos(), angle_rad.sin())
    }

    /// 成分ごとの最小値
    pub fn component_min(&self, other: &Point2D) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y))
    }

    /// 成分ごとの最大値
    pub fn component_max(&self, other: &Point2D) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y))
    }
}

impl Add for Point2D {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Point2D {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Point2D {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar)
    }
}

/// 点列の外接矩形（最小点, 最大点）。空の場合はNone
pub fn bounding_box(points: &[Point2D]) -> Option<(Point2D, Point2D)> {
    let first = *points.first()?;
    Some(points.iter().fold((first, first), |(min, max), p| {
        (min.component_min(p), max.component_max(p))
    }))
}

/// 数学ユーティリティ関数
pub mod math_utils {
    /// 度をラジアンに変換
    pub fn deg_to_rad(degrees: f64) -> f64 {
        degrees * std::f64::consts::PI / 180.0
    }
}

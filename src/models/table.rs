use crate::config::GeometryConfig;
use crate::models::{common::Point2D, traits::ITable};

/// 描画用のテーブル外形
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TableOutline {
    Circle {
        center: Point2D,
        radius: f64,
    },
    /// 角を基準点として`rotation_deg`だけ回転した矩形
    Rectangle {
        corner: Point2D,
        width: f64,
        length: f64,
        rotation_deg: f64,
    },
}

impl TableOutline {
    /// 外形の外接矩形（最小点, 最大点）
    pub fn bounds(&self) -> (Point2D, Point2D) {
        match *self {
            TableOutline::Circle { center, radius } => (
                Point2D::new(center.x - radius, center.y - radius),
                Point2D::new(center.x + radius, center.y + radius),
            ),
            TableOutline::Rectangle { .. } => {
                let corners = self.corners();
                corners[1..].iter().fold((corners[0], corners[0]), |(min, max), c| {
                    (min.component_min(c), max.component_max(c))
                })
            }
        }
    }

    /// 矩形の4隅（角, 幅方向, 対角, 奥行方向の順）。円の場合は外接正方形
    pub fn corners(&self) -> [Point2D; 4] {
        match *self {
            TableOutline::Circle { center, radius } => [
                Point2D::new(center.x - radius, center.y - radius),
                Point2D::new(center.x + radius, center.y - radius),
                Point2D::new(center.x + radius, center.y + radius),
                Point2D::new(center.x - radius, center.y + radius),
            ],
            TableOutline::Rectangle {
                corner,
                width,
                length,
                rotation_deg,
            } => {
                let along_width = Point2D::unit_from_angle(rotation_deg) * width;
                let along_length = Point2D::unit_from_angle(rotation_deg + 90.0) * length;
                [
                    corner,
                    corner + along_width,
                    corner + along_width + along_length,
                    corner + along_length,
                ]
            }
        }
    }
}

/// 長テーブルのどの辺に人が座るか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideOccupancy {
    pub bottom: bool,
    pub left: bool,
    pub top: bool,
    pub right: bool,
}

impl SideOccupancy {
    pub fn all() -> Self {
        Self {
            bottom: true,
            left: true,
            top: true,
            right: true,
        }
    }

    /// 長辺（下・上）のみ。端は指定に従う
    pub fn long_sides(left: bool, right: bool) -> Self {
        Self {
            bottom: true,
            left,
            top: true,
            right,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.bottom || self.left || self.top || self.right)
    }
}

impl Default for SideOccupancy {
    fn default() -> Self {
        Self::all()
    }
}

/// レイアウト構築エラー
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutError {
    InvalidDimension { name: &'static str, value: f64 },
    NoSeats(String),
    EmptySlotList,
    EmptyScene(String),
}

impl std::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutError::InvalidDimension { name, value } => {
                write!(f, "不正な寸法 {}: {}", name, value)
            }
            LayoutError::NoSeats(id) => {
                write!(f, "テーブル {} に座席がありません", id)
            }
            LayoutError::EmptySlotList => {
                write!(f, "疎配置のスロットリストが空です")
            }
            LayoutError::EmptyScene(name) => {
                write!(f, "シーン {} に参加者がいません", name)
            }
        }
    }
}

impl std::error::Error for LayoutError {}

fn check_dimension(name: &'static str, value: f64) -> Result<f64, LayoutError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(LayoutError::InvalidDimension { name, value })
    }
}

/// 丸テーブル
#[derive(Debug, Clone)]
pub struct CircularTable {
    pub id: String,
    pub center: Point2D,
    pub diameter: f64,
    pub seats: u32,
}

impl CircularTable {
    pub fn new(id: String, center: Point2D, geometry: &GeometryConfig) -> Result<Self, LayoutError> {
        let diameter = check_dimension("circular_diameter_ft", geometry.circular_diameter_ft)?;
        if geometry.circular_seats == 0 {
            return Err(LayoutError::NoSeats(id));
        }

        Ok(Self {
            id,
            center,
            diameter,
            seats: geometry.circular_seats,
        })
    }

    pub fn radius(&self) -> f64 {
        self.diameter / 2.0
    }
}

impl ITable for CircularTable {
    fn get_id(&self) -> String {
        self.id.clone()
    }

    /// 円周上に等角度間隔で配置。i番目は +x軸から反時計回りに i*360/N 度
    fn seat_points(&self) -> Vec<Point2D> {
        let angle_step = 360.0 / self.seats as f64;
        (0..self.seats)
            .map(|i| self.center + Point2D::unit_from_angle(i as f64 * angle_step) * self.radius())
            .collect()
    }

    fn outline(&self) -> TableOutline {
        TableOutline::Circle {
            center: self.center,
            radius: self.radius(),
        }
    }
}

/// 長テーブル
///
/// 角`corner`を基準に幅方向`rotation_deg`、奥行方向`rotation_deg + 90`度へ
/// 広がる。座席は下・左・上・右の順に生成される。
#[derive(Debug, Clone)]
pub struct RectangularTable {
    pub id: String,
    pub corner: Point2D,
    pub width: f64,
    pub length: f64,
    pub rotation_deg: f64,
    pub sides: SideOccupancy,
    pub seats_per_width_side: u32,
    pub seats_per_length_side: u32,
}

impl RectangularTable {
    pub fn new(
        id: String,
        corner: Point2D,
        rotation_deg: f64,
        sides: SideOccupancy,
        geometry: &GeometryConfig,
    ) -> Result<Self, LayoutError> {
        let width = check_dimension("rectangular_width_ft", geometry.rectangular_width_ft)?;
        let length = check_dimension("rectangular_length_ft", geometry.rectangular_length_ft)?;
        if sides.is_empty() {
            return Err(LayoutError::NoSeats(id));
        }
        if !rotation_deg.is_finite() {
            return Err(LayoutError::InvalidDimension {
                name: "rotation_deg",
                value: rotation_deg,
            });
        }

        let table = Self {
            id,
            corner,
            width,
            length,
            rotation_deg,
            sides,
            seats_per_width_side: geometry.seats_per_width_side,
            seats_per_length_side: geometry.seats_per_length_side,
        };

        if table.seat_count() == 0 {
            return Err(LayoutError::NoSeats(table.id));
        }

        Ok(table)
    }

    fn width_axis(&self) -> Point2D {
        Point2D::unit_from_angle(self.rotation_deg)
    }

    fn length_axis(&self) -> Point2D {
        Point2D::unit_from_angle(self.rotation_deg + 90.0)
    }

    /// 辺上に k/(count+1) 間隔で並ぶ座席。角には置かない
    fn side_seats(start: Point2D, direction: Point2D, side_length: f64, count: u32) -> Vec<Point2D> {
        (1..=count)
            .map(|k| start + direction * (side_length * side_fraction(k, count)))
            .collect()
    }
}

/// count席のうちk番目（1始まり）の辺上の位置の割合
fn side_fraction(k: u32, count: u32) -> f64 {
    k as f64 / (count as f64 + 1.0)
}

impl ITable for RectangularTable {
    fn get_id(&self) -> String {
        self.id.clone()
    }

    fn seat_points(&self) -> Vec<Point2D> {
        let u = self.width_axis();
        let v = self.length_axis();
        let mut seats = Vec::new();

        if self.sides.bottom {
            seats.extend(Self::side_seats(self.corner, u, self.width, self.seats_per_width_side));
        }
        if self.sides.left {
            seats.extend(Self::side_seats(self.corner, v, self.length, self.seats_per_length_side));
        }
        if self.sides.top {
            let far = self.corner + v * self.length;
            seats.extend(Self::side_seats(far, u, self.width, self.seats_per_width_side));
        }
        if self.sides.right {
            let far = self.corner + u * self.width;
            seats.extend(Self::side_seats(far, v, self.length, self.seats_per_length_side));
        }

        seats
    }

    fn seat_count(&self) -> usize {
        let w = self.seats_per_width_side as usize;
        let l = self.seats_per_length_side as usize;
        [
            (self.sides.bottom, w),
            (self.sides.left, l),
            (self.sides.top, w),
            (self.sides.right, l),
        ]
        .iter()
        .filter(|(occupied, _)| *occupied)
        .map(|(_, n)| n)
        .sum()
    }

    fn outline(&self) -> TableOutline {
        TableOutline::Rectangle {
            corner: self.corner,
            width: self.width,
            length: self.length,
            rotation_deg: self.rotation_deg,
        }
    }
}

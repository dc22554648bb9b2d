//! # Scene モジュール
//!
//! 複数のテーブルを組み合わせて1つの実験シーンを構築します。
//!
//! シーンは着席位置（参加者）の順序付きリスト、間引きで空席になった椅子、
//! 描画用のテーブル外形から成ります。参加者の順序がそのままシナリオ
//! ファイル上のエージェント番号になるため、テーブルの走査順は固定です。
//!
//! ## 構築レシピ
//!
//! - **密な格子**: 列（外側）→行（内側）の順に全スロットへテーブルを配置
//! - **疎な明示配置**: `(列, 行)` のリストに従って配置。端の着席判定は
//!   リスト中の最小・最大列を基準にする
//! - **間引き**: 密なシーンを作成後、偶数番目を参加者、奇数番目を空席に分割

use std::str::FromStr;

use tracing::debug;

use crate::config::{ExperimentConfig, GeometryConfig};
use crate::models::*;

/// テーブルの形状区分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Circular,
    Rectangular,
}

impl TableKind {
    /// 隣接スロット間の距離
    ///
    /// 丸テーブルは縦横とも直径+間隔。長テーブルは行方向に幅だけ進めて
    /// 端と端を接し、列方向は奥行+間隔で椅子を置く余地を残す。
    pub fn pitch(&self, geometry: &GeometryConfig) -> Point2D {
        match self {
            TableKind::Circular => {
                let step = geometry.circular_diameter_ft + geometry.table_gap_ft;
                Point2D::new(step, step)
            }
            TableKind::Rectangular => Point2D::new(
                geometry.rectangular_width_ft,
                geometry.rectangular_length_ft + geometry.table_gap_ft,
            ),
        }
    }
}

/// 長テーブルの短辺に人を座らせるかどうか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndSeating {
    /// 短辺には座らない
    None,
    /// 最小列の左端と最大列の右端にのみ座る
    OuterEnds,
}

/// 1つの実験シーン
#[derive(Debug, Clone)]
pub struct Scene {
    pub title: String,
    pub seats: Vec<Point2D>,
    pub empty_chairs: Vec<Point2D>,
    pub outlines: Vec<TableOutline>,
}

impl Scene {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            seats: Vec::new(),
            empty_chairs: Vec::new(),
            outlines: Vec::new(),
        }
    }

    /// テーブルの座席と外形を追加
    pub fn add_table(&mut self, table: &dyn ITable) {
        let seats = table.seat_points();
        debug!(
            "テーブル配置: {} ({}席)",
            table.get_id(),
            seats.len()
        );
        self.seats.extend(seats);
        self.outlines.push(table.outline());
    }

    /// 参加者数（空席は含まない）
    pub fn people_count(&self) -> usize {
        self.seats.len()
    }

    /// 偶数番目の座席だけを参加者として残し、奇数番目を空席にする
    pub fn thinned(mut self) -> Self {
        let (present, absent) = partition_by_parity(&self.seats);
        self.seats = present;
        self.empty_chairs.extend(absent);
        self
    }

    /// テーブルと全座席を含む外接矩形
    pub fn bounds(&self) -> Option<(Point2D, Point2D)> {
        let mut points: Vec<Point2D> = self.seats.iter().chain(&self.empty_chairs).copied().collect();
        for outline in &self.outlines {
            let (min, max) = outline.bounds();
            points.push(min);
            points.push(max);
        }
        bounding_box(&points)
    }
}

/// 順序付き列を添字の偶奇で分割する（偶数, 奇数）
///
/// 偶数側の要素数は ceil(len/2)、各側の相対順序は保たれる。
pub fn partition_by_parity<T: Copy>(items: &[T]) -> (Vec<T>, Vec<T>) {
    let even = items.iter().step_by(2).copied().collect();
    let odd = items.iter().skip(1).step_by(2).copied().collect();
    (even, odd)
}

/// 列×行の密な格子スロットを列優先で列挙
pub fn grid_slots(columns: u32, rows: u32) -> Vec<[i32; 2]> {
    (0..columns as i32)
        .flat_map(|col| (0..rows as i32).map(move |row| [col, row]))
        .collect()
}

/// シーン構築器
pub struct SceneBuilder<'a> {
    geometry: &'a GeometryConfig,
    id_prefix: String,
}

impl<'a> SceneBuilder<'a> {
    pub fn new(geometry: &'a GeometryConfig, id_prefix: &str) -> Self {
        Self {
            geometry,
            id_prefix: id_prefix.to_string(),
        }
    }

    /// 密な格子にテーブルを配置
    pub fn dense_grid(
        &self,
        title: &str,
        kind: TableKind,
        columns: u32,
        rows: u32,
        ends: EndSeating,
    ) -> Result<Scene, LayoutError> {
        self.at_slots(title, kind, &grid_slots(columns, rows), ends)
    }

    /// 指定スロットにテーブルを配置
    pub fn at_slots(
        &self,
        title: &str,
        kind: TableKind,
        slots: &[[i32; 2]],
        ends: EndSeating,
    ) -> Result<Scene, LayoutError> {
        let min_col = slots.iter().map(|s| s[0]).min().ok_or(LayoutError::EmptySlotList)?;
        let max_col = slots.iter().map(|s| s[0]).max().ok_or(LayoutError::EmptySlotList)?;

        let pitch = kind.pitch(self.geometry);
        let mut scene = Scene::new(title);

        for (index, [col, row]) in slots.iter().copied().enumerate() {
            let id = format!("{}_T{:03}", self.id_prefix, index + 1);
            let anchor = Point2D::new(col as f64 * pitch.x, row as f64 * pitch.y);

            match kind {
                TableKind::Circular => {
                    let table = CircularTable::new(id, anchor, self.geometry)?;
                    scene.add_table(&table);
                }
                TableKind::Rectangular => {
                    let sides = match ends {
                        EndSeating::None => SideOccupancy::long_sides(false, false),
                        EndSeating::OuterEnds => {
                            SideOccupancy::long_sides(col == min_col, col == max_col)
                        }
                    };
                    let table = RectangularTable::new(id, anchor, 0.0, sides, self.geometry)?;
                    scene.add_table(&table);
                }
            }
        }

        if scene.seats.is_empty() {
            return Err(LayoutError::EmptyScene(title.to_string()));
        }

        Ok(scene)
    }
}

/// 名前付き実験
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Experiment {
    RoundTables,
    Cafeteria,
    Conference,
    SparseRoundTables,
    SparseCafeteria,
    SparseConference,
}

impl Experiment {
    pub const ALL: [Experiment; 6] = [
        Experiment::RoundTables,
        Experiment::Cafeteria,
        Experiment::Conference,
        Experiment::SparseCafeteria,
        Experiment::SparseRoundTables,
        Experiment::SparseConference,
    ];

    /// CLIで使う識別名
    pub fn name(&self) -> &'static str {
        match self {
            Experiment::RoundTables => "round-tables",
            Experiment::Cafeteria => "cafeteria",
            Experiment::Conference => "conference",
            Experiment::SparseRoundTables => "sparse-round-tables",
            Experiment::SparseCafeteria => "sparse-cafeteria",
            Experiment::SparseConference => "sparse-conference",
        }
    }

    /// 出力ファイル名（拡張子なし）
    pub fn file_stem(&self) -> &'static str {
        match self {
            Experiment::RoundTables => "roundTables",
            Experiment::Cafeteria => "cafeteria",
            Experiment::Conference => "conference",
            Experiment::SparseRoundTables => "sparseRoundTables",
            Experiment::SparseCafeteria => "sparseCafeteria",
            Experiment::SparseConference => "sparse_conference",
        }
    }

    /// 図のタイトル
    pub fn title(&self) -> &'static str {
        match self {
            Experiment::RoundTables => "round tables",
            Experiment::Cafeteria => "cafeteria",
            Experiment::Conference => "conference",
            Experiment::SparseRoundTables => "sparse round tables",
            Experiment::SparseCafeteria => "sparse cafeteria",
            Experiment::SparseConference => "sparse conference",
        }
    }

    /// 設定に従ってシーンを構築
    pub fn build(&self, config: &ExperimentConfig) -> Result<Scene, LayoutError> {
        let layouts = &config.layouts;
        let builder = SceneBuilder::new(&config.geometry, self.file_stem());
        let title = self.title();

        match self {
            Experiment::RoundTables => {
                let [cols, rows] = layouts.round_table_grid;
                builder.dense_grid(title, TableKind::Circular, cols, rows, EndSeating::None)
            }
            Experiment::Cafeteria => {
                let [cols, rows] = layouts.cafeteria_grid;
                builder.dense_grid(title, TableKind::Rectangular, cols, rows, EndSeating::None)
            }
            Experiment::Conference => builder.dense_grid(
                title,
                TableKind::Rectangular,
                layouts.conference_tables,
                1,
                EndSeating::OuterEnds,
            ),
            Experiment::SparseRoundTables => builder.at_slots(
                title,
                TableKind::Circular,
                &layouts.sparse_slots,
                EndSeating::None,
            ),
            Experiment::SparseCafeteria => builder.at_slots(
                title,
                TableKind::Rectangular,
                &layouts.sparse_slots,
                EndSeating::OuterEnds,
            ),
            Experiment::SparseConference => Ok(builder
                .dense_grid(
                    title,
                    TableKind::Rectangular,
                    layouts.conference_tables,
                    1,
                    EndSeating::OuterEnds,
                )?
                .thinned()),
        }
    }
}

impl FromStr for Experiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Experiment::ALL
            .iter()
            .copied()
            .find(|e| e.name() == wanted || e.file_stem().to_lowercase() == s.trim().to_lowercase())
            .ok_or_else(|| {
                let names: Vec<&str> = Experiment::ALL.iter().map(|e| e.name()).collect();
                format!("無効な実験名: {}. 利用可能: {}", s, names.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_partition_by_parity() {
        let items = [0, 1, 2, 3, 4];
        let (even, odd) = partition_by_parity(&items);
        assert_eq!(even, vec![0, 2, 4]);
        assert_eq!(odd, vec![1, 3]);

        let (even, odd) = partition_by_parity::<i32>(&[]);
        assert!(even.is_empty() && odd.is_empty());
    }

    #[test]
    fn test_grid_slots_column_major() {
        assert_eq!(grid_slots(2, 2), vec![[0, 0], [0, 1], [1, 0], [1, 1]]);
    }

    #[test]
    fn test_round_tables_scene() {
        let config = ExperimentConfig::default();
        let scene = Experiment::RoundTables.build(&config).unwrap();
        assert_eq!(scene.people_count(), 6 * 8);
        assert_eq!(scene.outlines.len(), 6);
        assert!(scene.empty_chairs.is_empty());
        // 2番目のテーブル（列0, 行1）の中心は (0, 9)
        assert!((scene.seats[8].x - 2.5).abs() < 1e-9);
        assert!((scene.seats[8].y - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_cafeteria_has_no_end_seats() {
        let config = ExperimentConfig::default();
        let scene = Experiment::Cafeteria.build(&config).unwrap();
        assert_eq!(scene.people_count(), 6 * 6);
    }

    #[test]
    fn test_conference_outer_ends() {
        let config = ExperimentConfig::default();
        let scene = Experiment::Conference.build(&config).unwrap();
        // 4卓 x 長辺6席 + 両端1席ずつ
        assert_eq!(scene.people_count(), 4 * 6 + 2);
        let min_x = scene.seats.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let max_x = scene.seats.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        assert!(min_x.abs() < 1e-9);
        assert!((max_x - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_sparse_cafeteria_ends_follow_slot_extremes() {
        let config = ExperimentConfig::default();
        let scene = Experiment::SparseCafeteria.build(&config).unwrap();
        assert_eq!(scene.people_count(), 2 * 7);
        // 列2のテーブルの右端 x = 2*6 + 6 = 18
        assert!(scene.seats.iter().any(|p| (p.x - 18.0).abs() < 1e-9));
        assert!(scene.seats.iter().any(|p| p.x.abs() < 1e-9));
    }

    #[test]
    fn test_sparse_round_tables_positions() {
        let config = ExperimentConfig::default();
        let scene = Experiment::SparseRoundTables.build(&config).unwrap();
        assert_eq!(scene.people_count(), 16);
        assert!((scene.seats[8].x - (18.0 + 2.5)).abs() < 1e-9);
        assert!((scene.seats[8].y - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_sparse_conference_is_thinned() {
        let config = ExperimentConfig::default();
        let dense = Experiment::Conference.build(&config).unwrap();
        let sparse = Experiment::SparseConference.build(&config).unwrap();
        assert_eq!(sparse.people_count(), dense.people_count().div_ceil(2));
        assert_eq!(sparse.empty_chairs.len(), dense.people_count() / 2);
        assert_eq!(sparse.seats[1], dense.seats[2]);
        assert_eq!(sparse.empty_chairs[0], dense.seats[1]);
    }

    #[test]
    fn test_empty_slot_list_rejected() {
        let geometry = GeometryConfig::default();
        let builder = SceneBuilder::new(&geometry, "x");
        assert_eq!(
            builder
                .at_slots("x", TableKind::Circular, &[], EndSeating::None)
                .unwrap_err(),
            LayoutError::EmptySlotList
        );
    }

    #[test]
    fn test_experiment_from_str() {
        assert_eq!("round-tables".parse::<Experiment>(), Ok(Experiment::RoundTables));
        assert_eq!("sparse_conference".parse::<Experiment>(), Ok(Experiment::SparseConference));
        assert_eq!("sparseCafeteria".parse::<Experiment>(), Ok(Experiment::SparseCafeteria));
        assert!("ballroom".parse::<Experiment>().is_err());
    }

    proptest! {
        #[test]
        fn thinning_keeps_ceil_half(columns in 1u32..6, rows in 1u32..4) {
            let geometry = GeometryConfig::default();
            let builder = SceneBuilder::new(&geometry, "p");
            let dense = builder
                .dense_grid("p", TableKind::Rectangular, columns, rows, EndSeating::OuterEnds)
                .unwrap();
            let m = dense.people_count();
            let thinned = dense.clone().thinned();
            prop_assert_eq!(thinned.people_count(), m.div_ceil(2));
            prop_assert_eq!(thinned.people_count() + thinned.empty_chairs.len(), m);
        }
    }
}

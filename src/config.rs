use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::scene::Experiment;

/// 設定ファイルのメタデータ
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigMeta {
    pub version: String,
    pub name: String,
    pub description: String,
}

impl Default for ConfigMeta {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: "default".to_string(),
            description: "標準の着席レイアウト実験一式".to_string(),
        }
    }
}

/// テーブル寸法と着席数（単位: フィート）
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub circular_diameter_ft: f64,
    pub circular_seats: u32,
    pub rectangular_width_ft: f64,
    pub rectangular_length_ft: f64,
    pub seats_per_width_side: u32,
    pub seats_per_length_side: u32,
    /// 椅子を置くためのテーブル間隔
    pub table_gap_ft: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            circular_diameter_ft: 5.0,
            circular_seats: 8,
            rectangular_width_ft: 6.0,
            rectangular_length_ft: 2.5,
            seats_per_width_side: 3,
            seats_per_length_side: 1,
            table_gap_ft: 4.0,
        }
    }
}

/// 1辺あたりの着席数の上限
pub const MAX_SEATS_PER_SIDE: u32 = 1000;

/// 携帯電話の持ち方。シミュレータは `<持ち方> phone` の行として読む
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum CarryPosition {
    #[serde(rename = "FRONTPANTSPOCKET")]
    FrontPantsPocket,
    #[default]
    #[serde(rename = "INHAND")]
    InHand,
    #[serde(rename = "SHIRTPOCKET")]
    ShirtPocket,
}

impl CarryPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            CarryPosition::FrontPantsPocket => "FRONTPANTSPOCKET",
            CarryPosition::InHand => "INHAND",
            CarryPosition::ShirtPocket => "SHIRTPOCKET",
        }
    }
}

impl FromStr for CarryPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FRONTPANTSPOCKET" => Ok(CarryPosition::FrontPantsPocket),
            "INHAND" => Ok(CarryPosition::InHand),
            "SHIRTPOCKET" => Ok(CarryPosition::ShirtPocket),
            _ => Err(format!(
                "Invalid carry position: {}. Use FRONTPANTSPOCKET, INHAND or SHIRTPOCKET",
                s
            )),
        }
    }
}

/// シナリオファイル出力設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub duration_minutes: u32,
    pub sensing_range: f64,
    pub carry_position: CarryPosition,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            duration_minutes: 1,
            sensing_range: 16.0,
            carry_position: CarryPosition::default(),
        }
    }
}

/// 各実験のテーブル配置パラメータ
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// 丸テーブルの格子 [列数, 行数]
    pub round_table_grid: [u32; 2],
    /// 食堂の格子 [列数, 行数]
    pub cafeteria_grid: [u32; 2],
    /// 会議室で一列に並べるテーブル数
    pub conference_tables: u32,
    /// 疎配置実験のスロット座標 [列, 行]
    pub sparse_slots: Vec<[i32; 2]>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            round_table_grid: [3, 2],
            cafeteria_grid: [3, 2],
            conference_tables: 4,
            sparse_slots: vec![[0, 0], [2, 1]],
        }
    }
}

/// 実行する実験の選択
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExperimentSelection {
    pub round_tables: bool,
    pub cafeteria: bool,
    pub conference: bool,
    pub sparse_round_tables: bool,
    pub sparse_cafeteria: bool,
    pub sparse_conference: bool,
}

impl Default for ExperimentSelection {
    fn default() -> Self {
        Self {
            round_tables: true,
            cafeteria: true,
            conference: true,
            sparse_round_tables: true,
            sparse_cafeteria: true,
            sparse_conference: true,
        }
    }
}

impl ExperimentSelection {
    /// 何も選択しない状態
    pub fn none() -> Self {
        Self {
            round_tables: false,
            cafeteria: false,
            conference: false,
            sparse_round_tables: false,
            sparse_cafeteria: false,
            sparse_conference: false,
        }
    }

    pub fn is_enabled(&self, experiment: Experiment) -> bool {
        match experiment {
            Experiment::RoundTables => self.round_tables,
            Experiment::Cafeteria => self.cafeteria,
            Experiment::Conference => self.conference,
            Experiment::SparseRoundTables => self.sparse_round_tables,
            Experiment::SparseCafeteria => self.sparse_cafeteria,
            Experiment::SparseConference => self.sparse_conference,
        }
    }

    pub fn enable(&mut self, experiment: Experiment) {
        match experiment {
            Experiment::RoundTables => self.round_tables = true,
            Experiment::Cafeteria => self.cafeteria = true,
            Experiment::Conference => self.conference = true,
            Experiment::SparseRoundTables => self.sparse_round_tables = true,
            Experiment::SparseCafeteria => self.sparse_cafeteria = true,
            Experiment::SparseConference => self.sparse_conference = true,
        }
    }

    /// 有効な実験を定義順に列挙
    pub fn enabled(&self) -> Vec<Experiment> {
        Experiment::ALL
            .iter()
            .copied()
            .filter(|e| self.is_enabled(*e))
            .collect()
    }
}

/// 外部シミュレータ起動設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub java: String,
    pub jar_path: String,
    /// `key=value` 形式で渡す名前付きパラメータ
    pub parameters: BTreeMap<String, String>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        let parameters = [
            ("dataLocation", "CDFs/"),
            ("numMalicious", "0"),
            ("sybilMultiplier", "1"),
            ("weights", "fractional"),
            ("alpha", "3.0"),
            ("weightBias", "8.9"),
            ("weightDiscrepancy", "0.43"),
            ("weightSeparation", ".14"),
            ("delta", "absolute"),
            ("maliciousStrategy", "nDCFBreak"),
            ("threshStressMin", "-1"),
            ("threshStressMax", "-1"),
            ("rngSeed", "80085"),
            ("distanceMeasure", "ML"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            java: "java".to_string(),
            jar_path: "Covid-Graph-ContactTracing.jar".to_string(),
            parameters,
        }
    }
}

/// 完全な実験設定
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub meta: ConfigMeta,
    pub geometry: GeometryConfig,
    pub output: OutputConfig,
    pub layouts: LayoutConfig,
    pub experiments: ExperimentSelection,
    pub simulator: SimulatorConfig,
}

impl ExperimentConfig {
    /// YAMLファイルから実験設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        // ファイル存在チェック
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;

        let config: ExperimentConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e))?;

        config.validate()?;

        Ok(config)
    }

    /// 設定の基本的な検証
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.geometry;
        let dimensions = [
            ("circular_diameter_ft", g.circular_diameter_ft),
            ("rectangular_width_ft", g.rectangular_width_ft),
            ("rectangular_length_ft", g.rectangular_length_ft),
        ];
        for (name, value) in dimensions {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be positive (got {})",
                    name, value
                )));
            }
        }
        if !(g.table_gap_ft.is_finite() && g.table_gap_ft >= 0.0) {
            return Err(ConfigError::ValidationError(
                "table_gap_ft must be non-negative".to_string(),
            ));
        }
        if g.circular_seats == 0 {
            return Err(ConfigError::ValidationError(
                "circular_seats must be at least 1".to_string(),
            ));
        }
        // 食堂は長辺だけに座るので長辺の席は必須
        if g.seats_per_width_side == 0 {
            return Err(ConfigError::ValidationError(
                "seats_per_width_side must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("circular_seats", g.circular_seats),
            ("seats_per_width_side", g.seats_per_width_side),
            ("seats_per_length_side", g.seats_per_length_side),
        ] {
            if value > MAX_SEATS_PER_SIDE {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be at most {} (got {})",
                    name, MAX_SEATS_PER_SIDE, value
                )));
            }
        }

        let l = &self.layouts;
        if l.round_table_grid.contains(&0) || l.cafeteria_grid.contains(&0) {
            return Err(ConfigError::ValidationError(
                "grid dimensions must be at least 1".to_string(),
            ));
        }
        if l.conference_tables == 0 {
            return Err(ConfigError::ValidationError(
                "conference_tables must be at least 1".to_string(),
            ));
        }
        if l.sparse_slots.is_empty() {
            return Err(ConfigError::ValidationError(
                "sparse_slots must list at least one slot".to_string(),
            ));
        }

        let o = &self.output;
        if !(o.sensing_range.is_finite() && o.sensing_range > 0.0) {
            return Err(ConfigError::ValidationError(
                "sensing_range must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// 設定の概要を表示
    pub fn print_summary(&self) {
        println!("=== 設定情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        let g = &self.geometry;
        println!("=== テーブル寸法 ===");
        println!(
            "丸テーブル: 直径 {:.1}ft, {}席",
            g.circular_diameter_ft, g.circular_seats
        );
        println!(
            "長テーブル: {:.1}ft x {:.1}ft, 長辺 {}席 / 短辺 {}席",
            g.rectangular_width_ft,
            g.rectangular_length_ft,
            g.seats_per_width_side,
            g.seats_per_length_side
        );
        println!("テーブル間隔: {:.1}ft", g.table_gap_ft);
        println!();

        println!("=== 出力 ===");
        println!("出力先: {}", self.output.directory.display());
        println!("時間: {}分", self.output.duration_minutes);
        println!("通信範囲: {}", self.output.sensing_range);
        println!("持ち方: {}", self.output.carry_position.as_str());
        println!();

        println!("=== 実行する実験 ===");
        let enabled = self.experiments.enabled();
        if enabled.is_empty() {
            println!("  (なし)");
        }
        for experiment in enabled {
            println!("  {} -> {}", experiment.name(), experiment.file_stem());
        }
    }
}

/// 設定読み込みエラー
#[derive(Debug)]
pub enum ConfigError {
    FileNotFound(PathBuf),
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => {
                write!(f, "設定ファイルが見つかりません: {}", path.display())
            }
            ConfigError::IoError(path, err) => {
                write!(f, "ファイル読み込みエラー {}: {}", path.display(), err)
            }
            ConfigError::ParseError(path, err) => {
                write!(f, "YAML解析エラー {}: {}", path.display(), err)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "設定検証エラー: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

//! # Scenario File モジュール
//!
//! 接触追跡シミュレータが読み込むシナリオファイルの生成と検査を行います。
//!
//! ## 出力手順
//!
//! 1. 全座席の成分ごとの最小値を引き、外接矩形の左下を原点へ平行移動
//! 2. 平行移動後の成分ごとの最大値を領域 (area) とする
//! 3. 時間行, 領域行, `initialize:` 節, `round 0:` 節の順に書き出す
//! 4. 平行移動前のシーンをSVGとして同名で保存（失敗しても警告のみ）
//!
//! ## 書式
//!
//! ```text
//! 1 minutes
//! 5.0 5.0 area
//!
//! initialize:
//!
//! agent 0:
//! 16 range
//! INHAND phone
//!
//! round 0:
//! 0 5.000 2.500
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use crate::config::{CarryPosition, OutputConfig};
use crate::models::{bounding_box, LayoutError, Point2D};
use crate::render;
use crate::scene::Scene;

const NUMBER: &str = r"-?\d+(?:\.\d*)?(?:[eE][-+]?\d+)?";

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^({NUMBER})\s+minutes$")).expect("valid regex"));
static AREA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^({NUMBER})\s+({NUMBER})\s+area$")).expect("valid regex"));
static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:initialize|round\s+(\d+)):(?:\s+time\s+\d+)?$").expect("valid regex")
});
static AGENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^agent\s+(\d+):$").expect("valid regex"));
static RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^({NUMBER})\s+range$")).expect("valid regex"));
static CARRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(FRONTPANTSPOCKET|INHAND|SHIRTPOCKET)\s+phone$").expect("valid regex")
});
static POSITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(\d+)\s+({NUMBER})\s+({NUMBER})$")).expect("valid regex")
});

/// 座標は小数点以下3桁で書き出すので、検査時はその丸め幅を許容する
const COORDINATE_TOLERANCE: f64 = 5e-4;

/// エージェントの初期設定ブロック
#[derive(Debug, Clone, PartialEq)]
pub struct AgentDeclaration {
    pub index: usize,
    pub range: f64,
    pub carry_position: CarryPosition,
}

/// 1ラウンド分の位置記録
#[derive(Debug, Clone, PartialEq)]
pub struct Round {
    pub number: u32,
    pub positions: Vec<(usize, Point2D)>,
}

/// シナリオファイルの内容
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioFile {
    pub duration_minutes: f64,
    pub area: Point2D,
    pub agents: Vec<AgentDeclaration>,
    pub rounds: Vec<Round>,
}

/// 点列を非負座標系へ平行移動し、(移動後の点列, 領域) を返す
pub fn normalize(points: &[Point2D]) -> Option<(Vec<Point2D>, Point2D)> {
    let (min, _) = bounding_box(points)?;
    let translated: Vec<Point2D> = points.iter().map(|p| *p - min).collect();
    let (_, extent) = bounding_box(&translated)?;
    Some((translated, extent))
}

/// 領域の値を書き出す。整数値でも小数点を付ける（例: `5.0`）
fn format_extent(value: f64) -> String {
    let text = value.to_string();
    if text.contains('.') || !value.is_finite() {
        text
    } else {
        format!("{}.0", text)
    }
}

impl ScenarioFile {
    /// シーンの参加者からシナリオを作成
    pub fn from_scene(scene: &Scene, output: &OutputConfig) -> Result<Self, LayoutError> {
        let (points, area) =
            normalize(&scene.seats).ok_or_else(|| LayoutError::EmptyScene(scene.title.clone()))?;

        let agents = (0..points.len())
            .map(|index| AgentDeclaration {
                index,
                range: output.sensing_range,
                carry_position: output.carry_position,
            })
            .collect();

        Ok(Self {
            duration_minutes: output.duration_minutes as f64,
            area,
            agents,
            rounds: vec![Round {
                number: 0,
                positions: points.into_iter().enumerate().collect(),
            }],
        })
    }

    /// テキスト形式へ変換
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{} minutes\n", self.duration_minutes));
        out.push_str(&format!(
            "{} {} area\n",
            format_extent(self.area.x),
            format_extent(self.area.y)
        ));
        out.push('\n');
        out.push_str("initialize:\n\n");

        for agent in &self.agents {
            out.push_str(&format!("agent {}:\n", agent.index));
            out.push_str(&format!("{} range\n", agent.range));
            out.push_str(&format!("{} phone\n", agent.carry_position.as_str()));
            out.push('\n');
        }

        for round in &self.rounds {
            out.push_str(&format!("round {}:\n", round.number));
            for (index, p) in &round.positions {
                out.push_str(&format!("{} {:.3} {:.3}\n", index, p.x, p.y));
            }
        }

        out
    }

    /// ファイルへ書き出し
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), ScenarioFileError> {
        let path = path.as_ref();
        fs::write(path, self.to_text()).map_err(|e| ScenarioFileError::Io(path.to_path_buf(), e))
    }

    /// ファイルから読み込み、整合性を検査
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioFileError> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).map_err(|e| ScenarioFileError::Io(path.to_path_buf(), e))?;
        let scenario = Self::parse(&text)?;
        scenario.check()?;
        Ok(scenario)
    }

    /// テキストを解析
    pub fn parse(text: &str) -> Result<Self, ScenarioFileError> {
        enum Section {
            Header,
            Initialize,
            Round,
        }

        let mut duration = None;
        let mut area = None;
        let mut agents: Vec<AgentDeclaration> = Vec::new();
        let mut rounds: Vec<Round> = Vec::new();
        let mut section = Section::Header;

        for (line_index, raw) in text.lines().enumerate() {
            let line_no = line_index + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let parse_error = |message: &str| ScenarioFileError::Parse {
                line: line_no,
                message: message.to_string(),
            };

            if let Some(caps) = SECTION_RE.captures(line) {
                match caps.get(1) {
                    None => section = Section::Initialize,
                    Some(number) => {
                        let number = number
                            .as_str()
                            .parse()
                            .map_err(|_| parse_error("invalid round number"))?;
                        rounds.push(Round {
                            number,
                            positions: Vec::new(),
                        });
                        section = Section::Round;
                    }
                }
                continue;
            }

            match section {
                Section::Header => {
                    if let Some(caps) = DURATION_RE.captures(line) {
                        duration = Some(parse_number(&caps[1], line_no)?);
                    } else if let Some(caps) = AREA_RE.captures(line) {
                        area = Some(Point2D::new(
                            parse_number(&caps[1], line_no)?,
                            parse_number(&caps[2], line_no)?,
                        ));
                    } else {
                        return Err(parse_error("unexpected header line"));
                    }
                }
                Section::Initialize => {
                    if let Some(caps) = AGENT_RE.captures(line) {
                        let index = caps[1]
                            .parse()
                            .map_err(|_| parse_error("invalid agent index"))?;
                        agents.push(AgentDeclaration {
                            index,
                            range: 0.0,
                            carry_position: CarryPosition::default(),
                        });
                    } else {
                        let agent = agents
                            .last_mut()
                            .ok_or_else(|| parse_error("attribute outside of an agent block"))?;
                        if let Some(caps) = RANGE_RE.captures(line) {
                            agent.range = parse_number(&caps[1], line_no)?;
                        } else if let Some(caps) = CARRY_RE.captures(line) {
                            agent.carry_position = caps[1]
                                .parse()
                                .map_err(|e: String| parse_error(&e))?;
                        } else {
                            return Err(parse_error("unknown agent attribute"));
                        }
                    }
                }
                Section::Round => {
                    let caps = POSITION_RE
                        .captures(line)
                        .ok_or_else(|| parse_error("expected `<index> <x> <y>`"))?;
                    let index = caps[1]
                        .parse()
                        .map_err(|_| parse_error("invalid agent index"))?;
                    let position = Point2D::new(
                        parse_number(&caps[2], line_no)?,
                        parse_number(&caps[3], line_no)?,
                    );
                    if let Some(round) = rounds.last_mut() {
                        round.positions.push((index, position));
                    }
                }
            }
        }

        Ok(Self {
            duration_minutes: duration.ok_or(ScenarioFileError::Missing("minutes"))?,
            area: area.ok_or(ScenarioFileError::Missing("area"))?,
            agents,
            rounds,
        })
    }

    /// 参加者番号の連続性、ラウンド内の重複、round 0 の網羅、位置の領域内判定
    pub fn check(&self) -> Result<(), ScenarioFileError> {
        if self.agents.is_empty() {
            return Err(ScenarioFileError::Inconsistent(
                "no agents declared".to_string(),
            ));
        }
        for (expected, agent) in self.agents.iter().enumerate() {
            if agent.index != expected {
                return Err(ScenarioFileError::Inconsistent(format!(
                    "agent indices are not contiguous: expected {}, found {}",
                    expected, agent.index
                )));
            }
        }

        if !self.rounds.iter().any(|r| r.number == 0) {
            return Err(ScenarioFileError::Missing("round 0"));
        }

        for round in &self.rounds {
            let mut placed = vec![false; self.agents.len()];
            for (index, p) in &round.positions {
                if *index >= self.agents.len() {
                    return Err(ScenarioFileError::Inconsistent(format!(
                        "round {} places undeclared agent {}",
                        round.number, index
                    )));
                }
                if placed[*index] {
                    return Err(ScenarioFileError::Inconsistent(format!(
                        "round {} places agent {} more than once",
                        round.number, index
                    )));
                }
                placed[*index] = true;
                let inside = p.x >= -COORDINATE_TOLERANCE
                    && p.y >= -COORDINATE_TOLERANCE
                    && p.x <= self.area.x + COORDINATE_TOLERANCE
                    && p.y <= self.area.y + COORDINATE_TOLERANCE;
                if !inside {
                    return Err(ScenarioFileError::Inconsistent(format!(
                        "agent {} at ({:.3}, {:.3}) lies outside the area",
                        index, p.x, p.y
                    )));
                }
            }
            // round 0 は全エージェントの初期位置
            if round.number == 0 {
                if let Some(missing) = placed.iter().position(|p| !p) {
                    return Err(ScenarioFileError::Inconsistent(format!(
                        "round 0 does not place agent {}",
                        missing
                    )));
                }
            }
        }

        Ok(())
    }

    /// 検査結果の概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオファイル ===");
        println!("時間: {}分", self.duration_minutes);
        println!("領域: {:.3} x {:.3} ft", self.area.x, self.area.y);
        println!("エージェント数: {}", self.agents.len());
        println!("ラウンド数: {}", self.rounds.len());
    }
}

fn parse_number(text: &str, line: usize) -> Result<f64, ScenarioFileError> {
    text.parse().map_err(|_| ScenarioFileError::Parse {
        line,
        message: format!("invalid number `{}`", text),
    })
}

/// 書き出したファイルのパス
#[derive(Debug, Clone)]
pub struct EmittedFiles {
    pub scenario: PathBuf,
    pub image: Option<PathBuf>,
}

/// シーンを `<dir>/<stem>.txt` と `<dir>/<stem>.svg` へ書き出す
pub fn emit(
    scene: &Scene,
    dir: &Path,
    stem: &str,
    output: &OutputConfig,
) -> Result<EmittedFiles, Box<dyn std::error::Error>> {
    let scenario = ScenarioFile::from_scene(scene, output)?;
    let scenario_path = dir.join(format!("{}.txt", stem));
    scenario.write(&scenario_path)?;
    info!(
        "シナリオ出力: {} ({}人, 領域 {:.3} x {:.3})",
        scenario_path.display(),
        scenario.agents.len(),
        scenario.area.x,
        scenario.area.y
    );

    let image_path = dir.join(format!("{}.svg", stem));
    let image = match render::write_svg(scene, &image_path) {
        Ok(()) => Some(image_path),
        Err(e) => {
            warn!("図の保存に失敗しました {}: {}", image_path.display(), e);
            None
        }
    };

    Ok(EmittedFiles {
        scenario: scenario_path,
        image,
    })
}

/// シナリオファイルのエラー
#[derive(Debug)]
pub enum ScenarioFileError {
    Io(PathBuf, std::io::Error),
    Parse { line: usize, message: String },
    Missing(&'static str),
    Inconsistent(String),
}

impl std::fmt::Display for ScenarioFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScenarioFileError::Io(path, err) => {
                write!(f, "ファイル入出力エラー {}: {}", path.display(), err)
            }
            ScenarioFileError::Parse { line, message } => {
                write!(f, "シナリオ解析エラー (行 {}): {}", line, message)
            }
            ScenarioFileError::Missing(what) => {
                write!(f, "シナリオに {} がありません", what)
            }
            ScenarioFileError::Inconsistent(msg) => {
                write!(f, "シナリオ不整合: {}", msg)
            }
        }
    }
}

impl std::error::Error for ScenarioFileError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExperimentConfig, GeometryConfig};
    use crate::models::{CircularTable, ITable};
    use crate::scene::Experiment;
    use proptest::prelude::*;

    fn single_circle_scene() -> Scene {
        let table =
            CircularTable::new("C1".to_string(), Point2D::origin(), &GeometryConfig::default())
                .unwrap();
        let mut scene = Scene::new("single");
        scene.add_table(&table);
        scene
    }

    #[test]
    fn test_single_circle_area() {
        let scenario =
            ScenarioFile::from_scene(&single_circle_scene(), &OutputConfig::default()).unwrap();
        assert!((scenario.area.x - 5.0).abs() < 1e-9);
        assert!((scenario.area.y - 5.0).abs() < 1e-9);

        let text = scenario.to_text();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("1 minutes"));
        let area_line = lines.next().unwrap();
        let parts: Vec<&str> = area_line.split_whitespace().collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2], "area");
        assert!((parts[0].parse::<f64>().unwrap() - 5.0).abs() < 1e-9);
        assert!(text.contains("round 0:\n0 5.000 2.500\n"));
    }

    #[test]
    fn test_exact_layout() {
        let mut scene = Scene::new("two");
        scene.seats = vec![Point2D::new(-1.0, 2.0), Point2D::new(3.0, 4.5)];
        let scenario = ScenarioFile::from_scene(&scene, &OutputConfig::default()).unwrap();
        let expected = "1 minutes\n\
                        4.0 2.5 area\n\
                        \n\
                        initialize:\n\
                        \n\
                        agent 0:\n\
                        16 range\n\
                        INHAND phone\n\
                        \n\
                        agent 1:\n\
                        16 range\n\
                        INHAND phone\n\
                        \n\
                        round 0:\n\
                        0 0.000 0.000\n\
                        1 4.000 2.500\n";
        assert_eq!(scenario.to_text(), expected);
    }

    #[test]
    fn test_empty_scene_rejected() {
        let scene = Scene::new("empty");
        assert!(matches!(
            ScenarioFile::from_scene(&scene, &OutputConfig::default()),
            Err(LayoutError::EmptyScene(_))
        ));
    }

    #[test]
    fn test_thinned_scene_counts_present_only() {
        let config = ExperimentConfig::default();
        let scene = Experiment::SparseConference.build(&config).unwrap();
        let scenario = ScenarioFile::from_scene(&scene, &config.output).unwrap();
        assert_eq!(scenario.agents.len(), 13);
        let text = scenario.to_text();
        assert_eq!(text.matches("agent ").count(), 13);
        assert!(!text.contains("agent 13:"));
    }

    #[test]
    fn test_emit_is_deterministic() {
        let config = ExperimentConfig::default();
        let scene = Experiment::Cafeteria.build(&config).unwrap();
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();

        let a = emit(&scene, first.path(), "cafeteria", &config.output).unwrap();
        let rebuilt = Experiment::Cafeteria.build(&config).unwrap();
        let b = emit(&rebuilt, second.path(), "cafeteria", &config.output).unwrap();

        assert_eq!(
            fs::read(&a.scenario).unwrap(),
            fs::read(&b.scenario).unwrap()
        );
        assert!(a.image.unwrap().exists());
        assert!(a.scenario.ends_with("cafeteria.txt"));
    }

    #[test]
    fn test_emit_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let result = emit(
            &single_circle_scene(),
            &missing,
            "x",
            &OutputConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_written_file_passes_check() {
        let config = ExperimentConfig::default();
        let scene = Experiment::SparseRoundTables.build(&config).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let files = emit(&scene, dir.path(), "sparseRoundTables", &config.output).unwrap();

        let parsed = ScenarioFile::from_file(&files.scenario).unwrap();
        assert_eq!(parsed.agents.len(), 16);
        assert_eq!(parsed.agents[3].carry_position, CarryPosition::InHand);
        assert_eq!(parsed.agents[3].range, 16.0);
        assert_eq!(parsed.rounds.len(), 1);
    }

    #[test]
    fn test_check_rejects_gaps_and_outside_points() {
        let gap = "1 minutes\n2.0 2.0 area\n\ninitialize:\n\nagent 0:\n16 range\nINHAND phone\n\n\
                   agent 2:\n16 range\nINHAND phone\n\nround 0:\n0 0.000 0.000\n2 1.000 1.000\n";
        let scenario = ScenarioFile::parse(gap).unwrap();
        assert!(matches!(
            scenario.check(),
            Err(ScenarioFileError::Inconsistent(_))
        ));

        let outside = "1 minutes\n2.0 2.0 area\n\ninitialize:\n\nagent 0:\n16 range\nINHAND phone\n\n\
                       round 0:\n0 3.000 0.000\n";
        let scenario = ScenarioFile::parse(outside).unwrap();
        assert!(scenario.check().is_err());
    }

    #[test]
    fn test_check_rejects_duplicate_round_positions() {
        let header = "1 minutes\n2.0 2.0 area\n\ninitialize:\n\nagent 0:\n16 range\nINHAND phone\n\n\
                      agent 1:\n16 range\nINHAND phone\n\n";

        // 件数は合っているが agent 1 が置かれていない
        let doubled = format!("{header}round 0:\n0 0.000 0.000\n0 1.000 1.000\n");
        let scenario = ScenarioFile::parse(&doubled).unwrap();
        match scenario.check() {
            Err(ScenarioFileError::Inconsistent(msg)) => assert!(msg.contains("agent 0")),
            other => panic!("unexpected: {:?}", other),
        }

        let later = format!(
            "{header}round 0:\n0 0.000 0.000\n1 1.000 1.000\nround 1:\n1 0.500 0.500\n1 1.000 1.000\n"
        );
        let scenario = ScenarioFile::parse(&later).unwrap();
        assert!(matches!(
            scenario.check(),
            Err(ScenarioFileError::Inconsistent(_))
        ));

        let valid = format!(
            "{header}round 0:\n1 1.000 1.000\n0 0.000 0.000\nround 1:\n1 0.500 0.500\n"
        );
        assert!(ScenarioFile::parse(&valid).unwrap().check().is_ok());
    }

    #[test]
    fn test_carry_position_written_before_phone() {
        let output = OutputConfig {
            carry_position: CarryPosition::ShirtPocket,
            ..OutputConfig::default()
        };
        let scenario = ScenarioFile::from_scene(&single_circle_scene(), &output).unwrap();
        let text = scenario.to_text();
        assert_eq!(text.matches("SHIRTPOCKET phone\n").count(), 8);
        assert!(!text.contains("INHAND"));

        let parsed = ScenarioFile::parse(&text).unwrap();
        assert!(parsed
            .agents
            .iter()
            .all(|a| a.carry_position == CarryPosition::ShirtPocket));
    }

    #[test]
    fn test_parse_rejects_items_other_than_phone() {
        let text = "1 minutes\n2.0 2.0 area\n\ninitialize:\n\nagent 0:\n16 range\nINHAND tablet\n\n\
                    round 0:\n0 0.000 0.000\n";
        match ScenarioFile::parse(text) {
            Err(ScenarioFileError::Parse { line, .. }) => assert_eq!(line, 8),
            other => panic!("unexpected: {:?}", other),
        }

        let unknown_position = text.replace("INHAND tablet", "BACKPACK phone");
        assert!(ScenarioFile::parse(&unknown_position).is_err());
    }

    #[test]
    fn test_parse_errors_report_line() {
        let text = "1 minutes\n2.0 2.0 area\n\ninitialize:\n\nagent 0:\nbogus\n";
        match ScenarioFile::parse(text) {
            Err(ScenarioFileError::Parse { line, .. }) => assert_eq!(line, 7),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            ScenarioFile::parse("initialize:\n"),
            Err(ScenarioFileError::Missing("minutes"))
        ));
    }

    proptest! {
        #[test]
        fn normalization_moves_minimum_to_origin(
            coords in prop::collection::vec((-500.0f64..500.0, -500.0f64..500.0), 1..40)
        ) {
            let points: Vec<Point2D> = coords.iter().map(|(x, y)| Point2D::new(*x, *y)).collect();
            let (translated, extent) = normalize(&points).unwrap();
            let (min, max) = bounding_box(&translated).unwrap();
            prop_assert_eq!(min, Point2D::origin());
            prop_assert_eq!(max, extent);
            prop_assert_eq!(translated.len(), points.len());
        }
    }

    #[test]
    fn test_seat_order_matches_indices() {
        let scene = single_circle_scene();
        let scenario = ScenarioFile::from_scene(&scene, &OutputConfig::default()).unwrap();
        let indices: Vec<usize> = scenario.rounds[0].positions.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, (0..8).collect::<Vec<_>>());
        let table_seats = CircularTable::new(
            "C1".to_string(),
            Point2D::origin(),
            &GeometryConfig::default(),
        )
        .unwrap()
        .seat_points();
        // 平行移動は (-2.5, -2.5)
        for ((_, p), seat) in scenario.rounds[0].positions.iter().zip(table_seats) {
            assert!((p.x - (seat.x + 2.5)).abs() < 1e-9);
        }
    }
}

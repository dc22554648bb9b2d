mod config;
mod logging;
mod models;
mod render;
mod scenario_file;
mod scene;
mod simulator;

use std::path::{Path, PathBuf};

use clap::{Arg, ArgAction, Command};
use config::ExperimentConfig;
use logging::{LogConfig, LogOutput};
use scenario_file::ScenarioFile;
use scene::Experiment;
use simulator::SimulatorInvocation;
use tracing::{debug, error, info};

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("seatgen")
        .version("0.1.0")
        .about("着席レイアウト生成 (Seating Layout Generator)")
        .long_about(
            "丸テーブル・長テーブルに座る人の配置を計算し、\n\
             接触追跡シミュレータ用のシナリオファイルと配置図(SVG)を出力します。",
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("実験設定ファイル(.yaml)のパスを指定")
                .long_help(
                    "実験設定ファイル(.yaml)のパスを指定します。\n\
                     指定しない場合、標準の寸法と6つの実験すべてを使用します。",
                ),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("出力先ディレクトリ（設定ファイルの値を上書き）"),
        )
        .arg(
            Arg::new("experiment")
                .short('e')
                .long("experiment")
                .value_name("NAME")
                .action(ArgAction::Append)
                .value_parser(clap::builder::ValueParser::new(|s: &str| s.parse::<Experiment>()))
                .help("実行する実験を指定（複数指定可、設定ファイルの選択を上書き）"),
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(ArgAction::SetTrue)
                .help("設定の情報のみ表示して終了")
                .conflicts_with("check"),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .value_name("FILE")
                .help("既存のシナリオファイルを検査して終了"),
        )
        .arg(
            Arg::new("run-simulator")
                .long("run-simulator")
                .action(ArgAction::SetTrue)
                .help("生成したシナリオごとに外部シミュレータを実行"),
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("TARGET")
                .default_value("console")
                .value_parser(clap::builder::ValueParser::new(|s: &str| s.parse::<LogOutput>()))
                .help("ログ出力先 (console, file, both)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("ログレベル (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("詳細出力レベル (-v: 詳細, -vv: トレース)"),
        )
        .get_matches();

    let verbose_level = matches.get_count("verbose");
    let log_config = LogConfig {
        level: matches
            .get_one::<String>("log-level")
            .map(|s| logging::parse_log_level(s))
            .unwrap_or_else(|| logging::level_from_verbosity(verbose_level)),
        output: matches
            .get_one::<LogOutput>("log-output")
            .copied()
            .unwrap_or(LogOutput::Console),
        ..LogConfig::default()
    };
    // ガードはmainの終わりまで保持する
    let _log_guard = match logging::init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ログ初期化エラー: {}", e);
            None
        }
    };

    // シナリオファイルの検査
    if let Some(path) = matches.get_one::<String>("check") {
        match check_scenario(Path::new(path)) {
            Ok(()) => return,
            Err(e) => {
                eprintln!("エラー: {}", e);
                std::process::exit(1);
            }
        }
    }

    let mut config = match load_config(matches.get_one::<String>("config")) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(dir) = matches.get_one::<String>("output-dir") {
        config.output.directory = PathBuf::from(dir);
    }
    if let Some(selected) = matches.get_many::<Experiment>("experiment") {
        config.experiments = config::ExperimentSelection::none();
        for experiment in selected {
            config.experiments.enable(*experiment);
        }
    }

    // 情報表示のみの場合
    if matches.get_flag("info") {
        config.print_summary();
        return;
    }

    let failures = run_experiments(&config, matches.get_flag("run-simulator"));
    if failures > 0 {
        eprintln!("エラー: {}件の実験が失敗しました", failures);
        std::process::exit(1);
    }
}

/// 設定ファイルを読み込む。未指定なら既定値
fn load_config(path: Option<&String>) -> Result<ExperimentConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let config = ExperimentConfig::from_file(path)?;
            info!("設定ファイル読み込み完了: {}", path);
            Ok(config)
        }
        None => {
            debug!("設定ファイル未指定のため既定値を使用");
            Ok(ExperimentConfig::default())
        }
    }
}

/// 有効な実験を順に実行し、失敗した件数を返す
///
/// 1つの実験が失敗しても他の実験の出力には影響しない。
fn run_experiments(config: &ExperimentConfig, run_simulator: bool) -> usize {
    let experiments = config.experiments.enabled();
    if experiments.is_empty() {
        info!("実行する実験がありません");
        return 0;
    }

    if let Err(e) = std::fs::create_dir_all(&config.output.directory) {
        error!(
            "出力先ディレクトリを作成できません {}: {}",
            config.output.directory.display(),
            e
        );
        return experiments.len();
    }

    let mut failures = 0;
    for experiment in experiments {
        match run_experiment(config, experiment, run_simulator) {
            Ok(()) => {}
            Err(e) => {
                error!("実験 {} が失敗しました: {}", experiment.name(), e);
                failures += 1;
            }
        }
    }

    info!("=== 完了: 失敗 {}件 ===", failures);
    failures
}

/// 1つの実験のシーン構築・出力・（任意で）シミュレータ実行
fn run_experiment(
    config: &ExperimentConfig,
    experiment: Experiment,
    run_simulator: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("実験開始: {}", experiment.name());

    let scene = experiment.build(config)?;
    debug!(
        "シーン構築: 参加者 {}人, 空席 {}, テーブル {}卓",
        scene.people_count(),
        scene.empty_chairs.len(),
        scene.outlines.len()
    );

    let files = scenario_file::emit(
        &scene,
        &config.output.directory,
        experiment.file_stem(),
        &config.output,
    )?;

    if let Some(image) = &files.image {
        debug!("配置図: {}", image.display());
    }

    if run_simulator {
        SimulatorInvocation::new(&config.simulator, &files.scenario).run()?;
    }

    Ok(())
}

/// シナリオファイルを検査して概要を表示
fn check_scenario(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let scenario = ScenarioFile::from_file(path)?;
    scenario.print_summary();
    println!("検査OK: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_experiments_writes_selected_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ExperimentConfig::default();
        config.output.directory = dir.path().to_path_buf();
        config.experiments = config::ExperimentSelection::none();
        config.experiments.enable(Experiment::RoundTables);
        config.experiments.enable(Experiment::SparseConference);

        assert_eq!(run_experiments(&config, false), 0);
        assert!(dir.path().join("roundTables.txt").exists());
        assert!(dir.path().join("roundTables.svg").exists());
        assert!(dir.path().join("sparse_conference.txt").exists());
        assert!(!dir.path().join("cafeteria.txt").exists());

        assert!(check_scenario(&dir.path().join("roundTables.txt")).is_ok());
    }

    #[test]
    fn test_failed_experiment_is_counted() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ExperimentConfig::default();
        config.output.directory = dir.path().to_path_buf();
        config.experiments = config::ExperimentSelection::none();
        config.experiments.enable(Experiment::Cafeteria);
        config.experiments.enable(Experiment::SparseRoundTables);
        config.layouts.sparse_slots.clear();

        assert_eq!(run_experiments(&config, false), 1);
        assert!(dir.path().join("cafeteria.txt").exists());
        assert!(!dir.path().join("sparseRoundTables.txt").exists());
    }

    #[test]
    fn test_load_config_default() {
        let config = load_config(None).unwrap();
        assert_eq!(config.geometry.circular_seats, 8);
    }
}

//! 外部の接触追跡シミュレータの起動
//!
//! `<java> -jar <jar> key=value ...` 形式でシミュレータを起動し、生成済みの
//! シナリオファイルを `setting=` で渡す。結果は `fullOutput=<stem>.csv` に書かれる。

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::config::SimulatorConfig;

/// 1シナリオ分のシミュレータ起動内容
#[derive(Debug, Clone)]
pub struct SimulatorInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub results_path: PathBuf,
}

impl SimulatorInvocation {
    pub fn new(config: &SimulatorConfig, scenario_path: &Path) -> Self {
        let results_path = scenario_path.with_extension("csv");

        let mut args = vec!["-jar".to_string(), config.jar_path.clone()];
        // BTreeMapなので引数順は常に同じ
        args.extend(
            config
                .parameters
                .iter()
                .filter(|(key, _)| key.as_str() != "fullOutput" && key.as_str() != "setting")
                .map(|(key, value)| format!("{}={}", key, value)),
        );
        args.push(format!("fullOutput={}", results_path.display()));
        args.push(format!("setting={}", scenario_path.display()));

        Self {
            program: config.java.clone(),
            args,
            results_path,
        }
    }

    /// 同期的に実行し、終了を待つ
    pub fn run(&self) -> Result<(), SimulatorError> {
        info!("シミュレータ起動: {} {}", self.program, self.args.join(" "));

        let status = Command::new(&self.program)
            .args(&self.args)
            .status()
            .map_err(|e| SimulatorError::Spawn(self.program.clone(), e))?;

        if !status.success() {
            return Err(SimulatorError::ExitStatus(status.code()));
        }

        debug!("シミュレータ結果: {}", self.results_path.display());
        Ok(())
    }
}

/// シミュレータ起動エラー
#[derive(Debug)]
pub enum SimulatorError {
    Spawn(String, std::io::Error),
    ExitStatus(Option<i32>),
}

impl std::fmt::Display for SimulatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulatorError::Spawn(program, err) => {
                write!(f, "シミュレータを起動できません {}: {}", program, err)
            }
            SimulatorError::ExitStatus(Some(code)) => {
                write!(f, "シミュレータが異常終了しました (終了コード {})", code)
            }
            SimulatorError::ExitStatus(None) => {
                write!(f, "シミュレータがシグナルで終了しました")
            }
        }
    }
}

impl std::error::Error for SimulatorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_arguments() {
        let config = SimulatorConfig::default();
        let invocation = SimulatorInvocation::new(&config, Path::new("out/roundTables.txt"));

        assert_eq!(invocation.program, "java");
        assert_eq!(invocation.args[0], "-jar");
        assert_eq!(invocation.args[1], config.jar_path);
        assert!(invocation.args.contains(&"rngSeed=80085".to_string()));
        assert!(invocation.args.contains(&"distanceMeasure=ML".to_string()));
        assert!(invocation.args.contains(&"numMalicious=0".to_string()));
        assert_eq!(
            invocation.args[invocation.args.len() - 2],
            "fullOutput=out/roundTables.csv"
        );
        assert_eq!(
            invocation.args.last().map(String::as_str),
            Some("setting=out/roundTables.txt")
        );
        assert_eq!(invocation.results_path, PathBuf::from("out/roundTables.csv"));
    }

    #[test]
    fn test_reserved_parameters_are_overridden() {
        let mut config = SimulatorConfig::default();
        config
            .parameters
            .insert("setting".to_string(), "elsewhere.txt".to_string());
        let invocation = SimulatorInvocation::new(&config, Path::new("a.txt"));
        let settings: Vec<&String> = invocation
            .args
            .iter()
            .filter(|a| a.starts_with("setting="))
            .collect();
        assert_eq!(settings, vec!["setting=a.txt"]);
    }

    #[test]
    fn test_missing_program_reports_spawn_error() {
        let config = SimulatorConfig {
            java: "seatgen-no-such-program".to_string(),
            ..SimulatorConfig::default()
        };
        let invocation = SimulatorInvocation::new(&config, Path::new("a.txt"));
        assert!(matches!(invocation.run(), Err(SimulatorError::Spawn(..))));
    }
}

use std::path::{Path, PathBuf};
use std::result::Result as StdResult;
use std::time::Duration;

use anyhow::Context as _;
use rust_embed::RustEmbed;
use serde::Deserialize;

use crate::checker::CheckOptions;
use crate::harness::{BuiltinExecutor, ProcessCommand, ProcessExecutor};
use crate::lang::Context;

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    #[serde(skip)]
    pub source_config_file: Option<PathBuf>,
    pub harness: HarnessConfig,
    pub checker: CheckerConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Backend {
    #[default]
    Builtin,
    Process,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    pub backend: Backend,
    pub timeout_ms: u64,
    pub max_call_depth: usize,
    pub process: ProcessConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessConfig {
    pub shell: PathBuf,
    pub run: String,
    pub wrapper: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckerConfig {
    pub printed_value_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    pub show_notes: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            timeout_ms: BuiltinExecutor::DEFAULT_TIME_LIMIT.as_millis() as u64,
            max_call_depth: Context::DEFAULT_MAX_CALL_DEPTH,
            process: ProcessConfig::default(),
        }
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            shell: ProcessExecutor::DEFAULT_SHELL.into(),
            run: ProcessExecutor::DEFAULT_RUN.to_owned(),
            wrapper: ProcessExecutor::DEFAULT_WRAPPER.to_owned(),
        }
    }
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            printed_value_fallback: CheckOptions::default().printed_value_fallback,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { show_notes: true }
    }
}

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Asset;

impl Config {
    pub const FILENAME: &str = "snipcheck.toml";

    pub fn example_toml() -> String {
        Asset::get(Self::FILENAME)
            .map(|file| String::from_utf8_lossy(file.data.as_ref()).into_owned())
            .unwrap_or_default()
    }

    pub fn from_toml(s: &str) -> StdResult<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn from_toml_file(filepath: PathBuf) -> anyhow::Result<Self> {
        let toml = fsutil::read_to_string(&filepath).context("Cannot read a file")?;
        let mut cfg = Self::from_toml(&toml)
            .with_context(|| format!("Invalid config TOML: {:?}", filepath))?;
        cfg.source_config_file = Some(filepath);
        Ok(cfg)
    }

    /// Find the config file in `start_dir` or its ancestors.
    pub fn find_file_in_ancestors(start_dir: impl AsRef<Path>) -> Option<PathBuf> {
        fsutil::find_file_in_ancestors(start_dir.as_ref(), Self::FILENAME).ok()
    }

    /// The nearest config file's contents, or the defaults if there is none.
    pub fn from_file_finding_in_ancestors_or_default(
        start_dir: impl AsRef<Path>,
    ) -> anyhow::Result<Self> {
        match Self::find_file_in_ancestors(start_dir) {
            Some(path) => {
                log::info!("Using config {:?}", path);
                Self::from_toml_file(path)
            }
            None => {
                log::debug!("No {} found; using defaults", Self::FILENAME);
                Ok(Self::default())
            }
        }
    }
}

impl HarnessConfig {
    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn process_command(&self) -> ProcessCommand {
        ProcessCommand {
            run: self.process.run.clone(),
            wrapper: self.process.wrapper.clone(),
        }
    }
}

impl CheckerConfig {
    pub fn check_options(&self) -> CheckOptions {
        CheckOptions {
            printed_value_fallback: self.printed_value_fallback,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn example_toml_is_the_default() {
        let toml = Config::example_toml();
        let cfg = dbg!(Config::from_toml(&toml)).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.harness.time_limit(), Duration::from_millis(2000));
        assert_eq!(cfg.harness.process.shell, Path::new("/bin/sh"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = Config::from_toml("[harness]\nbackend = \"process\"\n\n[checker]\nprinted_value_fallback = false\n").unwrap();
        assert_eq!(cfg.harness.backend, Backend::Process);
        assert_eq!(cfg.harness.timeout_ms, 2000);
        assert!(!cfg.checker.check_options().printed_value_fallback);
        assert!(cfg.report.show_notes);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_toml("[harness]\ntimeout = 3\n").is_err());
    }

    #[test]
    fn config_is_found_in_ancestors() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("docs/ruby");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            root.path().join(Config::FILENAME),
            "[harness]\ntimeout_ms = 500\n",
        )
        .unwrap();

        let cfg = Config::from_file_finding_in_ancestors_or_default(&nested).unwrap();
        assert_eq!(cfg.harness.timeout_ms, 500);
        assert_eq!(
            cfg.source_config_file,
            Some(root.path().join(Config::FILENAME))
        );
    }
}

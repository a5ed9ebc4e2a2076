pub mod check;
pub mod init;
pub mod list;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use snipcheck_core::config::{Backend, Config};

use crate::util;

#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct GlobalArgs {
    #[command(subcommand)]
    pub subcmd: Subcommand,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Config file to use instead of the nearest snipcheck.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
pub enum Subcommand {
    #[command(alias("c"))]
    Check(check::Args),

    #[command(alias("ls"))]
    List(list::Args),

    Init(init::Args),
}

pub type SubcmdResult = anyhow::Result<ExitCode>;

impl GlobalArgs {
    pub async fn exec_subcmd(&self) -> SubcmdResult {
        use Subcommand::*;
        match &self.subcmd {
            Check(args) => check::exec(args, self).await,
            List(args) => list::exec(args, self),
            Init(args) => init::exec(args, self),
        }
    }

    pub fn log_level(&self) -> log::LevelFilter {
        use log::LevelFilter::*;
        if self.quiet {
            return Error;
        }
        match self.verbose {
            0 => Warn,
            1 => Info,
            2 => Debug,
            _ => Trace,
        }
    }

    /// `--config` if given, else the nearest config above `document`.
    pub fn load_config(&self, document: &Path) -> anyhow::Result<Config> {
        match &self.config {
            Some(path) => Config::from_toml_file(path.clone()),
            None => Config::from_file_finding_in_ancestors_or_default(util::document_dir(document)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
#[clap(rename_all = "lower")]
pub enum ArgBackend {
    Builtin,
    Process,
}

impl From<ArgBackend> for Backend {
    fn from(value: ArgBackend) -> Self {
        use ArgBackend::*;
        match value {
            Builtin => Backend::Builtin,
            Process => Backend::Process,
        }
    }
}

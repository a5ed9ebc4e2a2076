use std::path::PathBuf;
use std::process::ExitCode;

use snipcheck_core::{action, print_success};

use super::{GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg(default_value = "./")]
    dir: PathBuf,
}

pub fn exec(args: &Args, _: &GlobalArgs) -> SubcmdResult {
    let path = action::init_config(&args.dir)?;
    print_success!("Wrote example config. (path: {})", path.to_string_lossy());
    Ok(ExitCode::SUCCESS)
}

use std::process::ExitCode;

use clap::Parser;
use snipcheck_cli::{cmd::GlobalArgs, util};

#[tokio::main]
async fn main() -> ExitCode {
    let app = GlobalArgs::parse();
    util::init_logger(app.log_level());
    app.exec_subcmd().await.unwrap_or_else(|e| {
        eprintln!("Error: {:?}", e);
        ExitCode::from(2)
    })
}

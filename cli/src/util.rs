use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::exit;

use colored::Colorize;
use snipcheck_core::style::ColorTheme;

pub fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|e| {
        eprintln!("Failed to get current dir: {}", e);
        exit(1);
    })
}

/// Directory a document lives in, where config discovery starts.
pub fn document_dir(document: &Path) -> PathBuf {
    match document.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fsutil::normalize_path(dir),
        _ => current_dir(),
    }
}

/// Logger configured from command line flags only.
pub fn init_logger(level: log::LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            let level = record.level();
            writeln!(
                buf,
                "{} {}",
                format!("[{}]", level).color(level.color()).bold(),
                record.args()
            )
        })
        .init();
}

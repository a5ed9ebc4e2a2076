use std::path::PathBuf;
use std::process::ExitCode;

use colored::Colorize;
use snipcheck_core::{action, extract::Snippet};

use super::{GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Annotated source file or markdown document
    #[arg()]
    pub document: PathBuf,

    /// Print the catalog as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn exec(args: &Args, _: &GlobalArgs) -> SubcmdResult {
    let document = action::load_document(&args.document)?;
    let extraction = action::extract_snippets(&document);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&extraction.snippets)?);
        return Ok(ExitCode::SUCCESS);
    }

    for s in &extraction.snippets {
        println!(
            "{:>3}  {}  {:<14} {}",
            s.id.to_string().bold(),
            format!("line {:<4}", s.line).dimmed(),
            expectation_kinds(s),
            s.headline()
        );
    }
    for e in &extraction.skipped {
        println!("{} {}", "skipped:".bright_yellow(), e);
    }
    Ok(ExitCode::SUCCESS)
}

fn expectation_kinds(s: &Snippet) -> String {
    if s.is_informational() {
        return "info".to_owned();
    }
    let mut kinds = Vec::new();
    if s.expected_output.is_some() {
        kinds.push("output");
    }
    if s.expected_return.is_some() {
        kinds.push("return");
    }
    if s.expected_fault.is_some() {
        kinds.push("fault");
    }
    kinds.join("+")
}

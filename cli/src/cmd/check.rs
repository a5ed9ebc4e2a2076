use std::path::PathBuf;
use std::process::ExitCode;

use snipcheck_core::{action, checker::Verdict, style};

use super::{ArgBackend, GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Annotated source file or markdown document
    #[arg()]
    pub document: PathBuf,

    /// Also write the report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report as JSON
    #[arg(long)]
    pub json: bool,

    /// Wall-clock limit per snippet in milliseconds [default: 2000]
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Where snippets run: the bundled evaluator or an external interpreter
    /// (`[harness.process]` in snipcheck.toml) [default: builtin]
    #[arg(long, value_enum)]
    pub backend: Option<ArgBackend>,

    /// Do not accept printed output for `# =>` expectations
    #[arg(long)]
    pub strict: bool,
}

pub async fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let document = action::load_document(&args.document)?;

    let mut cfg = global_args.load_config(&args.document)?;
    if let Some(ms) = args.timeout_ms {
        cfg.harness.timeout_ms = ms;
    }
    if let Some(backend) = args.backend {
        cfg.harness.backend = backend.into();
    }
    if args.strict {
        cfg.checker.printed_value_fallback = false;
    }

    let extraction = action::extract_snippets(&document);
    let executor = action::make_executor(&cfg.harness);
    let report = action::do_check(
        extraction,
        executor.as_ref(),
        &cfg.checker.check_options(),
    )
    .await;

    let rendered = if args.json {
        report.to_json()?
    } else {
        report.render_plain(cfg.report.show_notes)
    };

    match (&args.output, args.json) {
        (None, true) => println!("{}", rendered),
        _ => {
            for entry in &report.entries {
                style::print_entry(entry, cfg.report.show_notes);
            }
            for entry in report.entries.iter().filter(|e| e.verdict() == Verdict::Fail) {
                style::print_failure_detail(entry);
            }
            style::print_summary(&report);
        }
    }
    if let Some(path) = &args.output {
        action::write_report(path, &rendered)?;
        log::info!("Wrote report to {:?}", path);
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

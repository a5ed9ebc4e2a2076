use colored::{Color, ColoredString, Colorize};
use crossterm::terminal;

use crate::checker::{Mismatch, Verdict};
use crate::report::{Entry, Report};

#[macro_export]
macro_rules! print_success {
    ($fmt:literal, $($e:tt)*) => {
        use ::colored::Colorize as _;
        println!("{}", format!($fmt, $($e)*).green())
    }
}

pub fn is_truecolor_supported() -> bool {
    let Ok(v) = std::env::var("COLORTERM") else {
        return false
    };
    matches!(v.as_str(), "truecolor" | "24bit")
}

pub trait ColorTheme {
    fn color(&self) -> Color;
}

impl ColorTheme for log::Level {
    fn color(&self) -> Color {
        use log::Level::*;
        match self {
            Error => Color::BrightRed,
            Warn => Color::BrightYellow,
            Info => Color::Cyan,
            Debug => Color::Magenta,
            Trace => Color::Blue,
        }
    }
}

impl ColorTheme for Verdict {
    fn color(&self) -> Color {
        use Verdict::*;
        if !self::is_truecolor_supported() {
            return match self {
                Pass => Color::Green,
                Fail => Color::Red,
                Info => Color::Blue,
            };
        }

        match self {
            Pass => Color::TrueColor {
                r: 30,
                g: 180,
                b: 40,
            },
            Fail => Color::TrueColor {
                r: 220,
                g: 42,
                b: 42,
            },
            Info => Color::TrueColor {
                r: 60,
                g: 110,
                b: 200,
            },
        }
    }
}

pub fn verdict_tag(verdict: Verdict) -> ColoredString {
    format!("[{}]", verdict).color(verdict.color()).bold()
}

pub fn print_entry(entry: &Entry, show_notes: bool) {
    println!(
        "{} snippet {}: {}",
        self::verdict_tag(entry.verdict()),
        entry.snippet.id.to_string().bold(),
        entry.assessment.summary(&entry.snippet),
    );
    if show_notes {
        for note in &entry.assessment.notes {
            println!("    {} {}", "note:".dimmed(), note.dimmed());
        }
    }
}

pub fn print_failure_detail(entry: &Entry) {
    let (cols, _) = terminal::size().unwrap_or((40, 40));
    let cols = cols as usize;

    const BOLD_LINE: &str = "━";
    const THIN_LINE: &str = "─";

    let bold_bar = BOLD_LINE.repeat(cols).blue().bold();

    println!(
        "\n{}: {} (line {}) [{}ms]\n{}",
        format!("snippet {}", entry.snippet.id).bright_yellow().bold(),
        self::verdict_tag(entry.verdict()),
        entry.snippet.line,
        entry.result.elapsed.as_millis(),
        bold_bar,
    );

    fn print_sub_title(s: &str, cols: usize) {
        println!(
            "{}{}",
            s.cyan().bold(),
            THIN_LINE
                .repeat(cols.saturating_sub(s.len() + 1))
                .bright_black(),
        )
    }

    fn print_lines(lines: &[String]) {
        if lines.is_empty() {
            println!("{}", "<EMPTY>".magenta().dimmed());
            return;
        }
        for line in lines {
            let trimmed = line.trim_end();
            print!("{}", trimmed);
            let num_trailing_whitespace = line.len() - trimmed.len();
            if num_trailing_whitespace > 0 {
                print!(
                    "{}{}",
                    " ".repeat(num_trailing_whitespace).on_red(),
                    "(Trailing whitespace)".bright_red().bold()
                );
            }
            println!();
        }
    }

    print_sub_title("[source]", cols);
    print_lines(&entry.snippet.source);

    for m in &entry.assessment.mismatches {
        match m {
            Mismatch::Output { expected, actual } => {
                print_sub_title("[expected output]", cols);
                print_lines(expected);
                print_sub_title("[actual output]", cols);
                print_lines(actual);
            }
            Mismatch::Return { expected, actual } => {
                print_sub_title("[return value]", cols);
                println!("{} {}", "expected:".green(), expected);
                println!("{} {}", "  actual:".red(), actual);
            }
            other => {
                print_sub_title("[error]", cols);
                println!("{}", other.to_string().bright_red());
            }
        }
    }

    println!("{}", bold_bar);
}

pub fn print_summary(report: &Report) {
    let bar = "-".repeat(5);
    print!("{} ", bar);

    let counts = report.counts();
    let num_checked = counts.passed + counts.failed;

    if counts.failed == 0 {
        let msg = format!("All {} checked snippets passed ✨", num_checked);
        print!("{}", msg.green());
    } else {
        let msg = if counts.passed > 0 {
            format!("{}/{} snippets failed 💣", counts.failed, num_checked)
        } else {
            format!("All {} snippets failed 💀", num_checked)
        };
        print!("{}", msg.bright_red());
    }

    let mut extra = Vec::new();
    if counts.informational > 0 {
        extra.push(format!(
            "{}{}{}",
            self::verdict_tag(Verdict::Info),
            "x".dimmed(),
            counts.informational.to_string().bold().bright_white()
        ));
    }
    if !report.skipped_blocks.is_empty() {
        extra.push(format!(
            "{} {}",
            report.skipped_blocks.len().to_string().bold().bright_white(),
            "blocks skipped".bright_yellow()
        ));
    }
    if !extra.is_empty() {
        print!(" ({})", extra.join(", "));
    }

    println!(" {}", bar);
}

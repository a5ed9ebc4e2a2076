use snipcheck_core::action;
use snipcheck_core::checker::{CheckOptions, Mismatch, Verdict};
use snipcheck_core::extract::{self, Snippet};
use snipcheck_core::harness::{BuiltinExecutor, Executor};
use snipcheck_core::lang::{FaultKind, Value};
use snipcheck_core::report::{Counts, Report};

const LEARN_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/learn.rb");
/// The tutorial as published, with its uneven indentation and prose.
const TUTORIAL_PATH: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/fixtures/methods_tutorial.rb"
);

async fn check_learn() -> Report {
    let document = action::load_document(LEARN_PATH).unwrap();
    let extraction = action::extract_snippets(&document);
    assert!(extraction.skipped.is_empty(), "{:?}", extraction.skipped);
    action::do_check(extraction, &BuiltinExecutor::new(), &CheckOptions::default()).await
}

fn by_headline<'r>(report: &'r Report, headline: &str) -> &'r snipcheck_core::report::Entry {
    report
        .entries
        .iter()
        .find(|e| e.snippet.headline() == headline)
        .unwrap_or_else(|| panic!("no snippet starting with {:?}", headline))
}

#[tokio::test]
async fn learn_document_verdicts() {
    let report = check_learn().await;

    let verdicts: Vec<Verdict> = report.entries.iter().map(|e| e.verdict()).collect();
    use Verdict::*;
    assert_eq!(
        verdicts,
        vec![Info, Pass, Pass, Pass, Pass, Pass, Pass, Pass, Pass, Pass, Pass, Fail, Fail, Pass]
    );
    assert!(!report.is_success());
    assert_eq!(
        report.summary_line(),
        "11 passed, 2 failed, 1 informational"
    );
}

#[tokio::test]
async fn each_prints_and_returns_no_value() {
    let report = check_learn().await;
    let e = by_headline(&report, "[1, 2, 3].each do |n|");
    assert_eq!(e.result.stdout, vec!["1", "2", "3"]);
    assert_eq!(e.result.return_value, Value::Nil);
}

#[tokio::test]
async fn default_argument_is_used() {
    let report = check_learn().await;
    let e = &report.entries[3];
    assert_eq!(e.result.stdout, vec!["Hi there, Rubyist!"]);
    assert_eq!(e.verdict(), Verdict::Pass);

    let e = by_headline(&report, "say_hi \"Sunny\"");
    assert_eq!(e.result.stdout, vec!["Hi there, Sunny!"]);
}

#[tokio::test]
async fn early_return_is_noted() {
    let report = check_learn().await;
    let e = report
        .entries
        .iter()
        .find(|e| e.result.probed_method.as_deref() == Some("stylish_painter"))
        .unwrap();
    assert_eq!(e.result.return_value, Value::Str("Jean-Michel Basquiat".into()));
    assert!(e.result.stdout.is_empty());

    let unreachable_line = e.snippet.line + 3;
    assert!(e
        .assessment
        .notes
        .contains(&format!("line {} is unreachable after an explicit return", unreachable_line)));
}

#[tokio::test]
async fn fault_does_not_stop_later_snippets() {
    let report = check_learn().await;
    let n = report.entries.len();

    let faulted = &report.entries[n - 2];
    assert!(faulted.result.raised_error());
    assert_eq!(
        faulted.result.fault.as_ref().unwrap().kind,
        FaultKind::NoMethodError
    );

    let after = &report.entries[n - 1];
    assert_eq!(after.result.return_value, Value::Int(13));
    assert_eq!(after.verdict(), Verdict::Pass);
}

#[tokio::test]
async fn wrong_claim_reports_both_values() {
    let report = check_learn().await;
    let e = by_headline(&report, "puts 1 + 1");
    assert_eq!(
        e.assessment.mismatches,
        vec![Mismatch::Return {
            expected: "3".into(),
            actual: "nil".into()
        }]
    );
    assert!(report
        .render_plain(true)
        .contains(&format!("[FAIL] snippet {}: expected return 3, got nil", e.snippet.id)));
}

#[tokio::test]
async fn execution_is_deterministic() {
    let document = action::load_document(LEARN_PATH).unwrap();
    let snippets: Vec<Snippet> = extract::extract(&document).snippets;
    let exec = BuiltinExecutor::new();
    for s in &snippets {
        let first = exec.execute(s).await.unwrap();
        let second = exec.execute(s).await.unwrap();
        assert_eq!(first, second, "snippet {}", s.id);
    }
}

#[test]
fn extraction_preserves_order() {
    let document = action::load_document(LEARN_PATH).unwrap();
    let snippets = extract::extract(&document).snippets;
    assert_eq!(snippets.len(), 14);
    for (i, pair) in snippets.windows(2).enumerate() {
        assert_eq!(pair[0].id, i + 1);
        assert!(pair[0].line < pair[1].line);
    }
}

#[tokio::test]
async fn markdown_document() {
    let document = "\
# Blocks

```ruby
end
```

```ruby
[1, 2].map { |n| n * 10 }
# => [10, 20]
```

```ruby
3.times do |i|
  print i
end
```

```output
012
```
";
    let extraction = action::extract_snippets(document);
    assert_eq!(extraction.skipped.len(), 1);
    let report = action::do_check(extraction, &BuiltinExecutor::new(), &CheckOptions::default()).await;
    let verdicts: Vec<Verdict> = report.entries.iter().map(|e| e.verdict()).collect();
    assert_eq!(verdicts, vec![Verdict::Pass, Verdict::Pass]);
    assert!(report.is_success());
}

#[tokio::test]
async fn published_tutorial_checks_clean() {
    let document = action::load_document(TUTORIAL_PATH).unwrap();
    let extraction = action::extract_snippets(&document);
    assert!(extraction.skipped.is_empty(), "{:?}", extraction.skipped);
    assert_eq!(extraction.snippets.len(), 14);

    let report = action::do_check(extraction, &BuiltinExecutor::new(), &CheckOptions::default()).await;
    assert_eq!(
        report.counts(),
        Counts {
            passed: 9,
            failed: 0,
            informational: 5
        },
        "{}",
        report.render_plain(true)
    );
    assert!(report.is_success());

    let painter = report
        .entries
        .iter()
        .find(|e| e.result.probed_method.as_deref() == Some("stylish_painter"))
        .unwrap();
    assert_eq!(painter.verdict(), Verdict::Pass);
    assert_eq!(painter.result.return_value, Value::Str("Jean-Michel Basquiat".into()));
}

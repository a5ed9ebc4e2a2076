//! Split a document into runnable snippets.
//!
//! Two shapes are understood. An *annotated source* file is code interleaved
//! with comments: `#Heading` comments separate example blocks and `# ...`
//! notes after code state what the code prints or returns:
//!
//! ```text
//! #Default Arguments
//! def say_hi(name = "Rubyist")
//!   puts "Hi there, #{name}!"
//! end
//! say_hi
//! # => "Hi there, Rubyist!"
//! ```
//!
//! A *markdown* file carries its examples in fenced code blocks, optionally
//! followed by an `output` fence with the expected output.

pub mod error;
pub mod snippet;

pub use error::*;
pub use snippet::*;

use lazy_regex::{lazy_regex, Lazy, Regex};

use crate::lang::lexer::{self, TokenKind};

static RE_FENCE: Lazy<Regex> = lazy_regex!(r"^\s*```+\s*([\w+-]*)\s*$");
static RE_RETURN_MARKER: Lazy<Regex> = lazy_regex!(r"^#\s*=>\s?(.*)$");
static RE_OUTPUT_MARKER: Lazy<Regex> = lazy_regex!(r"^#\s*>>\s?(.*)$");
static RE_FAULT_MARKER: Lazy<Regex> = lazy_regex!(r"^#\s*~>\s*(.*)$");
static RE_HEADING: Lazy<Regex> = lazy_regex!(r"^#[^\s=>~#]");

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub snippets: Vec<Snippet>,
    /// Blocks whose boundaries could not be determined, in document order.
    pub skipped: Vec<ExtractionError>,
}

/// Extract from `document`, choosing markdown mode when it has code fences.
pub fn extract(document: &str) -> Extraction {
    if document.lines().any(|l| RE_FENCE.is_match(l)) {
        extract_markdown(document)
    } else {
        extract_annotated(document)
    }
}

pub fn extract_annotated(document: &str) -> Extraction {
    let mut out = Collector::default();
    let mut block: Option<BlockScanner> = None;

    for (i, text) in document.lines().enumerate() {
        let line = i + 1;
        let trimmed = text.trim();

        let at_top = block.as_ref().map_or(true, |b| b.depth() == 0);
        if at_top && RE_HEADING.is_match(trimmed) {
            if let Some(b) = block.take() {
                out.push(b.finish());
            }
            continue;
        }

        block
            .get_or_insert_with(|| BlockScanner::new(line, Mode::Annotated))
            .feed(line, text);
    }
    if let Some(b) = block {
        out.push(b.finish());
    }
    out.into_extraction()
}

pub fn extract_markdown(document: &str) -> Extraction {
    let mut out = Collector::default();
    let lines: Vec<&str> = document.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        let Some(caps) = RE_FENCE.captures(lines[i]) else {
            i += 1;
            continue;
        };
        let fence_line = i + 1;
        let is_output_fence = is_output_tag(&caps[1]);
        i += 1;

        let mut scanner = BlockScanner::new(fence_line + 1, Mode::Markdown);
        let mut body = Vec::new();
        let mut closed = false;
        while i < lines.len() {
            if RE_FENCE.is_match(lines[i]) {
                closed = true;
                i += 1;
                break;
            }
            body.push((i + 1, lines[i]));
            i += 1;
        }
        if !closed {
            out.push(Err(ExtractionError::UnclosedFence {
                block_line: fence_line,
            }));
            break;
        }
        if is_output_fence {
            // an output fence not preceded by a code fence is prose
            continue;
        }
        for (line, text) in body {
            scanner.feed(line, text);
        }
        let mut res = scanner.finish();

        // an output fence right after the code fence
        let mut j = i;
        while j < lines.len() && lines[j].trim().is_empty() {
            j += 1;
        }
        if let Some(caps) = lines.get(j).and_then(|l| RE_FENCE.captures(l)) {
            if is_output_tag(&caps[1]) {
                let mut expected = Vec::new();
                let mut k = j + 1;
                while k < lines.len() && !RE_FENCE.is_match(lines[k]) {
                    expected.push(lines[k].trim_end().to_owned());
                    k += 1;
                }
                if let Ok(Some(last)) = res.as_mut().map(|s| s.last_mut()) {
                    last.expected_output
                        .get_or_insert_with(Vec::new)
                        .extend(expected);
                }
                i = (k + 1).min(lines.len());
            }
        }
        out.push(res);
    }
    out.into_extraction()
}

fn is_output_tag(tag: &str) -> bool {
    matches!(tag, "output" | "text")
}

#[derive(Debug, Default)]
struct Collector {
    snippets: Vec<Snippet>,
    skipped: Vec<ExtractionError>,
}

impl Collector {
    fn push(&mut self, block: Result<Vec<Snippet>, ExtractionError>) {
        match block {
            Ok(snippets) => self.snippets.extend(snippets),
            Err(e) => {
                log::warn!("Skipped an example block: {}", e);
                self.skipped.push(e);
            }
        }
    }

    fn into_extraction(self) -> Extraction {
        let snippets = self
            .snippets
            .into_iter()
            .enumerate()
            .map(|(i, s)| Snippet { id: i + 1, ..s })
            .collect();
        Extraction {
            snippets,
            skipped: self.skipped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Annotated,
    Markdown,
}

#[derive(Debug, Default)]
struct Expectations {
    output: Vec<String>,
    has_output: bool,
    ret: Option<ExpectedValue>,
    fault: Option<ExpectedFault>,
    /// The previous note was a label announcing a return value.
    return_label: bool,
    /// A note has been seen since the last code line.
    active: bool,
}

impl Expectations {
    fn is_empty(&self) -> bool {
        !self.has_output && self.ret.is_none() && self.fault.is_none()
    }

    fn add_note(&mut self, trimmed: &str) {
        self.active = true;
        if let Some(caps) = RE_RETURN_MARKER.captures(trimmed) {
            self.ret = Some(ExpectedValue::parse(&caps[1]));
        } else if let Some(caps) = RE_OUTPUT_MARKER.captures(trimmed) {
            self.push_output(caps[1].trim_end());
        } else if let Some(caps) = RE_FAULT_MARKER.captures(trimmed) {
            self.fault = Some(ExpectedFault::parse(caps[1].trim()));
        } else {
            let text = trimmed.trim_start_matches('#').trim();
            if text.is_empty() {
                return;
            }
            if std::mem::take(&mut self.return_label) {
                self.ret = Some(ExpectedValue::parse(text));
            } else if text.ends_with(':') {
                self.return_label = text.to_lowercase().contains("return");
            } else {
                self.push_output(text);
            }
            return;
        }
        self.return_label = false;
    }

    fn push_output(&mut self, line: &str) {
        self.output.push(line.to_owned());
        self.has_output = true;
    }
}

/// Line-by-line state for one example block.
#[derive(Debug)]
struct BlockScanner {
    mode: Mode,
    start_line: usize,
    /// Open constructs with the line they were opened on.
    open: Vec<(TokenKind, usize)>,
    indent_char: Option<char>,
    /// Code of earlier checkpoints.
    done: Vec<String>,
    /// Code since the last checkpoint, with document line numbers.
    pending: Vec<(usize, String)>,
    group: Expectations,
    snippets: Vec<Snippet>,
    error: Option<ExtractionError>,
}

impl BlockScanner {
    fn new(start_line: usize, mode: Mode) -> Self {
        Self {
            mode,
            start_line,
            open: Vec::new(),
            indent_char: None,
            done: Vec::new(),
            pending: Vec::new(),
            group: Expectations::default(),
            snippets: Vec::new(),
            error: None,
        }
    }

    fn depth(&self) -> usize {
        self.open.len()
    }

    fn has_pending_code(&self) -> bool {
        self.pending.iter().any(|(_, l)| !l.trim().is_empty())
    }

    fn feed(&mut self, line: usize, text: &str) {
        if self.error.is_some() {
            return;
        }
        let trimmed = text.trim();

        if trimmed.is_empty() {
            if !self.group.active && self.has_pending_code() {
                self.pending.push((line, String::new()));
            }
            return;
        }

        if trimmed.starts_with('#') && self.depth() == 0 {
            let remark = self.mode == Mode::Markdown && RE_HEADING.is_match(trimmed);
            if !remark && (self.group.active || self.has_pending_code()) {
                self.group.add_note(trimmed);
            }
            return;
        }

        if self.group.active {
            if !self.group.is_empty() {
                self.checkpoint();
            }
            self.group = Expectations::default();
        }
        if let Err(e) = self.track(line, text) {
            self.error = Some(e);
            return;
        }
        self.pending.push((line, text.trim_end().to_owned()));
    }

    /// Close a snippet at the current position.
    fn checkpoint(&mut self) {
        let group = std::mem::take(&mut self.group);
        let mut source = std::mem::take(&mut self.pending);
        while source.last().map_or(false, |(_, l)| l.trim().is_empty()) {
            source.pop();
        }
        let Some(&(first_line, _)) = source.first() else {
            return;
        };
        let source: Vec<String> = source.into_iter().map(|(_, l)| l).collect();

        self.snippets.push(Snippet {
            id: 0,
            line: first_line,
            setup: self.done.clone(),
            source: source.clone(),
            expected_output: group.has_output.then_some(group.output),
            expected_return: group.ret,
            expected_fault: group.fault,
        });
        self.done.extend(source);
    }

    fn finish(mut self) -> Result<Vec<Snippet>, ExtractionError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        if let Some((kind, line)) = self.open.first() {
            return Err(ExtractionError::Unclosed {
                block_line: self.start_line,
                construct: token_text(kind).to_owned(),
                line: *line,
            });
        }
        if self.has_pending_code() || !self.group.is_empty() {
            self.checkpoint();
        }
        Ok(self.snippets)
    }

    /// Update the open-construct stack and indentation check with one code line.
    fn track(&mut self, line: usize, text: &str) -> Result<(), ExtractionError> {
        let indent: String = text.chars().take_while(|c| c.is_whitespace()).collect();
        for c in indent.chars().filter(|c| *c == ' ' || *c == '\t') {
            match self.indent_char {
                None => self.indent_char = Some(c),
                Some(prev) if prev != c => {
                    return Err(ExtractionError::MixedIndentation {
                        block_line: self.start_line,
                        line,
                    })
                }
                Some(_) => (),
            }
        }

        let tokens = lexer::tokenize(text).map_err(|e| ExtractionError::Tokenize {
            block_line: self.start_line,
            line,
            message: e.to_string(),
        })?;

        let mut prev: Option<&TokenKind> = None;
        let mut loop_opened = false;
        for tok in &tokens {
            let kind = &tok.kind;
            match kind {
                TokenKind::Def | TokenKind::Begin | TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => {
                    self.open.push((kind.clone(), line))
                }
                TokenKind::Do if !loop_opened => self.open.push((kind.clone(), line)),
                TokenKind::If | TokenKind::Unless | TokenKind::While | TokenKind::Until
                    if starts_statement(prev) =>
                {
                    loop_opened |= matches!(kind, TokenKind::While | TokenKind::Until);
                    self.open.push((kind.clone(), line));
                }
                TokenKind::End | TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket => {
                    let matched = match self.open.last() {
                        Some((open, _)) => closes(open, kind),
                        None => false,
                    };
                    if !matched {
                        return Err(ExtractionError::StrayClose {
                            block_line: self.start_line,
                            token: token_text(kind).to_owned(),
                            line,
                        });
                    }
                    self.open.pop();
                }
                _ => (),
            }
            prev = Some(kind);
        }
        Ok(())
    }
}

/// `if`/`while` open a construct only in statement position; elsewhere they
/// are modifiers.
fn starts_statement(prev: Option<&TokenKind>) -> bool {
    matches!(
        prev,
        None | Some(TokenKind::Eq | TokenKind::Semi | TokenKind::LParen | TokenKind::Return)
    )
}

fn closes(open: &TokenKind, close: &TokenKind) -> bool {
    use TokenKind::*;
    match close {
        End => matches!(open, Def | Begin | Do | If | Unless | While | Until),
        RBrace => *open == LBrace,
        RParen => *open == LParen,
        RBracket => *open == LBracket,
        _ => false,
    }
}

fn token_text(kind: &TokenKind) -> &'static str {
    use TokenKind::*;
    match kind {
        Def => "def",
        Begin => "begin",
        Do => "do",
        If => "if",
        Unless => "unless",
        While => "while",
        Until => "until",
        End => "end",
        LBrace => "{",
        RBrace => "}",
        LParen => "(",
        RParen => ")",
        LBracket => "[",
        RBracket => "]",
        _ => "?",
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn notes_after_loop_are_expected_output() {
        let doc = "#Blocks\n\n  [1, 2, 3].each do |n|\n    puts n\n  end\n#   1\n#   2\n#   3\n";
        let ex = extract_annotated(doc);
        assert!(ex.skipped.is_empty());
        assert_eq!(ex.snippets.len(), 1);
        let s = &ex.snippets[0];
        assert_eq!(s.id, 1);
        assert_eq!(s.line, 3);
        assert_eq!(s.source.len(), 3);
        assert_eq!(s.expected_output, Some(lines(&["1", "2", "3"])));
        assert!(s.setup.is_empty());
    }

    #[test]
    fn checkpoints_split_a_block_and_carry_setup() {
        let doc = r#"#Default Arguments

def say_hi(name = "Rubyist")
    puts "Hi there, #{name}!"
  end

  say_hi
  # => "Hi there, Rubyist!"

  say_hi "Sunny"
  # => "Hi there, Sunny!"
"#;
        let ex = extract_annotated(doc);
        assert_eq!(ex.snippets.len(), 2);

        let first = &ex.snippets[0];
        assert_eq!(first.line, 3);
        assert!(first.setup.is_empty());
        assert_eq!(first.source.last().unwrap().trim(), "say_hi");
        assert_eq!(first.expected_return.as_ref().unwrap().canonical, "\"Hi there, Rubyist!\"");

        let second = &ex.snippets[1];
        assert_eq!(second.id, 2);
        assert_eq!(second.line, 10);
        assert_eq!(second.setup, first.source);
        assert_eq!(second.source, lines(&["  say_hi \"Sunny\""]));
    }

    #[test]
    fn return_label_announces_the_value() {
        let doc = "#Return\ndef stylish_painter\n  return \"Jean-Michel Basquiat\"\nend\n# It returns:\n# \"Jean-Michel Basquiat\" \n";
        let ex = extract_annotated(doc);
        let s = &ex.snippets[0];
        assert_eq!(s.expected_output, None);
        assert_eq!(s.expected_return.as_ref().unwrap().text, "\"Jean-Michel Basquiat\"");
    }

    #[test]
    fn headings_end_blocks_and_code_without_notes_is_informational() {
        let doc = "describe \"MyRubyThing\" do\n    it \"runs\" do\n      # test here\n    end\n  end\n\n  #describe and #it are just methods\n\ndef f\n  1\nend\n";
        let ex = extract_annotated(doc);
        assert_eq!(ex.snippets.len(), 2);
        assert!(ex.snippets.iter().all(Snippet::is_informational));
        assert_eq!(ex.snippets[0].source.len(), 5);
        assert_eq!(ex.snippets[1].line, 9);
    }

    #[test]
    fn prose_notes_before_code_are_ignored() {
        let doc = "#Return Values\n\n# You can categorize all functions:\n# What return value they have\n\nx = 1\n# => 1\n";
        let ex = extract_annotated(doc);
        assert_eq!(ex.snippets.len(), 1);
        assert_eq!(ex.snippets[0].expected_output, None);
        assert_eq!(ex.snippets[0].source, lines(&["x = 1"]));
    }

    #[test]
    fn explicit_markers() {
        let doc = "#M\nputs 1\n# >> 1\n# => nil\nnope\n# ~> NameError: undefined local variable\n";
        let ex = extract_annotated(doc);
        assert_eq!(ex.snippets.len(), 2);
        assert_eq!(ex.snippets[0].expected_output, Some(lines(&["1"])));
        assert_eq!(ex.snippets[0].expected_return.as_ref().unwrap().canonical, "nil");
        let fault = ex.snippets[1].expected_fault.as_ref().unwrap();
        assert_eq!(fault.kind, crate::lang::FaultKind::NameError);
    }

    #[test]
    fn ambiguous_blocks_are_skipped_and_ids_stay_dense() {
        let doc = "#A\nx = 1\n# => 1\n#B\nx = 2\nend\n#D\n\tx = 1\n  y = 2\n#E\ny = 2\n# => 2\n";
        let ex = extract_annotated(doc);
        assert_eq!(ex.skipped.len(), 2);
        assert!(matches!(ex.skipped[0], ExtractionError::StrayClose { line: 6, .. }));
        assert!(matches!(ex.skipped[1], ExtractionError::MixedIndentation { line: 9, .. }));
        let ids: Vec<usize> = ex.snippets.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(ex.snippets[1].line, 11);
    }

    #[test]
    fn unclosed_construct_is_reported() {
        let ex = extract_annotated("#A\n[1].each do |n|\n  puts n\n");
        assert_eq!(
            ex.skipped,
            vec![ExtractionError::Unclosed {
                block_line: 2,
                construct: "do".into(),
                line: 2
            }]
        );
        assert!(ex.snippets.is_empty());
    }

    #[test]
    fn modifiers_do_not_open_constructs() {
        let doc = "#A\ndef f(x)\n  return nil if x.nil?\n  while x > 0 do x -= 1 end\n  x\nend\nf(3)\n# => 0\n";
        let ex = extract_annotated(doc);
        assert!(ex.skipped.is_empty(), "{:?}", ex.skipped);
        assert_eq!(ex.snippets.len(), 1);
    }

    #[test]
    fn markdown_fences_and_output_blocks() {
        let doc = "# Title\n\nSome prose.\n\n```ruby\n[1, 2].each do |n|\n  puts n\nend\n```\n\n```output\n1\n2\n```\n\n```ruby\n#Comment\n1 + 1 # => 2\n```\n";
        let ex = extract_markdown(doc);
        assert!(ex.skipped.is_empty());
        assert_eq!(ex.snippets.len(), 2);
        assert_eq!(ex.snippets[0].line, 6);
        assert_eq!(ex.snippets[0].expected_output, Some(lines(&["1", "2"])));
        assert!(ex.snippets[1].is_informational());
    }

    #[test]
    fn markdown_unclosed_fence() {
        let ex = extract("```ruby\nputs 1\n");
        assert_eq!(ex.skipped, vec![ExtractionError::UnclosedFence { block_line: 1 }]);
    }
}

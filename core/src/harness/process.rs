use std::{
    collections::HashMap,
    ffi::OsStr,
    io::Write as _,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use anyhow::{bail, Context as _};
use async_trait::async_trait;
use lazy_regex::{lazy_regex, Lazy, Regex};
use tokio::process::Command;

use super::{split_lines, ExecutionResult, Executor};
use crate::extract::Snippet;
use crate::lang::{parser, Fault, FaultKind, Value};
use crate::str_interp::{interp, InterpError};

/// `file.rb:3:in 'foo': message (NameError)`
static RE_UNCAUGHT: Lazy<Regex> =
    lazy_regex!(r"^(?:.*?:\d+:(?:in [^:]*: )?)?(.*?) \(([A-Z][\w:]*)\)\s*$");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    /// Shell command line; `#{filePath}` etc. name the driver file.
    pub run: String,
    /// Driver file template; see [`ProcessExecutor::DEFAULT_WRAPPER`].
    pub wrapper: String,
}

impl Default for ProcessCommand {
    fn default() -> Self {
        Self {
            run: ProcessExecutor::DEFAULT_RUN.to_owned(),
            wrapper: ProcessExecutor::DEFAULT_WRAPPER.to_owned(),
        }
    }
}

/// Runs each snippet as a separate interpreter process.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    cmd: ProcessCommand,
    shell: PathBuf,
    time_limit: Duration,
}

impl ProcessExecutor {
    pub const DEFAULT_SHELL: &str = "/bin/sh";
    pub const DEFAULT_RUN: &str = "ruby #{filePath}";
    pub const BEGIN_MARKER: &str = "__SNIPCHECK_BEGIN__";
    pub const RETURN_MARKER: &str = "__SNIPCHECK_RETURN__";
    pub const DEFAULT_WRAPPER: &str = r##"#{setup}
$stdout.flush
$stdout.puts "#{beginMarker}"
__snipcheck_value = begin
#{code}
end
$stdout.puts "#{returnMarker}" + __snipcheck_value.inspect
"##;

    pub fn new(cmd: ProcessCommand) -> Self {
        Self {
            cmd,
            shell: Self::DEFAULT_SHELL.into(),
            time_limit: super::BuiltinExecutor::DEFAULT_TIME_LIMIT,
        }
    }

    pub fn shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = limit;
        self
    }

    /// Source of the driver file for `snippet`.
    pub fn render_driver(&self, snippet: &Snippet) -> Result<String, InterpError> {
        let mut code = snippet.source_text();
        if let Some(name) = method_to_probe(snippet) {
            code.push('\n');
            code.push_str(&name);
        }
        let mut vars: HashMap<&str, String> = HashMap::new();
        vars.insert("setup", snippet.setup_text());
        vars.insert("code", code);
        vars.insert("beginMarker", Self::BEGIN_MARKER.to_owned());
        vars.insert("returnMarker", Self::RETURN_MARKER.to_owned());
        interp(&self.cmd.wrapper, &vars)
    }

    pub fn render_run_command(&self, filepath: &Path) -> Result<String, InterpError> {
        interp(&self.cmd.run, &Self::make_cmd_interp_vars(filepath))
    }

    fn make_cmd_interp_vars(filepath: &Path) -> HashMap<&'static str, &OsStr> {
        let mut m: HashMap<_, &OsStr> = HashMap::new();
        m.insert("filePath", filepath.as_os_str());
        m.insert("fileName", filepath.file_name().unwrap_or(filepath.as_os_str()));
        m.insert(
            "fileDir",
            filepath.parent().unwrap_or(Path::new(".")).as_os_str(),
        );
        m.insert(
            "fileStem",
            filepath
                .file_stem()
                .unwrap_or(OsStr::new("UNDEFINED_FILE_STEM")),
        );
        m
    }

    pub async fn run(&self, snippet: &Snippet) -> anyhow::Result<ExecutionResult> {
        let driver = self
            .render_driver(snippet)
            .context("Invalid driver template")?;

        // removed when dropped, on every return path below
        let mut file = tempfile::Builder::new()
            .prefix("snipcheck-")
            .suffix(".rb")
            .tempfile()
            .context("Failed to create a driver file")?;
        file.write_all(driver.as_bytes())
            .and_then(|()| file.flush())
            .context("Failed to write the driver file")?;

        let cmd = self
            .render_run_command(file.path())
            .context("Invalid run command")?;
        log::info!("snippet {}: {} -c '{}'", snippet.id, self.shell.display(), cmd);

        let mut proc = Command::new(&self.shell)
            .args(["-c", &cmd])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!(
                    "Failed to spawn '{} -c {}'",
                    self.shell.to_string_lossy(),
                    &cmd
                )
            })?;
        let mut stdout = proc.stdout.take().context("Failed to open stdout")?;
        let mut stderr = proc.stderr.take().context("Failed to open stderr")?;

        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        let start_at = tokio::time::Instant::now();
        let res = {
            let fut_stdout = tokio::io::copy(&mut stdout, &mut stdout_buf);
            let fut_stderr = tokio::io::copy(&mut stderr, &mut stderr_buf);
            let fut_exit_status = proc.wait();

            tokio::time::timeout(self.time_limit, async {
                tokio::try_join!(fut_stdout, fut_stderr, fut_exit_status)
                    .context("Failed to communicate with subprocess")
            })
            .await
        };
        let elapsed = start_at.elapsed();

        let exit_status = match res {
            Err(_) => {
                proc.kill()
                    .await
                    .unwrap_or_else(|e| log::warn!("Failed to kill timed-out process: {:#}", e));
                return Ok(ExecutionResult {
                    snippet_id: snippet.id,
                    stdout: Vec::new(),
                    return_value: Value::Nil,
                    fault: Some(Fault::timeout(self.time_limit)),
                    probed_method: None,
                    elapsed,
                });
            }
            Ok(Err(e)) => bail!(e),
            Ok(Ok((_, _, exit_status))) => exit_status,
        };

        let stdout = String::from_utf8_lossy(&stdout_buf);
        let stderr = String::from_utf8_lossy(&stderr_buf);
        let (lines, return_value) = parse_driver_output(&stdout);

        let fault = if exit_status.success() {
            None
        } else {
            Some(parse_uncaught(&stderr).unwrap_or_else(|| {
                Fault::new(
                    FaultKind::Other("ExitStatus".to_owned()),
                    format!(
                        "exited with {}: {}",
                        exit_status
                            .code()
                            .map_or("a signal".to_owned(), |c| c.to_string()),
                        stderr.lines().next().unwrap_or("")
                    ),
                )
            }))
        };

        Ok(ExecutionResult {
            snippet_id: snippet.id,
            stdout: lines,
            return_value: if fault.is_some() { Value::Nil } else { return_value },
            fault,
            probed_method: method_to_probe(snippet),
            elapsed,
        })
    }
}

/// A trailing zero-arity `def` is called so that its result is the snippet's
/// value, as the builtin backend does.
fn method_to_probe(snippet: &Snippet) -> Option<String> {
    snippet.expected_return.as_ref()?;
    let program = parser::parse_program(&snippet.source_text()).ok()?;
    super::builtin::trailing_nullary_def(&program).map(str::to_owned)
}

/// Split driver stdout into the snippet's own lines and its return value.
fn parse_driver_output(stdout: &str) -> (Vec<String>, Value) {
    let after_begin = match stdout.find(ProcessExecutor::BEGIN_MARKER) {
        Some(i) => stdout[i + ProcessExecutor::BEGIN_MARKER.len()..]
            .strip_prefix('\n')
            .unwrap_or(""),
        None => return (split_lines(stdout), Value::Nil),
    };
    let mut lines = Vec::new();
    let mut value = Value::Nil;
    for line in after_begin.lines() {
        if let Some(rendered) = line.strip_prefix(ProcessExecutor::RETURN_MARKER) {
            value = crate::lang::parse_literal(rendered)
                .unwrap_or_else(|| Value::Opaque(rendered.to_owned()));
            break;
        }
        lines.push(line.to_owned());
    }
    (lines, value)
}

fn parse_uncaught(stderr: &str) -> Option<Fault> {
    stderr.lines().find_map(|line| {
        let caps = RE_UNCAUGHT.captures(line)?;
        let kind = caps[2].parse::<FaultKind>().unwrap_or_else(|never| match never {});
        Some(Fault::new(kind, caps[1].trim()))
    })
}

#[async_trait]
impl Executor for ProcessExecutor {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn execute(&self, snippet: &Snippet) -> anyhow::Result<ExecutionResult> {
        self.run(snippet).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::extract::ExpectedValue;

    struct X {
        source: &'static str,
        /// shell script standing in for the interpreter; `$1` is the driver file
        script: &'static str,
        want_stdout: Vec<&'static str>,
        want_return: Value,
        want_fault: Option<FaultKind>,
    }

    async fn run_test(x: X) {
        let snippet = Snippet {
            id: 7,
            line: 1,
            setup: vec![],
            source: vec![x.source.to_owned()],
            expected_output: None,
            expected_return: None,
            expected_fault: None,
        };
        let cmd = ProcessCommand {
            run: format!("sh -c '{}' driver #{{filePath}}", x.script.replace('\'', r#"'"'"'"#)),
            wrapper: "#{code}".to_owned(),
        };
        let exec = ProcessExecutor::new(cmd).time_limit(Duration::from_millis(300));
        let res = dbg!(exec.run(&snippet).await).unwrap();
        assert_eq!(res.snippet_id, 7);
        assert_eq!(res.stdout, x.want_stdout);
        assert_eq!(res.return_value, x.want_return);
        assert_eq!(res.fault.map(|f| f.kind), x.want_fault);
    }

    #[tokio::test]
    async fn output_and_return_value_are_read_back() {
        run_test(X {
            source: "hello",
            script: r#"echo setup-noise; echo __SNIPCHECK_BEGIN__; cat "$1"; echo; echo __SNIPCHECK_RETURN__4"#,
            want_stdout: vec!["hello"],
            want_return: Value::Int(4),
            want_fault: None,
        })
        .await;
    }

    #[tokio::test]
    async fn opaque_return_value() {
        run_test(X {
            source: "",
            script: "echo __SNIPCHECK_BEGIN__; echo '__SNIPCHECK_RETURN__#<Object:0x01>'",
            want_stdout: vec![],
            want_return: Value::Opaque("#<Object:0x01>".into()),
            want_fault: None,
        })
        .await;
    }

    #[tokio::test]
    async fn uncaught_exception_becomes_a_fault() {
        run_test(X {
            source: "",
            script: "echo __SNIPCHECK_BEGIN__; echo partial; echo \"x.rb:3:in 'f': undefined local variable or method 'my_var' for main (NameError)\" >&2; exit 1",
            want_stdout: vec!["partial"],
            want_return: Value::Nil,
            want_fault: Some(FaultKind::NameError),
        })
        .await;
    }

    #[tokio::test]
    async fn unrecognized_failure() {
        run_test(X {
            source: "",
            script: "echo boom >&2; exit 3",
            want_stdout: vec![],
            want_return: Value::Nil,
            want_fault: Some(FaultKind::Other("ExitStatus".into())),
        })
        .await;
    }

    #[tokio::test]
    async fn slow_process_times_out() {
        run_test(X {
            source: "",
            script: "sleep 2",
            want_stdout: vec![],
            want_return: Value::Nil,
            want_fault: Some(FaultKind::Timeout),
        })
        .await;
    }

    #[test]
    fn driver_rendering() {
        let exec = ProcessExecutor::new(ProcessCommand::default());
        let snippet = Snippet {
            id: 1,
            line: 1,
            setup: vec!["x = 1".into()],
            source: vec!["x + 1".into()],
            expected_output: None,
            expected_return: None,
            expected_fault: None,
        };
        let driver = exec.render_driver(&snippet).unwrap();
        assert!(driver.starts_with("x = 1\n"));
        assert!(driver.contains("$stdout.puts \"__SNIPCHECK_BEGIN__\"\n"));
        assert!(driver.contains("begin\nx + 1\nend\n"));
        assert_eq!(
            exec.render_run_command(Path::new("/tmp/a.rb")).unwrap(),
            "ruby /tmp/a.rb"
        );
    }

    #[tokio::test]
    async fn trailing_definition_is_called() {
        let snippet = Snippet {
            id: 3,
            line: 1,
            setup: vec![],
            source: vec![
                "def stylish_painter".into(),
                "  return \"Jean-Michel Basquiat\"".into(),
                "end".into(),
            ],
            expected_output: None,
            expected_return: Some(ExpectedValue::parse("\"Jean-Michel Basquiat\"")),
            expected_fault: None,
        };
        let cmd = ProcessCommand {
            run: r#"sh -c 'echo __SNIPCHECK_BEGIN__; printf "__SNIPCHECK_RETURN__%s\n" "$(tail -n 1 "$1")"' driver #{filePath}"#.to_owned(),
            wrapper: "#{code}".to_owned(),
        };
        let exec = ProcessExecutor::new(cmd).time_limit(Duration::from_millis(300));
        assert!(exec.render_driver(&snippet).unwrap().ends_with("end\nstylish_painter"));

        let res = exec.run(&snippet).await.unwrap();
        assert_eq!(res.probed_method.as_deref(), Some("stylish_painter"));
        // the stand-in interpreter echoes the call line back as the value
        assert_eq!(res.return_value, Value::Opaque("stylish_painter".into()));

        let mut plain = snippet.clone();
        plain.expected_return = None;
        assert!(exec.render_driver(&plain).unwrap().ends_with("\nend"));
        assert_eq!(exec.run(&plain).await.unwrap().probed_method, None);
    }

    #[test]
    fn uncaught_line_formats() {
        let f = parse_uncaught("-e:1:in '/': divided by 0 (ZeroDivisionError)\n\tfrom -e:1:in '<main>'").unwrap();
        assert_eq!(f.kind, FaultKind::ZeroDivisionError);
        assert_eq!(f.message, "divided by 0");
        assert!(parse_uncaught("warning: something").is_none());
    }
}

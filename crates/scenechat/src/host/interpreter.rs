use std::ffi::OsString;
use std::io;

use async_trait::async_trait;
use scenechat_core::dialect::ScriptDialect;
use scenechat_core::executor::{
    ExecutionFailure, ExecutionResult, ScriptExecutor,
};
use tokio::process::Command;

/// A program that runs the script passed as its last argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterpreterCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl InterpreterCommand {
    /// Creates a command running `program` with `args` before the script.
    pub fn new<I, S>(program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `python3 -c <script>`.
    pub fn python() -> Self {
        Self::new("python3", ["-c"])
    }
}

/// Runs scripts in external interpreters, one process per script.
///
/// A failing script is reported from its standard error: the error class
/// and message come from the last line, the offending source line from the
/// innermost traceback frame.
#[derive(Clone, Debug)]
pub struct ProcessScriptExecutor {
    python: InterpreterCommand,
    mel: Option<InterpreterCommand>,
}

impl ProcessScriptExecutor {
    /// Creates an executor running Python scripts with `python3`.
    #[inline]
    pub fn new() -> Self {
        Self {
            python: InterpreterCommand::python(),
            mel: None,
        }
    }

    /// Sets the Python interpreter.
    #[inline]
    pub fn with_python(mut self, python: InterpreterCommand) -> Self {
        self.python = python;
        self
    }

    /// Sets the MEL interpreter; without one MEL scripts fail to run.
    #[inline]
    pub fn with_mel(mut self, mel: InterpreterCommand) -> Self {
        self.mel = Some(mel);
        self
    }
}

impl Default for ProcessScriptExecutor {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScriptExecutor for ProcessScriptExecutor {
    async fn execute(
        &self,
        code: &str,
        dialect: ScriptDialect,
    ) -> ExecutionResult {
        let interpreter = match dialect {
            ScriptDialect::Python => &self.python,
            ScriptDialect::Mel => match &self.mel {
                Some(mel) => mel,
                None => {
                    return Err(ExecutionFailure::new(
                        "UnsupportedDialect",
                        "",
                        "no MEL interpreter is configured",
                    ));
                }
            },
        };
        run_script(interpreter, code).await.unwrap_or_else(|err| {
            Err(ExecutionFailure::new("OSError", "", err.to_string()))
        })
    }
}

async fn run_script(
    interpreter: &InterpreterCommand,
    code: &str,
) -> Result<ExecutionResult, io::Error> {
    let output = Command::new(&interpreter.program)
        .args(&interpreter.args)
        .arg(code)
        .kill_on_drop(true)
        .output()
        .await?;
    if output.status.success() {
        return Ok(Ok(()));
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!("script exited with {}: {stderr}", output.status);
    Ok(Err(parse_failure(&stderr, &output.status.to_string(), code)))
}

/// Extracts the error class, offending line and message from a traceback.
///
/// The offending line is the source text of the innermost frame. Frames in
/// the script itself carry no text when it is passed on the command line,
/// so those are looked up in `code`.
fn parse_failure(
    stderr: &str,
    status: &str,
    code: &str,
) -> ExecutionFailure {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let line = offending_line(&lines, code).unwrap_or_default();

    let Some(last) = lines.last() else {
        return ExecutionFailure::new("ProcessError", line, status);
    };
    match last.split_once(": ") {
        Some((kind, message)) if !kind.contains(' ') => {
            ExecutionFailure::new(kind, line, message)
        }
        _ => ExecutionFailure::new("Error", line, *last),
    }
}

fn offending_line(lines: &[&str], code: &str) -> Option<String> {
    let frame = lines.iter().rposition(|line| line.starts_with("File \""))?;
    // The last line holds the error itself, never source text.
    let quoted = lines
        .get(frame + 1..lines.len() - 1)
        .and_then(<[_]>::first)
        .filter(|text| !is_marker(text) && !text.starts_with("File \""));
    if let Some(text) = quoted {
        return Some((*text).to_owned());
    }

    let frame = lines[frame];
    if !frame.starts_with("File \"<string>\"") {
        return None;
    }
    let (_, rest) = frame.split_once(", line ")?;
    let digits: String =
        rest.chars().take_while(char::is_ascii_digit).collect();
    let number = digits.parse::<usize>().ok()?.checked_sub(1)?;
    code.lines().nth(number).map(|text| text.trim().to_owned())
}

/// Matches the `^^^` and `~~~^^` lines pointing into the quoted source.
fn is_marker(line: &str) -> bool {
    line.chars().all(|ch| matches!(ch, '^' | '~' | ' '))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_traceback() {
        let stderr = "Traceback (most recent call last):\n  \
                      File \"<string>\", line 2, in <module>\n\
                      NameError: name 'boom' is not defined\n";
        assert_eq!(
            parse_failure(stderr, "exit status: 1", "x = 1\n  boom()\n"),
            ExecutionFailure::new(
                "NameError",
                "boom()",
                "name 'boom' is not defined"
            )
        );
    }

    #[test]
    fn test_parse_syntax_error() {
        let stderr = "  File \"<string>\", line 1\n    cmds.polyCube(\n    \
                      ^\nSyntaxError: '(' was never closed\n";
        let failure = parse_failure(stderr, "exit status: 1", "unused");
        assert_eq!(
            failure.to_string(),
            "SyntaxError: cmds.polyCube(: '(' was never closed"
        );
    }

    #[test]
    fn test_parse_nested_frame() {
        let stderr = "Traceback (most recent call last):\n  \
                      File \"<string>\", line 1, in <module>\n  \
                      File \"/maya/cmds.py\", line 40, in polyCube\n    \
                      raise RuntimeError(\"no scene\")\n    \
                      ~~~~~~~~~~~~^^^^^^^^^^^^\n\
                      RuntimeError: no scene\n";
        let failure = parse_failure(stderr, "exit status: 1", "polyCube()");
        assert_eq!(failure.line, "raise RuntimeError(\"no scene\")");

        // A frame outside the script without quoted text has no line.
        let stderr = "  File \"/maya/cmds.py\", line 40, in polyCube\n\
                      RuntimeError: no scene\n";
        let failure = parse_failure(stderr, "exit status: 1", "polyCube()");
        assert_eq!(failure.line, "");
    }

    #[test]
    fn test_parse_line_out_of_range() {
        let stderr = "  File \"<string>\", line 9, in <module>\n\
                      NameError: name 'boom' is not defined\n";
        let failure = parse_failure(stderr, "exit status: 1", "boom()");
        assert_eq!(failure.line, "");
    }

    #[test]
    fn test_parse_unstructured() {
        assert_eq!(
            parse_failure("", "exit status: 2", "print(1)"),
            ExecutionFailure::new("ProcessError", "", "exit status: 2")
        );
        assert_eq!(
            parse_failure(
                "something went wrong: badly",
                "exit status: 1",
                "print(1)"
            ),
            ExecutionFailure::new("Error", "", "something went wrong: badly")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute() {
        let executor = ProcessScriptExecutor::new()
            .with_python(InterpreterCommand::new("sh", ["-c"]));
        assert_eq!(
            executor.execute("exit 0", ScriptDialect::Python).await,
            Ok(())
        );

        let script = "echo 'ValueError: bad' >&2; exit 1";
        let failure = executor
            .execute(script, ScriptDialect::Python)
            .await
            .unwrap_err();
        assert_eq!(failure, ExecutionFailure::new("ValueError", "", "bad"));

        let failure = executor
            .execute("polyCube;", ScriptDialect::Mel)
            .await
            .unwrap_err();
        assert_eq!(failure.kind, "UnsupportedDialect");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_reports_script_line() {
        // Prints what `python3 -c` prints for the script passed as `$1`.
        let fake_python = "printf '%s\\n' \
                           'Traceback (most recent call last):' \
                           '  File \"<string>\", line 2, in <module>' \
                           \"NameError: name 'boom' is not defined\" >&2; \
                           exit 1";
        let executor = ProcessScriptExecutor::new().with_python(
            InterpreterCommand::new("sh", ["-c", fake_python, "python3"]),
        );
        let failure = executor
            .execute("x = 1\nboom()\n", ScriptDialect::Python)
            .await
            .unwrap_err();
        assert_eq!(failure.line, "boom()");
        assert_eq!(
            failure.to_string(),
            "NameError: boom(): name 'boom' is not defined"
        );
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let executor = ProcessScriptExecutor::new().with_python(
            InterpreterCommand::new("scenechat-no-such-interpreter", ["-c"]),
        );
        let failure = executor
            .execute("print(1)", ScriptDialect::Python)
            .await
            .unwrap_err();
        assert_eq!(failure.kind, "OSError");
    }
}

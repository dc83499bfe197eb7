//! Splits a completed response into explanatory prose and runnable code.

use std::sync::LazyLock;

use regex::Regex;

use crate::dialect::ScriptDialect;

static PYTHON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| fence_regex("python3?"));
static MEL_FENCE: LazyLock<Regex> = LazyLock::new(|| fence_regex("mel"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n(?:[ \t]*\n)+").unwrap());

fn fence_regex(tag_pattern: &str) -> Regex {
    Regex::new(&format!(r"(?s)```{tag_pattern}\b(.*?)```")).unwrap()
}

fn fence_for(dialect: ScriptDialect) -> &'static Regex {
    match dialect {
        ScriptDialect::Python => &PYTHON_FENCE,
        ScriptDialect::Mel => &MEL_FENCE,
    }
}

/// A response split into its prose and its code blocks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Decomposed {
    /// The text outside of code blocks.
    pub comment: String,
    /// Code blocks of the active dialect, in order of appearance.
    pub code_list: Vec<String>,
}

/// A piece of a response, in order of appearance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Text outside of any matched code block, untouched.
    Prose(&'a str),
    /// The body of a matched code block with blank edges trimmed.
    Code(&'a str),
}

/// Returns the prose and code segments of `text` in order.
///
/// Only blocks fenced with the dialect's tag are treated as code, with
/// `python3` accepted for Python; anything else, including blocks of the
/// other dialect, stays in the prose.
pub fn segments(text: &str, dialect: ScriptDialect) -> Vec<Segment<'_>> {
    let mut segments = vec![];
    let mut cursor = 0;
    for captures in fence_for(dialect).captures_iter(text) {
        let (Some(whole), Some(body)) = (captures.get(0), captures.get(1))
        else {
            continue;
        };
        if whole.start() > cursor {
            segments.push(Segment::Prose(&text[cursor..whole.start()]));
        }
        segments.push(Segment::Code(trim_blank_lines(body.as_str())));
        cursor = whole.end();
    }
    if cursor < text.len() {
        segments.push(Segment::Prose(&text[cursor..]));
    }
    segments
}

/// Extracts every code block of `dialect` from `text`.
pub fn decompose(text: &str, dialect: ScriptDialect) -> Decomposed {
    let mut prose = String::new();
    let mut code_list = vec![];
    for segment in segments(text, dialect) {
        match segment {
            Segment::Prose(s) => prose.push_str(s),
            Segment::Code(code) => code_list.push(code.to_owned()),
        }
    }

    let prose = prose.replace("\r\n", "\n");
    let comment = BLANK_LINES.replace_all(&prose, "\n").trim().to_owned();
    Decomposed { comment, code_list }
}

/// Drops whitespace-only lines at both ends without touching the
/// indentation of the first real line.
fn trim_blank_lines(code: &str) -> &str {
    let code = code.trim_end();
    let mut start = 0;
    for line in code.split_inclusive('\n') {
        if !line.trim().is_empty() {
            break;
        }
        start += line.len();
    }
    &code[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_single_block() {
        let text = "Here is a cube.\n\n```python\nimport maya.cmds as cmds\n\
                    cmds.polyCube()\n```\n\n\nRun it in the editor.";
        let decomposed = decompose(text, ScriptDialect::Python);
        assert_eq!(
            decomposed.code_list,
            ["import maya.cmds as cmds\ncmds.polyCube()"]
        );
        assert_eq!(
            decomposed.comment,
            "Here is a cube.\nRun it in the editor."
        );
    }

    #[test]
    fn test_keeps_first_line_indentation() {
        let text = "```python\n\n    \n    x = 1\n    y = 2\n\n```";
        let decomposed = decompose(text, ScriptDialect::Python);
        assert_eq!(decomposed.code_list, ["    x = 1\n    y = 2"]);
        assert_eq!(decomposed.comment, "");
    }

    #[test]
    fn test_no_fences() {
        let decomposed =
            decompose("  Just some text.\n", ScriptDialect::Python);
        assert_eq!(
            decomposed,
            Decomposed {
                comment: "Just some text.".to_owned(),
                code_list: vec![],
            }
        );
    }

    #[test]
    fn test_other_dialect_stays_in_comment() {
        let text = "Try this:\n```mel\npolyCube;\n```\nor this:\n\
                    ```python\ncmds.polyCube()\n```";
        let decomposed = decompose(text, ScriptDialect::Python);
        assert_eq!(decomposed.code_list, ["cmds.polyCube()"]);
        assert_eq!(
            decomposed.comment,
            "Try this:\n```mel\npolyCube;\n```\nor this:"
        );

        let decomposed = decompose(text, ScriptDialect::Mel);
        assert_eq!(decomposed.code_list, ["polyCube;"]);
    }

    #[test]
    fn test_tag_must_end_at_word_boundary() {
        let text = "```pythonic\nnot code\n```";
        assert!(decompose(text, ScriptDialect::Python).code_list.is_empty());
        let text = "```python3x\nnot code\n```";
        assert!(decompose(text, ScriptDialect::Python).code_list.is_empty());
    }

    #[test]
    fn test_python3_tag() {
        let decomposed =
            decompose("Run:\n```python3\nprint(1)\n```", ScriptDialect::Python);
        assert_eq!(decomposed.code_list, ["print(1)"]);
        assert_eq!(decomposed.comment, "Run:");
    }

    #[test]
    fn test_segments_round_trip() {
        let text = "First:\n```python\nprint(1)\n```\nSecond:\n\n\
                    ```python\n\nprint(2)\n\n```\nDone.";
        let segments = segments(text, ScriptDialect::Python);
        assert_eq!(segments.len(), 5);

        let rebuilt: String = segments
            .iter()
            .map(|segment| match segment {
                Segment::Prose(s) => (*s).to_owned(),
                Segment::Code(code) => format!("```python\n{code}\n```"),
            })
            .collect();
        assert_eq!(normalize(&rebuilt), normalize(text));
    }
}

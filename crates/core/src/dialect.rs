//! Script dialects understood by the host application and the prompts that
//! steer the model towards each of them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::executor::ExecutionFailure;

/// The scripting language generated code is written in.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ScriptDialect {
    /// The embedded Python interpreter.
    #[default]
    Python,
    /// The host's own macro language.
    Mel,
}

impl ScriptDialect {
    /// The tag following the opening backticks of a fenced block.
    pub fn fence_tag(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Mel => "mel",
        }
    }

    /// The file extension of exported scripts.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Python => "py",
            Self::Mel => "mel",
        }
    }

    /// The name used when talking to the model about the dialect.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Python => "Python",
            Self::Mel => "MEL",
        }
    }

    /// The kind of script requested in prompts.
    pub fn script_kind(self) -> &'static str {
        match self {
            Self::Python => "Maya Python",
            Self::Mel => "MEL",
        }
    }

    /// The system message that opens every transcript in this dialect.
    ///
    /// Prose outside the scripts is requested in `language`.
    pub fn system_prompt(self, language: &str) -> String {
        let kind = self.script_kind();
        let tag = self.fence_tag();
        let mut prompt = format!(
            "Write a {kind} script in response to the question.\n\
             All text other than the script should be short and written in \
             {language}.\n\
             {} code blocks should always start with ```{tag}.\n",
            self.display_name(),
        );
        if self == Self::Python {
            prompt.push_str(
                "Do not use packages or modules that are not installed as \
                 standard in Maya.\n",
            );
        }
        prompt.push_str(
            "If information is missing for writing scripts, ask questions \
             as appropriate.",
        );
        prompt
    }

    /// Wraps the user's question in the per-dialect instruction template.
    pub fn user_prompt(self, question: &str, language: &str) -> String {
        let kind = self.script_kind();
        format!(
            "Write a {kind} script that can be executed in Maya to answer \
             the following Questions.\n\
             Be sure to answer in {language}.\n\
             \n\
             # Questions:\n\
             {question}"
        )
    }

    /// Asks the model to repair the most recent script.
    pub fn fix_prompt(
        self,
        failure: &ExecutionFailure,
        language: &str,
    ) -> String {
        let kind = self.script_kind();
        format!(
            "The {kind} script raised the following error when executed in \
             Maya. Fix the script so that the error does not occur.\n\
             Be sure to answer in {language}.\n\
             \n\
             # Error:\n\
             {failure}"
        )
    }
}

impl fmt::Display for ScriptDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// The error returned when parsing an unknown dialect name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownDialect(String);

impl fmt::Display for UnknownDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown script dialect `{}`", self.0)
    }
}

impl std::error::Error for UnknownDialect {}

impl FromStr for ScriptDialect {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" | "py" => Ok(Self::Python),
            "mel" => Ok(Self::Mel),
            _ => Err(UnknownDialect(s.to_owned())),
        }
    }
}

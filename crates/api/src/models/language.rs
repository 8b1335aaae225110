use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Programming language of a codebase, named the way the codegraph
/// configuration names it (`languages[].name`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Language(#[schemars(with = "String")] Cow<'static, str>);

impl Language {
    pub const GO: Language = Language(Cow::Borrowed("go"));
    pub const JAVA: Language = Language(Cow::Borrowed("java"));
    pub const KOTLIN: Language = Language(Cow::Borrowed("kotlin"));
    pub const SCALA: Language = Language(Cow::Borrowed("scala"));
    pub const PYTHON: Language = Language(Cow::Borrowed("python"));
    pub const JAVASCRIPT: Language = Language(Cow::Borrowed("javascript"));
    pub const TYPESCRIPT: Language = Language(Cow::Borrowed("typescript"));
    pub const C: Language = Language(Cow::Borrowed("c"));
    pub const CPP: Language = Language(Cow::Borrowed("cpp"));
    pub const RUST: Language = Language(Cow::Borrowed("rust"));
    pub const CSHARP: Language = Language(Cow::Borrowed("csharp"));
    pub const RUBY: Language = Language(Cow::Borrowed("ruby"));
    pub const PHP: Language = Language(Cow::Borrowed("php"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Map a source file extension to a Language. Non-source files yield `None`
    /// so they never count towards the dominant language.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "go" => Some(Self::GO),
            "java" => Some(Self::JAVA),
            "kt" | "kts" => Some(Self::KOTLIN),
            "scala" | "sc" => Some(Self::SCALA),
            "py" | "pyi" => Some(Self::PYTHON),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JAVASCRIPT),
            "ts" | "tsx" | "mts" | "cts" => Some(Self::TYPESCRIPT),
            "c" | "h" => Some(Self::C),
            "cc" | "cpp" | "cxx" | "hpp" | "hh" | "hxx" => Some(Self::CPP),
            "rs" => Some(Self::RUST),
            "cs" => Some(Self::CSHARP),
            "rb" => Some(Self::RUBY),
            "php" => Some(Self::PHP),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Language {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl From<String> for Language {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for Language {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

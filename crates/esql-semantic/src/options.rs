//! Compilation options
//!
//! The compilation mode decides how names are compared, which clauses take
//! part in resolution, and which constructs are admitted.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How a query is being compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CompilationMode {
    /// Regular user query
    #[default]
    Normal,
    /// Mapping views generated by the framework itself
    RestrictedViewGeneration,
    /// Views defined by the user in mapping files
    UserViewGeneration,
}

impl fmt::Display for CompilationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::RestrictedViewGeneration => write!(f, "restricted view generation"),
            Self::UserViewGeneration => write!(f, "user view generation"),
        }
    }
}

/// Query clauses whose participation depends on the compilation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Clause {
    GroupBy,
    Having,
    OrderBy,
}

/// Options shared by every component of one compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParserOptions {
    #[serde(default)]
    pub mode: CompilationMode,
}

impl ParserOptions {
    pub fn new(mode: CompilationMode) -> Self {
        Self { mode }
    }

    /// Load options from a JSON document such as `{"mode": "UserViewGeneration"}`
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Names are case-sensitive only in restricted view generation
    pub fn is_case_insensitive(&self) -> bool {
        self.mode != CompilationMode::RestrictedViewGeneration
    }

    pub fn name_comparer(&self) -> NameComparer {
        if self.is_case_insensitive() {
            NameComparer::CaseInsensitive
        } else {
            NameComparer::CaseSensitive
        }
    }

    /// GROUP BY, HAVING and ORDER BY are inert in restricted view generation
    pub fn is_clause_active(&self, clause: Clause) -> bool {
        match clause {
            Clause::GroupBy | Clause::Having | Clause::OrderBy => {
                self.mode != CompilationMode::RestrictedViewGeneration
            }
        }
    }

    /// Relationship constructors inside type constructors are admitted only
    /// when generating views
    pub fn allows_relationship_constructors(&self) -> bool {
        matches!(
            self.mode,
            CompilationMode::RestrictedViewGeneration | CompilationMode::UserViewGeneration
        )
    }
}

/// Equality over names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameComparer {
    /// Byte-for-byte comparison
    CaseSensitive,
    /// Ordinal comparison after per-character uppercasing
    CaseInsensitive,
}

impl NameComparer {
    pub fn ignore_case(&self) -> bool {
        matches!(self, Self::CaseInsensitive)
    }

    pub fn equals(&self, a: &str, b: &str) -> bool {
        match self {
            Self::CaseSensitive => a == b,
            Self::CaseInsensitive => {
                a.chars().count() == b.chars().count()
                    && a.chars().zip(b.chars()).all(|(x, y)| fold(x) == fold(y))
            }
        }
    }

    /// Normalized form of `name`; two names are equal exactly when their keys are
    pub fn key<'a>(&self, name: &'a str) -> Cow<'a, str> {
        match self {
            Self::CaseSensitive => Cow::Borrowed(name),
            Self::CaseInsensitive if name.chars().all(|c| fold(c) == c) => Cow::Borrowed(name),
            Self::CaseInsensitive => Cow::Owned(name.chars().map(fold).collect()),
        }
    }
}

/// Simple uppercase mapping. Characters whose uppercase form spans several
/// characters (`ß`) map to themselves.
fn fold(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}

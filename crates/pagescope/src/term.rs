//! Term matching and formatting.
//!
//! `MatchKind` is the comparison vocabulary shared by locators and
//! verifications; `TermFormat` turns a declared component name such as
//! `"Sign In Form"` into the term a locator searches for.

use crate::result::{PageError, PageResult};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison semantics for terms and verified values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Placeholder resolved from the ancestor chain when metadata is built
    Inherit,
    /// Exact equality
    #[default]
    Equals,
    /// Actual contains expected
    Contains,
    /// Actual starts with expected
    StartsWith,
    /// Actual ends with expected
    EndsWith,
    /// Case-insensitive equality
    EqualsIgnoringCase,
    /// Case-insensitive containment
    ContainsIgnoringCase,
    /// Case-insensitive prefix
    StartsWithIgnoringCase,
    /// Case-insensitive suffix
    EndsWithIgnoringCase,
    /// Expected is a regular expression searched in actual
    Regex,
    /// Case-insensitive regular expression
    RegexIgnoringCase,
}

impl MatchKind {
    /// All concrete (non-`Inherit`) kinds
    pub const CONCRETE: [Self; 10] = [
        Self::Equals,
        Self::Contains,
        Self::StartsWith,
        Self::EndsWith,
        Self::EqualsIgnoringCase,
        Self::ContainsIgnoringCase,
        Self::StartsWithIgnoringCase,
        Self::EndsWithIgnoringCase,
        Self::Regex,
        Self::RegexIgnoringCase,
    ];

    /// Replace `Inherit` with `fallback`
    #[must_use]
    pub const fn resolve(self, fallback: Self) -> Self {
        match self {
            Self::Inherit => fallback,
            other => other,
        }
    }

    /// Whether the kind is still unresolved
    #[must_use]
    pub const fn is_inherit(self) -> bool {
        matches!(self, Self::Inherit)
    }

    /// Apply the predicate to a single expected/actual pair.
    ///
    /// `Inherit` is resolved before any comparison happens; if one slips
    /// through it compares as `Equals`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPattern` if a regex kind is given a malformed expression.
    pub fn is_match(self, expected: &str, actual: &str) -> PageResult<bool> {
        let matched = match self {
            Self::Inherit | Self::Equals => actual == expected,
            Self::Contains => actual.contains(expected),
            Self::StartsWith => actual.starts_with(expected),
            Self::EndsWith => actual.ends_with(expected),
            Self::EqualsIgnoringCase => actual.to_lowercase() == expected.to_lowercase(),
            Self::ContainsIgnoringCase => actual.to_lowercase().contains(&expected.to_lowercase()),
            Self::StartsWithIgnoringCase => {
                actual.to_lowercase().starts_with(&expected.to_lowercase())
            }
            Self::EndsWithIgnoringCase => actual.to_lowercase().ends_with(&expected.to_lowercase()),
            Self::Regex | Self::RegexIgnoringCase => self.build_regex(expected)?.is_match(actual),
        };
        Ok(matched)
    }

    fn build_regex(self, pattern: &str) -> PageResult<Regex> {
        RegexBuilder::new(pattern)
            .case_insensitive(self == Self::RegexIgnoringCase)
            .build()
            .map_err(|e| PageError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })
    }

    /// Prepare `expected` for repeated matching. Regex kinds compile every
    /// pattern here, so a malformed one fails before any value is read.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPattern` if a regex kind is given a malformed expression.
    pub fn compile<S: AsRef<str>>(self, expected: &[S]) -> PageResult<CompiledMatch> {
        let patterns = match self {
            Self::Regex | Self::RegexIgnoringCase => expected
                .iter()
                .map(|p| self.build_regex(p.as_ref()))
                .collect::<PageResult<Vec<_>>>()?,
            _ => Vec::new(),
        };
        Ok(CompiledMatch {
            kind: self,
            expected: expected.iter().map(|e| e.as_ref().to_string()).collect(),
            patterns,
        })
    }

    /// True if any candidate matches
    pub fn matches_any<S: AsRef<str>>(self, candidates: &[S], actual: &str) -> PageResult<bool> {
        for candidate in candidates {
            if self.is_match(candidate.as_ref(), actual)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Verb phrase for diagnostics ("equal", "not contain", ...)
    #[must_use]
    pub fn describe(self, negated: bool) -> String {
        let verb = match self {
            Self::Inherit | Self::Equals => "equal",
            Self::Contains => "contain",
            Self::StartsWith => "start with",
            Self::EndsWith => "end with",
            Self::EqualsIgnoringCase => "equal ignoring case",
            Self::ContainsIgnoringCase => "contain ignoring case",
            Self::StartsWithIgnoringCase => "start with ignoring case",
            Self::EndsWithIgnoringCase => "end with ignoring case",
            Self::Regex => "match pattern",
            Self::RegexIgnoringCase => "match pattern ignoring case",
        };
        if negated {
            format!("not {verb}")
        } else {
            verb.to_string()
        }
    }
}

/// Expected values bound to a [`MatchKind`], with regexes compiled once
#[derive(Debug, Clone)]
pub struct CompiledMatch {
    kind: MatchKind,
    expected: Vec<String>,
    patterns: Vec<Regex>,
}

impl CompiledMatch {
    /// Comparison in use
    #[must_use]
    pub const fn kind(&self) -> MatchKind {
        self.kind
    }

    /// True if any expected value matches `actual`
    #[must_use]
    pub fn matches_any(&self, actual: &str) -> bool {
        match self.kind {
            MatchKind::Regex | MatchKind::RegexIgnoringCase => {
                self.patterns.iter().any(|regex| regex.is_match(actual))
            }
            kind => self
                .expected
                .iter()
                .any(|expected| kind.is_match(expected, actual).unwrap_or(false)),
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(false))
    }
}

/// Rendering of a declared name into a locator term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermFormat {
    /// Placeholder resolved from the ancestor chain when metadata is built
    Inherit,
    /// Name used verbatim
    None,
    /// "Sign In Form"
    #[default]
    Title,
    /// "Sign In Form:"
    TitleWithColon,
    /// "Sign in form"
    Sentence,
    /// "sign in form"
    Lower,
    /// "SIGN IN FORM"
    Upper,
    /// "signInForm"
    Camel,
    /// "SignInForm"
    Pascal,
    /// "sign-in-form"
    Kebab,
    /// "sign_in_form"
    Snake,
}

impl TermFormat {
    /// Replace `Inherit` with `fallback`
    #[must_use]
    pub const fn resolve(self, fallback: Self) -> Self {
        match self {
            Self::Inherit => fallback,
            other => other,
        }
    }

    /// Render `name` in this format
    #[must_use]
    pub fn apply(self, name: &str) -> String {
        let words = split_words(name);
        match self {
            Self::Inherit | Self::None => name.to_string(),
            Self::Title => join_mapped(&words, " ", capitalize),
            Self::TitleWithColon => format!("{}:", join_mapped(&words, " ", capitalize)),
            Self::Sentence => words
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    if i == 0 {
                        capitalize(w)
                    } else {
                        w.to_lowercase()
                    }
                })
                .collect::<Vec<_>>()
                .join(" "),
            Self::Lower => join_mapped(&words, " ", |w| w.to_lowercase()),
            Self::Upper => join_mapped(&words, " ", |w| w.to_uppercase()),
            Self::Camel => words
                .iter()
                .enumerate()
                .map(|(i, w)| if i == 0 { w.to_lowercase() } else { capitalize(w) })
                .collect(),
            Self::Pascal => join_mapped(&words, "", capitalize),
            Self::Kebab => join_mapped(&words, "-", |w| w.to_lowercase()),
            Self::Snake => join_mapped(&words, "_", |w| w.to_lowercase()),
        }
    }
}

fn join_mapped(words: &[String], sep: &str, f: impl Fn(&str) -> String) -> String {
    words.iter().map(|w| f(w)).collect::<Vec<_>>().join(sep)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Split on separators and case boundaries: "SignIn_form-x" -> [Sign, In, form, x]
fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = name.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if c.is_whitespace() || c == '_' || c == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

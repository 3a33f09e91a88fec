//! Pattern matchers compiled once from the dashboard configuration.

use regex::Regex;
use tracing::warn;

use crate::models::Step;

/// A single job-name predicate.
///
/// Patterns wrapped in slashes (`/^run-.*/`) are regular expressions; anything
/// else is a plain substring test.
#[derive(Debug, Clone)]
pub enum NamePattern {
    Contains(String),
    Regex(Regex),
}

impl NamePattern {
    /// Compile a pattern string.
    pub fn parse(pattern: &str) -> Result<Self, regex::Error> {
        match pattern
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
        {
            Some(expr) if !expr.is_empty() => Regex::new(expr).map(NamePattern::Regex),
            _ => Ok(NamePattern::Contains(pattern.to_string())),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            NamePattern::Contains(needle) => name.contains(needle.as_str()),
            NamePattern::Regex(re) => re.is_match(name),
        }
    }
}

/// Ordered `(category, predicate)` rules evaluated against job names.
///
/// Rules are evaluated in insertion order; the first match wins for
/// [`CategoryMatcher::first_match`].
#[derive(Debug, Clone)]
pub struct CategoryMatcher<C> {
    rules: Vec<(C, NamePattern)>,
}

impl<C> Default for CategoryMatcher<C> {
    fn default() -> Self {
        CategoryMatcher { rules: Vec::new() }
    }
}

impl<C> CategoryMatcher<C> {
    /// Compile rules, skipping (and logging) patterns that fail to compile.
    ///
    /// Returns the matcher and the list of rejected pattern strings.
    pub fn compile<'a, I>(rules: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = (C, &'a str)>,
    {
        let mut compiled = Vec::new();
        let mut rejected = Vec::new();

        for (category, pattern) in rules {
            match NamePattern::parse(pattern) {
                Ok(p) => compiled.push((category, p)),
                Err(e) => {
                    warn!("Skipping invalid job pattern '{}': {}", pattern, e);
                    rejected.push(pattern.to_string());
                }
            }
        }

        (CategoryMatcher { rules: compiled }, rejected)
    }

    /// Category of the first rule matching `name`.
    pub fn first_match(&self, name: &str) -> Option<&C> {
        self.rules
            .iter()
            .find(|(_, pattern)| pattern.matches(name))
            .map(|(category, _)| category)
    }

    /// Categories of every rule matching `name`, in rule order.
    pub fn all_matches<'s>(&'s self, name: &'s str) -> impl Iterator<Item = &'s C> + 's {
        self.rules
            .iter()
            .filter(move |(_, pattern)| pattern.matches(name))
            .map(|(category, _)| category)
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.first_match(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Regexes naming the CI steps that run the real test suite.
#[derive(Debug, Clone, Default)]
pub struct FatalStepMatcher {
    patterns: Vec<Regex>,
    rejected: Vec<String>,
}

impl FatalStepMatcher {
    /// Compile step patterns. Malformed expressions are skipped with a warning.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut compiled = Vec::new();
        let mut rejected = Vec::new();

        for pattern in patterns {
            let pattern = pattern.as_ref();
            match Regex::new(pattern) {
                Ok(re) => compiled.push(re),
                Err(e) => {
                    warn!("Skipping invalid fatal step pattern '{}': {}", pattern, e);
                    rejected.push(pattern.to_string());
                }
            }
        }

        FatalStepMatcher {
            patterns: compiled,
            rejected,
        }
    }

    /// True when a step with this name counts as test execution.
    ///
    /// With no usable patterns every step is fatal, so failures are never
    /// silently masked as setup problems.
    pub fn is_fatal(&self, step_name: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|re| re.is_match(step_name))
    }

    /// True when the run reached a step that is explicitly listed as fatal.
    pub fn reached_fatal_step(&self, steps: &[Step]) -> bool {
        !self.patterns.is_empty()
            && steps
                .iter()
                .any(|step| self.patterns.iter().any(|re| re.is_match(&step.name)))
    }

    /// Patterns that failed to compile.
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }
}

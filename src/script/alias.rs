//! Import specifier aliasing
//!
//! Alias rules redirect virtual or package specifiers (for example the
//! framework's `gestaltjs/plugin` runtime module) to files on disk before
//! normal resolution runs. Exact rules are consulted before pattern rules;
//! within each group the first matching rule wins.

use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;

/// How an alias rule matches a specifier
#[derive(Debug, Clone)]
pub enum AliasFind {
    /// The specifier must equal this string
    Exact(String),

    /// The specifier must match this pattern; captures are available to the
    /// replacement as `$1`, `$2`, ...
    Pattern(Regex),
}

/// A single specifier rewrite
#[derive(Debug, Clone)]
pub struct AliasRule {
    pub find: AliasFind,
    pub replacement: String,
}

impl AliasRule {
    /// Creates a rule matching `find` literally
    pub fn exact(find: impl Into<String>, replacement: impl AsRef<Path>) -> Self {
        Self {
            find: AliasFind::Exact(find.into()),
            replacement: replacement.as_ref().to_string_lossy().into_owned(),
        }
    }

    /// Creates a rule matching the regular expression `pattern`
    pub fn pattern(pattern: &str, replacement: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            find: AliasFind::Pattern(Regex::new(pattern)?),
            replacement: replacement.into(),
        })
    }

    fn is_exact(&self) -> bool {
        matches!(self.find, AliasFind::Exact(_))
    }

    fn apply(&self, specifier: &str) -> Option<PathBuf> {
        match &self.find {
            AliasFind::Exact(find) if find == specifier => Some(PathBuf::from(&self.replacement)),
            AliasFind::Exact(_) => None,
            AliasFind::Pattern(regex) if regex.is_match(specifier) => Some(PathBuf::from(
                regex.replace(specifier, self.replacement.as_str()).into_owned(),
            )),
            AliasFind::Pattern(_) => None,
        }
    }
}

impl fmt::Display for AliasRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.find {
            AliasFind::Exact(find) => write!(f, "{} -> {}", find, self.replacement),
            AliasFind::Pattern(regex) => write!(f, "/{}/ -> {}", regex.as_str(), self.replacement),
        }
    }
}

/// Rewrites `specifier` with the first applicable rule
///
/// Returns `None` when no rule matches, in which case the specifier goes
/// through regular resolution.
pub fn rewrite(rules: &[AliasRule], specifier: &str) -> Option<PathBuf> {
    rules
        .iter()
        .filter(|rule| rule.is_exact())
        .chain(rules.iter().filter(|rule| !rule.is_exact()))
        .find_map(|rule| rule.apply(specifier))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_rule_matches_whole_specifier() {
        let rules = vec![AliasRule::exact("@gestaltjs/plugins", "/repo/plugins/src/index.ts")];

        assert_eq!(
            rewrite(&rules, "@gestaltjs/plugins"),
            Some(PathBuf::from("/repo/plugins/src/index.ts"))
        );
        assert_eq!(rewrite(&rules, "@gestaltjs/plugins/extra"), None);
        assert_eq!(rewrite(&rules, "other"), None);
    }

    #[test]
    fn pattern_rule_substitutes_captures() {
        let rules = vec![AliasRule::pattern("^@gestaltjs/(.+)/(.+)/(.+)$", "/repo/packages/$1/src/$2/$3.ts").unwrap()];

        assert_eq!(
            rewrite(&rules, "@gestaltjs/core/node/path"),
            Some(PathBuf::from("/repo/packages/core/src/node/path.ts"))
        );
    }

    #[test]
    fn exact_rules_take_precedence_over_patterns() {
        let rules = vec![
            AliasRule::pattern("^gestaltjs/(.*)$", "/pattern/$1.ts").unwrap(),
            AliasRule::exact("gestaltjs/plugin", "/exact/plugin.ts"),
        ];

        assert_eq!(rewrite(&rules, "gestaltjs/plugin"), Some(PathBuf::from("/exact/plugin.ts")));
        assert_eq!(rewrite(&rules, "gestaltjs/target"), Some(PathBuf::from("/pattern/target.ts")));
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = vec![
            AliasRule::pattern(r"^\$(.*)$", "/first/$1.ts").unwrap(),
            AliasRule::pattern(r"^\$(.*)$", "/second/$1.ts").unwrap(),
        ];

        assert_eq!(rewrite(&rules, "$utils"), Some(PathBuf::from("/first/utils.ts")));
    }

    #[test]
    fn display() {
        let rule = AliasRule::exact("a", "/b.ts");
        assert_eq!(rule.to_string(), "a -> /b.ts");
    }
}

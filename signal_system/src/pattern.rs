//! Content-type identifier patterns used by subscriptions

use std::fmt;

/// Selects the content types a subscriber listens to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UidPattern {
    /// Every content type (`*`)
    Any,
    /// A single content type
    Exact(String),
    /// Every uid starting with the prefix (`api::*`)
    Prefix(String),
}

impl UidPattern {
    pub fn parse(pattern: &str) -> Self {
        let pattern = pattern.trim();
        if pattern == "*" {
            UidPattern::Any
        } else if let Some(prefix) = pattern.strip_suffix('*') {
            UidPattern::Prefix(prefix.to_string())
        } else {
            UidPattern::Exact(pattern.to_string())
        }
    }

    pub fn matches(&self, uid: &str) -> bool {
        match self {
            UidPattern::Any => true,
            UidPattern::Exact(exact) => exact == uid,
            UidPattern::Prefix(prefix) => uid.starts_with(prefix.as_str()),
        }
    }
}

impl From<&str> for UidPattern {
    fn from(pattern: &str) -> Self {
        Self::parse(pattern)
    }
}

impl From<String> for UidPattern {
    fn from(pattern: String) -> Self {
        Self::parse(&pattern)
    }
}

impl fmt::Display for UidPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UidPattern::Any => f.write_str("*"),
            UidPattern::Exact(uid) => f.write_str(uid),
            UidPattern::Prefix(prefix) => write!(f, "{}*", prefix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matching() {
        assert!(UidPattern::parse("*").matches("api::article.article"));

        let exact = UidPattern::parse("api::article.article");
        assert!(exact.matches("api::article.article"));
        assert!(!exact.matches("api::article.articles"));

        let prefix = UidPattern::parse("api::*");
        assert!(prefix.matches("api::user.user"));
        assert!(!prefix.matches("plugin::users-permissions.user"));
        assert_eq!(prefix.to_string(), "api::*");
    }
}

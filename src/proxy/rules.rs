// Rule resolution - literal prefix matching and path rewriting

use regex::Regex;

/// How a matched path is transformed before it is appended to the target
/// origin.
///
/// Only the leading occurrence is ever rewritten; if the prefix shows up
/// again later in the path it survives untouched.
#[derive(Debug, Clone)]
pub enum PathRewrite {
    /// Forward the path unchanged, prefix included.
    Identity,
    /// Remove the first occurrence of the prefix anchored at the start.
    StripPrefix(String),
    /// Replace the leftmost match of the pattern. Anchor with `^` to get
    /// strip-prefix behavior with a custom replacement.
    Regex { pattern: Regex, replacement: String },
}

impl PathRewrite {
    /// Apply the rewrite to a request path. Pure; no allocation beyond the
    /// returned string.
    pub fn apply(&self, path: &str) -> String {
        match self {
            PathRewrite::Identity => path.to_string(),
            PathRewrite::StripPrefix(prefix) => match path.strip_prefix(prefix.as_str()) {
                Some(rest) => rest.to_string(),
                None => path.to_string(),
            },
            PathRewrite::Regex {
                pattern,
                replacement,
            } => pattern.replace(path, replacement.as_str()).into_owned(),
        }
    }
}

// Regex has no PartialEq; compare patterns by source text
impl PartialEq for PathRewrite {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PathRewrite::Identity, PathRewrite::Identity) => true,
            (PathRewrite::StripPrefix(a), PathRewrite::StripPrefix(b)) => a == b,
            (
                PathRewrite::Regex {
                    pattern: pa,
                    replacement: ra,
                },
                PathRewrite::Regex {
                    pattern: pb,
                    replacement: rb,
                },
            ) => pa.as_str() == pb.as_str() && ra == rb,
            _ => false,
        }
    }
}

/// A compiled proxy rule. Built once at configuration load, immutable
/// afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyRule {
    /// Literal path prefix checked at request time. No wildcards.
    pub prefix: String,
    /// Upstream origin, kept verbatim: the forwarded URL is a plain
    /// concatenation of this string and the rewritten path.
    pub target: String,
    /// Host (plus non-default port) of `target`, extracted at compile time.
    pub host: String,
    pub change_origin: bool,
    pub rewrite: PathRewrite,
}

/// Where a matched request is forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardSpec {
    pub url: String,
    /// `Some(upstream host)` when the rule sets `change_origin`; `None`
    /// keeps the original request's Host header.
    pub host_header: Option<String>,
}

/// Compiled rule table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<ProxyRule>,
}

impl RuleSet {
    pub fn new(mut rules: Vec<ProxyRule>) -> Self {
        // Longest prefix first so nested prefixes resolve deterministically
        rules.sort_by(|a, b| {
            b.prefix
                .len()
                .cmp(&a.prefix.len())
                .then_with(|| a.prefix.cmp(&b.prefix))
        });
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Resolve a request path against the rule table.
    ///
    /// Returns `None` when no prefix matches; the request then stays with
    /// the normal dev-server handling.
    pub fn resolve(&self, request_path: &str) -> Option<ForwardSpec> {
        let rule = self
            .rules
            .iter()
            .find(|r| request_path.starts_with(r.prefix.as_str()))?;
        let rewritten = rule.rewrite.apply(request_path);
        Some(ForwardSpec {
            url: format!("{}{}", rule.target, rewritten),
            host_header: rule.change_origin.then(|| rule.host.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn juicy_rule() -> ProxyRule {
        ProxyRule {
            prefix: "/juicy-api".to_string(),
            target: "https://enjoyjuicy.com".to_string(),
            host: "enjoyjuicy.com".to_string(),
            change_origin: true,
            rewrite: PathRewrite::StripPrefix("/juicy-api".to_string()),
        }
    }

    #[test]
    fn test_no_match_passes_through() {
        let rules = RuleSet::new(vec![juicy_rule()]);
        assert_eq!(rules.resolve("/other/path"), None);
        assert_eq!(rules.resolve("/"), None);
        // Prefix test is literal and anchored, not substring search
        assert_eq!(rules.resolve("/api/juicy-api/users"), None);
    }

    #[test]
    fn test_prefix_stripped_once_from_front() {
        let rules = RuleSet::new(vec![juicy_rule()]);
        let spec = rules.resolve("/juicy-api/users/42").unwrap();
        assert_eq!(spec.url, "https://enjoyjuicy.com/users/42");
        assert_eq!(spec.host_header.as_deref(), Some("enjoyjuicy.com"));
    }

    #[test]
    fn test_exact_prefix_forwards_to_bare_origin() {
        let rules = RuleSet::new(vec![juicy_rule()]);
        let spec = rules.resolve("/juicy-api").unwrap();
        assert_eq!(spec.url, "https://enjoyjuicy.com");
    }

    #[test]
    fn test_later_occurrence_survives() {
        let rules = RuleSet::new(vec![juicy_rule()]);
        let spec = rules.resolve("/juicy-api/a/juicy-api/b").unwrap();
        assert_eq!(spec.url, "https://enjoyjuicy.com/a/juicy-api/b");
    }

    #[test]
    fn test_identity_keeps_full_path() {
        let rule = ProxyRule {
            prefix: "/api".to_string(),
            target: "http://127.0.0.1:3000".to_string(),
            host: "127.0.0.1:3000".to_string(),
            change_origin: false,
            rewrite: PathRewrite::Identity,
        };
        let rules = RuleSet::new(vec![rule]);
        let spec = rules.resolve("/api/health").unwrap();
        assert_eq!(spec.url, "http://127.0.0.1:3000/api/health");
        assert_eq!(spec.host_header, None);
    }

    #[test]
    fn test_regex_rewrites_leftmost_match_only() {
        let rule = ProxyRule {
            prefix: "/api".to_string(),
            target: "http://127.0.0.1:3000".to_string(),
            host: "127.0.0.1:3000".to_string(),
            change_origin: false,
            rewrite: PathRewrite::Regex {
                pattern: Regex::new("^/api").unwrap(),
                replacement: String::new(),
            },
        };
        let rules = RuleSet::new(vec![rule]);
        let spec = rules.resolve("/api/v1/api/health").unwrap();
        assert_eq!(spec.url, "http://127.0.0.1:3000/v1/api/health");
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mut v2 = juicy_rule();
        v2.prefix = "/juicy-api/v2".to_string();
        v2.target = "https://v2.enjoyjuicy.com".to_string();
        v2.host = "v2.enjoyjuicy.com".to_string();
        v2.rewrite = PathRewrite::StripPrefix("/juicy-api/v2".to_string());
        let rules = RuleSet::new(vec![juicy_rule(), v2]);

        let spec = rules.resolve("/juicy-api/v2/users").unwrap();
        assert_eq!(spec.url, "https://v2.enjoyjuicy.com/users");

        let spec = rules.resolve("/juicy-api/users").unwrap();
        assert_eq!(spec.url, "https://enjoyjuicy.com/users");
    }

    #[test]
    fn test_resolution_is_pure() {
        let rules = RuleSet::new(vec![juicy_rule()]);
        let a = rules.resolve("/juicy-api/users/42");
        let b = rules.resolve("/juicy-api/users/42");
        assert_eq!(a, b);
    }
}

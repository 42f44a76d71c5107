use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

use crate::error::{AppError, AppResult};
use crate::proxy::rules::{PathRewrite, ProxyRule, RuleSet};

/// Dev server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Listen address
    /// - "127.0.0.1": local machine only (default)
    /// - "0.0.0.0": reachable from the LAN
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Proxy rule table (key: path prefix, value: rule)
    #[serde(default)]
    pub proxy: BTreeMap<String, ProxyRuleConfig>,

    /// Upstream request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            proxy: BTreeMap::new(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5173
}

fn default_request_timeout() -> u64 {
    120
}

/// One proxy rule as written in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProxyRuleConfig {
    /// Upstream origin, an absolute http(s) URL
    pub target: String,

    /// Set the outbound Host header to the upstream host instead of the
    /// original request's host. Needed for virtual-host upstreams.
    #[serde(default)]
    pub change_origin: bool,

    /// Path transform applied before forwarding. Omitted means the path is
    /// forwarded unchanged.
    #[serde(default)]
    pub rewrite: RewriteConfig,
}

/// Serde form of the path rewrite
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RewriteConfig {
    #[default]
    Identity,
    /// Strip the rule's own prefix from the front of the path
    StripPrefix,
    Regex {
        pattern: String,
        replacement: String,
    },
}

impl ProxyRuleConfig {
    /// Validate and compile one rule.
    ///
    /// Runs at configuration load; any error here keeps the server from
    /// starting.
    pub fn compile(&self, prefix: &str) -> AppResult<ProxyRule> {
        if !prefix.starts_with('/') {
            return Err(AppError::Config(format!(
                "proxy prefix must start with '/': {:?}",
                prefix
            )));
        }

        let parsed = Url::parse(&self.target).map_err(|e| {
            AppError::Config(format!("invalid proxy target {:?}: {}", self.target, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::Config(format!(
                "proxy target {:?} must use http or https",
                self.target
            )));
        }
        let host = parsed.host_str().ok_or_else(|| {
            AppError::Config(format!("proxy target {:?} has no host", self.target))
        })?;
        let host = match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let rewrite = match &self.rewrite {
            RewriteConfig::Identity => PathRewrite::Identity,
            RewriteConfig::StripPrefix => PathRewrite::StripPrefix(prefix.to_string()),
            RewriteConfig::Regex {
                pattern,
                replacement,
            } => {
                let pattern = regex::Regex::new(pattern).map_err(|e| {
                    AppError::Config(format!("invalid rewrite pattern {:?}: {}", pattern, e))
                })?;
                PathRewrite::Regex {
                    pattern,
                    replacement: replacement.clone(),
                }
            }
        };

        Ok(ProxyRule {
            prefix: prefix.to_string(),
            target: self.target.clone(),
            host,
            change_origin: self.change_origin,
            rewrite,
        })
    }
}

impl ServerConfig {
    /// Actual listen address handed to the TCP listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Compile the whole rule table into the runtime rule set
    pub fn compile_rules(&self) -> AppResult<RuleSet> {
        let mut rules = Vec::with_capacity(self.proxy.len());
        for (prefix, rule) in &self.proxy {
            rules.push(rule.compile(prefix)?);
        }
        Ok(RuleSet::new(rules))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn juicy() -> ProxyRuleConfig {
        ProxyRuleConfig {
            target: "https://enjoyjuicy.com".to_string(),
            change_origin: true,
            rewrite: RewriteConfig::StripPrefix,
        }
    }

    #[test]
    fn test_compile_strips_with_rule_prefix() {
        let rule = juicy().compile("/juicy-api").unwrap();
        assert_eq!(rule.host, "enjoyjuicy.com");
        assert_eq!(
            rule.rewrite,
            PathRewrite::StripPrefix("/juicy-api".to_string())
        );
    }

    #[test]
    fn test_host_includes_non_default_port() {
        let rule = ProxyRuleConfig {
            target: "http://127.0.0.1:8045".to_string(),
            change_origin: true,
            rewrite: RewriteConfig::Identity,
        };
        let compiled = rule.compile("/api").unwrap();
        assert_eq!(compiled.host, "127.0.0.1:8045");
    }

    #[test]
    fn test_invalid_target_rejected() {
        let mut rule = juicy();
        rule.target = "not-a-url".to_string();
        assert!(matches!(
            rule.compile("/juicy-api"),
            Err(AppError::Config(_))
        ));

        rule.target = "ftp://enjoyjuicy.com".to_string();
        assert!(matches!(
            rule.compile("/juicy-api"),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_rewrite_pattern_rejected() {
        let rule = ProxyRuleConfig {
            target: "https://enjoyjuicy.com".to_string(),
            change_origin: false,
            rewrite: RewriteConfig::Regex {
                pattern: "(".to_string(),
                replacement: String::new(),
            },
        };
        assert!(matches!(rule.compile("/api"), Err(AppError::Config(_))));
    }

    #[test]
    fn test_prefix_must_be_absolute() {
        assert!(matches!(
            juicy().compile("juicy-api"),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_compile_rules_is_idempotent() {
        let mut config = ServerConfig::default();
        config.proxy.insert("/juicy-api".to_string(), juicy());
        let a = config.compile_rules().unwrap();
        let b = config.compile_rules().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 1);
    }
}

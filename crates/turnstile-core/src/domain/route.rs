//! Declarative route → tier table.
//!
//! Call sites never name a tier themselves; the HTTP layer asks this table.
//! Patterns are matched segment by segment: `{name}` matches any single
//! segment and a trailing `*` matches any remainder. The first matching rule
//! wins.

use crate::domain::PolicyRegistry;
use crate::error::PolicyError;

/// What to do with a matched route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteRule {
    /// Count the request against the named tier.
    Limit(String),
    /// Do not rate limit (health checks, quota introspection).
    Exempt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
    Rest,
}

#[derive(Debug, Clone)]
struct RouteEntry {
    /// Upper-cased method, `None` for any method.
    method: Option<String>,
    segments: Vec<Segment>,
    rule: RouteRule,
}

impl RouteEntry {
    fn matches(&self, method: &str, path: &str) -> bool {
        if let Some(expected) = &self.method {
            if !expected.eq_ignore_ascii_case(method) {
                return false;
            }
        }

        let mut parts = split_path(path);
        for segment in &self.segments {
            match segment {
                Segment::Rest => return true,
                Segment::Param => {
                    if parts.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(literal) => {
                    if parts.next() != Some(literal.as_str()) {
                        return false;
                    }
                }
            }
        }
        parts.next().is_none()
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Route → tier table with a default for unmatched routes.
#[derive(Debug, Clone)]
pub struct RouteTiers {
    routes: Vec<RouteEntry>,
    default: RouteRule,
}

impl RouteTiers {
    /// Empty table whose unmatched routes fall into `default_tier`.
    pub fn new(default_tier: impl Into<String>) -> Self {
        Self {
            routes: Vec::new(),
            default: RouteRule::Limit(default_tier.into()),
        }
    }

    /// Rate limit `method pattern` under `tier`. `"*"` matches any method.
    pub fn limit(mut self, method: &str, pattern: &str, tier: impl Into<String>) -> Self {
        self.push(method, pattern, RouteRule::Limit(tier.into()));
        self
    }

    /// Leave `method pattern` unlimited.
    pub fn exempt(mut self, method: &str, pattern: &str) -> Self {
        self.push(method, pattern, RouteRule::Exempt);
        self
    }

    fn push(&mut self, method: &str, pattern: &str, rule: RouteRule) {
        let method = match method.trim() {
            "*" | "" => None,
            m => Some(m.to_ascii_uppercase()),
        };
        let segments = split_path(pattern)
            .map(|s| match s {
                "*" => Segment::Rest,
                s if s.starts_with('{') && s.ends_with('}') => Segment::Param,
                s => Segment::Literal(s.to_string()),
            })
            .collect();

        self.routes.push(RouteEntry {
            method,
            segments,
            rule,
        });
    }

    /// The rule for a request.
    pub fn resolve(&self, method: &str, path: &str) -> &RouteRule {
        self.routes
            .iter()
            .find(|entry| entry.matches(method, path))
            .map(|entry| &entry.rule)
            .unwrap_or(&self.default)
    }

    /// Check every tier name in the table against the registry, so a typo
    /// surfaces at startup instead of on the first matching request.
    pub fn validate(&self, registry: &PolicyRegistry) -> Result<(), PolicyError> {
        self.routes
            .iter()
            .map(|entry| &entry.rule)
            .chain(std::iter::once(&self.default))
            .try_for_each(|rule| match rule {
                RouteRule::Limit(name) => registry.lookup(name).map(|_| ()),
                RouteRule::Exempt => Ok(()),
            })
    }
}

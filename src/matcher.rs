use crate::spec::{ApiSpecification, Operation};
use regex::Regex;

/// Regex for a path template: each `{name}` becomes one non-empty segment.
pub fn template_regex(template: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::with_capacity(template.len() + 16);
    pattern.push('^');

    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        pattern.push_str(&regex::escape(&rest[..open]));
        pattern.push_str("[^/]+");
        rest = &rest[open + close + 1..];
    }
    pattern.push_str(&regex::escape(rest));
    pattern.push('$');

    Regex::new(&pattern)
}

pub fn matches(concrete_path: &str, template: &str) -> bool {
    template_regex(template)
        .map(|re| re.is_match(concrete_path))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved<'a> {
    pub template: &'a str,
    pub operation: &'a Operation,
}

/// Template regexes for one specification, compiled once, in declaration
/// order.
pub struct PathMatcher<'a> {
    spec: &'a ApiSpecification,
    compiled: Vec<Regex>,
}

impl<'a> PathMatcher<'a> {
    pub fn new(spec: &'a ApiSpecification) -> Result<Self, regex::Error> {
        let compiled = spec
            .paths()
            .iter()
            .map(|item| template_regex(&item.template))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { spec, compiled })
    }

    pub fn spec(&self) -> &'a ApiSpecification {
        self.spec
    }

    /// Exact template lookup first, then the first declared template whose
    /// pattern matches and which defines `method`.
    pub fn resolve(&self, method: &str, path: &str) -> Option<Resolved<'a>> {
        if let Some(item) = self.spec.exact(path) {
            if let Some(operation) = item.operation(method) {
                return Some(Resolved {
                    template: &item.template,
                    operation,
                });
            }
        }

        self.spec
            .paths()
            .iter()
            .zip(&self.compiled)
            .filter(|(_, re)| re.is_match(path))
            .find_map(|(item, _)| {
                item.operation(method).map(|operation| Resolved {
                    template: &item.template,
                    operation,
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_template_matching() {
        let template = "/api/user/{userId}";
        assert!(matches("/api/user/123", template));
        assert!(!matches("/api/user/123/extra", template));
        assert!(!matches("/api/user", template));
        assert!(!matches("/api/user/", template));
    }

    #[test]
    fn test_literal_characters_are_escaped() {
        assert!(matches("/api/v1.0/status", "/api/v1.0/status"));
        assert!(!matches("/api/v1x0/status", "/api/v1.0/status"));
    }

    #[test]
    fn test_multiple_placeholders() {
        let template = "/api/user/{userId}/family/{familyId}";
        assert!(matches("/api/user/1/family/2", template));
        assert!(!matches("/api/user/1/family", template));
    }

    #[test]
    fn test_resolve_first_declared_template_wins() {
        let spec = ApiSpecification::from_value(&json!({
            "paths": {
                "/api/user/{userId}": { "get": {} },
                "/api/user/{loginId}": { "get": { "deprecated": true } },
                "/api/user/search": { "get": {}, "post": {} }
            }
        }))
        .unwrap();
        let matcher = PathMatcher::new(&spec).unwrap();

        let resolved = matcher.resolve("GET", "/api/user/abc").unwrap();
        assert_eq!(resolved.template, "/api/user/{userId}");
        assert!(!resolved.operation.deprecated);

        // Exact key beats template.
        let resolved = matcher.resolve("GET", "/api/user/search").unwrap();
        assert_eq!(resolved.template, "/api/user/search");

        assert!(matcher.resolve("DELETE", "/api/user/abc").is_none());
        assert!(matcher.resolve("GET", "/api/users").is_none());
    }
}

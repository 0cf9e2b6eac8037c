//! Finds API endpoint references in free-form documentation text.
//!
//! Three shapes are recognised, all anchored on the first `/api/` segment:
//! a bare path (`/api/user/123`), a verb-prefixed path (`POST /api/login`)
//! and a fully-qualified URL (`https://example.com/api/user`). Each match is
//! reduced to a canonical [`EndpointKey`].

use ahash::AHashMap;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_METHOD: &str = "GET";

const VERBS: [&str; 7] = ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

const REFERENCE_PATTERN: &str = concat!(
    r"(?i:(?:^|[^A-Za-z0-9])(GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS)\s+)?",
    r#"(?:https?://[^\s/"'`)<>*]+)?"#,
    r#"(/api/[^\s"'`)<>\]|\\*]+)"#,
);

/// Canonical `"METHOD path"` identity of an endpoint.
///
/// The method is uppercased and the path carries no query string, fragment,
/// domain or trailing punctuation. Ordering is by method, then path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointKey {
    pub method: String,
    pub path: String,
}

impl EndpointKey {
    /// Returns `None` when `path` holds no `/api/` reference.
    pub fn new(method: &str, path: &str) -> Option<Self> {
        Some(Self {
            method: normalize_method(method),
            path: normalize_path(path)?,
        })
    }

    /// Key for a specification operation. Templates are taken verbatim since
    /// they need not live under `/api/`.
    pub fn from_spec(method: &str, template: &str) -> Self {
        Self {
            method: normalize_method(method),
            path: template.to_string(),
        }
    }

    /// Inverse of `Display`; also accepts un-normalized text such as
    /// `post https://host/api/login?x=1`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (method, rest) = match text.split_once(char::is_whitespace) {
            Some((first, rest)) if VERBS.contains(&first.to_ascii_uppercase().as_str()) => {
                (first, rest.trim_start())
            }
            _ => (DEFAULT_METHOD, text),
        };
        Self::new(method, rest)
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

pub fn normalize_method(method: &str) -> String {
    let method = method.trim();
    if method.is_empty() {
        DEFAULT_METHOD.to_string()
    } else {
        method.to_ascii_uppercase()
    }
}

/// Keeps the text from the first `/api/` up to the first terminator.
pub fn normalize_path(raw: &str) -> Option<String> {
    let start = raw.find("/api/")?;
    let tail = &raw[start..];

    let end = tail
        .find(|c: char| c.is_whitespace() || "\"'`)<>]|\\?#*".contains(c))
        .unwrap_or(tail.len());
    let path = tail[..end].trim_end_matches(['.', ',', ';', ':', '!', '_', '*']);

    if path.len() <= "/api/".len() {
        return None;
    }
    Some(path.to_string())
}

/// Where one occurrence of a reference sits in its file. `start..end` covers
/// the normalized path only, so a fix can rewrite exactly that span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

/// One unique endpoint referenced by one document.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointReference {
    pub key: EndpointKey,
    pub source_file: PathBuf,
    /// Matched text of the first occurrence.
    pub raw_text: String,
    pub occurrences: Vec<Occurrence>,
}

impl EndpointReference {
    pub fn method(&self) -> &str {
        &self.key.method
    }

    pub fn path(&self) -> &str {
        &self.key.path
    }

    pub fn line(&self) -> usize {
        self.occurrences.first().map(|o| o.line).unwrap_or(1)
    }
}

pub struct Extractor {
    pattern: Regex,
}

impl Extractor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(REFERENCE_PATTERN)?,
        })
    }

    /// Unique references in first-seen order. Front matter is skipped but
    /// offsets still refer to the full `text`.
    pub fn extract(&self, source_file: &Path, text: &str) -> Vec<EndpointReference> {
        let body_start = front_matter_len(text);
        let body = &text[body_start..];

        let mut references: Vec<EndpointReference> = Vec::new();
        let mut seen: AHashMap<EndpointKey, usize> = AHashMap::new();

        for caps in self.pattern.captures_iter(body) {
            let (Some(whole), Some(path_match)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            let verb = caps.get(1);
            let method = verb.map(|m| m.as_str()).unwrap_or(DEFAULT_METHOD);
            // The match may open on the character before the verb.
            let raw_start = verb.map_or(path_match.start(), |m| m.start());
            let Some(key) = EndpointKey::new(method, path_match.as_str()) else {
                continue;
            };

            let start = body_start + path_match.start();
            let occurrence = Occurrence {
                line: line_of(text, start),
                start,
                end: start + key.path.len(),
            };

            match seen.get(&key) {
                Some(&i) => references[i].occurrences.push(occurrence),
                None => {
                    seen.insert(key.clone(), references.len());
                    references.push(EndpointReference {
                        key,
                        source_file: source_file.to_path_buf(),
                        raw_text: body[raw_start..whole.end()].trim().to_string(),
                        occurrences: vec![occurrence],
                    });
                }
            }
        }

        references
    }
}

/// Byte length of a leading `---` delimited YAML front matter block, or 0.
pub fn front_matter_len(text: &str) -> usize {
    let Some(first_line_end) = text.find('\n') else {
        return 0;
    };
    if text[..first_line_end].trim_end() != "---" {
        return 0;
    }

    let mut offset = first_line_end + 1;
    for line in text[offset..].split_inclusive('\n') {
        offset += line.len();
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            return offset;
        }
    }
    0
}

fn line_of(text: &str, offset: usize) -> usize {
    text.as_bytes()[..offset].iter().filter(|&&b| b == b'\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn keys(text: &str) -> Vec<String> {
        let extractor = Extractor::new().unwrap();
        extractor
            .extract(Path::new("doc.md"), text)
            .into_iter()
            .map(|r| r.key.to_string())
            .collect()
    }

    #[test]
    fn test_extract_reference_shapes() {
        let text = r#"
Call `POST /api/user/registration` to register.
Fetch a user with GET https://auth.example.com/api/user/123?expand=true.
The raw path is "/api/tenant/{tenantId}".
Docs: <https://local.fusionauth.io/api/application>, see also (/api/group).
"#;
        assert_eq!(
            keys(text),
            vec![
                "POST /api/user/registration",
                "GET /api/user/123",
                "GET /api/tenant/{tenantId}",
                "GET /api/application",
                "GET /api/group",
            ]
        );
    }

    #[test]
    fn test_lowercase_verb_is_uppercased() {
        assert_eq!(keys("then delete /api/user/42 when done"), vec!["DELETE /api/user/42"]);
    }

    #[test]
    fn test_dedup_within_document_keeps_every_occurrence() {
        let extractor = Extractor::new().unwrap();
        let text = "GET /api/user\nagain: GET /api/user\nPOST /api/user";
        let refs = extractor.extract(Path::new("doc.md"), text);

        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].key.to_string(), "GET /api/user");
        assert_eq!(refs[0].occurrences.len(), 2);
        assert_eq!(refs[0].occurrences[1].line, 2);
        assert_eq!(refs[1].key.to_string(), "POST /api/user");
    }

    #[test]
    fn test_offsets_point_at_path() {
        let extractor = Extractor::new().unwrap();
        let text = "---\ntitle: Users\nlink: /api/ignored\n---\nUse PUT /api/user/1.\n";
        let refs = extractor.extract(Path::new("doc.md"), text);

        assert_eq!(refs.len(), 1);
        let occ = refs[0].occurrences[0];
        assert_eq!(&text[occ.start..occ.end], "/api/user/1");
        assert_eq!(occ.line, 5);
        assert_eq!(refs[0].raw_text, "PUT /api/user/1.");
    }

    #[test]
    fn test_front_matter_len() {
        assert_eq!(front_matter_len("no front matter\n---\n"), 0);
        assert_eq!(front_matter_len("---\na: 1\n---\nbody"), "---\na: 1\n---\n".len());
        assert_eq!(front_matter_len("---\nunterminated"), 0);
    }

    #[test]
    fn test_markdown_emphasis_around_reference() {
        assert_eq!(
            keys("Call **GET /api/user/123** or _POST /api/login_.\n*DELETE /api/user/9*"),
            vec!["GET /api/user/123", "POST /api/login", "DELETE /api/user/9"]
        );

        let extractor = Extractor::new().unwrap();
        let text = "Sign in with **POST /api/login**.";
        let refs = extractor.extract(Path::new("doc.md"), text);
        let occ = refs[0].occurrences[0];
        assert_eq!(&text[occ.start..occ.end], "/api/login");
        assert_eq!(refs[0].raw_text, "POST /api/login");
    }

    #[test]
    fn test_verb_inside_word_is_not_a_method() {
        assert_eq!(keys("forGET /api/status"), vec!["GET /api/status"]);
        assert_eq!(keys("rePOST /api/status"), vec!["GET /api/status"]);
    }

    #[test]
    fn test_non_api_paths_ignored() {
        assert!(keys("see /docs/apis/users and /api/ alone").is_empty());
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let samples = [
            "GET /api/user/123",
            "post https://host:9011/api/login?loginId=a#frag",
            "DELETE /api/user/{userId}.",
            "/api/jwt/refresh",
            "Patch   http://x/api/a/b/c,",
        ];
        for sample in samples {
            let once = EndpointKey::parse(sample).unwrap();
            let twice = EndpointKey::parse(&once.to_string()).unwrap();
            assert_eq!(once, twice, "normalizing {sample:?} twice changed it");
            assert_eq!(normalize_path(&once.path).as_deref(), Some(once.path.as_str()));
        }
    }

    #[test]
    fn test_parse_defaults_to_get() {
        let key = EndpointKey::parse("https://host/api/status").unwrap();
        assert_eq!(key.method, "GET");
        assert_eq!(key.path, "/api/status");
    }
}

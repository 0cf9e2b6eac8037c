use crate::spec::ApiSpecification;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SimilaritySuggestion {
    pub method: String,
    pub from_path: String,
    pub to_path: String,
    pub score: f64,
}

/// Edit distance over chars (two-row dynamic programming).
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// `1 - distance / max_len`, in `[0, 1]`. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

/// Best-scoring specification path for an unmatched one, if it clears
/// `threshold`. Ties go to the first declared template.
pub fn suggest(
    spec: &ApiSpecification,
    method: &str,
    path: &str,
    threshold: f64,
) -> Option<SimilaritySuggestion> {
    let mut best: Option<(&str, f64)> = None;

    for item in spec.paths() {
        let score = similarity(path, &item.template);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((&item.template, score));
        }
    }

    let (to_path, score) = best?;
    if score <= threshold || to_path == path {
        return None;
    }

    Some(SimilaritySuggestion {
        method: method.to_string(),
        from_path: path.to_string(),
        to_path: to_path.to_string(),
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("/api/usr", "/api/user"), 1);
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity("/api/user", "/api/user"), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        assert_eq!(similarity("", ""), 1.0);
        let sim = similarity("/api/usr/register", "/api/user/register");
        assert!((sim - (1.0 - 1.0 / 18.0)).abs() < 1e-9);
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let samples = [
            "",
            "/api/user",
            "/api/usr/register",
            "/api/user/register",
            "/api/jwt/refresh",
            "/api/user/{userId}",
            "/api/ünïcödé",
            "completely unrelated",
        ];
        for a in samples {
            for b in samples {
                assert_eq!(similarity(a, b), similarity(b, a), "asymmetric for {a:?} / {b:?}");
            }
        }
    }

    #[test]
    fn test_suggests_typo_fix() {
        let spec = ApiSpecification::from_value(&json!({
            "paths": {
                "/api/login": { "post": {} },
                "/api/user/register": { "post": {} },
                "/api/user/registration": { "post": {} }
            }
        }))
        .unwrap();

        let suggestion = suggest(&spec, "POST", "/api/usr/register", 0.7).unwrap();
        assert_eq!(suggestion.to_path, "/api/user/register");
        assert_eq!(suggestion.method, "POST");
        assert!(suggestion.score > 0.7);
    }

    #[test]
    fn test_no_suggestion_below_threshold() {
        let spec = ApiSpecification::from_value(&json!({
            "paths": { "/api/login": { "post": {} } }
        }))
        .unwrap();
        assert!(suggest(&spec, "GET", "/api/tenant/search", 0.7).is_none());
    }
}

use crate::extract::EndpointKey;
use crate::report::{FileError, ScannedDocument};
use crate::verify::VerificationResult;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: usize,
    pub end: usize,
    pub old: String,
    pub new: String,
}

#[derive(Debug, Default)]
pub struct FixSummary {
    pub files_changed: usize,
    pub replacements: usize,
    /// Spans whose text no longer matched what was scanned.
    pub stale: usize,
    pub failures: Vec<FileError>,
}

/// Applies `edits` back to front. An edit only lands if the text at its span
/// is still `old`; returns the new text, applied and stale counts.
pub fn rewrite(text: &str, edits: &[Edit]) -> (String, usize, usize) {
    let mut ordered: Vec<&Edit> = edits.iter().collect();
    ordered.sort_by(|a, b| b.start.cmp(&a.start));

    let mut out = text.to_string();
    let mut applied = 0;
    let mut stale = 0;
    let mut floor = usize::MAX;

    for edit in ordered {
        let fits = edit.end <= floor && out.get(edit.start..edit.end) == Some(edit.old.as_str());
        if !fits {
            stale += 1;
            continue;
        }
        out.replace_range(edit.start..edit.end, &edit.new);
        floor = edit.start;
        applied += 1;
    }

    (out, applied, stale)
}

/// Edits for every invalid reference in `doc` that has a replacement path.
pub fn plan(doc: &ScannedDocument, results: &BTreeMap<EndpointKey, VerificationResult>) -> Vec<Edit> {
    let mut edits = Vec::new();
    for reference in &doc.references {
        let Some(result) = results.get(&reference.key).filter(|r| !r.valid) else {
            continue;
        };
        let Some(target) = result.fix_target() else {
            continue;
        };
        for occ in &reference.occurrences {
            edits.push(Edit {
                start: occ.start,
                end: occ.end,
                old: reference.key.path.clone(),
                new: target.to_string(),
            });
        }
    }
    edits
}

/// Rewrites each affected file once. A failing file is recorded and the rest
/// carry on.
pub async fn apply_fixes(
    documents: &[ScannedDocument],
    results: &BTreeMap<EndpointKey, VerificationResult>,
) -> FixSummary {
    let mut summary = FixSummary::default();

    for doc in documents {
        let edits = plan(doc, results);
        if edits.is_empty() {
            continue;
        }

        match fix_file(&doc.file, &edits).await {
            Ok((applied, stale)) => {
                summary.stale += stale;
                if applied > 0 {
                    summary.files_changed += 1;
                    summary.replacements += applied;
                    tracing::info!(file = %doc.file.display(), replacements = applied, "fixed document");
                }
                if stale > 0 {
                    tracing::warn!(file = %doc.file.display(), stale, "skipped references that changed since the scan");
                }
            }
            Err(e) => {
                tracing::warn!(file = %doc.file.display(), error = %e, "could not fix document");
                summary.failures.push(FileError {
                    file: doc.file.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    summary
}

async fn fix_file(path: &Path, edits: &[Edit]) -> std::io::Result<(usize, usize)> {
    let text = tokio::fs::read_to_string(path).await?;
    let (rewritten, applied, stale) = rewrite(&text, edits);
    if applied > 0 {
        tokio::fs::write(path, rewritten).await?;
    }
    Ok((applied, stale))
}

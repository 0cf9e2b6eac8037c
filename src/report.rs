use crate::config::ConfigSnapshot;
use crate::error::{Error, Result};
use crate::extract::{EndpointKey, EndpointReference};
use crate::suggest::SimilaritySuggestion;
use crate::verify::VerificationResult;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FileError {
    pub file: PathBuf,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    UndocumentedEndpoint,
    SimilarEndpoint,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Warning {
    pub kind: WarningKind,
    pub endpoint: String,
    pub message: String,
}

/// One reference inside a document; verification detail lives in
/// `AggregateReport::endpoints` under `key`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceResult {
    pub key: String,
    pub method: String,
    pub path: String,
    pub raw_text: String,
    pub line: usize,
    pub occurrences: usize,
    pub valid: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DocumentReport {
    pub file: PathBuf,
    pub valid: bool,
    pub references: Vec<ReferenceResult>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_endpoints: usize,
    pub valid_endpoints: usize,
    pub invalid_endpoints: usize,
    pub deprecated_endpoints: usize,
    pub documents_checked: usize,
    /// Invalid documents, counted once each.
    pub issues_found: usize,
    pub undocumented_endpoints: usize,
    pub suggestions_made: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub timestamp: String,
    pub spec_version: String,
    pub duration_ms: u64,
    pub config: ConfigSnapshot,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AggregateReport {
    pub summary: Summary,
    pub documents: BTreeMap<String, DocumentReport>,
    pub endpoints: BTreeMap<String, VerificationResult>,
    pub suggestions: Vec<SimilaritySuggestion>,
    pub warnings: Vec<Warning>,
    pub errors: Vec<FileError>,
    pub metadata: Metadata,
}

impl AggregateReport {
    pub fn has_failures(&self) -> bool {
        self.summary.invalid_endpoints > 0
    }
}

/// References found in one readable document.
pub struct ScannedDocument {
    pub file: PathBuf,
    pub references: Vec<EndpointReference>,
}

/// Folds per-endpoint results back into per-document structures and counts
/// everything once: endpoints per unique key, issues per invalid document.
pub fn aggregate(
    documents: &[ScannedDocument],
    results: &BTreeMap<EndpointKey, VerificationResult>,
    mut warnings: Vec<Warning>,
    errors: Vec<FileError>,
    metadata: Metadata,
) -> AggregateReport {
    let mut summary = Summary {
        documents_checked: documents.len(),
        ..Summary::default()
    };

    let mut endpoints = BTreeMap::new();
    let mut suggestions = Vec::new();
    for (key, result) in results {
        summary.total_endpoints += 1;
        if result.valid {
            summary.valid_endpoints += 1;
        } else {
            summary.invalid_endpoints += 1;
        }
        if result.deprecated {
            summary.deprecated_endpoints += 1;
        }
        if let Some(suggestion) = &result.suggestion {
            warnings.push(Warning {
                kind: WarningKind::SimilarEndpoint,
                endpoint: key.to_string(),
                message: format!(
                    "Did you mean {} {}? ({}% similar)",
                    suggestion.method,
                    suggestion.to_path,
                    (suggestion.score * 100.0) as u32
                ),
            });
            suggestions.push(suggestion.clone());
        }
        endpoints.insert(key.to_string(), result.clone());
    }

    let mut document_reports = BTreeMap::new();
    for doc in documents.iter().filter(|d| !d.references.is_empty()) {
        let references: Vec<ReferenceResult> = doc
            .references
            .iter()
            .map(|r| ReferenceResult {
                key: r.key.to_string(),
                method: r.method().to_string(),
                path: r.path().to_string(),
                raw_text: r.raw_text.clone(),
                line: r.line(),
                occurrences: r.occurrences.len(),
                valid: results.get(&r.key).is_some_and(|v| v.valid),
            })
            .collect();

        let valid = references.iter().all(|r| r.valid);
        if !valid {
            summary.issues_found += 1;
        }

        document_reports.insert(
            doc.file.to_string_lossy().to_string(),
            DocumentReport {
                file: doc.file.clone(),
                valid,
                references,
            },
        );
    }

    summary.undocumented_endpoints = warnings
        .iter()
        .filter(|w| w.kind == WarningKind::UndocumentedEndpoint)
        .count();
    summary.suggestions_made = suggestions.len();

    AggregateReport {
        summary,
        documents: document_reports,
        endpoints,
        suggestions,
        warnings,
        errors,
        metadata,
    }
}

/// Overwrites `path` with the pretty-printed report.
pub async fn write_report(report: &AggregateReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    let write_err = |source| Error::ReportWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    tokio::fs::write(path, json).await.map_err(write_err)?;
    Ok(())
}

pub fn print_endpoint(key: &str, result: &VerificationResult) {
    let status = if result.valid {
        "ok".green()
    } else if result.deprecated {
        "deprecated".yellow()
    } else {
        "invalid".red()
    };
    let live = match (result.status_code, result.response_time_ms) {
        (Some(code), Some(ms)) => format!(" [{code} in {ms}ms]"),
        (Some(code), None) => format!(" [{code}]"),
        _ => String::new(),
    };
    println!("  {} {}{}", status, key, live.dimmed());
    for issue in &result.issues {
        println!("    {} {}", "-".dimmed(), issue);
    }
}

pub fn print_summary(report: &AggregateReport, report_path: &Path) {
    let s = &report.summary;

    println!();
    println!("{}", "Verification Summary".green().bold());
    println!("  Spec version:       {}", report.metadata.spec_version.cyan());
    println!("  Documents checked:  {}", s.documents_checked.to_string().cyan());
    println!("  Total endpoints:    {}", s.total_endpoints.to_string().cyan());
    println!("  Valid endpoints:    {}", s.valid_endpoints.to_string().green());
    println!("  Invalid endpoints:  {}", colour_count(s.invalid_endpoints));
    println!("  Deprecated:         {}", s.deprecated_endpoints.to_string().yellow());
    println!("  Documents w/issues: {}", colour_count(s.issues_found));
    println!("  Undocumented:       {}", s.undocumented_endpoints.to_string().yellow());
    println!("  Time elapsed:       {}ms", report.metadata.duration_ms);

    let invalid: Vec<_> = report.endpoints.iter().filter(|(_, r)| !r.valid).collect();
    if !invalid.is_empty() {
        println!();
        println!("{}", "Invalid endpoints".red().bold());
        for (key, result) in &invalid {
            println!("  {}", key.cyan());
            for issue in &result.issues {
                println!("    {} {}", "-".dimmed(), issue);
            }
            for doc in report
                .documents
                .values()
                .filter(|d| d.references.iter().any(|r| &r.key == *key))
            {
                let line = doc
                    .references
                    .iter()
                    .find(|r| &r.key == *key)
                    .map(|r| r.line)
                    .unwrap_or(1);
                println!("    {} {}:{}", ">".dimmed(), doc.file.display(), line);
            }
        }
    }

    if !report.suggestions.is_empty() {
        println!();
        println!("{}", "Suggestions".yellow().bold());
        for suggestion in &report.suggestions {
            println!(
                "  {} {} {} {} ({}%)",
                suggestion.method,
                suggestion.from_path.red(),
                "->".dimmed(),
                suggestion.to_path.green(),
                (suggestion.score * 100.0) as u32
            );
        }
    }

    let undocumented: Vec<_> = report
        .warnings
        .iter()
        .filter(|w| w.kind == WarningKind::UndocumentedEndpoint)
        .collect();
    if !undocumented.is_empty() {
        println!();
        println!("{}", "Undocumented endpoints".yellow().bold());
        for warning in undocumented.iter().take(20) {
            println!("  {} {}", "~".dimmed(), warning.endpoint);
        }
        if undocumented.len() > 20 {
            println!("  {}", format!("... and {} more", undocumented.len() - 20).dimmed());
        }
    }

    if !report.errors.is_empty() {
        println!();
        println!("{}", "Unreadable files".red().bold());
        for error in &report.errors {
            println!("  {}: {}", error.file.display(), error.message);
        }
    }

    println!();
    println!("{} {}", "Report written to".green(), report_path.display().to_string().cyan());
}

fn colour_count(n: usize) -> colored::ColoredString {
    if n == 0 {
        n.to_string().green()
    } else {
        n.to_string().red().bold()
    }
}

use crate::audit;
use crate::config::Config;
use crate::error::Result;
use crate::extract::{EndpointKey, Extractor};
use crate::fix::{apply_fixes, FixSummary};
use crate::report::{self, AggregateReport, Metadata, ScannedDocument};
use crate::scan::{read_documents, Scanner, SourceDocument};
use crate::spec::ApiSpecification;
use crate::verify::{VerificationResult, Verifier};
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

/// Everything one verification pass needs, built once per process so watch
/// mode can re-run without reloading the specification.
pub struct Pipeline<'a> {
    config: &'a Config,
    spec: &'a ApiSpecification,
    scanner: Scanner,
    extractor: Extractor,
    verifier: Verifier<'a>,
}

pub struct RunOutcome {
    pub report: AggregateReport,
    pub fixes: Option<FixSummary>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, spec: &'a ApiSpecification) -> Result<Self> {
        Ok(Self {
            config,
            spec,
            scanner: Scanner::from_config(config)?,
            extractor: Extractor::new()?,
            verifier: Verifier::new(spec, config)?,
        })
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    /// Full pass: scan, verify, audit, persist, print, and optionally fix.
    pub async fn run(&self) -> Result<RunOutcome> {
        let start = Instant::now();

        let files = self.scanner.scan();
        tracing::info!(files = files.len(), "scanning documentation");
        let (documents, errors) = read_documents(&files).await;
        let scanned = self.extract_all(&documents);

        let (results, report) = self.verify(&scanned, errors, true, start).await;
        report::write_report(&report, &self.config.report_path).await?;

        if !self.config.quiet {
            report::print_summary(&report, &self.config.report_path);
        }

        let fixes = if self.config.fix_docs {
            let summary = apply_fixes(&scanned, &results).await;
            if !self.config.quiet {
                print_fix_summary(&summary);
            }
            Some(summary)
        } else {
            None
        };

        Ok(RunOutcome { report, fixes })
    }

    /// Single-file pass used by watch mode. Nothing is persisted.
    pub async fn verify_file(&self, path: &Path) -> AggregateReport {
        let start = Instant::now();
        let (documents, errors) = read_documents(&[path.to_path_buf()]).await;
        let scanned = self.extract_all(&documents);
        self.verify(&scanned, errors, false, start).await.1
    }

    fn extract_all(&self, documents: &[SourceDocument]) -> Vec<ScannedDocument> {
        documents
            .iter()
            .map(|doc| ScannedDocument {
                file: doc.path.clone(),
                references: self.extractor.extract(&doc.path, &doc.text),
            })
            .collect()
    }

    async fn verify(
        &self,
        scanned: &[ScannedDocument],
        errors: Vec<report::FileError>,
        audit_spec: bool,
        start: Instant,
    ) -> (BTreeMap<EndpointKey, VerificationResult>, AggregateReport) {
        let keys = scanned
            .iter()
            .flat_map(|doc| doc.references.iter().map(|r| r.key.clone()));
        let results = self.verifier.verify_all(keys).await;

        if self.config.verbose && !self.config.quiet {
            println!("{}", "Endpoints".cyan().bold());
            for (key, result) in &results {
                report::print_endpoint(&key.to_string(), result);
            }
        }

        let warnings = if audit_spec {
            audit::undocumented(
                self.spec,
                &audit::documented_keys(&results),
                self.config.include_deprecated,
            )
        } else {
            Vec::new()
        };

        let metadata = Metadata {
            timestamp: chrono::Utc::now().to_rfc3339(),
            spec_version: self.spec.version().to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
            config: self.config.snapshot(),
        };

        let report = report::aggregate(scanned, &results, warnings, errors, metadata);
        (results, report)
    }
}

fn print_fix_summary(summary: &FixSummary) {
    println!();
    println!("{}", "Auto-fix".green().bold());
    println!("  Files changed:  {}", summary.files_changed.to_string().cyan());
    println!("  Replacements:   {}", summary.replacements.to_string().cyan());
    if summary.stale > 0 {
        println!("  Skipped:        {}", summary.stale.to_string().yellow());
    }
    for failure in &summary.failures {
        println!("  {} {}: {}", "failed".red(), failure.file.display(), failure.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::WarningKind;
    use serde_json::json;
    use std::fs;
    use std::path::PathBuf;

    fn spec() -> ApiSpecification {
        ApiSpecification::from_value(&json!({
            "info": { "version": "1.45.0" },
            "paths": {
                "/api/user/{userId}": { "get": {}, "delete": {} },
                "/api/user/register": { "post": {} },
                "/api/jwt/refresh": { "post": { "deprecated": true } }
            }
        }))
        .unwrap()
    }

    fn config(root: &Path) -> Config {
        Config {
            quiet: true,
            doc_roots: vec![root.join("docs")],
            report_path: root.join("out").join("report.json"),
            spec_cache_path: root.join("out").join("openapi.json"),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_full_run_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(
            docs.join("users.md"),
            "---\ntitle: Users\n---\nFetch with `GET /api/user/123`.\nRegister via POST /api/usr/register\n",
        )
        .unwrap();
        fs::write(docs.join("jwt.md"), "Refresh tokens: POST /api/jwt/refresh\n").unwrap();
        fs::write(docs.join("intro.md"), "No endpoints here.\n").unwrap();

        let spec = spec();
        let config = config(dir.path());
        let pipeline = Pipeline::new(&config, &spec).unwrap();
        let outcome = pipeline.run().await.unwrap();
        let report = outcome.report;

        assert_eq!(report.summary.documents_checked, 3);
        assert_eq!(report.summary.total_endpoints, 3);
        assert_eq!(report.summary.valid_endpoints, 1);
        assert_eq!(report.summary.deprecated_endpoints, 1);
        assert_eq!(report.summary.issues_found, 2);
        assert_eq!(report.summary.suggestions_made, 1);
        assert!(report.has_failures());
        assert!(outcome.fixes.is_none());

        let undocumented: Vec<&str> = report
            .warnings
            .iter()
            .filter(|w| w.kind == WarningKind::UndocumentedEndpoint)
            .map(|w| w.endpoint.as_str())
            .collect();
        assert_eq!(undocumented, vec!["DELETE /api/user/{userId}", "POST /api/user/register"]);

        assert!(config.report_path.exists());
        assert_eq!(report.metadata.spec_version, "1.45.0");
    }

    #[tokio::test]
    async fn test_fix_docs_rewrites_after_reporting() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        let file = docs.join("register.md");
        fs::write(&file, "POST /api/usr/register\n").unwrap();

        let spec = spec();
        let config = Config {
            fix_docs: true,
            ..config(dir.path())
        };
        let outcome = Pipeline::new(&config, &spec).unwrap().run().await.unwrap();

        let fixes = outcome.fixes.unwrap();
        assert_eq!(fixes.replacements, 1);
        assert_eq!(fs::read_to_string(&file).unwrap(), "POST /api/user/register\n");
        // The report describes the scanned state, not the fixed one.
        assert!(outcome.report.has_failures());
    }

    #[tokio::test]
    async fn test_verify_file_scoped_to_one_document() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join("a.md"), "GET /api/user/1").unwrap();
        fs::write(docs.join("b.md"), "GET /api/unknown/path").unwrap();

        let spec = spec();
        let config = config(dir.path());
        let pipeline = Pipeline::new(&config, &spec).unwrap();

        let report = pipeline.verify_file(&docs.join("a.md")).await;
        assert_eq!(report.summary.documents_checked, 1);
        assert_eq!(report.summary.total_endpoints, 1);
        assert!(!report.has_failures());
        assert!(report.warnings.is_empty());
        assert!(!config.report_path.exists());

        let missing = pipeline.verify_file(&PathBuf::from("/nonexistent/doc.md")).await;
        assert_eq!(missing.errors.len(), 1);
    }
}

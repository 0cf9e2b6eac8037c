use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::report;
use crate::scan::Scanner;
use colored::Colorize;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Window, measured from the first event of a burst, in which further events
/// collapse into one pass.
const COALESCE_WINDOW: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Verifying,
}

/// Documentation files touched by a create or modify event.
pub fn changed_paths(event: &Event, scanner: &Scanner) -> Vec<PathBuf> {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return Vec::new();
    }
    event
        .paths
        .iter()
        .filter(|p| scanner.is_match(p))
        .cloned()
        .collect()
}

/// Re-verifies each changed file until the process is terminated.
pub async fn watch(pipeline: &Pipeline<'_>, quiet: bool) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        },
        notify::Config::default(),
    )?;

    for root in pipeline.scanner().roots() {
        watcher.watch(root, RecursiveMode::Recursive)?;
        if !quiet {
            println!("{} {}", "Watching".cyan().bold(), root.display());
        }
    }

    let mut state = WatchState::Idle;

    while let Some(first) = rx.recv().await {
        let mut pending = BTreeSet::new();
        collect(first, pipeline.scanner(), &mut pending);
        drain_burst(&mut rx, pipeline.scanner(), &mut pending).await;

        if pending.is_empty() {
            continue;
        }

        state = transition(state, WatchState::Verifying);
        for path in &pending {
            let report = pipeline.verify_file(path).await;
            if !quiet {
                print_update(path, &report);
            }
        }
        state = transition(state, WatchState::Idle);
    }

    Ok(())
}

/// Gathers events until the window closes. The deadline is fixed, so a
/// steady stream of events cannot hold verification off.
async fn drain_burst(
    rx: &mut mpsc::UnboundedReceiver<notify::Result<Event>>,
    scanner: &Scanner,
    pending: &mut BTreeSet<PathBuf>,
) {
    let window = tokio::time::sleep_until(Instant::now() + COALESCE_WINDOW);
    tokio::pin!(window);

    loop {
        tokio::select! {
            _ = &mut window => break,
            next = rx.recv() => match next {
                Some(res) => collect(res, scanner, pending),
                None => break,
            },
        }
    }
}

fn collect(res: notify::Result<Event>, scanner: &Scanner, pending: &mut BTreeSet<PathBuf>) {
    match res {
        Ok(event) => pending.extend(changed_paths(&event, scanner)),
        Err(e) => tracing::warn!(error = %e, "file watcher error"),
    }
}

fn transition(from: WatchState, to: WatchState) -> WatchState {
    tracing::debug!(?from, ?to, "watch state");
    to
}

fn print_update(path: &Path, report: &report::AggregateReport) {
    let s = &report.summary;
    let status = if report.has_failures() || !report.errors.is_empty() {
        "changed".yellow().bold()
    } else {
        "changed".green().bold()
    };

    println!();
    println!(
        "{} {} ({} endpoints, {} invalid)",
        status,
        path.display().to_string().cyan(),
        s.total_endpoints,
        s.invalid_endpoints
    );
    for (key, result) in report.endpoints.iter().filter(|(_, r)| !r.valid) {
        report::print_endpoint(key, result);
    }
    for error in &report.errors {
        println!("  {} {}", "error".red(), error.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};

    fn scanner(root: &Path) -> Scanner {
        Scanner::new(&[root.to_path_buf()], &["**/*.md".to_string()], &[]).unwrap()
    }

    #[test]
    fn test_changed_paths_filters_kind_and_glob() {
        let root = PathBuf::from("/docs");
        let scanner = scanner(&root);

        let modify = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(root.join("guide.md"))
            .add_path(root.join("image.png"));
        assert_eq!(changed_paths(&modify, &scanner), vec![root.join("guide.md")]);

        let create = Event::new(EventKind::Create(CreateKind::File)).add_path(root.join("new.md"));
        assert_eq!(changed_paths(&create, &scanner), vec![root.join("new.md")]);

        let remove = Event::new(EventKind::Remove(RemoveKind::File)).add_path(root.join("old.md"));
        assert!(changed_paths(&remove, &scanner).is_empty());

        let access = Event::new(EventKind::Access(AccessKind::Any)).add_path(root.join("guide.md"));
        assert!(changed_paths(&access, &scanner).is_empty());
    }

    #[tokio::test]
    async fn test_drain_burst_ends_despite_steady_events() {
        let root = PathBuf::from("/docs");
        let scanner = scanner(&root);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let file = root.join("autosave.md");
        let producer = tokio::spawn(async move {
            for _ in 0..100 {
                let event = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(file.clone());
                if tx.send(Ok(event)).is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        });

        let start = Instant::now();
        let mut pending = BTreeSet::new();
        drain_burst(&mut rx, &scanner, &mut pending).await;
        let elapsed = start.elapsed();
        producer.abort();

        assert!(elapsed < COALESCE_WINDOW * 5, "drain ran for {elapsed:?}");
        assert_eq!(pending.into_iter().collect::<Vec<_>>(), vec![root.join("autosave.md")]);
    }

    #[test]
    fn test_collect_dedups_paths() {
        let root = PathBuf::from("/docs");
        let scanner = scanner(&root);
        let mut pending = BTreeSet::new();

        for _ in 0..3 {
            let event = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(root.join("a.md"));
            collect(Ok(event), &scanner, &mut pending);
        }
        collect(Err(notify::Error::generic("boom")), &scanner, &mut pending);

        assert_eq!(pending.len(), 1);
    }
}

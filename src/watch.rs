//! File system watcher that keeps the published index current.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      Event Loop                          │
//! │                                                          │
//! │  ┌──────────┐    ┌──────────┐    ┌────────────────────┐  │
//! │  │ notify   │───▶│ Debouncer│───▶│   handle_changes   │  │
//! │  │ events   │    │ (300ms)  │    │                    │  │
//! │  └──────────┘    └──────────┘    │  config → reload   │  │
//! │                                  │           config   │  │
//! │                                  │  pages  → reload   │  │
//! │                                  └────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Every reload builds a complete index before it is swapped in, so
//! readers never observe a half-built tree.

use crate::{
    index::{CacheStatus, PageService},
    log,
    logger::WatchStatus,
};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

const DEBOUNCE_MS: u64 = 300;
const RELOAD_COOLDOWN_MS: u64 = 800;

/// Editor swap and backup files.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with(".#")
}

/// `/proj/pages/02.blog/item.md` → `pages/02.blog/item.md`
fn rel_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid file events with debouncing and reload cooldown.
struct Debouncer {
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
    last_reload: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            pending: FxHashSet::default(),
            last_event: None,
            last_reload: None,
        }
    }

    fn in_cooldown(&self) -> bool {
        self.last_reload
            .is_some_and(|t| t.elapsed() < Duration::from_millis(RELOAD_COOLDOWN_MS))
    }

    fn add(&mut self, event: Event) {
        for path in event.paths {
            if !is_temp_file(&path) {
                self.pending.insert(path);
            }
        }
        self.last_event = Some(Instant::now());
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        self.pending.drain().collect()
    }

    fn mark_reload(&mut self) {
        self.last_reload = Some(Instant::now());
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            Duration::from_millis(DEBOUNCE_MS)
        }
    }
}

// =============================================================================
// Event Handler
// =============================================================================

/// What a batch of changed paths requires.
#[derive(Debug, PartialEq, Eq)]
enum Action {
    ReloadConfig,
    Reload,
    Ignore,
}

fn classify(paths: &[PathBuf], config_path: &Path, pages_dir: &Path, cache_dir: &Path) -> Action {
    if paths.iter().any(|p| p == config_path) {
        Action::ReloadConfig
    } else if paths
        .iter()
        .any(|p| p.starts_with(pages_dir) && !p.starts_with(cache_dir))
    {
        Action::Reload
    } else {
        Action::Ignore
    }
}

/// Apply one batch. Returns true when a new index was published.
fn handle_changes(paths: &[PathBuf], service: &PageService, status: &mut WatchStatus) -> bool {
    let config = service.config();
    let trigger = paths
        .iter()
        .map(|p| rel_path(p, &config.root))
        .collect::<Vec<_>>()
        .join(", ");

    let result = match classify(paths, &config.config_path, &config.pages_dir(), &config.cache_dir()) {
        Action::ReloadConfig => service.reload_config().map(|changed| {
            if changed {
                Some(CacheStatus::Miss)
            } else {
                None
            }
        }),
        Action::Reload => service.reload().map(Some),
        Action::Ignore => return false,
    };

    match result {
        Ok(Some(CacheStatus::Hit)) => {
            status.unchanged(&format!("{trigger}: index unchanged"));
            true
        }
        Ok(Some(_)) => {
            let pages = service.index().instances().len();
            status.success(&format!("{trigger}: reindexed {pages} pages"));
            true
        }
        Ok(None) => {
            status.unchanged(&format!("{trigger}: configuration unchanged"));
            false
        }
        Err(err) => {
            status.error(&format!("{trigger}: reload failed"), &format!("{err:#}"));
            false
        }
    }
}

// =============================================================================
// Public API
// =============================================================================

fn setup_watchers(watcher: &mut impl Watcher, service: &PageService) -> Result<()> {
    let config = service.config();
    let pages = config.pages_dir();
    watcher
        .watch(&pages, RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch pages: {}", pages.display()))?;
    log!("watch"; "pages: {}/", rel_path(&pages, &config.root));

    if config.config_path.exists() {
        watcher
            .watch(&config.config_path, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch config: {}", config.config_path.display()))?;
        log!("watch"; "config: {}", rel_path(&config.config_path, &config.root));
    }
    Ok(())
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

/// Watch the page tree and config file, reloading `service` on change.
/// Blocks until the watcher channel closes.
pub fn watch_blocking(service: &PageService) -> Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("failed to create file watcher")?;
    setup_watchers(&mut watcher, service)?;

    let mut debouncer = Debouncer::new();
    let mut status = WatchStatus::new();

    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) if is_relevant(&event) && !debouncer.in_cooldown() => {
                debouncer.add(event);
            }
            Ok(Err(e)) => log!("watch"; "error: {e}"),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) if debouncer.ready() => {
                if handle_changes(&debouncer.take(), service, &mut status) {
                    debouncer.mark_reload();
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            _ => {}
        }
    }

    Ok(())
}

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::OrchestratorConfig;
use crate::routing::RoutingPolicy;
use crate::{Error, ErrorContext, Result};

/// Re-read `path` and swap its routing table into `policy`.
///
/// On any error the current table stays in place and the error is returned.
pub fn reload_routes(path: &Path, policy: &RoutingPolicy) -> Result<()> {
    let table = OrchestratorConfig::from_file(path)?.to_routing_table()?;
    if *policy.table() == table {
        debug!(path = %path.display(), "routes unchanged");
        return Ok(());
    }
    policy.swap_table(table);
    info!(path = %path.display(), "routing table reloaded");
    Ok(())
}

/// Watches a config file and hot-swaps the routing table when it changes.
///
/// The parent directory is watched so editors that replace the file on save still trigger
/// a reload. Invalid files are logged and ignored. Dropping the watcher stops it.
pub struct ConfigWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl ConfigWatcher {
    /// Must be called from within a tokio runtime.
    pub fn spawn(path: impl Into<PathBuf>, policy: Arc<RoutingPolicy>) -> Result<Self> {
        let path: PathBuf = path.into();
        let file_name = path.file_name().map(|n| n.to_os_string()).ok_or_else(|| {
            Error::configuration_with_context(
                "config path has no file name",
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("config_watcher"),
            )
        })?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let watched = path.clone();
        let task = tokio::spawn(async move {
            while let Some(res) = rx.recv().await {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "config watcher error");
                        continue;
                    }
                };
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    continue;
                }
                if !event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == Some(file_name.as_os_str()))
                {
                    continue;
                }
                if let Err(e) = reload_routes(&watched, &policy) {
                    warn!(path = %watched.display(), error = %e, "config reload failed; keeping previous routes");
                }
            }
        });

        info!(path = %path.display(), "watching config for route changes");
        Ok(Self {
            path,
            _watcher: watcher,
            task,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

//! Server lifecycle: `Starting → Listening → ShuttingDown → Stopped`.
//!
//! The phase lives in a [`tokio::sync::watch`] channel so the request guard
//! middleware can refuse new work as soon as a shutdown signal arrives, while
//! `main` drives the drain and the purge of the working roots.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use imgpack_core::{PurgeReport, WorkspaceRoots, cleanup};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Listening,
    ShuttingDown,
    Stopped,
}

impl Phase {
    fn can_advance_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Starting, Phase::Listening)
                | (Phase::Listening, Phase::ShuttingDown)
                | (Phase::ShuttingDown, Phase::Stopped)
        )
    }
}

/// Shared handle on the current [`Phase`].
#[derive(Debug, Clone)]
pub struct Lifecycle {
    tx: Arc<watch::Sender<Phase>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Phase::Starting);
        Self { tx: Arc::new(tx) }
    }

    pub fn phase(&self) -> Phase {
        *self.tx.borrow()
    }

    /// Move to `next`.  Returns `false` (and leaves the phase alone) for any
    /// transition outside the state machine.
    pub fn advance(&self, next: Phase) -> bool {
        let mut from = self.phase();
        let moved = self.tx.send_if_modified(|current| {
            from = *current;
            if current.can_advance_to(next) {
                *current = next;
                true
            } else {
                false
            }
        });
        if moved {
            info!(?from, to = ?next, "lifecycle transition");
        } else {
            warn!(?from, to = ?next, "ignored invalid lifecycle transition");
        }
        moved
    }

    /// Resolve once the phase reaches `phase` (or has already passed it).
    pub async fn reached(&self, phase: Phase) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|p| *p as u8 >= phase as u8).await;
    }
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received,
/// after moving the lifecycle into [`Phase::ShuttingDown`].
pub async fn shutdown_signal(lifecycle: Lifecycle) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c   => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; draining in-flight requests");
    lifecycle.advance(Phase::ShuttingDown);
}

/// Run `server` until it stops on its own, or until shutdown begins and the
/// graceful drain either completes or exceeds `drain_timeout`.
///
/// Returns `Ok(true)` when every in-flight request finished, `Ok(false)` when
/// the drain timed out.
pub async fn drain<F>(server: F, lifecycle: &Lifecycle, drain_timeout: Duration) -> std::io::Result<bool>
where
    F: IntoFuture<Output = std::io::Result<()>>,
{
    let server = server.into_future();
    tokio::pin!(server);

    tokio::select! {
        res = &mut server => return res.map(|()| true),
        _ = lifecycle.reached(Phase::ShuttingDown) => {}
    }

    match tokio::time::timeout(drain_timeout, &mut server).await {
        Ok(res) => res.map(|()| true),
        Err(_) => {
            warn!(
                timeout_secs = drain_timeout.as_secs(),
                "drain timed out; purging with requests still in flight"
            );
            Ok(false)
        }
    }
}

/// Tear down `runtime`, abandoning blocking tasks still running after
/// `grace`.  Conversions cut off by their timeout cannot be cancelled, so a
/// plain drop of the runtime could hang the process indefinitely.
pub fn shutdown_runtime(runtime: tokio::runtime::Runtime, grace: Duration) {
    let started = std::time::Instant::now();
    runtime.shutdown_timeout(grace);
    if started.elapsed() >= grace {
        warn!(grace_secs = grace.as_secs(), "abandoned blocking work still running at exit");
    }
}

/// Ask the platform to open `url` in the default browser.  Failures are only
/// logged.
pub async fn open_browser(url: String) {
    let mut command = browser_command(&url);
    match command.status().await {
        Ok(status) if status.success() => info!(%url, "browser opened"),
        Ok(status) => warn!(%url, %status, "browser launcher exited unsuccessfully"),
        Err(e) => warn!(%url, error = %e, "failed to open browser"),
    }
}

fn browser_command(url: &str) -> tokio::process::Command {
    #[cfg(target_os = "macos")]
    let command = {
        let mut c = tokio::process::Command::new("open");
        c.arg(url);
        c
    };

    #[cfg(target_os = "windows")]
    let command = {
        let mut c = tokio::process::Command::new("cmd");
        c.args(["/C", "start", "", url]);
        c
    };

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let command = {
        let mut c = tokio::process::Command::new("xdg-open");
        c.arg(url);
        c
    };

    command
}

/// Empty the uploads and downloads roots.
pub async fn purge_working_dirs(roots: &WorkspaceRoots) -> PurgeReport {
    let uploads = roots.uploads().to_path_buf();
    let downloads = roots.downloads().to_path_buf();
    let joined = tokio::task::spawn_blocking(move || {
        cleanup::purge_dir(&uploads).merge(cleanup::purge_dir(&downloads))
    })
    .await;

    match joined {
        Ok(report) => report,
        Err(e) => {
            warn!(error = %e, "purge task failed");
            PurgeReport { removed: 0, failed: 1 }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn follows_the_state_machine() {
        let lc = Lifecycle::new();
        assert_eq!(lc.phase(), Phase::Starting);
        assert!(!lc.advance(Phase::ShuttingDown));
        assert!(lc.advance(Phase::Listening));
        assert!(!lc.advance(Phase::Starting));
        assert!(lc.advance(Phase::ShuttingDown));
        assert!(lc.advance(Phase::Stopped));
        assert!(!lc.advance(Phase::Listening));
        assert_eq!(lc.phase(), Phase::Stopped);
    }

    #[tokio::test]
    async fn reached_wakes_on_transition() {
        let lc = Lifecycle::new();
        lc.advance(Phase::Listening);

        let waiter = {
            let lc = lc.clone();
            tokio::spawn(async move { lc.reached(Phase::ShuttingDown).await })
        };
        lc.advance(Phase::ShuttingDown);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn drain_reports_clean_finish() {
        let lc = Lifecycle::new();
        lc.advance(Phase::Listening);
        let server = {
            let lc = lc.clone();
            async move {
                lc.reached(Phase::ShuttingDown).await;
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok::<(), std::io::Error>(())
            }
        };
        lc.advance(Phase::ShuttingDown);

        assert!(drain(server, &lc, Duration::from_secs(5)).await.unwrap());
    }

    #[tokio::test]
    async fn drain_gives_up_after_timeout() {
        let lc = Lifecycle::new();
        lc.advance(Phase::Listening);
        lc.advance(Phase::ShuttingDown);
        let stuck = std::future::pending::<std::io::Result<()>>();

        assert!(!drain(stuck, &lc, Duration::from_millis(20)).await.unwrap());
    }

    #[test]
    fn runtime_shutdown_does_not_wait_for_stuck_blocking_work() {
        let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build().unwrap();
        let (release, stuck) = std::sync::mpsc::channel::<()>();
        let (running_tx, running) = std::sync::mpsc::channel::<()>();
        runtime.spawn_blocking(move || {
            let _ = running_tx.send(());
            let _ = stuck.recv();
        });
        running.recv().unwrap();

        let started = std::time::Instant::now();
        shutdown_runtime(runtime, Duration::from_millis(50));

        assert!(started.elapsed() < Duration::from_secs(5));
        drop(release);
    }

    #[tokio::test]
    async fn purge_empties_both_roots() {
        let tmp = tempfile::tempdir().unwrap();
        let roots = WorkspaceRoots::new(tmp.path().join("uploads"), tmp.path().join("downloads"));
        roots.ensure().unwrap();
        let ws = roots.create().unwrap();
        ws.store("a.png", "image/png", b"x").unwrap();
        imgpack_core::archive::build_archive(&ws, &["a.png"]).unwrap();

        let report = purge_working_dirs(&roots).await;

        assert!(report.is_clean());
        assert_eq!(std::fs::read_dir(roots.uploads()).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(roots.downloads()).unwrap().count(), 0);
    }
}

//! Cleanup of generated certificate material on shutdown
//!
//! A [`LifecycleGuard`] goes through three states exactly once: armed while
//! it waits for a signal, cleaning while it removes its files, and
//! terminated once the process exits. Cleaning consumes the guard, so it
//! can't be armed again.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use tracing::{debug, info};

/// Interrupt and termination notifications for the current process
pub struct ShutdownSignal {
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    /// Start listening for SIGINT and SIGTERM (Ctrl+C on other platforms).
    ///
    /// Must be called from within a tokio runtime.
    pub fn install() -> io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            Ok(Self {
                sigint: signal(SignalKind::interrupt())?,
                sigterm: signal(SignalKind::terminate())?,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Wait for the first signal and return its name
    pub async fn recv(self) -> &'static str {
        #[cfg(unix)]
        {
            let Self {
                mut sigint,
                mut sigterm,
            } = self;

            tokio::select! {
                _ = sigint.recv() => "SIGINT",
                _ = sigterm.recv() => "SIGTERM",
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            "Ctrl+C"
        }
    }
}

/// Deletes a fixed set of files when the process is asked to stop
#[derive(Debug)]
pub struct LifecycleGuard {
    paths: Vec<PathBuf>,
}

impl LifecycleGuard {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Arm a guard for `paths` for the rest of the process lifetime.
    ///
    /// On the first SIGINT or SIGTERM the files are removed and the process
    /// exits with status 0. In-flight requests are not drained. Only a
    /// failure to install the signal listeners is reported.
    pub fn register<I, P>(paths: I) -> io::Result<()>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let guard = Self::new(paths);
        let signal = ShutdownSignal::install()?;

        tokio::spawn(async move {
            guard
                .wait_and_clean(async {
                    let name = signal.recv().await;
                    info!("Received {}, shutting down...", name);
                })
                .await;
            std::process::exit(0);
        });

        Ok(())
    }

    /// Wait for `signal` to complete, then clean up.
    ///
    /// Returns the number of files removed.
    pub async fn wait_and_clean<F>(self, signal: F) -> usize
    where
        F: Future<Output = ()>,
    {
        debug!("Lifecycle guard armed for {} file(s)", self.paths.len());
        signal.await;
        self.clean()
    }

    /// Remove every registered path, in order, best effort.
    ///
    /// A failure on one path doesn't stop the others and is not reported
    /// beyond a debug log. Returns the number of files removed.
    pub fn clean(self) -> usize {
        debug!("Lifecycle guard cleaning {} file(s)", self.paths.len());

        let mut removed = 0;
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => {
                    debug!("Removed {}", path.display());
                    removed += 1;
                }
                Err(e) => debug!("Could not remove {}: {}", path.display(), e),
            }
        }

        if removed > 0 {
            info!("Removed {} temporary file(s)", removed);
        }
        removed
    }
}

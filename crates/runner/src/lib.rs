//! A concurrent application runner that manages long-running processes with graceful shutdown.
//!
//! This runner orchestrates multiple app processes and cleanup functions, providing:
//! - Concurrent execution of named processes
//! - Graceful shutdown on SIGTERM/SIGINT
//! - A bounded drain window so in-flight work can finish before tasks are aborted
//! - Cleanup execution regardless of process outcome
//!
//! # Example
//!
//! ```no_run
//! use meterflow_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let runner = Runner::new()
//!         .with_app_process(|ctx| async move {
//!             loop {
//!                 tokio::select! {
//!                     _ = ctx.cancelled() => break,
//!                     _ = tokio::time::sleep(Duration::from_secs(1)) => {
//!                         tracing::info!("Process working...");
//!                     }
//!                 }
//!             }
//!             Ok(())
//!         })
//!         .with_closer(|| async move {
//!             tracing::info!("Cleaning up resources");
//!             Ok(())
//!         })
//!         .with_drain_timeout(Duration::from_secs(30));
//!
//!     runner.run().await;
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Future returned by an app process or closer
pub type ProcessFuture = Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>>;

/// Type alias for an app process function.
/// Takes a cancellation token and returns a future that resolves to Result<(), anyhow::Error>
pub type AppProcess = Box<dyn FnOnce(CancellationToken) -> ProcessFuture + Send>;

/// Type alias for a closer function.
pub type Closer = Box<dyn FnOnce() -> ProcessFuture + Send>;

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// Cancelled by a signal or the token, or every process finished on its own
    Shutdown,
    /// A process failed and brought the others down
    Failed(anyhow::Error),
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Shutdown => 0,
            Self::Failed(_) => 1,
        }
    }
}

struct NamedProcess {
    name: String,
    process: AppProcess,
}

/// A concurrent application runner that manages long-running processes with graceful shutdown.
///
/// - App processes run concurrently until one fails or a shutdown signal is received
/// - On shutdown every process gets the drain window to return before it is aborted
/// - Closers execute afterward, regardless of process outcome
pub struct Runner {
    app_processes: Vec<NamedProcess>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    drain_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// Creates a new Runner with default configuration.
    ///
    /// Default settings:
    /// - Drain timeout: 30 seconds
    /// - Closer timeout: 10 seconds
    pub fn new() -> Self {
        Self {
            app_processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            drain_timeout: Duration::from_secs(30),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Adds an anonymous app process to the runner.
    pub fn with_app_process<F, Fut>(self, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        let name = format!("process_{}", self.app_processes.len());
        self.with_named_process(name, move |token| -> ProcessFuture { Box::pin(process(token)) })
    }

    /// Adds a named app process to the runner. The name appears in every log line about it.
    ///
    /// If any process returns an error, all processes are cancelled and closers are executed.
    pub fn with_named_process<F>(mut self, name: impl Into<String>, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> ProcessFuture + Send + 'static,
    {
        self.app_processes.push(NamedProcess {
            name: name.into(),
            process: Box::new(process),
        });
        self
    }

    /// Adds a closer to the runner.
    ///
    /// Closers are executed after all app processes have stopped.
    /// All closers will attempt to execute even if some fail.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.closers.push(Box::new(move || -> ProcessFuture { Box::pin(closer()) }));
        self
    }

    /// Sets the timeout for executing closers.
    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Sets how long processes may keep running after cancellation before being aborted.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Sets a custom cancellation token for external control over shutdown.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Runs all app processes until shutdown, then exits the application.
    ///
    /// Exit code is 0 after a signal-initiated shutdown and 1 if a process failed.
    pub async fn run(self) {
        spawn_signal_handlers(self.cancellation_token.clone());

        let outcome = self.execute().await;
        match &outcome {
            RunOutcome::Failed(err) => {
                tracing::error!("Application exiting with error: {:#}", err);
            }
            RunOutcome::Shutdown => {
                tracing::info!("Application exiting normally");
            }
        }
        std::process::exit(outcome.exit_code());
    }

    /// Runs all app processes, drains them, then runs closers. Does not install signal
    /// handlers or exit.
    pub async fn execute(self) -> RunOutcome {
        let token = self.cancellation_token;
        let mut join_set = JoinSet::new();

        for NamedProcess { name, process } in self.app_processes {
            let process_token = token.clone();
            tracing::info!(process = %name, "Starting app process");
            join_set.spawn(async move {
                let result = process(process_token).await;
                (name, result)
            });
        }

        // Wait for cancellation or the first failure
        let mut first_error = None;
        while !token.is_cancelled() {
            let result = tokio::select! {
                _ = token.cancelled() => break,
                result = join_set.join_next() => result,
            };

            match result {
                None => break,
                Some(Ok((name, Ok(())))) => {
                    tracing::debug!(process = %name, "App process completed successfully");
                }
                Some(Ok((name, Err(err)))) => {
                    tracing::error!(process = %name, "App process error: {:#}", err);
                    first_error = Some(err);
                    token.cancel();
                }
                Some(Err(err)) => {
                    tracing::error!("App process panicked: {}", err);
                    first_error = Some(anyhow::anyhow!("app process panicked: {}", err));
                    token.cancel();
                }
            }
        }

        Self::drain(&mut join_set, self.drain_timeout).await;

        if !self.closers.is_empty() {
            tracing::info!("Running closers with timeout of {:?}", self.closer_timeout);

            match tokio::time::timeout(self.closer_timeout, Self::run_closers_static(self.closers))
                .await
            {
                Ok(()) => tracing::info!("All closers completed"),
                Err(_) => tracing::error!("Closers timed out after {:?}", self.closer_timeout),
            }
        }

        match first_error {
            Some(err) => RunOutcome::Failed(err),
            None => RunOutcome::Shutdown,
        }
    }

    /// Wait for processes to return on their own, aborting whatever is left at the deadline.
    async fn drain(join_set: &mut JoinSet<(String, Result<(), anyhow::Error>)>, timeout: Duration) {
        if join_set.is_empty() {
            return;
        }
        tracing::info!(remaining = join_set.len(), "Draining app processes with timeout of {:?}", timeout);

        let drained = tokio::time::timeout(timeout, async {
            while let Some(result) = join_set.join_next().await {
                match result {
                    Ok((name, Ok(()))) => tracing::info!(process = %name, "App process stopped"),
                    Ok((name, Err(err))) => {
                        tracing::error!(process = %name, "App process error during shutdown: {:#}", err)
                    }
                    Err(err) if err.is_cancelled() => {}
                    Err(err) => tracing::error!("App process panicked during shutdown: {}", err),
                }
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = join_set.len(),
                "Drain timed out after {:?}, aborting remaining processes",
                timeout
            );
            join_set.shutdown().await;
        }
    }

    /// Runs all closers concurrently.
    async fn run_closers_static(closers: Vec<Closer>) {
        let mut closer_set = JoinSet::new();

        for closer in closers {
            closer_set.spawn(async move { closer().await });
        }

        while let Some(result) = closer_set.join_next().await {
            match result {
                Ok(Ok(())) => {
                    tracing::debug!("Closer completed successfully");
                }
                Ok(Err(err)) => {
                    tracing::error!("Closer error: {:#}", err);
                }
                Err(err) => {
                    tracing::error!("Closer panicked: {}", err);
                }
            }
        }
    }
}

fn spawn_signal_handlers(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received shutdown signal");
                ctrl_c_token.cancel();
            }
            Err(err) => {
                tracing::error!("Error setting up signal handler: {}", err);
            }
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
                token.cancel();
            }
            Err(err) => {
                tracing::error!("Error setting up SIGTERM handler: {}", err);
            }
        }
    });
}

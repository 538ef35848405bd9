//! Update capability seam.
//!
//! The orchestrator only needs to know whether an update succeeded. What an
//! update actually does (fetching, regenerating, validating data) is owned by
//! the [`Updater`] implementation.

use crate::config::CommandConfig;
use anyhow::Context;
use async_trait::async_trait;
use std::future::Future;
use tracing::info;

/// An external operation that refreshes the cached data.
#[async_trait]
pub trait Updater: Send + Sync {
    /// Run the update to completion.
    ///
    /// # Errors
    ///
    /// Any error is reported by the orchestrator as a failed update; the
    /// freshness marker is left unchanged.
    async fn update(&self) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: Updater + ?Sized> Updater for std::sync::Arc<T> {
    async fn update(&self) -> anyhow::Result<()> {
        (**self).update().await
    }
}

#[async_trait]
impl<T: Updater + ?Sized> Updater for Box<T> {
    async fn update(&self) -> anyhow::Result<()> {
        (**self).update().await
    }
}

/// Adapts an async closure into an [`Updater`].
pub struct FnUpdater<F> {
    f: F,
}

impl<F, Fut> FnUpdater<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    /// Wrap `f`; each update awaits a fresh future from it.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Updater for FnUpdater<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn update(&self) -> anyhow::Result<()> {
        (self.f)().await
    }
}

/// Runs an external program; a non-zero exit status is a failed update.
///
/// Standard output and error are inherited so the program's own progress
/// stays visible to the caller.
#[derive(Debug, Clone)]
pub struct CommandUpdater {
    program: String,
    args: Vec<String>,
}

impl CommandUpdater {
    /// Updater running `program` with `args`.
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Updater described by a config entry.
    #[must_use]
    pub fn from_config(config: &CommandConfig) -> Self {
        Self::new(config.program.clone(), config.args.iter().cloned())
    }

    /// Program name.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl Updater for CommandUpdater {
    async fn update(&self) -> anyhow::Result<()> {
        info!(program = %self.program, args = ?self.args, "running update command");
        let status = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .status()
            .await
            .with_context(|| format!("cannot run update command `{}`", self.program))?;

        if !status.success() {
            anyhow::bail!("update command `{}` exited with {status}", self.program);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn fn_updater_invokes_closure_each_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let updater = FnUpdater::new(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), anyhow::Error>(())
            }
        });

        updater.update().await.unwrap();
        updater.update().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fn_updater_propagates_error() {
        let updater = FnUpdater::new(|| async {
            Err::<(), _>(anyhow::anyhow!("upstream unavailable"))
        });
        let err = updater.update().await.unwrap_err();
        assert_eq!(err.to_string(), "upstream unavailable");
    }

    #[tokio::test]
    async fn boxed_updater_delegates() {
        let updater: Box<dyn Updater> =
            Box::new(FnUpdater::new(|| async { Ok::<(), anyhow::Error>(()) }));
        assert!(updater.update().await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_updater_success_and_failure() {
        assert!(CommandUpdater::new("true", Vec::<String>::new()).update().await.is_ok());

        let err = CommandUpdater::new("false", Vec::<String>::new())
            .update()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exited with"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_updater_passes_args() {
        let updater = CommandUpdater::new("sh", ["-c", "exit 3"]);
        assert!(updater.update().await.is_err());
        let updater = CommandUpdater::new("sh", ["-c", "exit 0"]);
        assert!(updater.update().await.is_ok());
    }

    #[tokio::test]
    async fn command_updater_missing_program_fails() {
        let err = CommandUpdater::new("freshen-no-such-program", Vec::<String>::new())
            .update()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot run update command"));
    }

    #[test]
    fn from_config_copies_program_and_args() {
        let updater = CommandUpdater::from_config(&CommandConfig {
            program: "make".to_owned(),
            args: vec!["data".to_owned()],
        });
        assert_eq!(updater.program(), "make");
        assert_eq!(updater.args, vec!["data".to_owned()]);
    }
}

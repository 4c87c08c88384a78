//! Runtime shutdown
//!
//! Success is decided by a final liveness check, never by the exit status of
//! the kill commands: the launcher processes detach from their helpers.

mod platform;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use application::ports::RuntimeShutdownPort;
use async_trait::async_trait;
use domain::Platform;
use tracing::{debug, info, instrument, warn};

pub use platform::{LinuxShutdown, MacOsShutdown, PlatformShutdown, WindowsShutdown};

use crate::command_runner::CommandRunner;
use crate::config::ShutdownConfig;

fn strategy_for(platform: Platform) -> Box<dyn PlatformShutdown> {
    match platform {
        Platform::MacOs => Box::new(MacOsShutdown),
        Platform::Windows => Box::new(WindowsShutdown),
        Platform::Linux => Box::new(LinuxShutdown),
    }
}

/// [`RuntimeShutdownPort`] dispatching to the host platform's commands
pub struct ShutdownManager {
    strategy: Option<Box<dyn PlatformShutdown>>,
    runner: Arc<dyn CommandRunner>,
    grace_period: Duration,
    kill_wait: Duration,
}

impl fmt::Debug for ShutdownManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownManager")
            .field("strategy", &self.strategy)
            .field("grace_period", &self.grace_period)
            .field("kill_wait", &self.kill_wait)
            .finish_non_exhaustive()
    }
}

impl ShutdownManager {
    pub fn new(config: &ShutdownConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self::for_platform(Platform::current().ok(), config, runner)
    }

    pub fn for_platform(
        platform: Option<Platform>,
        config: &ShutdownConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            strategy: platform.map(strategy_for),
            runner,
            grace_period: Duration::from_millis(config.grace_period_ms),
            kill_wait: Duration::from_millis(config.kill_wait_ms),
        }
    }
}

#[async_trait]
impl RuntimeShutdownPort for ShutdownManager {
    #[instrument(skip(self))]
    async fn shutdown(&self, force: bool) -> bool {
        let Some(strategy) = &self.strategy else {
            warn!(os = std::env::consts::OS, "No shutdown strategy for this platform");
            return false;
        };
        let runner = self.runner.as_ref();

        if !force {
            strategy.request_quit(runner).await;
            tokio::time::sleep(self.grace_period).await;
            if !strategy.is_running(runner).await {
                info!("Runtime quit gracefully");
                return true;
            }
            debug!("Runtime still alive after grace period, killing");
        }

        strategy.kill(runner, force).await;
        tokio::time::sleep(self.kill_wait).await;

        let stopped = !strategy.is_running(runner).await;
        if stopped {
            info!(force, "Runtime terminated");
        } else {
            warn!(force, "Runtime still running after kill");
        }
        stopped
    }

    async fn is_process_running(&self) -> bool {
        match &self.strategy {
            Some(strategy) => strategy.is_running(self.runner.as_ref()).await,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::CommandOutput;
    use crate::command_runner::fake::FakeCommandRunner;

    fn manager(platform: Option<Platform>, runner: Arc<FakeCommandRunner>) -> ShutdownManager {
        ShutdownManager::for_platform(platform, &ShutdownConfig::default(), runner)
    }

    #[tokio::test(start_paused = true)]
    async fn graceful_quit_skips_kill() {
        let runner = Arc::new(FakeCommandRunner::new());
        runner.answer("pgrep", CommandOutput::failed(1, ""));
        let manager = manager(Some(Platform::MacOs), Arc::clone(&runner));

        assert!(manager.shutdown(false).await);

        assert!(runner.called("osascript"));
        assert!(!runner.called("pkill"));
    }

    #[tokio::test(start_paused = true)]
    async fn kill_follows_failed_graceful_quit() {
        let runner = Arc::new(FakeCommandRunner::new());
        // alive after grace period (ollama), then gone after kill
        runner
            .answer("pgrep", CommandOutput::ok("4242"))
            .answer("pgrep", CommandOutput::failed(1, ""));
        let manager = manager(Some(Platform::MacOs), Arc::clone(&runner));

        assert!(manager.shutdown(false).await);

        assert!(runner.called("pkill -x ollama"));
        assert!(!runner.called("pkill -9"));
    }

    #[tokio::test(start_paused = true)]
    async fn force_skips_graceful_step() {
        let runner = Arc::new(FakeCommandRunner::new());
        runner.answer("pgrep", CommandOutput::failed(1, ""));
        let manager = manager(Some(Platform::MacOs), Arc::clone(&runner));

        assert!(manager.shutdown(true).await);

        assert!(!runner.called("osascript"));
        assert!(runner.called("pkill -9 -x ollama"));
    }

    #[tokio::test(start_paused = true)]
    async fn success_comes_from_final_liveness_check() {
        let runner = Arc::new(FakeCommandRunner::new());
        // kill commands "succeed" but the process survives
        runner.answer("pkill", CommandOutput::ok(""));
        runner.answer("pgrep", CommandOutput::ok("4242"));
        let manager = manager(Some(Platform::Linux), Arc::clone(&runner));

        assert!(!manager.shutdown(false).await);
        assert!(runner.called("pkill -KILL -x ollama"));
    }

    #[tokio::test(start_paused = true)]
    async fn windows_kills_both_images() {
        let runner = Arc::new(FakeCommandRunner::new());
        runner.answer("tasklist", CommandOutput::ok("No tasks"));
        let manager = manager(Some(Platform::Windows), Arc::clone(&runner));

        assert!(manager.shutdown(true).await);
        assert!(runner.called("taskkill /F /IM ollama app.exe"));
        assert!(runner.called("taskkill /F /IM ollama.exe"));
    }

    #[tokio::test]
    async fn unsupported_platform_reports_failure() {
        let runner = Arc::new(FakeCommandRunner::new());
        let manager = manager(None, Arc::clone(&runner));

        assert!(!manager.shutdown(true).await);
        assert!(!manager.is_process_running().await);
        assert!(runner.calls().is_empty());
    }
}

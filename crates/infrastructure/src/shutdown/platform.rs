//! Per-platform termination commands

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::command_runner::CommandRunner;

/// How the runtime is asked to stop, killed and looked for on one platform
#[async_trait]
pub trait PlatformShutdown: Send + Sync + std::fmt::Debug {
    /// Ask the runtime to quit through its own surface
    async fn request_quit(&self, runner: &dyn CommandRunner);

    /// Kill the runtime by process name
    async fn kill(&self, runner: &dyn CommandRunner, force: bool);

    /// Whether a runtime process is alive
    async fn is_running(&self, runner: &dyn CommandRunner) -> bool;
}

/// Run a best-effort command; failures only get logged
async fn attempt(runner: &dyn CommandRunner, program: &str, args: &[&str]) {
    match runner.run(program, args).await {
        Ok(output) if output.success() => debug!(program, ?args, "Command succeeded"),
        // pkill/taskkill exit non-zero when nothing matched
        Ok(output) => debug!(program, ?args, code = ?output.code, "Command matched nothing or failed"),
        Err(e) => warn!(program, error = %e, "Command could not be started"),
    }
}

async fn pgrep(runner: &dyn CommandRunner, name: &str) -> bool {
    runner
        .run("pgrep", &["-x", name])
        .await
        .is_ok_and(|output| output.success())
}

#[derive(Debug, Clone, Copy)]
pub struct MacOsShutdown;

#[async_trait]
impl PlatformShutdown for MacOsShutdown {
    async fn request_quit(&self, runner: &dyn CommandRunner) {
        attempt(runner, "osascript", &["-e", "tell application \"Ollama\" to quit"]).await;
    }

    async fn kill(&self, runner: &dyn CommandRunner, force: bool) {
        let signal: &[&str] = if force { &["-9", "-x"] } else { &["-x"] };
        for name in ["Ollama", "ollama"] {
            let mut args = signal.to_vec();
            args.push(name);
            attempt(runner, "pkill", &args).await;
        }
    }

    async fn is_running(&self, runner: &dyn CommandRunner) -> bool {
        pgrep(runner, "ollama").await || pgrep(runner, "Ollama").await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WindowsShutdown;

#[async_trait]
impl PlatformShutdown for WindowsShutdown {
    async fn request_quit(&self, runner: &dyn CommandRunner) {
        attempt(runner, "taskkill", &["/IM", "ollama app.exe"]).await;
    }

    async fn kill(&self, runner: &dyn CommandRunner, _force: bool) {
        for image in ["ollama app.exe", "ollama.exe"] {
            attempt(runner, "taskkill", &["/F", "/IM", image]).await;
        }
    }

    async fn is_running(&self, runner: &dyn CommandRunner) -> bool {
        runner
            .run("tasklist", &["/FI", "IMAGENAME eq ollama.exe", "/NH"])
            .await
            .is_ok_and(|output| output.stdout.to_lowercase().contains("ollama.exe"))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LinuxShutdown;

#[async_trait]
impl PlatformShutdown for LinuxShutdown {
    async fn request_quit(&self, runner: &dyn CommandRunner) {
        attempt(runner, "pkill", &["-TERM", "-x", "ollama"]).await;
    }

    async fn kill(&self, runner: &dyn CommandRunner, _force: bool) {
        attempt(runner, "pkill", &["-KILL", "-x", "ollama"]).await;
    }

    async fn is_running(&self, runner: &dyn CommandRunner) -> bool {
        pgrep(runner, "ollama").await
    }
}

//! Server management - starting and health checking the application under test

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// Handle to the application server
///
/// When an already running server was reused there is no child process and
/// stopping the handle is a no-op.
pub struct ServerHandle {
    child: Option<Child>,
    pub base_url: String,
}

impl ServerHandle {
    /// Reuse a healthy server at `base_url` or spawn `program` and wait for it.
    pub async fn start(config: ServerConfig) -> E2eResult<Self> {
        let client = health_client()?;

        if config.reuse_existing && is_healthy(&client, &config.base_url).await {
            info!("Reusing server already running at {}", config.base_url);
            return Ok(Self {
                child: None,
                base_url: config.base_url,
            });
        }

        info!("Starting application server: {} {}", config.program, config.args.join(" "));

        let mut cmd = Command::new(&config.program);
        cmd.args(&config.args)
            .current_dir(&config.working_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().map_err(|e| {
            E2eError::ServerStartup(format!("Failed to spawn {}: {}", config.program, e))
        })?;

        let mut handle = ServerHandle {
            child: Some(child),
            base_url: config.base_url.clone(),
        };

        if let Err(e) = handle.wait_for_healthy(&client, config.startup_timeout).await {
            let _ = handle.stop();
            return Err(e);
        }

        info!("Server is healthy at {}", handle.base_url);
        Ok(handle)
    }

    /// Poll the base URL until it answers with a 2xx
    async fn wait_for_healthy(&mut self, client: &reqwest::Client, timeout: Duration) -> E2eResult<()> {
        let start = Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout {
            attempts += 1;

            if let Some(child) = self.child.as_mut() {
                if let Some(status) = child.try_wait()? {
                    return Err(E2eError::ServerStartup(format!("server exited early: {}", status)));
                }
            }

            if is_healthy(client, &self.base_url).await {
                return Ok(());
            }
            if attempts == 1 {
                info!("Waiting for server to start...");
            }

            sleep(Duration::from_millis(500)).await;
        }

        Err(E2eError::ServerHealthCheck(attempts))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// True when this handle owns the server process
    pub fn is_owned(&self) -> bool {
        self.child.is_some()
    }

    /// Stop the server if this handle started it
    pub fn stop(&mut self) -> E2eResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        info!("Stopping server (pid: {})", child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                let deadline = Instant::now() + Duration::from_secs(10);
                while Instant::now() < deadline {
                    if child.try_wait()?.is_some() {
                        return Ok(());
                    }
                    std::thread::sleep(Duration::from_millis(200));
                }
                warn!("Server ignored SIGTERM, killing it");
            }
        }

        let _ = child.kill();
        let _ = child.wait();
        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn health_client() -> E2eResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?)
}

async fn is_healthy(client: &reqwest::Client, base_url: &str) -> bool {
    match client.get(base_url).send().await {
        Ok(resp) if resp.status().is_success() => true,
        Ok(resp) => {
            debug!("Health check returned {}", resp.status());
            false
        }
        Err(e) => {
            // Connection refused is expected while the server is starting
            if !e.is_connect() {
                warn!("Health check error: {}", e);
            }
            false
        }
    }
}

/// Configuration for the application server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Program that starts the server
    pub program: String,

    pub args: Vec<String>,

    /// Directory the program runs in
    pub working_dir: PathBuf,

    /// URL that answers 2xx once the server is up
    pub base_url: String,

    /// Use a server that is already running instead of starting one
    pub reuse_existing: bool,

    pub startup_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            program: "./mvnw".to_string(),
            args: Vec::new(),
            working_dir: PathBuf::from("."),
            base_url: "http://localhost:8080".to_string(),
            reuse_existing: std::env::var_os("CI").is_none(),
            startup_timeout: Duration::from_secs(60),
        }
    }
}

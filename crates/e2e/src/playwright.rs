//! Playwright browser automation
//!
//! A long-lived Node process (`bridge.js`) owns the browser. Commands are
//! sent one JSON object per line on its stdin and answered one per line on
//! its stdout, so browser state (cookies, the open page, observed
//! responses) survives across steps.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::page::{
    ApiRequest, ApiResponse, HttpMethod, Locator, NetworkObserver, PageDriver, RequestContext,
    ResponseMatcher, WaitState,
};

const BRIDGE_SCRIPT: &str = include_str!("bridge.js");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::Playwright(format!("unknown browser: {}", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub base_url: String,

    /// Directory whose `node_modules` provides `playwright`
    pub project_dir: PathBuf,

    pub viewport_width: u32,
    pub viewport_height: u32,
    pub browser: Browser,
    pub headless: bool,
    pub slow_mo_ms: u64,

    /// Upper bound for browser launch and for any single command
    pub command_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            project_dir: PathBuf::from("."),
            viewport_width: 1280,
            viewport_height: 720,
            browser: Browser::Chromium,
            headless: true,
            slow_mo_ms: 0,
            command_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Serialize)]
struct BridgeOptions<'a> {
    base_url: &'a str,
    browser: &'static str,
    headless: bool,
    slow_mo_ms: u64,
    viewport_width: u32,
    viewport_height: u32,
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeCommand<'a> {
    Goto { url: &'a str },
    Reload,
    WaitFor { locator: &'a Locator, state: WaitState, timeout_ms: u64 },
    Attribute { locator: &'a Locator, name: &'a str },
    Click { locator: &'a Locator },
    Fill { locator: &'a Locator, value: &'a str },
    SelectOption { locator: &'a Locator, label: &'a str },
    Check { locator: &'a Locator },
    Count { locator: &'a Locator },
    TextContents { locator: &'a Locator },
    TextContent { locator: &'a Locator },
    IsEnabled { locator: &'a Locator },
    WaitForEnabled { locator: &'a Locator, timeout_ms: u64 },
    ScrollToEnd { locator: &'a Locator },
    ScrollIntoView { locator: &'a Locator },
    WaitForUrl { pattern: &'a str, timeout_ms: u64 },
    LastResponseSeq,
    WaitForResponse {
        url_contains: &'a str,
        statuses: &'a [u16],
        after_seq: u64,
        timeout_ms: u64,
    },
    Cookies,
    Request {
        method: HttpMethod,
        path: &'a str,
        body: Option<&'a serde_json::Value>,
        headers: &'a BTreeMap<String, String>,
    },
    Screenshot { path: &'a Path },
    Close,
}

impl BridgeCommand<'_> {
    fn describe(&self) -> String {
        match self {
            BridgeCommand::Goto { url } => format!("goto:{}", url),
            BridgeCommand::WaitFor { locator, .. } => format!("wait:{}", locator),
            BridgeCommand::Click { locator } => format!("click:{}", locator),
            BridgeCommand::Fill { locator, .. } => format!("fill:{}", locator),
            BridgeCommand::WaitForEnabled { locator, .. } => format!("enabled:{}", locator),
            BridgeCommand::WaitForUrl { pattern, .. } => format!("url:{}", pattern),
            BridgeCommand::WaitForResponse { url_contains, .. } => format!("response:{}", url_contains),
            BridgeCommand::Request { method, path, .. } => format!("request:{:?} {}", method, path),
            other => serde_json::to_value(other)
                .ok()
                .and_then(|v| v.get("op").and_then(|op| op.as_str()).map(String::from))
                .unwrap_or_else(|| "command".to_string()),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    command: &'a BridgeCommand<'a>,
}

#[derive(Deserialize)]
struct BridgeReply {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    timeout: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct Cookie {
    name: String,
    value: String,
}

struct BridgeIo {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// A browser page driven through the Playwright bridge
pub struct PlaywrightSession {
    io: Mutex<BridgeIo>,
    child: Mutex<Child>,
    next_id: AtomicU64,

    /// Responses up to this sequence number are ignored by waits
    response_cursor: AtomicU64,

    command_timeout: Duration,

    // Holds bridge.js for the lifetime of the process
    _script_dir: TempDir,
}

impl PlaywrightSession {
    /// Launch a browser and open an empty page
    pub async fn launch(config: &PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed(&config.project_dir)?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        let options = serde_json::to_string(&BridgeOptions {
            base_url: &config.base_url,
            browser: config.browser.as_str(),
            headless: config.headless,
            slow_mo_ms: config.slow_mo_ms,
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
        })?;

        debug!("Starting Playwright bridge: {}", script_path.display());

        let mut child = TokioCommand::new("node")
            .arg(&script_path)
            .arg(options)
            .current_dir(&config.project_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdout unavailable".to_string()))?;
        let mut lines = BufReader::new(stdout).lines();

        tokio::time::timeout(config.command_timeout, wait_ready(&mut lines))
            .await
            .map_err(|_| E2eError::Timeout("Playwright browser launch".to_string()))??;

        info!("Launched {} ({})", config.browser.as_str(), config.base_url);

        Ok(Self {
            io: Mutex::new(BridgeIo { stdin, stdout: lines }),
            child: Mutex::new(child),
            next_id: AtomicU64::new(1),
            response_cursor: AtomicU64::new(0),
            command_timeout: config.command_timeout,
            _script_dir: script_dir,
        })
    }

    /// Check if Playwright is installed
    fn check_playwright_installed(project_dir: &Path) -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .current_dir(project_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    async fn call(&self, command: BridgeCommand<'_>) -> E2eResult<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let description = command.describe();
        let mut line = serde_json::to_string(&Envelope { id, command: &command })?;
        line.push('\n');

        let mut io = self.io.lock().await;
        let reply = tokio::time::timeout(self.command_timeout, exchange(&mut io, id, &line))
            .await
            .map_err(|_| E2eError::Timeout(format!("{} (bridge unresponsive)", description)))??;

        if reply.ok {
            Ok(reply.value)
        } else if reply.timeout {
            Err(E2eError::Timeout(description))
        } else {
            Err(E2eError::Playwright(format!(
                "{}: {}",
                description,
                reply.error.unwrap_or_else(|| "unknown error".to_string())
            )))
        }
    }

    async fn call_into<T: serde::de::DeserializeOwned>(&self, command: BridgeCommand<'_>) -> E2eResult<T> {
        let value = self.call(command).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Full-page screenshot, used for failure diagnostics
    pub async fn screenshot(&self, path: &Path) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.call(BridgeCommand::Screenshot { path }).await?;
        Ok(())
    }

    /// Close the browser and wait for the bridge to exit
    pub async fn close(self) -> E2eResult<()> {
        if let Err(e) = self.call(BridgeCommand::Close).await {
            warn!("Bridge did not acknowledge close: {}", e);
        }
        let mut child = self.child.lock().await;
        match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
            Ok(status) => {
                debug!("Bridge exited: {:?}", status?);
            }
            Err(_) => {
                warn!("Bridge did not exit, killing it");
                child.kill().await?;
            }
        }
        Ok(())
    }
}

async fn wait_ready(lines: &mut Lines<BufReader<ChildStdout>>) -> E2eResult<()> {
    while let Some(line) = lines.next_line().await? {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&line) {
            if value.get("ready").and_then(|v| v.as_bool()) == Some(true) {
                return Ok(());
            }
        }
        debug!("bridge: {}", line);
    }
    Err(E2eError::Playwright("bridge exited before it was ready".to_string()))
}

async fn exchange(io: &mut BridgeIo, id: u64, line: &str) -> E2eResult<BridgeReply> {
    io.stdin.write_all(line.as_bytes()).await?;
    io.stdin.flush().await?;

    while let Some(raw) = io.stdout.next_line().await? {
        let reply: BridgeReply = match serde_json::from_str(&raw) {
            Ok(reply) => reply,
            Err(_) => {
                debug!("bridge: {}", raw);
                continue;
            }
        };
        // Late replies to commands that timed out on our side are skipped.
        if reply.id == Some(id) {
            return Ok(reply);
        }
    }
    Err(E2eError::Playwright("bridge exited".to_string()))
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

#[async_trait]
impl PageDriver for PlaywrightSession {
    async fn goto(&self, path: &str) -> E2eResult<()> {
        self.call(BridgeCommand::Goto { url: path }).await?;
        Ok(())
    }

    async fn reload(&self) -> E2eResult<()> {
        self.call(BridgeCommand::Reload).await?;
        Ok(())
    }

    async fn wait_for(&self, locator: &Locator, state: WaitState, timeout: Duration) -> E2eResult<()> {
        self.call(BridgeCommand::WaitFor {
            locator,
            state,
            timeout_ms: millis(timeout),
        })
        .await?;
        Ok(())
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>> {
        self.call_into(BridgeCommand::Attribute { locator, name }).await
    }

    async fn click(&self, locator: &Locator) -> E2eResult<()> {
        self.call(BridgeCommand::Click { locator }).await?;
        Ok(())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.call(BridgeCommand::Fill { locator, value }).await?;
        Ok(())
    }

    async fn select_option(&self, locator: &Locator, label: &str) -> E2eResult<()> {
        self.call(BridgeCommand::SelectOption { locator, label }).await?;
        Ok(())
    }

    async fn check(&self, locator: &Locator) -> E2eResult<()> {
        self.call(BridgeCommand::Check { locator }).await?;
        Ok(())
    }

    async fn count(&self, locator: &Locator) -> E2eResult<usize> {
        self.call_into(BridgeCommand::Count { locator }).await
    }

    async fn text_contents(&self, locator: &Locator) -> E2eResult<Vec<String>> {
        self.call_into(BridgeCommand::TextContents { locator }).await
    }

    async fn text_content(&self, locator: &Locator) -> E2eResult<Option<String>> {
        self.call_into(BridgeCommand::TextContent { locator }).await
    }

    async fn is_enabled(&self, locator: &Locator) -> E2eResult<bool> {
        self.call_into(BridgeCommand::IsEnabled { locator }).await
    }

    async fn wait_for_enabled(&self, locator: &Locator, timeout: Duration) -> E2eResult<()> {
        self.call(BridgeCommand::WaitForEnabled {
            locator,
            timeout_ms: millis(timeout),
        })
        .await?;
        Ok(())
    }

    async fn scroll_to_end(&self, container: &Locator) -> E2eResult<()> {
        self.call(BridgeCommand::ScrollToEnd { locator: container }).await?;
        Ok(())
    }

    async fn scroll_into_view(&self, locator: &Locator) -> E2eResult<()> {
        self.call(BridgeCommand::ScrollIntoView { locator }).await?;
        Ok(())
    }

    async fn wait_for_url(&self, pattern: &str, timeout: Duration) -> E2eResult<()> {
        self.call(BridgeCommand::WaitForUrl {
            pattern,
            timeout_ms: millis(timeout),
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl NetworkObserver for PlaywrightSession {
    async fn mark(&self) -> E2eResult<()> {
        let seq: u64 = self.call_into(BridgeCommand::LastResponseSeq).await?;
        self.response_cursor.store(seq, Ordering::SeqCst);
        Ok(())
    }

    async fn wait_for_response(&self, matcher: &ResponseMatcher, timeout: Duration) -> E2eResult<bool> {
        let seq: Option<u64> = self
            .call_into(BridgeCommand::WaitForResponse {
                url_contains: &matcher.url_contains,
                statuses: &matcher.statuses,
                after_seq: self.response_cursor.load(Ordering::SeqCst),
                timeout_ms: millis(timeout),
            })
            .await?;

        match seq {
            Some(seq) => {
                self.response_cursor.store(seq, Ordering::SeqCst);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl RequestContext for PlaywrightSession {
    async fn cookie(&self, name: &str) -> E2eResult<Option<String>> {
        let cookies: Vec<Cookie> = self.call_into(BridgeCommand::Cookies).await?;
        Ok(cookies.into_iter().find(|c| c.name == name).map(|c| c.value))
    }

    async fn request(&self, request: ApiRequest) -> E2eResult<ApiResponse> {
        self.call_into(BridgeCommand::Request {
            method: request.method,
            path: &request.path,
            body: request.body.as_ref(),
            headers: &request.headers,
        })
        .await
    }
}

//! Scenario runner that orchestrates the server, browser sessions, and steps

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::context::ScenarioContext;
use crate::entity::EntityKind;
use crate::error::{E2eError, E2eResult};
use crate::page::BrowserSession;
use crate::playwright::{PlaywrightConfig, PlaywrightSession};
use crate::selectors::SelectorRegistry;
use crate::server::{ServerConfig, ServerHandle};
use crate::spec::ScenarioSpec;
use crate::steps::StepExecutor;
use crate::table::TableConfig;

/// Result of executing a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub feature: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,

    /// Full-page capture taken when a step failed
    pub screenshot: Option<String>,
}

impl ScenarioResult {
    fn failed(spec: &ScenarioSpec, error: &E2eError) -> Self {
        Self {
            name: spec.name.clone(),
            feature: spec.feature.clone(),
            success: false,
            duration_ms: 0,
            steps: Vec::new(),
            error: Some(error.to_string()),
            screenshot: None,
        }
    }
}

/// Result of running all scenarios
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Run every step of `spec` against `session`, stopping at the first failure.
///
/// The scenario gets its own [`ScenarioContext`], dropped when it returns.
pub async fn execute_scenario<S: BrowserSession + ?Sized>(
    session: &S,
    selectors: &SelectorRegistry,
    tables: &HashMap<EntityKind, TableConfig>,
    spec: &ScenarioSpec,
) -> ScenarioResult {
    let start = Instant::now();
    let mut ctx = ScenarioContext::new();
    let mut executor = StepExecutor::new(session, selectors, &mut ctx);
    for (entity, table) in tables {
        executor = executor.with_table(*entity, table.clone());
    }

    let mut steps = Vec::new();
    let mut failure = None;

    for step in spec.all_steps() {
        let step_start = Instant::now();
        let name = step.name();
        let outcome = executor.execute(step).await;
        let duration_ms = step_start.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => {
                debug!("  ✓ {} ({} ms)", name, duration_ms);
                steps.push(StepResult {
                    step: name,
                    success: true,
                    duration_ms,
                    error: None,
                });
            }
            Err(e) => {
                let reason = e.to_string();
                warn!("  ✗ {} - {}", name, reason);
                steps.push(StepResult {
                    step: name.clone(),
                    success: false,
                    duration_ms,
                    error: Some(reason.clone()),
                });
                failure = Some(E2eError::StepFailed { step: name, reason }.to_string());
                break;
            }
        }
    }

    ScenarioResult {
        name: spec.name.clone(),
        feature: spec.feature.clone(),
        success: failure.is_none(),
        duration_ms: start.elapsed().as_millis() as u64,
        steps,
        error: failure,
        screenshot: None,
    }
}

/// Main E2E scenario runner
pub struct ScenarioRunner {
    config: RunnerConfig,
    selectors: SelectorRegistry,

    /// Running server handle (if any)
    server: Option<ServerHandle>,
}

impl ScenarioRunner {
    /// Create a runner with the builtin selectors plus any configured file
    pub fn with_config(config: RunnerConfig) -> E2eResult<Self> {
        let mut selectors = SelectorRegistry::builtin()?;
        if let Some(path) = &config.selectors_file {
            selectors.merge_file(path)?;
        }

        Ok(Self {
            config,
            selectors,
            server: None,
        })
    }

    /// Start (or reuse) the application server
    pub async fn start_server(&mut self) -> E2eResult<()> {
        if self.server.is_some() || !self.config.manage_server {
            return Ok(());
        }

        let server = ServerHandle::start(self.config.server.clone()).await?;
        self.config.playwright.base_url = server.base_url().to_string();
        self.server = Some(server);
        Ok(())
    }

    pub fn stop_server(&mut self) -> E2eResult<()> {
        if let Some(mut server) = self.server.take() {
            server.stop()?;
        }
        Ok(())
    }

    pub fn load_scenarios(&self) -> E2eResult<Vec<ScenarioSpec>> {
        ScenarioSpec::load_all(&self.config.specs_dir)
    }

    pub async fn run_all(&mut self) -> E2eResult<SuiteResult> {
        let specs = self.load_scenarios()?;
        self.run_specs(&specs).await
    }

    pub async fn run_tagged(&mut self, tag: &str) -> E2eResult<SuiteResult> {
        let specs = self.load_scenarios()?;
        let filtered: Vec<ScenarioSpec> = ScenarioSpec::filter_by_tag(&specs, tag)
            .into_iter()
            .cloned()
            .collect();
        self.run_specs(&filtered).await
    }

    /// Run a specific scenario by name
    pub async fn run_named(&mut self, name: &str) -> E2eResult<ScenarioResult> {
        let spec = self
            .load_scenarios()?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::SpecParse(format!("Scenario not found: {}", name)))?;

        self.start_server().await?;
        self.run_spec(&spec).await
    }

    /// Run scenarios serially
    pub async fn run_specs(&mut self, specs: &[ScenarioSpec]) -> E2eResult<SuiteResult> {
        let start = Instant::now();
        let mut suite = SuiteResult {
            total: specs.len(),
            ..Default::default()
        };

        self.start_server().await?;

        info!("Running {} scenario(s)...", specs.len());

        for spec in specs {
            let result = match self.run_spec(spec).await {
                Ok(result) => result,
                Err(e) => ScenarioResult::failed(spec, &e),
            };

            if result.success {
                suite.passed += 1;
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                suite.failed += 1;
                error!("✗ {} - {}", result.name, result.error.as_deref().unwrap_or("unknown error"));
            }
            suite.results.push(result);
        }

        suite.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Scenario results: {} passed, {} failed ({} ms)",
            suite.passed, suite.failed, suite.duration_ms
        );

        Ok(suite)
    }

    /// Run one scenario in a fresh browser session
    pub async fn run_spec(&mut self, spec: &ScenarioSpec) -> E2eResult<ScenarioResult> {
        info!("Scenario: {}", spec.name);

        let session = PlaywrightSession::launch(&self.config.playwright).await?;
        let mut result = execute_scenario(&session, &self.selectors, &self.config.tables, spec).await;

        if !result.success {
            let path = self
                .config
                .output_dir
                .join("screenshots")
                .join(format!("{}.png", sanitize(&spec.name)));
            match session.screenshot(&path).await {
                Ok(()) => result.screenshot = Some(path.display().to_string()),
                Err(e) => warn!("Failure screenshot not captured: {}", e),
            }
        }

        session.close().await?;
        Ok(result)
    }

    /// Write scenario results to `test-results.json`
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

impl Drop for ScenarioRunner {
    fn drop(&mut self) {
        let _ = self.stop_server();
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Configuration for the scenario runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub server: ServerConfig,
    pub playwright: PlaywrightConfig,

    /// Start or reuse the server before running scenarios
    pub manage_server: bool,

    pub specs_dir: PathBuf,
    pub output_dir: PathBuf,

    /// Extra selector tables merged over the builtin ones
    pub selectors_file: Option<PathBuf>,

    /// Per-entity table settings replacing the defaults
    pub tables: HashMap<EntityKind, TableConfig>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            playwright: PlaywrightConfig::default(),
            manage_server: true,
            specs_dir: PathBuf::from("tests/scenarios"),
            output_dir: PathBuf::from("test-results"),
            selectors_file: None,
            tables: HashMap::new(),
        }
    }
}

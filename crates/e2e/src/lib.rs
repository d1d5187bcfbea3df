//! Pessoa E2E Test Framework
//!
//! This crate provides a Rust-controlled E2E testing framework that:
//! - Starts (or reuses) the application server
//! - Drives a browser through a persistent Playwright bridge process
//! - Parses declarative YAML scenarios
//! - Navigates lazily loaded, sortable entity tables reliably
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  E2E Scenario Runner (Rust)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioRunner                                              │
//! │    ├── ServerHandle::start() -> reuse or spawn              │
//! │    ├── PlaywrightSession::launch() per scenario             │
//! │    ├── execute_scenario(spec) -> ScenarioResult             │
//! │    └── write_results() -> test-results.json                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  StepExecutor (one ScenarioContext per scenario)             │
//! │    ├── SelectorRegistry: button/field name -> selector      │
//! │    ├── EntityApi: REST preconditions with the XSRF token    │
//! │    └── TableHelper                                          │
//! │          ├── SortNormalizer: ID column -> descending        │
//! │          └── RowLocator: bounded scroll-and-wait search     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  PageDriver + NetworkObserver + RequestContext (traits)      │
//! │    └── PlaywrightSession (bridge.js over stdin/stdout)      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod cleanup;
pub mod context;
pub mod entity;
pub mod error;
pub mod format;
pub mod page;
pub mod playwright;
pub mod runner;
pub mod selectors;
pub mod server;
pub mod spec;
pub mod steps;
pub mod table;

pub use context::ScenarioContext;
pub use entity::EntityKind;
pub use error::{E2eError, E2eResult};
pub use page::{BrowserSession, Locator, NetworkObserver, PageDriver, RequestContext};
pub use runner::ScenarioRunner;
pub use spec::{ScenarioSpec, ScenarioStep};
pub use table::{RowLocator, SortNormalizer, SortState, TableConfig, TableHelper};

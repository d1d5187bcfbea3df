//! Helpers for server-sorted, infinite-scroll entity tables
//!
//! Two operations are provided:
//! - [`SortNormalizer`] drives the ID column header into descending order so
//!   freshly created records appear at the top of the list.
//! - [`RowLocator`] finds the first row containing a text fragment, scrolling
//!   the table body to pull in more pages when the row is not rendered yet.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::page::{Locator, NetworkObserver, PageDriver, ResponseMatcher, WaitState};

/// Selectors and retry budget for one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub row_selector: String,
    pub body_selector: String,
    pub sort_header_selector: String,
    pub sort_icon_selector: String,
    pub sort_attribute: String,
    pub refresh_button_selector: String,

    /// URL fragment of the endpoint the table pages are fetched from
    pub data_endpoint: String,

    pub max_scrolls: usize,
    pub render_timeout_ms: u64,
    pub fetch_timeout_ms: u64,
    pub sort_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            row_selector: "table tbody tr".to_string(),
            body_selector: "table tbody".to_string(),
            sort_header_selector: r#"th[jhisortby="id"]"#.to_string(),
            sort_icon_selector: "svg".to_string(),
            sort_attribute: "data-icon".to_string(),
            refresh_button_selector: r#"role=button[name="Refresh List"]"#.to_string(),
            data_endpoint: "/api/pessoas".to_string(),
            max_scrolls: 10,
            render_timeout_ms: 5000,
            fetch_timeout_ms: 2000,
            sort_timeout_ms: 10000,
            poll_interval_ms: 100,
        }
    }
}

impl TableConfig {
    pub fn for_endpoint(data_endpoint: impl Into<String>) -> Self {
        Self {
            data_endpoint: data_endpoint.into(),
            ..Default::default()
        }
    }

    pub fn rows(&self) -> Locator {
        Locator::new(&self.row_selector)
    }

    pub fn body(&self) -> Locator {
        Locator::new(&self.body_selector)
    }

    pub fn sort_header(&self) -> Locator {
        Locator::new(&self.sort_header_selector)
    }

    pub fn sort_icon(&self) -> Locator {
        self.sort_header().locator(&self.sort_icon_selector)
    }

    pub fn refresh_button(&self) -> Locator {
        Locator::new(&self.refresh_button_selector)
    }

    pub fn data_responses(&self) -> ResponseMatcher {
        ResponseMatcher::new(&self.data_endpoint, &[200])
    }

    fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    fn sort_timeout(&self) -> Duration {
        Duration::from_millis(self.sort_timeout_ms)
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Direction shown by a column's sort icon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortState {
    Ascending,
    Descending,
    Unsorted,
}

impl SortState {
    /// Map the icon name rendered by the table header.
    pub fn from_indicator(indicator: Option<&str>) -> E2eResult<Self> {
        match indicator {
            Some("sort-down") => Ok(SortState::Descending),
            Some("sort-up") => Ok(SortState::Ascending),
            Some("sort") => Ok(SortState::Unsorted),
            Some(other) => Err(E2eError::UnrecognizedSortState(other.to_string())),
            None => Err(E2eError::UnrecognizedSortState("<missing>".to_string())),
        }
    }

    /// State the header moves to when activated
    pub fn next(self) -> Self {
        match self {
            SortState::Unsorted => SortState::Ascending,
            SortState::Ascending => SortState::Descending,
            SortState::Descending => SortState::Ascending,
        }
    }
}

impl fmt::Display for SortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SortState::Ascending => "ascending",
            SortState::Descending => "descending",
            SortState::Unsorted => "unsorted",
        };
        f.write_str(s)
    }
}

/// What a normalization run observed and did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOutcome {
    pub initial: SortState,
    pub activations: usize,
}

/// Forces the ID column into descending order
pub struct SortNormalizer<'a, P: ?Sized> {
    page: &'a P,
    config: &'a TableConfig,
}

impl<'a, P: PageDriver + ?Sized> SortNormalizer<'a, P> {
    pub fn new(page: &'a P, config: &'a TableConfig) -> Self {
        Self { page, config }
    }

    pub async fn current_state(&self) -> E2eResult<SortState> {
        let indicator = self
            .page
            .attribute(&self.config.sort_icon(), &self.config.sort_attribute)
            .await?;
        SortState::from_indicator(indicator.as_deref())
    }

    /// Drive the header to [`SortState::Descending`].
    ///
    /// A table already sorted descending is left untouched.
    pub async fn normalize(&self) -> E2eResult<SortOutcome> {
        let initial = self.current_state().await?;
        let mut state = initial;
        let mut activations = 0;

        // Unsorted -> Ascending -> Descending is the longest path.
        while state != SortState::Descending {
            let expected = state.next();
            debug!("Sort is {}, activating header to reach {}", state, expected);

            self.page.click(&self.config.sort_header()).await?;
            activations += 1;
            state = self.wait_for_state(expected).await?;
        }

        if activations > 0 {
            self.page
                .wait_for_enabled(&self.config.refresh_button(), self.config.sort_timeout())
                .await?;
            info!("Table sorted by ID descending after {} activation(s)", activations);
        }

        Ok(SortOutcome { initial, activations })
    }

    async fn wait_for_state(&self, expected: SortState) -> E2eResult<SortState> {
        let deadline = Instant::now() + self.config.sort_timeout();

        loop {
            let state = self.current_state().await?;
            if state == expected {
                return Ok(state);
            }
            if Instant::now() >= deadline {
                return Err(E2eError::Timeout(format!(
                    "sort indicator to become {} (still {})",
                    expected, state
                )));
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }
}

/// A matched table row, valid for the current step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowHandle {
    locator: Locator,
}

impl RowHandle {
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Locator for a control rendered inside the row
    pub fn child(&self, selector: &str) -> Locator {
        self.locator.locator(selector)
    }
}

/// Finds rows in a lazily loaded table
pub struct RowLocator<'a, P: ?Sized> {
    page: &'a P,
    config: &'a TableConfig,
}

impl<'a, P: PageDriver + NetworkObserver + ?Sized> RowLocator<'a, P> {
    pub fn new(page: &'a P, config: &'a TableConfig) -> Self {
        Self { page, config }
    }

    /// Locate the first row whose text contains `fragment`.
    pub async fn find_row(&self, fragment: &str) -> E2eResult<RowHandle> {
        self.find_row_matching(&[fragment]).await
    }

    /// Locate the first row containing every one of `fragments`.
    pub async fn find_row_matching(&self, fragments: &[&str]) -> E2eResult<RowHandle> {
        if fragments.is_empty() || fragments.iter().any(|f| f.trim().is_empty()) {
            return Err(E2eError::InvalidFragment);
        }
        let label = fragments.join(" + ");
        debug!("Looking for row containing \"{}\"", label);

        let rows = self.config.rows();
        self.page
            .wait_for(&rows.clone().first(), WaitState::Visible, self.config.render_timeout())
            .await?;

        let matching = fragments
            .iter()
            .fold(rows.clone(), |locator, fragment| locator.has_text(*fragment));

        if self.page.count(&matching).await? > 0 {
            debug!("Row found in the initially rendered page");
            return self.select(matching).await;
        }

        let body = self.config.body();
        let responses = self.config.data_responses();
        let max = self.config.max_scrolls;

        for attempt in 1..=max {
            debug!("Loading more rows... attempt {}/{}", attempt, max);

            self.page.mark().await?;
            self.page.scroll_to_end(&body).await?;

            let fetched = self
                .page
                .wait_for_response(&responses, self.config.fetch_timeout())
                .await?;
            if fetched {
                debug!("New page loaded from {}", self.config.data_endpoint);
            } else {
                debug!("No fetch observed, the table may be exhausted");
            }

            if self.page.count(&matching).await? > 0 {
                info!("Row \"{}\" found after {} scroll(s)", label, attempt);
                return self.select(matching).await;
            }
        }

        let total_rows = self.page.count(&rows).await?;
        self.log_diagnostics(&rows, &label, total_rows).await;

        Err(E2eError::RowNotFound {
            fragment: label,
            attempts: max,
            total_rows,
        })
    }

    async fn select(&self, matching: Locator) -> E2eResult<RowHandle> {
        let locator = matching.first();
        self.page.scroll_into_view(&locator).await?;
        Ok(RowHandle { locator })
    }

    async fn log_diagnostics(&self, rows: &Locator, label: &str, total_rows: usize) {
        warn!("Row \"{}\" not found. Total rows loaded: {}", label, total_rows);

        // Diagnostics only; a failure here must not mask RowNotFound.
        if let Ok(texts) = self.page.text_contents(rows).await {
            let sample = |items: &[String]| {
                items
                    .iter()
                    .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" | ")
            };
            let head = &texts[..texts.len().min(5)];
            let tail = &texts[texts.len().saturating_sub(3)..];
            warn!("First rows: {}", sample(head));
            warn!("Last rows: {}", sample(tail));
        }
    }
}

/// Sort normalization followed by row lookup, as used by the scenario steps
pub struct TableHelper<'a, P: ?Sized> {
    page: &'a P,
    config: &'a TableConfig,
}

impl<'a, P: PageDriver + NetworkObserver + ?Sized> TableHelper<'a, P> {
    pub fn new(page: &'a P, config: &'a TableConfig) -> Self {
        Self { page, config }
    }

    pub async fn sort_by_highest_id(&self) -> E2eResult<SortOutcome> {
        SortNormalizer::new(self.page, self.config).normalize().await
    }

    pub async fn find_row(&self, fragments: &[&str]) -> E2eResult<RowHandle> {
        self.sort_by_highest_id().await?;
        RowLocator::new(self.page, self.config)
            .find_row_matching(fragments)
            .await
    }

    /// Locator for rows containing every fragment, without any scrolling
    pub fn rows_containing(&self, fragments: &[&str]) -> Locator {
        fragments
            .iter()
            .fold(self.config.rows(), |locator, fragment| locator.has_text(*fragment))
    }
}

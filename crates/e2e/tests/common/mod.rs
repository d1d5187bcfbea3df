//! In-memory browser used by the integration tests
//!
//! Models a JHipster list page: a sortable ID header, a lazily loaded table
//! that renders one more page per scroll, a response log, and a small REST
//! backend reached through the browser context.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use pessoa_e2e::page::{
    ApiRequest, ApiResponse, HttpMethod, Locator, NetworkObserver, PageDriver, RequestContext,
    ResponseMatcher, WaitState,
};
use pessoa_e2e::table::TableConfig;
use pessoa_e2e::{E2eError, E2eResult};

pub const ROW_SELECTOR: &str = "table tbody tr";

/// Table settings with timeouts short enough for tests
pub fn fast_table() -> TableConfig {
    TableConfig {
        render_timeout_ms: 50,
        fetch_timeout_ms: 20,
        sort_timeout_ms: 100,
        poll_interval_ms: 5,
        ..Default::default()
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub seq: u64,
    pub url: String,
    pub status: u16,
}

#[derive(Debug)]
pub struct FakeState {
    /// Indicator on the ID header: `sort`, `sort-up`, `sort-down`, or anything else
    pub sort_indicator: Option<String>,
    /// Header clicks leave the indicator unchanged
    pub sort_stuck: bool,
    /// Attribute reads after a click that still report the previous indicator
    pub sort_lag: usize,
    pub stale_reads: usize,
    pub stale_indicator: Option<String>,
    pub header_clicks: usize,
    /// Indicator the page was showing at each header click
    pub clicked_on: Vec<Option<String>>,

    /// Every row the backend could serve, in display order
    pub rows: Vec<String>,
    pub rendered: usize,
    pub page_size: usize,
    /// Scrolling loads rows but never produces a response
    pub silent_fetches: bool,
    pub scrolls: usize,
    pub fetches: usize,

    pub responses: Vec<Response>,
    pub seq: u64,
    pub cursor: u64,
    /// `mark` and `wait_for_response` calls
    pub network_calls: usize,

    /// Responses produced when a selector is clicked
    pub click_responses: HashMap<String, (String, u16)>,
    pub clicks: Vec<String>,
    pub fills: Vec<(String, String)>,
    pub selects: Vec<(String, String)>,
    pub checked: HashSet<String>,
    pub visited: Vec<String>,
    pub reloads: usize,
    pub waits: Vec<(String, WaitState)>,

    /// Selectors that never become visible
    pub missing: HashSet<String>,
    pub disabled: HashSet<String>,
    pub texts: HashMap<String, String>,

    pub cookies: HashMap<String, String>,
    pub pessoas: BTreeMap<i64, Value>,
    pub contatos: BTreeMap<i64, Value>,
    pub next_id: i64,
    pub failing_deletes: HashSet<i64>,
    /// Paged list replies leave out the `last` flag
    pub omit_last: bool,
    pub requests: Vec<(HttpMethod, String)>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            sort_indicator: Some("sort".to_string()),
            sort_stuck: false,
            sort_lag: 0,
            stale_reads: 0,
            stale_indicator: None,
            header_clicks: 0,
            clicked_on: Vec::new(),
            rows: Vec::new(),
            rendered: 0,
            page_size: 20,
            silent_fetches: false,
            scrolls: 0,
            fetches: 0,
            responses: Vec::new(),
            seq: 0,
            cursor: 0,
            network_calls: 0,
            click_responses: HashMap::new(),
            clicks: Vec::new(),
            fills: Vec::new(),
            selects: Vec::new(),
            checked: HashSet::new(),
            visited: Vec::new(),
            reloads: 0,
            waits: Vec::new(),
            missing: HashSet::new(),
            disabled: HashSet::new(),
            texts: HashMap::new(),
            cookies: HashMap::new(),
            pessoas: BTreeMap::new(),
            contatos: BTreeMap::new(),
            next_id: 1500,
            failing_deletes: HashSet::new(),
            omit_last: false,
            requests: Vec::new(),
        }
    }
}

impl FakeState {
    fn displayed_indicator(&self) -> Option<String> {
        if self.stale_reads > 0 {
            self.stale_indicator.clone()
        } else {
            self.sort_indicator.clone()
        }
    }

    fn push_response(&mut self, url: impl Into<String>, status: u16) {
        self.seq += 1;
        self.responses.push(Response {
            seq: self.seq,
            url: url.into(),
            status,
        });
    }

    fn matching_rows(&self, locator: &Locator) -> usize {
        let matched = self.rows[..self.rendered.min(self.rows.len())]
            .iter()
            .filter(|row| locator.has_text.iter().all(|t| row.contains(t.as_str())))
            .count();
        match locator.nth {
            Some(n) => usize::from(n < matched),
            None => matched,
        }
    }

    fn count(&self, locator: &Locator) -> usize {
        if locator.selector == ROW_SELECTOR {
            return self.matching_rows(locator);
        }
        if let Some(selector) = locator.selector.strip_suffix(":checked") {
            return usize::from(self.checked.contains(selector));
        }
        usize::from(!self.missing.contains(&locator.selector))
    }

    fn rest(&mut self, request: &ApiRequest) -> ApiResponse {
        self.requests.push((request.method, request.path.clone()));

        let authorized = request.method == HttpMethod::Get
            || request.headers.get("X-XSRF-TOKEN") == self.cookies.get("XSRF-TOKEN");
        if !authorized {
            return reply(403, json!({ "title": "Forbidden" }));
        }

        let (path, query) = request.path.split_once('?').unwrap_or((request.path.as_str(), ""));
        match (request.method, path) {
            (HttpMethod::Post, "/api/pessoas") | (HttpMethod::Post, "/api/pessoa-contatoes") => {
                let id = self.next_id;
                self.next_id += 1;
                let mut body = request.body.clone().unwrap_or_else(|| json!({}));
                body["id"] = json!(id);
                if path == "/api/pessoas" {
                    self.pessoas.insert(id, body.clone());
                } else {
                    self.contatos.insert(id, body.clone());
                }
                self.push_response(path, 201);
                reply(201, body)
            }
            (HttpMethod::Get, "/api/pessoas") => {
                let param = |name: &str| {
                    query
                        .split('&')
                        .find_map(|kv| kv.strip_prefix(name).and_then(|v| v.strip_prefix('=')))
                        .and_then(|v| v.parse::<usize>().ok())
                };
                let page = param("page").unwrap_or(0);
                let size = param("size").unwrap_or(20);
                let all: Vec<Value> = self.pessoas.values().cloned().collect();
                let content: Vec<Value> = all.iter().skip(page * size).take(size).cloned().collect();
                if self.omit_last {
                    return reply(200, json!({ "content": content }));
                }
                let last = (page + 1) * size >= all.len();
                reply(200, json!({ "content": content, "last": last }))
            }
            (HttpMethod::Delete, _) => {
                let id = path
                    .rsplit('/')
                    .next()
                    .and_then(|id| id.parse::<i64>().ok())
                    .unwrap_or_default();
                if self.failing_deletes.contains(&id) {
                    return reply(500, json!({ "title": "Internal Server Error" }));
                }
                match self.pessoas.remove(&id) {
                    Some(_) => reply(204, Value::Null),
                    None => reply(404, json!({ "title": "Not Found" })),
                }
            }
            _ => reply(404, json!({ "title": "Not Found" })),
        }
    }
}

fn reply(status: u16, body: Value) -> ApiResponse {
    ApiResponse {
        status,
        body: if body.is_null() { String::new() } else { body.to_string() },
    }
}

#[derive(Debug, Default)]
pub struct FakeBrowser {
    pub state: Mutex<FakeState>,
    config: TableConfig,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::with_state(FakeState::default())
    }

    pub fn with_state(state: FakeState) -> Self {
        Self {
            state: Mutex::new(state),
            config: TableConfig::default(),
        }
    }

    /// `total` rows numbered from `total` down to 1, first page rendered
    pub fn with_rows(total: usize, page_size: usize) -> Self {
        let rows = (1..=total).rev().map(|i| format!("{} Pessoa {} 000000{:05}", i, i, i)).collect();
        Self::with_state(FakeState {
            rows,
            rendered: page_size.min(total),
            page_size,
            ..Default::default()
        })
    }

    pub fn logged_in(self) -> Self {
        self.state
            .lock()
            .unwrap()
            .cookies
            .insert("XSRF-TOKEN".to_string(), "token-123".to_string());
        self
    }

    pub fn sorted(self, indicator: &str) -> Self {
        self.state.lock().unwrap().sort_indicator = Some(indicator.to_string());
        self
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl PageDriver for FakeBrowser {
    async fn goto(&self, path: &str) -> E2eResult<()> {
        self.state().visited.push(path.to_string());
        Ok(())
    }

    async fn reload(&self) -> E2eResult<()> {
        let mut state = self.state();
        state.reloads += 1;

        // Records created through the API show up after a reload, newest first
        if !state.pessoas.is_empty() {
            let rows: Vec<String> = state
                .pessoas
                .values()
                .rev()
                .map(|p| {
                    let text = |key: &str| p[key].as_str().unwrap_or_default().to_string();
                    format!("{} {} {}{}", p["id"], text("nome"), text("cpf"), text("cnpj"))
                })
                .collect();
            state.rendered = state.page_size.min(rows.len());
            state.rows = rows;
        }

        state.push_response("/api/pessoas?page=0&size=20&sort=id,desc", 200);
        state.push_response("/api/pessoa-contatoes?page=0&size=20&sort=id,desc", 200);
        Ok(())
    }

    async fn wait_for(&self, locator: &Locator, state: WaitState, timeout: Duration) -> E2eResult<()> {
        let present = {
            let mut page = self.state();
            page.waits.push((locator.selector.clone(), state));
            page.count(locator) > 0
        };
        let reached = match state {
            WaitState::Visible | WaitState::Attached => present,
            WaitState::Hidden | WaitState::Detached => !present,
        };
        if reached {
            Ok(())
        } else {
            tokio::time::sleep(timeout.min(Duration::from_millis(10))).await;
            Err(E2eError::Timeout(format!("{} to be {:?}", locator, state)))
        }
    }

    async fn attribute(&self, _locator: &Locator, name: &str) -> E2eResult<Option<String>> {
        if name == self.config.sort_attribute {
            let mut state = self.state();
            let shown = state.displayed_indicator();
            state.stale_reads = state.stale_reads.saturating_sub(1);
            Ok(shown)
        } else {
            Ok(None)
        }
    }

    async fn click(&self, locator: &Locator) -> E2eResult<()> {
        let mut state = self.state();
        state.clicks.push(locator.to_string());

        if locator.selector == self.config.sort_header_selector {
            state.header_clicks += 1;
            let shown = state.displayed_indicator();
            state.clicked_on.push(shown);
            if !state.sort_stuck {
                state.stale_indicator = state.sort_indicator.clone();
                state.stale_reads = state.sort_lag;
                let next = match state.sort_indicator.as_deref() {
                    Some("sort-up") => "sort-down",
                    _ => "sort-up",
                };
                state.sort_indicator = Some(next.to_string());
            }
        }

        if let Some((url, status)) = state.click_responses.get(&locator.selector).cloned() {
            state.push_response(url, status);
        }
        Ok(())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.state().fills.push((locator.selector.clone(), value.to_string()));
        Ok(())
    }

    async fn select_option(&self, locator: &Locator, label: &str) -> E2eResult<()> {
        self.state().selects.push((locator.selector.clone(), label.to_string()));
        Ok(())
    }

    async fn check(&self, locator: &Locator) -> E2eResult<()> {
        self.state().checked.insert(locator.selector.clone());
        Ok(())
    }

    async fn count(&self, locator: &Locator) -> E2eResult<usize> {
        Ok(self.state().count(locator))
    }

    async fn text_contents(&self, locator: &Locator) -> E2eResult<Vec<String>> {
        let state = self.state();
        if locator.selector == ROW_SELECTOR {
            Ok(state.rows[..state.rendered.min(state.rows.len())].to_vec())
        } else {
            Ok(state.texts.get(&locator.selector).cloned().into_iter().collect())
        }
    }

    async fn text_content(&self, locator: &Locator) -> E2eResult<Option<String>> {
        Ok(self.state().texts.get(&locator.selector).cloned())
    }

    async fn is_enabled(&self, locator: &Locator) -> E2eResult<bool> {
        Ok(!self.state().disabled.contains(&locator.selector))
    }

    async fn wait_for_enabled(&self, locator: &Locator, _timeout: Duration) -> E2eResult<()> {
        if self.is_enabled(locator).await? {
            Ok(())
        } else {
            Err(E2eError::Timeout(format!("{} to be enabled", locator)))
        }
    }

    async fn scroll_to_end(&self, _container: &Locator) -> E2eResult<()> {
        let mut state = self.state();
        state.scrolls += 1;
        if state.rendered < state.rows.len() {
            state.rendered = (state.rendered + state.page_size).min(state.rows.len());
            state.fetches += 1;
            if !state.silent_fetches {
                let url = format!("/api/pessoas?page={}&size={}", state.fetches, state.page_size);
                state.push_response(url, 200);
            }
        }
        Ok(())
    }

    async fn scroll_into_view(&self, _locator: &Locator) -> E2eResult<()> {
        Ok(())
    }

    async fn wait_for_url(&self, pattern: &str, _timeout: Duration) -> E2eResult<()> {
        self.state().visited.push(pattern.to_string());
        Ok(())
    }
}

#[async_trait]
impl NetworkObserver for FakeBrowser {
    async fn mark(&self) -> E2eResult<()> {
        let mut state = self.state();
        state.network_calls += 1;
        state.cursor = state.seq;
        Ok(())
    }

    async fn wait_for_response(&self, matcher: &ResponseMatcher, _timeout: Duration) -> E2eResult<bool> {
        let mut state = self.state();
        state.network_calls += 1;
        let cursor = state.cursor;
        let found = state
            .responses
            .iter()
            .find(|r| r.seq > cursor && matcher.matches(&r.url, r.status))
            .map(|r| r.seq);

        match found {
            Some(seq) => {
                state.cursor = seq;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl RequestContext for FakeBrowser {
    async fn cookie(&self, name: &str) -> E2eResult<Option<String>> {
        Ok(self.state().cookies.get(name).cloned())
    }

    async fn request(&self, request: ApiRequest) -> E2eResult<ApiResponse> {
        Ok(self.state().rest(&request))
    }
}

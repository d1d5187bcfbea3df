//! Scenario step implementations
//!
//! Each [`ScenarioStep`] maps to a short sequence of page actions. Steps that
//! target a table row always sort the table by ID descending first and then
//! locate the row, scrolling through lazily loaded pages when needed.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info};

use crate::api::{EntityApi, EntityRef, Pessoa, PessoaContato};
use crate::context::ScenarioContext;
use crate::entity::EntityKind;
use crate::error::{E2eError, E2eResult};
use crate::page::{BrowserSession, Locator, ResponseMatcher, WaitState};
use crate::selectors::{FieldKind, SelectorRegistry};
use crate::spec::{FieldValue, RowAction, RowTarget, ScenarioStep};
use crate::table::{RowHandle, TableConfig, TableHelper};

/// Default wait for UI assertions
pub const EXPECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait for saves, deletes, and form transitions
pub const SAVE_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

const SAVE_BUTTON: &str = r#"[data-cy="entityCreateSaveButton"]"#;
const CONFIRM_DELETE_BUTTON: &str = r#"[data-cy="entityConfirmDeleteButton"]"#;
const ENTITY_MENU: &str = "#entity-menu";

/// Quote a value for use inside a Playwright selector string
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn role(role: &str, name: &str, exact: bool) -> Locator {
    let suffix = if exact { "s" } else { "i" };
    Locator::new(format!("role={}[name={}{}]", role, quote(name), suffix))
}

/// Poll `probe` until it yields `true` or `timeout` passes.
async fn wait_until<F, Fut>(timeout: Duration, mut probe: F) -> E2eResult<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<bool>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if probe().await? {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// "Nome Mae" -> "nomeMae"
fn api_key(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first
            .to_lowercase()
            .chain(chars.filter(|c| !c.is_whitespace()))
            .collect(),
        None => String::new(),
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "yes" | "sim" | "x" | "checked" | "1"
    )
}

/// Runs steps for one scenario against one browser session
pub struct StepExecutor<'a, S: ?Sized> {
    session: &'a S,
    selectors: &'a SelectorRegistry,
    ctx: &'a mut ScenarioContext,
    tables: HashMap<EntityKind, TableConfig>,
}

impl<'a, S: BrowserSession + ?Sized> StepExecutor<'a, S> {
    pub fn new(session: &'a S, selectors: &'a SelectorRegistry, ctx: &'a mut ScenarioContext) -> Self {
        Self {
            session,
            selectors,
            ctx,
            tables: HashMap::new(),
        }
    }

    /// Replace the table settings used for `entity`
    pub fn with_table(mut self, entity: EntityKind, config: TableConfig) -> Self {
        self.tables.insert(entity, config);
        self
    }

    pub fn context(&self) -> &ScenarioContext {
        &*self.ctx
    }

    fn table_for(&self, entity: EntityKind) -> TableConfig {
        self.tables.get(&entity).cloned().unwrap_or_else(|| entity.table())
    }

    pub async fn execute(&mut self, step: &ScenarioStep) -> E2eResult<()> {
        debug!("Executing step: {}", step.name());

        match step {
            ScenarioStep::OpenLogin => self.open_login().await,
            ScenarioStep::Login { username, password } => self.login(username, password).await,
            ScenarioStep::NavigateToList { entity } => self.navigate_to_list(entity).await,
            ScenarioStep::ClickButton { name } => {
                let button = self.selectors.button(name)?;
                // Buttons like Save trigger the responses later expectations wait for
                self.session.mark().await?;
                self.session.click(&button).await
            }
            ScenarioStep::ClickField { name } => {
                let field = self.selectors.field(name)?.locator();
                self.session.click(&field).await
            }
            ScenarioStep::FillForm { fields } => self.fill_form(fields).await,
            ScenarioStep::FillField { field, value } => self.fill_field(field, value).await,
            ScenarioStep::Check { field } => {
                let checkbox = self.selectors.checkbox(field)?.locator();
                self.session.check(&checkbox).await
            }
            ScenarioStep::CreatePessoa { data, reload } => self.create_pessoa(data, *reload).await,
            ScenarioStep::CreatePessoaContato { descricao } => self.create_pessoa_contato(descricao).await,
            ScenarioStep::RowAction { kind, target } => self.row_action(*kind, target).await,
            ScenarioStep::ConfirmDelete => self.confirm_delete().await,
            ScenarioStep::ExpectSuccessMessage { text } => {
                let alert = Locator::new("ngb-alert.alert-success").has_text(text);
                self.session.wait_for(&alert, WaitState::Visible, EXPECT_TIMEOUT).await
            }
            ScenarioStep::ExpectRow { target, cell, exact } => {
                self.expect_row(target, cell.as_deref(), *exact).await
            }
            ScenarioStep::ExpectNoRow { target } => self.expect_no_row(target).await,
            ScenarioStep::ExpectNoCell { text } => {
                let cell = role("cell", text, true).first();
                self.session.wait_for(&cell, WaitState::Hidden, EXPECT_TIMEOUT).await
            }
            ScenarioStep::ExpectButtonDisabled { name } => {
                let button = self.selectors.button(name)?;
                self.expect_disabled(&button).await
            }
            ScenarioStep::ExpectFieldDisabled { field } => {
                let field = self.selectors.field(field)?.locator();
                self.expect_disabled(&field).await
            }
            ScenarioStep::ExpectChecked { field, checked } => self.expect_checked(field, *checked).await,
            ScenarioStep::ExpectFieldError { field, message } => {
                let selector = &self.selectors.field(field)?.selector;
                let error = Locator::new(format!(".form-group:has({})", selector))
                    .locator(format!("text={}", quote(message)));
                self.session.wait_for(&error, WaitState::Visible, EXPECT_TIMEOUT).await
            }
            ScenarioStep::ExpectDetailsPage => {
                let entity = self.ctx.require_entity()?;
                self.session
                    .wait_for(&entity.details_heading(), WaitState::Visible, EXPECT_TIMEOUT)
                    .await
            }
            ScenarioStep::ExpectDetail { label, value } => {
                let value = self.ctx.resolve_value(value)?;
                self.expect_detail(label, &value).await
            }
            ScenarioStep::ExpectSaved => self.expect_saved().await,
            ScenarioStep::Sleep { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(())
            }
            ScenarioStep::Log { message } => {
                info!("[SCENARIO LOG] {}", message);
                Ok(())
            }
        }
    }

    async fn open_login(&self) -> E2eResult<()> {
        self.session.goto("/login").await?;
        self.session
            .wait_for(&role("heading", "Sign in", false), WaitState::Visible, EXPECT_TIMEOUT)
            .await
    }

    async fn login(&self, username: &str, password: &str) -> E2eResult<()> {
        self.session
            .fill(&Locator::new(r#"input[name="username"]"#), username)
            .await?;
        self.session
            .fill(&Locator::new(r#"input[name="password"]"#), password)
            .await?;
        self.session
            .click(&Locator::new(r#"button[type="submit"]"#))
            .await?;
        self.session
            .wait_for(&Locator::new(ENTITY_MENU), WaitState::Visible, SAVE_TIMEOUT)
            .await
    }

    async fn navigate_to_list(&mut self, entity: &str) -> E2eResult<()> {
        let entity: EntityKind = entity.parse()?;

        self.session.click(&Locator::new(ENTITY_MENU)).await?;
        self.session.click(&role("link", entity.label(), true)).await?;
        self.session
            .wait_for(&role("heading", entity.list_heading(), false), WaitState::Visible, SAVE_TIMEOUT)
            .await?;

        self.ctx.current_entity = Some(entity);
        Ok(())
    }

    async fn fill_form(&mut self, fields: &[FieldValue]) -> E2eResult<()> {
        for FieldValue { field, value } in fields {
            self.fill_field(field, value).await?;
        }
        Ok(())
    }

    async fn fill_field(&mut self, field: &str, value: &str) -> E2eResult<()> {
        let selector = self.selectors.field(field)?;
        let locator = selector.locator();
        let value = self.ctx.resolve_value(value)?;

        match selector.kind {
            FieldKind::Input | FieldKind::Datetime => self.session.fill(&locator, &value).await,
            FieldKind::Select => self.session.select_option(&locator, &value).await,
            FieldKind::Checkbox if is_truthy(&value) => self.session.check(&locator).await,
            FieldKind::Checkbox => Ok(()),
        }
    }

    async fn create_pessoa(&mut self, data: &BTreeMap<String, String>, reload: bool) -> E2eResult<()> {
        let mut body = serde_json::Map::new();
        for (label, value) in data {
            let value = self.ctx.resolve_value(value)?;
            body.insert(api_key(label), serde_json::Value::String(value));
        }
        body.insert(
            "dataRegistro".to_string(),
            serde_json::Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );

        let created: Pessoa = EntityApi::new(self.session, EntityKind::Pessoa)
            .create(&serde_json::Value::Object(body))
            .await?;
        let id = created
            .id
            .ok_or_else(|| E2eError::AssertionFailed("created Pessoa has no id".to_string()))?;
        info!("Created Pessoa {} via API", id);
        self.ctx.created_pessoa_id = Some(id);

        if reload {
            self.reload_and_wait(EntityKind::Pessoa).await?;
        }
        Ok(())
    }

    async fn create_pessoa_contato(&mut self, descricao: &str) -> E2eResult<()> {
        let pessoa_id = self.ctx.require_pessoa_id()?;
        let contato = PessoaContato {
            descricao: Some(self.ctx.resolve_value(descricao)?),
            telefone_numero_completo: Some("+55 (11) 12345-6789".to_string()),
            data_registro: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            contato: Some(EntityRef { id: pessoa_id }),
            ..Default::default()
        };

        let created: PessoaContato = EntityApi::new(self.session, EntityKind::PessoaContato)
            .create(&contato)
            .await?;
        let id = created
            .id
            .ok_or_else(|| E2eError::AssertionFailed("created Pessoa Contato has no id".to_string()))?;
        info!("Created Pessoa Contato {} via API", id);
        self.ctx.created_pessoa_contato_id = Some(id);

        self.reload_and_wait(EntityKind::PessoaContato).await
    }

    /// Reload so the UI reflects records created through the API
    async fn reload_and_wait(&self, entity: EntityKind) -> E2eResult<()> {
        self.session.mark().await?;
        self.session.reload().await?;
        let loaded = self
            .session
            .wait_for_response(&ResponseMatcher::new(entity.api_resource(), &[200]), SAVE_TIMEOUT)
            .await?;
        if !loaded {
            return Err(E2eError::Timeout(format!("{} list after reload", entity)));
        }
        Ok(())
    }

    fn row_fragments(&self, target: &RowTarget) -> E2eResult<Vec<String>> {
        let fragments = match target {
            RowTarget::GeneratedCpf => vec![self.ctx.require_cpf()?.to_string()],
            RowTarget::GeneratedCnpj => vec![self.ctx.require_cnpj()?.to_string()],
            RowTarget::GeneratedDescription => vec![self.ctx.require_description()?.to_string()],
            RowTarget::CreatedContato { descricao } => vec![
                descricao.clone(),
                self.ctx.require_pessoa_contato_id()?.to_string(),
            ],
            RowTarget::Text { value } => vec![value.clone()],
        };
        Ok(fragments)
    }

    async fn find_row(&self, target: &RowTarget) -> E2eResult<RowHandle> {
        let entity = self.ctx.require_entity()?;
        let fragments = self.row_fragments(target)?;
        let fragments: Vec<&str> = fragments.iter().map(String::as_str).collect();
        let table = self.table_for(entity);

        TableHelper::new(self.session, &table).find_row(&fragments).await
    }

    async fn row_action(&self, kind: RowAction, target: &RowTarget) -> E2eResult<()> {
        let entity = self.ctx.require_entity()?;
        let row = self.find_row(target).await?;
        self.session.click(&row.child(kind.button_selector())).await?;

        match kind {
            RowAction::View => Ok(()),
            RowAction::Edit => {
                self.session
                    .wait_for(&Locator::new(SAVE_BUTTON), WaitState::Visible, SAVE_TIMEOUT)
                    .await
            }
            RowAction::Delete => {
                self.session
                    .wait_for(&entity.delete_heading(), WaitState::Visible, EXPECT_TIMEOUT)
                    .await
            }
        }
    }

    async fn confirm_delete(&self) -> E2eResult<()> {
        let entity = self.ctx.require_entity()?;

        self.session.mark().await?;
        self.session.click(&Locator::new(CONFIRM_DELETE_BUTTON)).await?;
        let deleted = self
            .session
            .wait_for_response(&ResponseMatcher::new(entity.api_resource(), &[204]), SAVE_TIMEOUT)
            .await?;
        if !deleted {
            return Err(E2eError::Timeout(format!("{} delete response", entity)));
        }
        Ok(())
    }

    async fn expect_row(&self, target: &RowTarget, cell: Option<&str>, exact: bool) -> E2eResult<()> {
        let row = self.find_row(target).await?;
        if let Some(cell) = cell {
            let cell = row.locator().locator(role("cell", cell, exact).selector);
            self.session.wait_for(&cell, WaitState::Visible, EXPECT_TIMEOUT).await?;
        }
        Ok(())
    }

    async fn expect_no_row(&self, target: &RowTarget) -> E2eResult<()> {
        let entity = self.ctx.require_entity()?;
        let fragments = self.row_fragments(target)?;
        let fragments: Vec<&str> = fragments.iter().map(String::as_str).collect();
        let table = self.table_for(entity);

        let helper = TableHelper::new(self.session, &table);
        helper.sort_by_highest_id().await?;
        let rows = helper.rows_containing(&fragments).first();
        self.session.wait_for(&rows, WaitState::Hidden, EXPECT_TIMEOUT).await
    }

    async fn expect_disabled(&self, locator: &Locator) -> E2eResult<()> {
        let session = self.session;
        let disabled = wait_until(EXPECT_TIMEOUT, || async move {
            Ok::<_, E2eError>(!session.is_enabled(locator).await?)
        })
        .await?;

        if !disabled {
            return Err(E2eError::AssertionFailed(format!("{} should be disabled", locator)));
        }
        Ok(())
    }

    async fn expect_checked(&self, field: &str, checked: bool) -> E2eResult<()> {
        let selector = &self.selectors.checkbox(field)?.selector;
        let state = Locator::new(format!("{}:checked", selector));
        let state = &state;
        let session = self.session;

        let reached = wait_until(EXPECT_TIMEOUT, || async move {
            Ok::<_, E2eError>((session.count(state).await? > 0) == checked)
        })
        .await?;

        if !reached {
            let expected = if checked { "checked" } else { "unchecked" };
            return Err(E2eError::AssertionFailed(format!(
                "checkbox \"{}\" should be {}",
                field, expected
            )));
        }
        Ok(())
    }

    async fn expect_detail(&self, label: &str, value: &str) -> E2eResult<()> {
        let detail = Locator::new(format!("dt:text-is({}) + dd", quote(label))).first();
        let deadline = Instant::now() + EXPECT_TIMEOUT;

        loop {
            let text = self.session.text_content(&detail).await?;
            if text.as_deref().map(str::trim) == Some(value) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(E2eError::AssertionFailed(format!(
                    "detail \"{}\" should be \"{}\", found {:?}",
                    label, value, text
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn expect_saved(&self) -> E2eResult<()> {
        let entity = self.ctx.require_entity()?;
        let saved = self
            .session
            .wait_for_response(&ResponseMatcher::new(entity.api_resource(), &[200, 201]), SAVE_TIMEOUT)
            .await?;
        if !saved {
            return Err(E2eError::Timeout(format!("{} save response", entity)));
        }

        let table = self.table_for(entity);
        self.session
            .wait_for_enabled(&table.refresh_button(), SAVE_TIMEOUT)
            .await?;
        self.session
            .wait_for_url(&format!("**{}", entity.list_route()), SAVE_TIMEOUT)
            .await
    }
}

mod common;

use std::collections::HashMap;

use common::{fast_table, FakeBrowser};
use pessoa_e2e::context::ScenarioContext;
use pessoa_e2e::runner::execute_scenario;
use pessoa_e2e::selectors::SelectorRegistry;
use pessoa_e2e::steps::StepExecutor;
use pessoa_e2e::{E2eError, EntityKind, ScenarioSpec};

const SAVE: &str = r#"[data-cy="entityCreateSaveButton"]"#;
const CONFIRM_DELETE: &str = r#"[data-cy="entityConfirmDeleteButton"]"#;

fn fast_tables() -> HashMap<EntityKind, pessoa_e2e::TableConfig> {
    [EntityKind::Pessoa, EntityKind::PessoaContato]
        .into_iter()
        .map(|entity| {
            let table = pessoa_e2e::TableConfig {
                data_endpoint: entity.api_resource().to_string(),
                ..fast_table()
            };
            (entity, table)
        })
        .collect()
}

const BACKGROUND: &str = r#"
background:
  - action: open_login
  - action: login
    username: admin
    password: admin
  - action: navigate_to_list
    entity: Pessoa
"#;

fn scenario(steps: &str) -> ScenarioSpec {
    let yaml = format!("name: test\nfeature: Pessoa\n{}steps:\n{}", BACKGROUND, steps);
    ScenarioSpec::from_yaml(&yaml).unwrap()
}

/// Creating a Pessoa through the form fills generated values and waits for the save
#[tokio::test]
async fn create_through_form() {
    let page = FakeBrowser::new().logged_in();
    page.state()
        .click_responses
        .insert(SAVE.to_string(), ("/api/pessoas".to_string(), 201));

    let spec = scenario(
        r#"
  - action: click_button
    name: Create a new Pessoa
  - action: fill_form
    fields:
      - field: Nome
        value: Maria da Silva
      - field: Cpf
        value: '{{unique_cpf}}'
      - field: Tipo Pessoa
        value: PF
  - action: click_button
    name: Save
  - action: expect_saved
"#,
    );

    let selectors = SelectorRegistry::builtin().unwrap();
    let result = execute_scenario(&page, &selectors, &fast_tables(), &spec).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.steps.len(), 7);

    let state = page.state();
    assert_eq!(state.visited.first().map(String::as_str), Some("/login"));
    assert_eq!(state.visited.last().map(String::as_str), Some("**/pessoa"));
    let cpf = &state
        .fills
        .iter()
        .find(|(selector, _)| selector == r#"[data-cy="cpf"]"#)
        .unwrap()
        .1;
    assert_eq!(cpf.len(), 11);
    assert_eq!(
        state.selects,
        vec![(r#"[data-cy="tipoPessoa"]"#.to_string(), "PF".to_string())]
    );
}

/// Records created through the API are found in the table after a reload
#[tokio::test]
async fn edit_row_created_through_api() {
    let page = FakeBrowser::new().logged_in();
    let spec = scenario(
        r#"
  - action: create_pessoa
    data:
      Nome: Joao Teste
      Cpf: '{{unique_cpf}}'
      Tipo Pessoa: PF
  - action: expect_row
    target:
      by: generated_cpf
  - action: row_action
    kind: edit
    target:
      by: generated_cpf
"#,
    );

    let selectors = SelectorRegistry::builtin().unwrap();
    let result = execute_scenario(&page, &selectors, &fast_tables(), &spec).await;

    assert!(result.success, "{:?}", result.error);

    let state = page.state();
    assert_eq!(state.reloads, 1);
    let created = state.pessoas.values().next().unwrap();
    assert_eq!(created["nome"], "Joao Teste");
    assert_eq!(created["tipoPessoa"], "PF");
    assert!(created["dataRegistro"].is_string());
    assert!(state
        .clicks
        .last()
        .unwrap()
        .ends_with(r#"[data-cy="entityEditButton"]"#));
}

/// Deleting waits for the 204 from the delete endpoint
#[tokio::test]
async fn delete_confirmation_waits_for_response() {
    let page = FakeBrowser::with_rows(5, 20).logged_in();
    page.state()
        .click_responses
        .insert(CONFIRM_DELETE.to_string(), ("/api/pessoas/3".to_string(), 204));

    let spec = scenario(
        r#"
  - action: row_action
    kind: delete
    target:
      by: text
      value: '00000000003'
  - action: confirm_delete
"#,
    );

    let selectors = SelectorRegistry::builtin().unwrap();
    let result = execute_scenario(&page, &selectors, &fast_tables(), &spec).await;
    assert!(result.success, "{:?}", result.error);

    // Without the 204 the confirmation times out
    page.state().click_responses.clear();
    let result = execute_scenario(&page, &selectors, &fast_tables(), &spec).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("delete response"));
}

/// The scenario stops at the first failing step
#[tokio::test]
async fn failure_stops_scenario() {
    let page = FakeBrowser::new().logged_in();
    let spec = scenario(
        r#"
  - action: expect_button_disabled
    name: Save
  - action: log
    message: never reached
"#,
    );

    let selectors = SelectorRegistry::builtin().unwrap();
    let result = execute_scenario(&page, &selectors, &fast_tables(), &spec).await;

    assert!(!result.success);
    assert_eq!(result.steps.len(), 4);
    let last = result.steps.last().unwrap();
    assert_eq!(last.step, "expect_disabled:Save");
    assert!(last.error.as_deref().unwrap().contains("should be disabled"));
}

/// Row steps need a value generated earlier in the same scenario
#[tokio::test]
async fn row_target_requires_generated_value() {
    let page = FakeBrowser::with_rows(5, 20).logged_in();
    let selectors = SelectorRegistry::builtin().unwrap();
    let mut ctx = ScenarioContext::new();
    ctx.current_entity = Some(EntityKind::Pessoa);

    let step = serde_yaml::from_str("action: expect_row\ntarget:\n  by: generated_cnpj\n").unwrap();
    let err = StepExecutor::new(&page, &selectors, &mut ctx)
        .execute(&step)
        .await
        .unwrap_err();

    assert!(matches!(err, E2eError::MissingContext(_)), "got {err}");
    assert_eq!(page.state().header_clicks, 0);
}

/// Checkbox fields accept truthy values and can be asserted
#[tokio::test]
async fn checkbox_fields() {
    let page = FakeBrowser::new().logged_in();
    let selectors = SelectorRegistry::builtin().unwrap();
    let mut ctx = ScenarioContext::new();
    let mut executor = StepExecutor::new(&page, &selectors, &mut ctx);

    let steps: Vec<pessoa_e2e::ScenarioStep> = serde_yaml::from_str(
        r#"
- action: fill_field
  field: Preferido
  value: 'Sim'
- action: fill_field
  field: Possui Whatsapp
  value: 'false'
- action: expect_checked
  field: Preferido
- action: expect_checked
  field: Possui Whatsapp
  checked: false
"#,
    )
    .unwrap();

    for step in &steps {
        executor.execute(step).await.unwrap();
    }

    assert!(page.state().checked.contains(r#"[data-cy="preferido"]"#));
}

/// Details are compared after trimming
#[tokio::test]
async fn detail_values() {
    let page = FakeBrowser::new();
    page.state()
        .texts
        .insert(r#"dt:text-is("Nome") + dd"#.to_string(), "  Maria  ".to_string());
    let selectors = SelectorRegistry::builtin().unwrap();
    let mut ctx = ScenarioContext::new();
    let mut executor = StepExecutor::new(&page, &selectors, &mut ctx);

    let matching = serde_yaml::from_str("action: expect_detail\nlabel: Nome\nvalue: Maria\n").unwrap();
    executor.execute(&matching).await.unwrap();

    let other = serde_yaml::from_str("action: expect_detail\nlabel: Nome\nvalue: Joana\n").unwrap();
    let err = executor.execute(&other).await.unwrap_err();
    assert!(matches!(err, E2eError::AssertionFailed(_)));
}

/// Generated CPFs are compared in the masked form the detail page shows
#[tokio::test]
async fn detail_value_uses_formatted_cpf() {
    let page = FakeBrowser::new();
    page.state()
        .texts
        .insert(r#"dt:text-is("Cpf") + dd"#.to_string(), "123.456.789-01".to_string());
    let selectors = SelectorRegistry::builtin().unwrap();
    let mut ctx = ScenarioContext::new();
    ctx.generated_cpf = Some("12345678901".to_string());
    let mut executor = StepExecutor::new(&page, &selectors, &mut ctx);

    let step = serde_yaml::from_str("action: expect_detail\nlabel: Cpf\nvalue: '{{formatted_cpf}}'\n").unwrap();
    executor.execute(&step).await.unwrap();
}

//! Declarative YAML scenario specification

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{E2eError, E2eResult};

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Feature the scenario belongs to (e.g. "Pessoa")
    #[serde(default)]
    pub feature: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Steps run before `steps`, typically login and navigation
    #[serde(default)]
    pub background: Vec<ScenarioStep>,

    /// Steps to execute in order
    pub steps: Vec<ScenarioStep>,
}

/// Which row a row-targeting step operates on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum RowTarget {
    GeneratedCpf,
    GeneratedCnpj,
    GeneratedDescription,
    /// Row with this description and the Pessoa Contato id created earlier
    CreatedContato { descricao: String },
    Text { value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowAction {
    View,
    Edit,
    Delete,
}

impl RowAction {
    pub fn button_selector(&self) -> &'static str {
        match self {
            RowAction::View => r#"[data-cy="entityDetailsButton"]"#,
            RowAction::Edit => r#"[data-cy="entityEditButton"]"#,
            RowAction::Delete => r#"[data-cy="entityDeleteButton"]"#,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub field: String,
    pub value: String,
}

/// A single step in a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Open the login page and wait for the sign-in heading
    OpenLogin,

    /// Sign in through the login form
    Login { username: String, password: String },

    /// Open an entity list through the entity menu
    NavigateToList { entity: String },

    /// Click a button by its registered name
    ClickButton { name: String },

    /// Click a form field by its registered name
    ClickField { name: String },

    /// Fill several form fields; values may be placeholders
    FillForm { fields: Vec<FieldValue> },

    /// Fill one form field
    FillField { field: String, value: String },

    /// Tick a checkbox
    Check { field: String },

    /// Create a Pessoa through the API; values may be placeholders
    CreatePessoa {
        data: BTreeMap<String, String>,
        #[serde(default = "default_true")]
        reload: bool,
    },

    /// Create a Pessoa Contato linked to the Pessoa created earlier
    CreatePessoaContato { descricao: String },

    /// Click the view, edit, or delete button of a row
    RowAction { kind: RowAction, target: RowTarget },

    /// Confirm the delete dialog and wait for the 204
    ConfirmDelete,

    ExpectSuccessMessage { text: String },

    /// The row exists; optionally it shows `cell`
    ExpectRow {
        target: RowTarget,
        #[serde(default)]
        cell: Option<String>,
        #[serde(default)]
        exact: bool,
    },

    /// No rendered row matches the target
    ExpectNoRow { target: RowTarget },

    /// No cell with exactly this text is visible
    ExpectNoCell { text: String },

    ExpectButtonDisabled { name: String },

    ExpectFieldDisabled { field: String },

    ExpectChecked {
        field: String,
        #[serde(default = "default_true")]
        checked: bool,
    },

    ExpectFieldError { field: String, message: String },

    ExpectDetailsPage,

    ExpectDetail { label: String, value: String },

    /// Save answered 200/201 and the list page is shown again
    ExpectSaved,

    /// Wait for a fixed amount of time (use sparingly)
    Sleep { ms: u64 },

    /// Log a message (for debugging)
    Log { message: String },
}

fn default_true() -> bool {
    true
}

impl ScenarioStep {
    /// Short label used in logs and results
    pub fn name(&self) -> String {
        match self {
            ScenarioStep::OpenLogin => "open_login".to_string(),
            ScenarioStep::Login { username, .. } => format!("login:{}", username),
            ScenarioStep::NavigateToList { entity } => format!("navigate:{}", entity),
            ScenarioStep::ClickButton { name } => format!("click_button:{}", name),
            ScenarioStep::ClickField { name } => format!("click_field:{}", name),
            ScenarioStep::FillForm { fields } => format!("fill_form:{} field(s)", fields.len()),
            ScenarioStep::FillField { field, .. } => format!("fill:{}", field),
            ScenarioStep::Check { field } => format!("check:{}", field),
            ScenarioStep::CreatePessoa { .. } => "create_pessoa".to_string(),
            ScenarioStep::CreatePessoaContato { descricao } => format!("create_pessoa_contato:{}", descricao),
            ScenarioStep::RowAction { kind, .. } => format!("row_action:{:?}", kind).to_lowercase(),
            ScenarioStep::ConfirmDelete => "confirm_delete".to_string(),
            ScenarioStep::ExpectSuccessMessage { text } => format!("expect_success:{}", text),
            ScenarioStep::ExpectRow { .. } => "expect_row".to_string(),
            ScenarioStep::ExpectNoRow { .. } => "expect_no_row".to_string(),
            ScenarioStep::ExpectNoCell { text } => format!("expect_no_cell:{}", text),
            ScenarioStep::ExpectButtonDisabled { name } => format!("expect_disabled:{}", name),
            ScenarioStep::ExpectFieldDisabled { field } => format!("expect_field_disabled:{}", field),
            ScenarioStep::ExpectChecked { field, checked } => format!("expect_checked:{}={}", field, checked),
            ScenarioStep::ExpectFieldError { field, .. } => format!("expect_field_error:{}", field),
            ScenarioStep::ExpectDetailsPage => "expect_details_page".to_string(),
            ScenarioStep::ExpectDetail { label, .. } => format!("expect_detail:{}", label),
            ScenarioStep::ExpectSaved => "expect_saved".to_string(),
            ScenarioStep::Sleep { ms } => format!("sleep:{}ms", ms),
            ScenarioStep::Log { message } => {
                format!("log:{}", message.chars().take(30).collect::<String>())
            }
        }
    }
}

impl ScenarioSpec {
    /// Parse a scenario from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        serde_yaml::from_str(yaml).map_err(E2eError::from)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all scenarios from a directory, ordered by path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let spec = Self::from_file(entry.path())?;
            specs.push(spec);
        }

        Ok(specs)
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// Background steps followed by the scenario's own steps
    pub fn all_steps(&self) -> impl Iterator<Item = &ScenarioStep> {
        self.background.iter().chain(self.steps.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_scenario() {
        let yaml = r#"
name: create-pessoa-fisica
feature: Pessoa
tags: [pessoa, smoke]
background:
  - action: open_login
  - action: login
    username: admin
    password: admin
  - action: navigate_to_list
    entity: Pessoa
steps:
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
  - action: expect_row
    target:
      by: generated_cpf
    cell: Maria da Silva
"#;
        let spec = ScenarioSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.name, "create-pessoa-fisica");
        assert_eq!(spec.background.len(), 3);
        assert_eq!(spec.steps.len(), 5);
        assert_eq!(spec.all_steps().count(), 8);

        match &spec.steps[4] {
            ScenarioStep::ExpectRow { target, cell, exact } => {
                assert_eq!(*target, RowTarget::GeneratedCpf);
                assert_eq!(cell.as_deref(), Some("Maria da Silva"));
                assert!(!exact);
            }
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn test_parse_row_targets() {
        let yaml = r#"
name: edit-contato
steps:
  - action: create_pessoa_contato
    descricao: Contato Comercial
  - action: row_action
    kind: edit
    target:
      by: created_contato
      descricao: Contato Comercial
"#;
        let spec = ScenarioSpec::from_yaml(yaml).unwrap();
        match &spec.steps[1] {
            ScenarioStep::RowAction { kind, target } => {
                assert_eq!(*kind, RowAction::Edit);
                assert_eq!(
                    *target,
                    RowTarget::CreatedContato { descricao: "Contato Comercial".to_string() }
                );
            }
            other => panic!("unexpected step: {:?}", other),
        }
        assert_eq!(spec.steps[1].name(), "row_action:edit");

        let yaml = r#"
name: delete-contato
steps:
  - action: create_pessoa
    data:
      Nome: Joao
      Cpf: '{{unique_cpf}}'
      Tipo Pessoa: PF
  - action: expect_no_row
    target:
      by: text
      value: Joao
"#;
        let spec = ScenarioSpec::from_yaml(yaml).unwrap();
        match &spec.steps[0] {
            ScenarioStep::CreatePessoa { data, reload } => {
                assert_eq!(data.len(), 3);
                assert!(*reload);
            }
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn test_load_all_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("b.yaml"),
            "name: second\ntags: [contato]\nsteps:\n  - action: open_login\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("a.yml"),
            "name: first\ntags: [pessoa]\nsteps:\n  - action: sleep\n    ms: 10\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a scenario").unwrap();

        let specs = ScenarioSpec::load_all(dir.path()).unwrap();
        assert_eq!(specs.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), ["first", "second"]);
        assert_eq!(ScenarioSpec::filter_by_tag(&specs, "contato").len(), 1);
    }
}

//! Named UI selectors for buttons and form fields
//!
//! Each entity contributes a table of logical names. The tables are merged
//! once into a [`SelectorRegistry`]; binding a name to two different
//! selectors is an error rather than a silent override.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};
use crate::page::Locator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Input,
    Select,
    Datetime,
    Checkbox,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSelector {
    pub selector: String,
    pub kind: FieldKind,
}

impl FieldSelector {
    pub fn locator(&self) -> Locator {
        Locator::new(&self.selector)
    }
}

/// Selector tables contributed by one entity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntitySelectors {
    pub entity: String,
    #[serde(default)]
    pub buttons: BTreeMap<String, String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSelector>,
}

impl EntitySelectors {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Default::default()
        }
    }

    pub fn button(mut self, name: &str, selector: &str) -> Self {
        self.buttons.insert(name.to_string(), selector.to_string());
        self
    }

    pub fn field(mut self, name: &str, selector: &str, kind: FieldKind) -> Self {
        self.fields.insert(
            name.to_string(),
            FieldSelector {
                selector: selector.to_string(),
                kind,
            },
        );
        self
    }

    pub fn pessoa() -> Self {
        Self::new("Pessoa")
            .button("Create a new Pessoa", r#"[data-cy="entityCreateButton"]"#)
            .button("Save", r#"[data-cy="entityCreateSaveButton"]"#)
            .field("Nome", r#"[data-cy="nome"]"#, FieldKind::Input)
            .field("Cpf", r#"[data-cy="cpf"]"#, FieldKind::Input)
            .field("Cnpj", r#"[data-cy="cnpj"]"#, FieldKind::Input)
            .field("Tipo Pessoa", r#"[data-cy="tipoPessoa"]"#, FieldKind::Select)
            .field("Nome Mae", r#"[data-cy="nomeMae"]"#, FieldKind::Input)
    }

    pub fn pessoa_contato() -> Self {
        Self::new("Pessoa Contato")
            .button("Create a new Pessoa Contato", r#"[data-cy="entityCreateButton"]"#)
            .button("Save", r#"[data-cy="entityCreateSaveButton"]"#)
            .field("Descricao", r#"[data-cy="descricao"]"#, FieldKind::Input)
            .field("Contato Digital Ident", r#"[data-cy="contatoDigitalIdent"]"#, FieldKind::Input)
            .field("Telefone Numero Completo", r#"[data-cy="telefoneNumeroCompleto"]"#, FieldKind::Input)
            .field("Telefone Ddd", r#"[data-cy="telefoneDdd"]"#, FieldKind::Input)
            .field("Telefone Numero", r#"[data-cy="telefoneNumero"]"#, FieldKind::Input)
            .field("Data Registro", r#"[data-cy="dataRegistro"]"#, FieldKind::Datetime)
            .field("Data Importacao", r#"[data-cy="dataImportacao"]"#, FieldKind::Datetime)
            .field("Data Exclusao", r#"[data-cy="dataExclusao"]"#, FieldKind::Datetime)
            .field("Contato", r#"[data-cy="contato"]"#, FieldKind::Select)
            .field("Preferido", r#"[data-cy="preferido"]"#, FieldKind::Checkbox)
            .field("Receber Propagandas", r#"[data-cy="receberPropagandas"]"#, FieldKind::Checkbox)
            .field("Receber Confirmacoes", r#"[data-cy="receberConfirmacoes"]"#, FieldKind::Checkbox)
            .field("Possui Whatsapp", r#"[data-cy="possuiWhatsapp"]"#, FieldKind::Checkbox)
    }
}

/// Merged lookup of every button and field name
#[derive(Debug, Clone, Default)]
pub struct SelectorRegistry {
    buttons: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldSelector>,
}

impl SelectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the Pessoa and Pessoa Contato tables
    pub fn builtin() -> E2eResult<Self> {
        let mut registry = Self::new();
        registry.merge(EntitySelectors::pessoa())?;
        registry.merge(EntitySelectors::pessoa_contato())?;
        Ok(registry)
    }

    /// Add `tables` to the registry.
    ///
    /// Nothing is inserted when any incoming name is already bound elsewhere.
    pub fn merge(&mut self, tables: EntitySelectors) -> E2eResult<()> {
        for (name, selector) in &tables.buttons {
            if let Some(existing) = self.buttons.get(name) {
                if existing != selector {
                    return Err(E2eError::SelectorConflict {
                        name: name.clone(),
                        existing: existing.clone(),
                        incoming: selector.clone(),
                    });
                }
            }
        }

        for (name, field) in &tables.fields {
            if let Some(existing) = self.fields.get(name) {
                if existing != field {
                    return Err(E2eError::SelectorConflict {
                        name: name.clone(),
                        existing: format!("{} ({:?})", existing.selector, existing.kind),
                        incoming: format!("{} ({:?})", field.selector, field.kind),
                    });
                }
            }
        }

        self.buttons.extend(tables.buttons);
        self.fields.extend(tables.fields);
        Ok(())
    }

    /// Merge additional tables from a YAML list of [`EntitySelectors`]
    pub fn merge_file(&mut self, path: &Path) -> E2eResult<()> {
        let content = std::fs::read_to_string(path)?;
        let tables: Vec<EntitySelectors> = serde_yaml::from_str(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))?;
        let mut merged = self.clone();
        for table in tables {
            merged.merge(table)?;
        }
        *self = merged;
        Ok(())
    }

    pub fn button(&self, name: &str) -> E2eResult<Locator> {
        self.buttons
            .get(name)
            .map(Locator::new)
            .ok_or_else(|| E2eError::UnknownSelector {
                kind: "button",
                name: name.to_string(),
            })
    }

    pub fn field(&self, name: &str) -> E2eResult<&FieldSelector> {
        self.fields.get(name).ok_or_else(|| E2eError::UnknownSelector {
            kind: "field",
            name: name.to_string(),
        })
    }

    pub fn checkbox(&self, name: &str) -> E2eResult<&FieldSelector> {
        match self.fields.get(name) {
            Some(field) if field.kind == FieldKind::Checkbox => Ok(field),
            _ => Err(E2eError::UnknownSelector {
                kind: "checkbox",
                name: name.to_string(),
            }),
        }
    }
}

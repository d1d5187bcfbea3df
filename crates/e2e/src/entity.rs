//! The CRUD entities exercised by the scenarios

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::E2eError;
use crate::page::Locator;
use crate::table::TableConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Pessoa,
    PessoaContato,
}

impl EntityKind {
    /// Link text in the entity menu
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Pessoa => "Pessoa",
            EntityKind::PessoaContato => "Pessoa Contato",
        }
    }

    /// Heading of the list page
    pub fn list_heading(&self) -> &'static str {
        match self {
            EntityKind::Pessoa => "Pessoas",
            EntityKind::PessoaContato => "Pessoa Contatos",
        }
    }

    pub fn list_route(&self) -> &'static str {
        match self {
            EntityKind::Pessoa => "/pessoa",
            EntityKind::PessoaContato => "/pessoa-contato",
        }
    }

    pub fn api_resource(&self) -> &'static str {
        match self {
            EntityKind::Pessoa => "/api/pessoas",
            EntityKind::PessoaContato => "/api/pessoa-contatoes",
        }
    }

    pub fn delete_heading(&self) -> Locator {
        match self {
            EntityKind::Pessoa => Locator::new("#jhi-delete-pessoa-heading"),
            EntityKind::PessoaContato => Locator::new("#jhi-delete-pessoaContato-heading"),
        }
    }

    pub fn details_heading(&self) -> Locator {
        match self {
            EntityKind::Pessoa => Locator::new(r#"[data-cy="pessoaDetailsHeading"]"#),
            EntityKind::PessoaContato => Locator::new(r#"[data-cy="pessoaContatoDetailsHeading"]"#),
        }
    }

    pub fn table(&self) -> TableConfig {
        TableConfig::for_endpoint(self.api_resource())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EntityKind {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "pessoa" | "pessoas" => Ok(EntityKind::Pessoa),
            "pessoacontato" | "pessoacontatoes" => Ok(EntityKind::PessoaContato),
            _ => Err(E2eError::UnknownEntity(s.to_string())),
        }
    }
}

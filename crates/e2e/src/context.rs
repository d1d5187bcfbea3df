//! Per-scenario state shared between steps
//!
//! A fresh [`ScenarioContext`] is created for every scenario and dropped when
//! it finishes, so generated documents and IDs never leak across scenarios.

use chrono::Local;
use rand::Rng;

use crate::entity::EntityKind;
use crate::error::{E2eError, E2eResult};
use crate::format::format_cpf_strict;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, Default)]
pub struct ScenarioContext {
    pub generated_cpf: Option<String>,
    pub generated_cnpj: Option<String>,
    pub generated_description: Option<String>,
    pub created_pessoa_id: Option<i64>,
    pub created_pessoa_contato_id: Option<i64>,

    /// Entity whose list page is currently open
    pub current_entity: Option<EntityKind>,
}

impl ScenarioContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_cpf(&self) -> E2eResult<&str> {
        self.generated_cpf
            .as_deref()
            .ok_or(E2eError::MissingContext("a generated CPF"))
    }

    pub fn require_cnpj(&self) -> E2eResult<&str> {
        self.generated_cnpj
            .as_deref()
            .ok_or(E2eError::MissingContext("a generated CNPJ"))
    }

    pub fn require_description(&self) -> E2eResult<&str> {
        self.generated_description
            .as_deref()
            .ok_or(E2eError::MissingContext("a generated description"))
    }

    pub fn require_pessoa_id(&self) -> E2eResult<i64> {
        self.created_pessoa_id
            .ok_or(E2eError::MissingContext("the created Pessoa id"))
    }

    pub fn require_pessoa_contato_id(&self) -> E2eResult<i64> {
        self.created_pessoa_contato_id
            .ok_or(E2eError::MissingContext("the created Pessoa Contato id"))
    }

    pub fn require_entity(&self) -> E2eResult<EntityKind> {
        self.current_entity
            .ok_or(E2eError::MissingContext("an open entity list"))
    }

    /// Expand a value placeholder, recording generated values.
    ///
    /// Values that are not placeholders are returned unchanged.
    pub fn resolve_value(&mut self, value: &str) -> E2eResult<String> {
        let resolved = match value.trim() {
            "{{unique_cpf}}" => {
                let cpf = generate_cpf();
                self.generated_cpf = Some(cpf.clone());
                cpf
            }
            "{{unique_cnpj}}" => {
                let cnpj = generate_cnpj();
                self.generated_cnpj = Some(cnpj.clone());
                cnpj
            }
            "{{unique_description}}" => {
                let description = unique_description();
                self.generated_description = Some(description.clone());
                description
            }
            "{{now}}" => Local::now().format("%Y-%m-%dT%H:%M").to_string(),
            "{{created_pessoa_id}}" => self.require_pessoa_id()?.to_string(),
            "{{formatted_cpf}}" => format_cpf_strict(self.require_cpf()?)?,
            _ => value.to_string(),
        };
        Ok(resolved)
    }
}

/// Random 11-digit CPF-shaped number. No check digits.
pub fn generate_cpf() -> String {
    rand::thread_rng()
        .gen_range(10_000_000_000u64..=99_999_999_999)
        .to_string()
}

/// Random 14-digit CNPJ-shaped number. No check digits.
pub fn generate_cnpj() -> String {
    rand::thread_rng()
        .gen_range(10_000_000_000_000u64..=99_999_999_999_999)
        .to_string()
}

/// `Desc_<base36 millis>_<6 random base36 chars>`
pub fn unique_description() -> String {
    let millis = u64::try_from(Local::now().timestamp_millis()).unwrap_or_default();
    let mut rng = rand::thread_rng();
    let hash: String = (0..6)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("Desc_{}_{}", to_base36(millis), hash)
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

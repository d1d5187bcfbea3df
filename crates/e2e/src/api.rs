//! REST helpers for test preconditions and cleanup
//!
//! Requests are sent through the browser context so they reuse the session
//! established by logging in through the UI.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entity::EntityKind;
use crate::error::{E2eError, E2eResult};
use crate::page::{ApiRequest, HttpMethod, RequestContext};

pub const CSRF_COOKIE: &str = "XSRF-TOKEN";
pub const CSRF_HEADER: &str = "X-XSRF-TOKEN";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pessoa {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cnpj: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tipo_pessoa: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome_mae: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_registro: Option<String>,
}

impl Pessoa {
    /// CPF, else CNPJ, else `N/A`
    pub fn document(&self) -> &str {
        self.cpf
            .as_deref()
            .or(self.cnpj.as_deref())
            .unwrap_or("N/A")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PessoaContato {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descricao: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telefone_numero_completo: Option<String>,
    #[serde(default)]
    pub preferido: bool,
    #[serde(default)]
    pub receber_propagandas: bool,
    #[serde(default)]
    pub receber_confirmacoes: bool,
    #[serde(default)]
    pub possui_whatsapp: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_registro: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contato: Option<EntityRef>,
}

/// One page of a list endpoint
#[derive(Debug, Clone)]
pub struct ListPage<T> {
    pub items: Vec<T>,

    /// False when the server answered with a bare array
    pub paged: bool,

    /// The paged body's `last` flag, when present
    pub last: Option<bool>,
}

/// CRUD calls against one entity resource
pub struct EntityApi<'a, C: ?Sized> {
    ctx: &'a C,
    resource: &'static str,
}

impl<'a, C: RequestContext + ?Sized> EntityApi<'a, C> {
    pub fn new(ctx: &'a C, entity: EntityKind) -> Self {
        Self {
            ctx,
            resource: entity.api_resource(),
        }
    }

    async fn csrf_token(&self) -> E2eResult<String> {
        self.ctx
            .cookie(CSRF_COOKIE)
            .await?
            .ok_or(E2eError::MissingCsrfToken)
    }

    /// POST a new record; the server must answer 201 Created.
    pub async fn create<T, R>(&self, record: &T) -> E2eResult<R>
    where
        T: Serialize + Sync,
        R: DeserializeOwned,
    {
        let token = self.csrf_token().await?;
        let request = ApiRequest::new(HttpMethod::Post, self.resource)
            .json(serde_json::to_value(record)?)
            .header(CSRF_HEADER, token);

        let response = self.ctx.request(request).await?;
        if !response.is_success() {
            return Err(E2eError::Api {
                status: response.status,
                body: response.body,
            });
        }
        if response.status != 201 {
            return Err(E2eError::AssertionFailed(format!(
                "expected 201 Created from {}, got {}",
                self.resource, response.status
            )));
        }

        Ok(serde_json::from_str(&response.body)?)
    }

    pub async fn list_page<R: DeserializeOwned>(
        &self,
        page: usize,
        size: usize,
        sort: &str,
    ) -> E2eResult<ListPage<R>> {
        let path = format!("{}?page={}&size={}&sort={}", self.resource, page, size, sort);
        let mut request = ApiRequest::new(HttpMethod::Get, path);
        if let Some(token) = self.ctx.cookie(CSRF_COOKIE).await? {
            request = request.header(CSRF_HEADER, token);
        }

        let response = self.ctx.request(request).await?;
        if !response.is_success() {
            return Err(E2eError::Api {
                status: response.status,
                body: response.body,
            });
        }

        match response.json()? {
            serde_json::Value::Object(mut body) => {
                let last = body.get("last").and_then(|v| v.as_bool());
                let content = body.remove("content").unwrap_or(serde_json::Value::Array(Vec::new()));
                Ok(ListPage {
                    items: serde_json::from_value(content)?,
                    paged: true,
                    last,
                })
            }
            other => Ok(ListPage {
                items: serde_json::from_value(other)?,
                paged: false,
                last: None,
            }),
        }
    }

    /// Walk every page until an empty, last, or short page, or a bare array.
    pub async fn list_all<R: DeserializeOwned>(&self, page_size: usize, sort: &str) -> E2eResult<Vec<R>> {
        let mut all = Vec::new();
        let mut page = 0;

        loop {
            debug!("Loading page {} of {}", page + 1, self.resource);
            let batch: ListPage<R> = self.list_page(page, page_size, sort).await?;
            let fetched = batch.items.len();
            if fetched == 0 {
                break;
            }
            all.extend(batch.items);

            if !batch.paged || batch.last == Some(true) || fetched < page_size {
                break;
            }
            page += 1;
        }

        Ok(all)
    }

    pub async fn delete(&self, id: i64) -> E2eResult<()> {
        let token = self.csrf_token().await?;
        let request = ApiRequest::new(HttpMethod::Delete, format!("{}/{}", self.resource, id))
            .header(CSRF_HEADER, token);

        let response = self.ctx.request(request).await?;
        if !response.is_success() {
            return Err(E2eError::Api {
                status: response.status,
                body: response.body,
            });
        }
        Ok(())
    }
}

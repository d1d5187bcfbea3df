//! Removal of Pessoa records created by test runs

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::{EntityApi, Pessoa};
use crate::entity::EntityKind;
use crate::error::E2eResult;
use crate::format::format_cpf;
use crate::page::RequestContext;

#[derive(Debug, Clone)]
pub struct CleanupOptions {
    /// Records with `id >= min_id` are removed
    pub min_id: i64,
    pub dry_run: bool,
    pub page_size: usize,

    /// Pause between deletes
    pub pause: Duration,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            min_id: 1000,
            dry_run: false,
            page_size: 100,
            pause: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupCandidate {
    pub id: i64,
    pub nome: String,
    pub document: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub total: usize,
    pub candidates: Vec<CleanupCandidate>,
    pub deleted: usize,
    pub errors: usize,
    pub dry_run: bool,
}

impl CleanupReport {
    pub fn remaining(&self) -> usize {
        self.total - self.candidates.len()
    }
}

/// List every Pessoa, then delete (or, in dry-run, report) those at or
/// above `min_id`. A failed delete is counted and the run continues.
pub async fn cleanup_pessoas<C>(ctx: &C, options: &CleanupOptions) -> E2eResult<CleanupReport>
where
    C: RequestContext + ?Sized,
{
    let api = EntityApi::new(ctx, EntityKind::Pessoa);

    let all: Vec<Pessoa> = api.list_all(options.page_size, "id,asc").await?;
    info!("Found {} pessoas", all.len());

    let candidates: Vec<CleanupCandidate> = all
        .iter()
        .filter_map(|p| {
            let id = p.id?;
            (id >= options.min_id).then(|| CleanupCandidate {
                id,
                nome: p.nome.clone().unwrap_or_else(|| "N/A".to_string()),
                document: format_cpf(p.document()),
            })
        })
        .collect();

    info!(
        "{} pessoa(s) with ID >= {}, {} will remain",
        candidates.len(),
        options.min_id,
        all.len() - candidates.len()
    );

    let mut report = CleanupReport {
        total: all.len(),
        candidates,
        dry_run: options.dry_run,
        ..Default::default()
    };

    if options.dry_run || report.candidates.is_empty() {
        return Ok(report);
    }

    for candidate in &report.candidates {
        debug!("Deleting pessoa {}: {}", candidate.id, candidate.nome);
        match api.delete(candidate.id).await {
            Ok(()) => report.deleted += 1,
            Err(e) => {
                warn!("Failed to delete pessoa {}: {}", candidate.id, e);
                report.errors += 1;
            }
        }
        tokio::time::sleep(options.pause).await;
    }

    info!("Deleted {} pessoa(s), {} error(s)", report.deleted, report.errors);
    Ok(report)
}

//! Output formatting for the cleanup report

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use pessoa_e2e::cleanup::{CleanupCandidate, CleanupReport};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable tables
    #[default]
    Table,
    /// JSON report
    Json,
    /// YAML report
    Yaml,
}

fn candidate_table(candidates: &[CleanupCandidate]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec!["ID", "Nome", "Documento"]);
    for candidate in candidates {
        table.add_row(vec![
            candidate.id.to_string(),
            candidate.nome.clone(),
            candidate.document.clone(),
        ]);
    }
    table
}

pub fn print_banner(min_id: i64, dry_run: bool) {
    println!("{}", "Pessoa cleanup".bold());
    println!("==============");
    if dry_run {
        println!("Mode:   {}", "DRY-RUN (nothing is deleted)".cyan());
    } else {
        println!("Mode:   {}", "DELETE".red().bold());
    }
    println!("Filter: ID >= {}", min_id);
    println!();

    if !dry_run {
        print_warning("This deletes real data. Run with --dry first to preview.");
        println!();
    }
}

pub fn print_report(report: &CleanupReport, min_id: i64, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
            return Ok(());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(report)?);
            return Ok(());
        }
        OutputFormat::Table => {}
    }

    println!("{}", "Analysis".bold());
    println!("  Total pessoas:      {}", report.total);
    println!("  With ID >= {:<8} {}", format!("{}:", min_id), report.candidates.len());
    println!("  Remaining:          {}", report.remaining());
    println!();

    if report.candidates.is_empty() {
        print_success("No pessoa matches the filter.");
        return Ok(());
    }

    println!("{}", candidate_table(&report.candidates));
    println!();

    if report.dry_run {
        print_info("Dry run finished. Remove --dry to delete these records.");
        return Ok(());
    }

    println!("{}", "Final report".bold());
    println!("  Deleted: {}", report.deleted.to_string().green());
    if report.errors > 0 {
        println!("  Errors:  {}", report.errors.to_string().red());
    } else {
        println!("  Errors:  0");
    }
    Ok(())
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "!".yellow().bold(), message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("{} {}", "i".blue(), message);
}

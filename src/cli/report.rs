//! Terminal summary of a run

use crate::migration::{ResourceStatus, RunResult, RunStatus};
use colored::*;

pub fn print_run_result(result: &RunResult) {
    println!();
    if result.status == RunStatus::NotFound {
        println!("  {} {}", "⚠️  Dataset not found:".bright_yellow().bold(), result.dataset_ref.white());
        return;
    }

    let mode = result.dataset_mode.map(|m| m.to_string()).unwrap_or_default();
    println!(
        "  {} {} {}",
        "Dataset".bright_white().bold(),
        result.dataset_ref.bright_white(),
        mode.dimmed()
    );
    if let Some(id) = &result.dataset_id {
        println!("    {}: {}", "Id".dimmed(), id.cyan());
    }

    for outcome in &result.outcomes {
        let marker = match &outcome.status {
            ResourceStatus::Created | ResourceStatus::Updated | ResourceStatus::Deleted => "✓".green(),
            ResourceStatus::Failed(_) => "✗".red(),
            ResourceStatus::Skipped => "-".dimmed(),
        };
        let rows = outcome
            .table_rows
            .map(|n| format!(" ({} rows)", n))
            .unwrap_or_default();
        println!(
            "  {} {} {}{}",
            marker,
            outcome.name.white(),
            outcome.status.label().dimmed(),
            rows.dimmed()
        );
        if let Some(error) = outcome.error() {
            println!("      {}", error.to_string().red());
        }
    }

    if let Some(error) = &result.dataset_error {
        println!("  {} {}", "✗".red(), error.to_string().red());
    }
    if result.published {
        println!("  {}", "Published".green());
    }
    if result.purged {
        println!("  {}", "Purged".green());
    }

    println!();
    let summary = format!(
        "{} resources, {} failed in {:.1}s",
        result.outcomes.len(),
        result.failure_count(),
        result.duration.as_secs_f64()
    );
    if result.is_success() {
        println!("  {} {}", "✓ Done:".green().bold(), summary);
    } else {
        println!("  {} {}", "✗ Finished with failures:".red().bold(), summary);
    }
}

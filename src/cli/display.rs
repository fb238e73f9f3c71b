use console::style;

use crate::orchestrator::RunResult;
use crate::progress::{ItemState, ProgressLedger};

pub struct Display;

impl Display {
    pub fn new() -> Self {
        Self
    }

    pub fn print_header(&self, text: &str) {
        println!();
        println!("{}", style(text).bold().cyan());
        println!("{}", style("═".repeat(60)).dim());
    }

    pub fn print_run_summary(&self, result: &RunResult, dry_run: bool) {
        let title = if dry_run {
            "Migration complete (dry run)"
        } else {
            "Migration complete"
        };
        self.print_header(title);

        println!("Total:     {}", style(result.total).bold());
        println!(
            "Completed: {}",
            style(result.completed).bold().green()
        );
        let failed = if result.failed > 0 {
            style(result.failed).bold().red()
        } else {
            style(result.failed).bold()
        };
        println!("Failed:    {}", failed);

        if !result.errors.is_empty() {
            println!();
            println!("{}", style("Errors:").bold().red());
            for error in &result.errors {
                println!(
                    "  - {}: {}",
                    style(&error.product_label).bold(),
                    error.error
                );
            }
        }
        println!();
    }

    pub fn print_status(&self, ledger: &ProgressLedger) {
        self.print_header("Migration status");

        println!("Started:   {}", ledger.started.to_rfc3339());
        println!("Total:     {}", style(ledger.total).bold());
        println!("Completed: {}", style(ledger.completed).bold().green());
        println!("Failed:    {}", style(ledger.failed).bold().red());

        let processing: Vec<&String> = ledger
            .files
            .iter()
            .filter(|(_, entry)| entry.status == ItemState::Processing)
            .map(|(id, _)| id)
            .collect();
        if !processing.is_empty() {
            println!();
            println!(
                "{}",
                style("Left in processing (interrupted run):").yellow()
            );
            for id in processing {
                println!("  - {}", id);
            }
        }

        let failed: Vec<(&String, &str)> = ledger
            .files
            .iter()
            .filter(|(_, entry)| entry.status == ItemState::Failed)
            .map(|(id, entry)| {
                (
                    id,
                    entry
                        .details
                        .get("error")
                        .map(String::as_str)
                        .unwrap_or("unknown error"),
                )
            })
            .collect();
        if !failed.is_empty() {
            println!();
            println!("{}", style("Failed items:").red());
            for (id, error) in failed {
                println!("  - {}: {}", style(id).bold(), error);
            }
        }
        println!();
    }

    pub fn print_error(&self, message: &str) {
        eprintln!("{} {}", style("error:").bold().red(), message);
    }

    pub fn print_info(&self, message: &str) {
        println!("{}", message);
    }
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}

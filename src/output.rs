//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output: colored status lines,
//! section titles, the move progress bar, and the end-of-run summary table.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Titles, separators and the summary table
/// - The progress bar shown while moving
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sorting_hat::output::OutputFormatter;
    /// OutputFormatter::success("All results resolved");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a regular message without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints `title` framed above and below by `=` rules of the same width.
    pub fn title(title: &str) {
        let rule = "=".repeat(title.chars().count());
        println!("{}", rule);
        println!("{}", title.bold());
        println!("{}", rule);
        println!();
    }

    /// Prints the light separator used between jobs.
    pub fn separator() {
        println!("{}\n", "~ ".repeat(10).dimmed());
    }

    /// Prints a result line, colored by whether it needs attention.
    pub fn result_line(text: &str, good: bool, recoverable: bool) {
        if good {
            println!("{}", text.green());
        } else if recoverable {
            println!("{}", text.yellow());
        } else {
            println!("{}", text.red());
        }
    }

    /// Creates and returns a progress bar for the move phase.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sorting_hat::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(3);
    /// pb.inc(1);
    /// pb.finish_and_clear();
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("█▓░"),
        );
        pb
    }

    /// Prints a summary table of labelled counts.
    ///
    /// Rows with a zero count are skipped.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sorting_hat::output::OutputFormatter;
    ///
    /// OutputFormatter::summary_table(&[("moved", 3), ("deleted source", 1)], 4);
    /// ```
    pub fn summary_table(rows: &[(&str, usize)], total: usize) {
        Self::header("SUMMARY");

        let rows: Vec<_> = rows.iter().filter(|(_, count)| *count > 0).collect();
        let width = rows
            .iter()
            .map(|(label, _)| label.len())
            .max()
            .unwrap_or(0)
            .max(6); // At least "Status" width

        println!(
            "{:<width$} | {}",
            "Status".bold(),
            "Jobs".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));

        for (label, count) in &rows {
            println!(
                "{:<width$} | {}",
                label,
                count.to_string().green(),
                width = width
            );
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {}",
            "Total".bold(),
            total.to_string().green().bold(),
            width = width
        );
    }
}

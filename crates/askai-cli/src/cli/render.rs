//! Terminal rendering of streamed answers.
//!
//! Updates carry the whole answer so far. While each update extends the
//! previous one only the new suffix is printed; when the text diverges (the
//! secondary endpoint restarting the answer, or a notice replacing it) the
//! answer is reprinted on a fresh line.

use std::io::Write;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use askai_types::query::SourceRef;

/// What to write for one update.
#[derive(Debug, PartialEq, Eq)]
pub enum Delta<'a> {
    Append(&'a str),
    Restart(&'a str),
    Unchanged,
}

/// Tracks what has already been printed for the current answer.
#[derive(Debug, Default)]
pub struct StreamPrinter {
    printed: String,
}

impl StreamPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the delta for `answer` and remember it as printed.
    pub fn delta<'a>(&mut self, answer: &'a str) -> Delta<'a> {
        let delta = if answer == self.printed {
            Delta::Unchanged
        } else if let Some(suffix) = answer.strip_prefix(self.printed.as_str()) {
            Delta::Append(suffix)
        } else {
            Delta::Restart(answer)
        };
        self.printed.clear();
        self.printed.push_str(answer);
        delta
    }

    /// Print `answer` to stdout as a delta against what is already shown.
    pub fn print(&mut self, answer: &str) -> std::io::Result<()> {
        let mut out = std::io::stdout().lock();
        match self.delta(answer) {
            Delta::Append(suffix) => write!(out, "{suffix}")?,
            Delta::Restart(text) => write!(out, "\n{}\n{text}", console::style("---").dim())?,
            Delta::Unchanged => {}
        }
        out.flush()
    }

    /// End the current answer with a newline if anything was printed.
    pub fn finish(&mut self) {
        if !self.printed.is_empty() {
            println!();
        }
        self.printed.clear();
    }

    pub fn has_output(&self) -> bool {
        !self.printed.is_empty()
    }
}

/// Spinner shown until the first update arrives.
pub fn waiting_spinner(hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Thinking...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Styled source list, one line per source.
pub fn source_lines(sources: &[SourceRef]) -> Vec<String> {
    sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            format!(
                "  {} {}",
                console::style(format!("[{}]", i + 1)).dim(),
                console::style(source.describe()).cyan()
            )
        })
        .collect()
}

pub fn print_sources(sources: &[SourceRef]) {
    if sources.is_empty() {
        return;
    }
    println!();
    println!("  {}", console::style("Sources").bold());
    for line in source_lines(sources) {
        println!("{line}");
    }
}

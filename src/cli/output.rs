//! Handles all user-facing output for the CLI.
//!
//! Diffs, summaries and syntax tree listings are printed here so every
//! command colors and formats its output the same way.

use std::io::Write;

use difference::{Changeset, Difference};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::syntax::{ModulePart, ToSource};

/// Counts gathered over one `rewrite` run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub changed: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Prints a colored line diff between two versions of a document.
pub fn print_file_diff(name: &str, old: &str, new: &str) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
    let _ = writeln!(stdout, "--- {name}");
    let _ = writeln!(stdout, "+++ {name}");
    let _ = stdout.reset();

    let changeset = Changeset::new(old, new, "\n");
    print_diff(&mut stdout, &changeset.diffs);
    let _ = stdout.reset();
}

/// Prints the one-line outcome for a document in `check` mode.
pub fn print_pending(name: &str) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)));
    let _ = writeln!(stdout, "would rewrite {name}");
    let _ = stdout.reset();
}

pub fn print_summary(summary: &RunSummary) {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    let color = if summary.failed > 0 {
        Color::Red
    } else {
        Color::Green
    };
    let _ = stderr.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
    let _ = writeln!(
        stderr,
        "{} changed, {} unchanged, {} failed",
        summary.changed, summary.unchanged, summary.failed
    );
    let _ = stderr.reset();
}

/// Lists annotated functions and their annotations.
pub fn print_annotations(root: &ModulePart) {
    let mut annotated = 0;
    for function in root.functions() {
        let mut annotations = function.annotations().peekable();
        if annotations.peek().is_none() {
            continue;
        }
        annotated += 1;
        println!("function {}", function.name.text());
        for annotation in annotations {
            let payload = annotation
                .value
                .as_ref()
                .map(|mapping| compact(&mapping.source_text()))
                .unwrap_or_else(|| "(no literal)".to_string());
            println!(
                "  {} @{} {}",
                annotation.id,
                annotation.reference.name(),
                payload
            );
        }
    }
    if annotated == 0 {
        println!("(no annotated functions)");
    }
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn compact(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn print_diff(stdout: &mut StandardStream, diffs: &[Difference]) {
    for diff in diffs {
        match diff {
            Difference::Same(ref x) => {
                let _ = stdout.reset();
                for line in x.lines() {
                    let _ = writeln!(stdout, " {line}");
                }
            }
            Difference::Add(ref x) => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
                for line in x.lines() {
                    let _ = writeln!(stdout, "+{line}");
                }
            }
            Difference::Rem(ref x) => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
                for line in x.lines() {
                    let _ = writeln!(stdout, "-{line}");
                }
            }
        }
    }
}

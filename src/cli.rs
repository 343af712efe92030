//! The annotweave command-line interface.
//!
//! A thin host around the library: it reads documents from disk, matches
//! annotation sites to the plan's tool entries, runs the source modifier on
//! an in-memory host and then writes, diffs or checks the results.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    process,
};

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use crate::{
    commit::{DocumentId, MemoryHost, SourceModifier},
    config::RewritePlan,
    diagnostics::print_error,
    rewrite::annotation_sites,
    rewrite_err,
    syntax::parse_module,
    RewriteError,
};

pub mod args;
pub mod output;

use args::{AnnotweaveArgs, Command, Mode};
use output::RunSummary;

/// The main entry point for the CLI.
pub fn run() {
    let args = AnnotweaveArgs::parse();
    init_tracing(args.verbose);

    let result = match args.command {
        Command::Rewrite { path, plan, mode } => handle_rewrite(&path, &plan, mode),
        Command::Ast { file, json } => handle_ast(&file, json).map(|()| 0),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            print_error(e);
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "annotweave=warn",
            1 => "annotweave=debug",
            _ => "annotweave=trace",
        })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

// ============================================================================
// COMMAND HANDLERS
// ============================================================================

/// A document read from disk, with the text it had before rewriting.
struct LoadedDocument {
    path: PathBuf,
    original: String,
}

fn handle_rewrite(path: &Path, plan_path: &Path, mode: Mode) -> Result<i32, RewriteError> {
    let plan = RewritePlan::load(plan_path)?;
    let files = discover_sources(path, &plan)?;
    info!(files = files.len(), annotation = %plan.annotation, "discovered source documents");

    let mut host = MemoryHost::new();
    let mut modifier = SourceModifier::new();
    let mut documents = BTreeMap::new();
    let mut summary = RunSummary::default();

    for file in files {
        let id = DocumentId::new(file.display().to_string());
        let text = read_source(&file)?;
        let relative = file
            .strip_prefix(path)
            .ok()
            .filter(|relative| !relative.as_os_str().is_empty())
            .unwrap_or(file.as_path());
        let loaded = if plan.is_test_path(relative) {
            host.add_test_document(&id, &text)
        } else {
            host.add_document(&id, &text)
        };
        let tree = match loaded {
            Ok(tree) => tree,
            Err(e) => {
                print_error(e);
                summary.failed += 1;
                continue;
            }
        };

        for site in annotation_sites(tree.root(), &plan.annotation) {
            match plan.config_for(&site.function_name) {
                Some(config) => modifier.add_site(&id, &site.annotation, config),
                None => warn!(
                    document = %id,
                    function = %site.function_name,
                    "function has no tool entry in the plan; annotation skipped"
                ),
            }
        }
        documents.insert(
            id,
            LoadedDocument {
                path: file,
                original: text,
            },
        );
    }

    let report = modifier.modify(&mut host);
    for (_, e) in report.failed {
        print_error(e);
        summary.failed += 1;
    }

    for (id, _) in &report.committed {
        let (Some(document), Some(rewritten)) = (documents.get(id), host.committed(id)) else {
            continue;
        };
        if rewritten == document.original {
            summary.unchanged += 1;
            continue;
        }
        summary.changed += 1;
        match mode {
            Mode::Write => {
                fs::write(&document.path, rewritten).map_err(|e| {
                    rewrite_err!(Document, format!("cannot write {}", document.path.display()))
                        .caused_by(e)
                })?;
                info!(document = %id, "wrote rewritten document");
            }
            Mode::Diff => output::print_file_diff(id.as_str(), &document.original, rewritten),
            Mode::Check => output::print_pending(id.as_str()),
        }
    }

    output::print_summary(&summary);
    let pending = mode == Mode::Check && summary.changed > 0;
    Ok(if summary.failed > 0 || pending { 1 } else { 0 })
}

fn handle_ast(file: &Path, json: bool) -> Result<(), RewriteError> {
    let text = read_source(file)?;
    let tree = parse_module(&file.display().to_string(), &text)?;
    if json {
        let rendered = serde_json::to_string_pretty(tree.root().as_ref()).map_err(|e| {
            rewrite_err!(Internal, "cannot serialize syntax tree").caused_by(e)
        })?;
        println!("{rendered}");
    } else {
        output::print_annotations(tree.root());
    }
    Ok(())
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn read_source(path: &Path) -> Result<String, RewriteError> {
    fs::read_to_string(path).map_err(|e| {
        rewrite_err!(Document, format!("cannot read {}", path.display())).caused_by(e)
    })
}

/// The source files under `path`, sorted; `path` itself when it is a file.
fn discover_sources(path: &Path, plan: &RewritePlan) -> Result<Vec<PathBuf>, RewriteError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            rewrite_err!(Document, format!("cannot walk {}", path.display())).caused_by(e)
        })?;
        if entry.file_type().is_file() && plan.is_source_path(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

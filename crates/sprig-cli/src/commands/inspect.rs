//! Inspect command - report on a guest module without running it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use sprig_core::{IntoShared, ModuleLoader, SprigEngine};
use sprig_host::{IMPORT_MODULE, IMPORT_NAME};

use crate::OutputFormat;

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    /// Path to the guest module
    #[arg(required = true)]
    pub module: PathBuf,
}

/// Inspection result.
#[derive(Debug, Serialize)]
struct InspectReport {
    path: String,
    name: Option<String>,
    exports: Vec<ExternEntry>,
    imports: Vec<ExternEntry>,
    runnable: bool,
    notes: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ExternEntry {
    name: String,
    kind: &'static str,
}

/// Execute the inspect command.
pub fn execute(args: InspectArgs, format: OutputFormat) -> Result<()> {
    let engine = SprigEngine::default_engine()
        .context("Failed to create engine")?
        .into_shared();
    let loader = ModuleLoader::new(Arc::clone(&engine));

    let module = loader
        .load_file(&args.module)
        .with_context(|| format!("Failed to load {}", args.module.display()))?;

    let mut notes = Vec::new();
    if !module.has_entry_point() {
        notes.push("module does not export a '_start' function".to_string());
    }
    if !module.exports_memory() {
        notes.push("module does not export its linear memory".to_string());
    }
    for import in &module.metadata().imports {
        if import.module != IMPORT_MODULE || import.name != IMPORT_NAME {
            notes.push(format!(
                "unsupported import: {}::{}",
                import.module, import.name
            ));
        }
    }

    let report = InspectReport {
        path: args.module.display().to_string(),
        name: module.name().map(String::from),
        exports: module
            .metadata()
            .exports
            .iter()
            .map(|e| ExternEntry {
                name: e.name.clone(),
                kind: e.kind.as_str(),
            })
            .collect(),
        imports: module
            .metadata()
            .imports
            .iter()
            .map(|i| ExternEntry {
                name: format!("{}::{}", i.module, i.name),
                kind: i.kind.as_str(),
            })
            .collect(),
        runnable: notes.is_empty(),
        notes,
    };

    match format {
        OutputFormat::Human => {
            println!("Module: {}", report.path);
            if let Some(name) = &report.name {
                println!("Name: {}", name);
            }
            println!("Runnable: {}", if report.runnable { "yes" } else { "no" });
            println!("Exports:");
            for e in &report.exports {
                println!("  {} ({})", e.name, e.kind);
            }
            println!("Imports:");
            for i in &report.imports {
                println!("  {} ({})", i.name, i.kind);
            }
            for note in &report.notes {
                println!("Note: {}", note);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

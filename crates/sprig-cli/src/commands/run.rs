//! Run command - execute a guest module.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Args;

use sprig_core::{IntoShared, ResourceLimits, SprigEngine};
use sprig_host::{BufferSink, Host, HostError, OutputSink, StdoutSink};

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Path to the guest module (.wasm, or .wat for text format)
    #[arg(required = true)]
    pub module: PathBuf,

    /// Linear memory limit in bytes (default: 64MB)
    #[arg(long, default_value = "67108864")]
    pub memory_limit: usize,

    /// Collect output in memory and print it after the run instead of
    /// streaming it
    #[arg(long)]
    pub buffer: bool,
}

/// Execute the run command.
pub fn execute(args: RunArgs, quiet: bool) -> Result<()> {
    let engine = SprigEngine::default_engine()
        .context("Failed to create engine")?
        .into_shared();

    let buffer = if args.buffer {
        Some(Arc::new(BufferSink::new()))
    } else {
        None
    };
    let sink: Arc<dyn OutputSink> = match &buffer {
        Some(buf) => Arc::clone(buf) as Arc<dyn OutputSink>,
        None => Arc::new(StdoutSink),
    };

    let host = Host::builder(engine)
        .with_limits(ResourceLimits::new().with_max_memory(args.memory_limit))
        .with_sink(sink)
        .build();

    let module = load_module(&host, &args.module)?;

    if !quiet {
        tracing::info!(module = %args.module.display(), "Executing guest module");
    }

    let result = host.run_module(&module);

    if let Some(buf) = &buffer {
        print!("{}", buf.contents());
    }

    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            // Failure markers go to the same surface as program output,
            // the way the display expects them.
            if err.is_instantiation_failure() {
                println!("== instantiation error ==");
            } else {
                println!("== runtime error ==");
            }
            println!("{err}");
            bail!("guest run failed");
        }
    }
}

/// Load a module from disk, accepting text format by extension.
fn load_module(host: &Host, path: &Path) -> Result<sprig_core::LoadedModule> {
    let module = if path.extension().is_some_and(|ext| ext == "wat") {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        host.loader().load_wat(&source)
    } else {
        host.loader().load_file(path)
    };

    module.map_err(HostError::from).map_err(|err| {
        println!("== instantiation error ==");
        println!("{err}");
        anyhow::anyhow!("guest run failed")
    })
}

use bytegraph::builder::{BuildOptions, ClassGraphBuilder};
use bytegraph::class_reader::read_class;
use bytegraph::memory_graph::MemoryGraph;
use bytegraph::sequence::Sequencer;
use clap::Parser;
use log::{error, info};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

/// Build the statement graph of compiled Java classes.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Class files, or directories to search for them.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Print the reconstructed tree of every method.
    #[arg(long)]
    dump: bool,

    /// Stop at the first method that cannot be reconstructed.
    #[arg(long)]
    fail_fast: bool,
}

fn collect_class_files(path: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if !path.is_dir() {
        out.push(path.to_owned());
        return Ok(());
    }
    let mut entries = std::fs::read_dir(path)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    for entry in entries {
        if entry.is_dir() {
            collect_class_files(&entry, out)?;
        } else if entry.extension().is_some_and(|ext| ext == "class") {
            out.push(entry);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let mut files = Vec::new();
    for input in &cli.inputs {
        if let Err(e) = collect_class_files(input, &mut files) {
            error!("Cannot read {}: {e}", input.display());
            return ExitCode::FAILURE;
        }
    }

    let sequencer = Sequencer::new();
    let options = BuildOptions {
        fail_fast: cli.fail_fast,
    };
    let mut builder = ClassGraphBuilder::new(MemoryGraph::new(), &sequencer, options);

    let start = Instant::now();
    let mut failed = false;
    for file in &files {
        let raw_bytes = match std::fs::read(file) {
            Ok(raw_bytes) => raw_bytes,
            Err(e) => {
                error!("Cannot read {}: {e}", file.display());
                failed = true;
                continue;
            }
        };
        if let Err(e) = read_class(&raw_bytes, &mut builder) {
            error!("{}: {e}", file.display());
            failed = true;
            if cli.fail_fast {
                break;
            }
        }
    }

    let report = builder.report();
    info!(
        "{} classes, {} methods ({} skipped), {} body vertices in {:?}",
        report.classes,
        report.methods,
        report.skipped,
        report.body_vertices,
        start.elapsed()
    );

    if cli.dump {
        let graph = builder.hook();
        for &method in builder.methods() {
            print!("{}", graph.dump(method));
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

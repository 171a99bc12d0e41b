use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use catback::engine::{self, CreateOptions, FindOptions, RestoreOptions};
use catback::policy::{ErrorPolicy, InteractivePolicy, NonInteractivePolicy};
use catback::report::{NullReporter, PrintReporter, Reporter};
use catback::volume::Codec;

// ── CLI definition (spec §6) ──────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "catback",
    version,
    about = "Content-addressed, deduplicating, differential file-tree backup tool.",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce a catalogue and volume set from a source directory
    Create {
        source: PathBuf,
        repository: PathBuf,
        name: String,

        /// Prior backup's basename to diff against and reuse unchanged content from
        #[arg(short = 'r', long = "reference", value_name = "REF")]
        reference: Option<String>,

        /// Maximum bytes per volume before splitting (default 1024*1024*1020)
        #[arg(short = 's', long = "size", value_name = "BYTES", default_value_t = 1024 * 1024 * 1020)]
        size: u64,

        /// Keep only entries matching a glob (and their containing directories); repeatable
        #[arg(short = 'i', long = "include", value_name = "GLOB")]
        include: Vec<String>,

        /// Drop entries matching a glob, after --include; repeatable
        #[arg(short = 'e', long = "exclude", value_name = "GLOB")]
        exclude: Vec<String>,

        /// Suppress progress printing
        #[arg(short = 'q', long = "quiet")]
        quiet: bool,

        /// Ignore per-file read errors instead of prompting
        #[arg(short = 'g', long = "ignore")]
        ignore: bool,

        /// Volume compression codec
        #[arg(short = 'c', long = "compression", value_name = "tar|gz|bz2", default_value = "tar")]
        compression: String,

        /// Force hash recomputation, bypassing the (mtime, size) reference short-circuit
        #[arg(short = 'a', long = "recalculate")]
        recalculate: bool,
    },

    /// List entries across catalogues matching a glob
    Find {
        repository: PathBuf,
        name_glob: String,

        #[arg(short = 'i', long = "include", value_name = "GLOB")]
        include: Vec<String>,

        #[arg(short = 'e', long = "exclude", value_name = "GLOB")]
        exclude: Vec<String>,
    },

    /// Materialize a catalogue's files into a destination directory
    Restore {
        repository: PathBuf,
        name: String,
        destination: PathBuf,

        #[arg(short = 'i', long = "include", value_name = "GLOB")]
        include: Vec<String>,

        #[arg(short = 'e', long = "exclude", value_name = "GLOB")]
        exclude: Vec<String>,

        /// Remove destination entries the (filtered) catalogue no longer names
        #[arg(short = 'd', long = "delete")]
        delete: bool,

        /// Ignore per-file errors instead of prompting
        #[arg(short = 'g', long = "ignore")]
        ignore: bool,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Create {
            source,
            repository,
            name,
            reference,
            size,
            include,
            exclude,
            quiet,
            ignore,
            compression,
            recalculate,
        } => cmd_create(
            source, repository, name, reference, size, include, exclude, quiet, ignore, compression,
            recalculate,
        ),
        Commands::Find { repository, name_glob, include, exclude } => {
            cmd_find(repository, name_glob, include, exclude)
        }
        Commands::Restore { repository, name, destination, include, exclude, delete, ignore } => {
            cmd_restore(repository, name, destination, include, exclude, delete, ignore)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_create(
    source: PathBuf,
    repository: PathBuf,
    name: String,
    reference: Option<String>,
    size: u64,
    include: Vec<String>,
    exclude: Vec<String>,
    quiet: bool,
    ignore: bool,
    compression: String,
    recalculate: bool,
) -> Result<()> {
    let codec = Codec::parse(&compression)?;
    let opts = CreateOptions {
        source,
        repo: repository,
        name,
        reference,
        max_part_size: size,
        include,
        exclude,
        codec,
        recalculate,
    };

    let mut interactive = InteractivePolicy;
    let mut non_interactive = NonInteractivePolicy;
    let policy: &mut dyn ErrorPolicy = if ignore { &mut non_interactive } else { &mut interactive };

    let mut print_reporter = PrintReporter;
    let mut null_reporter = NullReporter;
    let reporter: &mut dyn Reporter = if quiet { &mut null_reporter } else { &mut print_reporter };

    let report = engine::create(&opts, policy, reporter).context("create failed")?;
    if !quiet {
        println!(
            "done: {} added, {} deduped, {} reused, {} ignored",
            report.added, report.deduped, report.reused, report.ignored
        );
    }
    Ok(())
}

fn cmd_find(repository: PathBuf, name_glob: String, include: Vec<String>, exclude: Vec<String>) -> Result<()> {
    let opts = FindOptions { repo: repository, name_pattern: name_glob, include, exclude };
    let lines = engine::find(&opts).context("find failed")?;
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

fn cmd_restore(
    repository: PathBuf,
    name: String,
    destination: PathBuf,
    include: Vec<String>,
    exclude: Vec<String>,
    delete: bool,
    ignore: bool,
) -> Result<()> {
    let opts = RestoreOptions { repo: repository, name, destination, include, exclude, delete };

    let mut interactive = InteractivePolicy;
    let mut non_interactive = NonInteractivePolicy;
    let policy: &mut dyn ErrorPolicy = if ignore { &mut non_interactive } else { &mut interactive };

    let mut reporter = PrintReporter;
    let report = engine::restore(&opts, policy, &mut reporter).context("restore failed")?;
    println!(
        "done: {} extracted, {} unchanged, {} deleted",
        report.extracted, report.skipped_identical, report.deleted
    );
    Ok(())
}

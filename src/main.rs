//! diskinventory: disk usage inventory for one folder.
//!
//! Thin binary entry point. All scan and aggregation logic lives in the
//! `diskinventory-core` crate; this file only maps flags onto options,
//! pumps the scanner, and prints what the document holds.

use anyhow::{bail, Context};
use clap::Parser;
use diskinventory_core::error::Error;
use diskinventory_core::kinds::KindSummary;
use diskinventory_core::model::size::{format_count, format_size};
use diskinventory_core::model::FsTree;
use diskinventory_core::scanner::{ScanObserver, ScanProgress};
use diskinventory_core::{Document, ScanOptions, ScanState, Scanner};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "diskinventory", about = "Disk usage by folder and file kind")]
struct Args {
    /// Folder to scan
    root: PathBuf,
    /// Measure allocated blocks instead of file lengths
    #[arg(long)]
    physical: bool,
    /// Descend into packages (bundles) instead of counting them as one file
    #[arg(long)]
    packages: bool,
    /// Classify files by name only
    #[arg(long)]
    ignore_creator_code: bool,
    /// Keep going past folders that cannot be read
    #[arg(long)]
    skip_unreadable: bool,
    /// Add the volume's free space as an item of the root
    #[arg(long)]
    free_space: bool,
    /// Add space used outside the scanned folder as an item of the root
    #[arg(long)]
    other_space: bool,
    /// Number of largest items to list
    #[arg(long, default_value_t = 10)]
    top: usize,
    /// Print a JSON report instead of tables
    #[arg(long)]
    json: bool,
    /// Log debug details to stderr
    #[arg(short, long)]
    verbose: bool,
}

/// Scan callbacks for the command line: progress goes to stderr, the
/// finished tree goes into the document.
struct Console {
    document: Document,
    error: Option<Error>,
    quiet: bool,
}

impl ScanObserver for Console {
    fn did_finish(&mut self, tree: FsTree) {
        self.clear_line();
        self.document.did_finish(tree);
    }

    fn did_fail(&mut self, error: Error) {
        self.clear_line();
        self.error = Some(error);
    }

    fn did_enter_folder(&mut self, progress: &ScanProgress) {
        if self.quiet {
            return;
        }
        let mut stderr = std::io::stderr().lock();
        let _ = write!(
            stderr,
            "\r\x1b[2K{} folders, {} files  {}",
            format_count(progress.folders_found),
            format_count(progress.files_found),
            progress.current_path.display()
        );
        let _ = stderr.flush();
    }

    fn did_cancel(&mut self) {
        self.clear_line();
        self.document.did_cancel();
    }
}

impl Console {
    fn clear_line(&self) {
        if !self.quiet {
            eprint!("\r\x1b[2K");
        }
    }
}

#[derive(Serialize)]
struct Report {
    root: PathBuf,
    total_size: u64,
    files: u64,
    folders: u64,
    skipped_folders: u64,
    options: ScanOptions,
    kinds: Vec<KindSummary>,
    largest: Vec<ItemSummary>,
}

#[derive(Serialize)]
struct ItemSummary {
    name: String,
    kind: Option<String>,
    size: u64,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    let options = ScanOptions {
        use_physical_size: args.physical,
        look_into_packages: args.packages,
        ignore_creator_code: args.ignore_creator_code,
        skip_unreadable: args.skip_unreadable,
    };

    let mut scanner = Scanner::new(&args.root, options);
    scanner
        .start()
        .with_context(|| format!("cannot scan {}", args.root.display()))?;

    let mut console = Console {
        document: Document::new(options),
        error: None,
        quiet: args.json,
    };
    match scanner.wait(&mut console) {
        ScanState::Finished => {}
        ScanState::Cancelled => bail!("scan of {} was cancelled", args.root.display()),
        _ => {
            let err = console
                .error
                .take()
                .map_or_else(|| anyhow::anyhow!("scan ended unexpectedly"), anyhow::Error::from);
            return Err(err.context(format!("scan of {} failed", args.root.display())));
        }
    }

    let mut document = console.document;
    document.set_show_other_space(args.other_space)?;
    document.set_show_free_space(args.free_space)?;

    let tree = document
        .tree()
        .context("scan finished without a tree")?;
    let root = tree.root().context("scanned tree has no root")?;

    let kinds: Vec<KindSummary> = document
        .kind_statistics()
        .into_iter()
        .map(KindSummary::from)
        .collect();
    let largest: Vec<ItemSummary> = tree
        .children_sorted_by_size(root)
        .into_iter()
        .take(args.top)
        .map(|child| ItemSummary {
            name: tree.display_name(child).to_string(),
            kind: tree.kind_name(child).map(str::to_string),
            size: tree.size(child),
        })
        .collect();

    let report = Report {
        root: tree.base_path().to_path_buf(),
        total_size: tree.size(root),
        files: scanner.files_found(),
        folders: scanner.folders_found(),
        skipped_folders: scanner.error_count(),
        options,
        kinds,
        largest,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &Report) {
    println!("{}", report.root.display());
    println!(
        "  {} in {} files, {} folders",
        format_size(report.total_size),
        format_count(report.files),
        format_count(report.folders)
    );
    if report.skipped_folders > 0 {
        println!("  {} unreadable folders skipped", format_count(report.skipped_folders));
    }

    println!();
    println!("{:<32} {:>10} {:>12}", "Kind", "Files", "Size");
    for kind in &report.kinds {
        println!(
            "{:<32} {:>10} {:>12}",
            kind.kind_name,
            format_count(kind.file_count as u64),
            format_size(kind.total_size)
        );
    }

    println!();
    println!("{:<44} {:>12}", "Largest items", "Size");
    for item in &report.largest {
        println!("{:<44} {:>12}", item.name, format_size(item.size));
    }
}

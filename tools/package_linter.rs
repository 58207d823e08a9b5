/// Package Linter: validates narrative packages before they ship.
///
/// Usage: package_linter <package_dir|package_file> [--warnings-as-errors]

use narrative_graph::core::store::{NarrativeStore, Severity};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: package_linter <package_dir|package_file> [--warnings-as-errors]");
        process::exit(0);
    }

    let package_path = Path::new(&args[1]);
    let warnings_as_errors = args[2..].iter().any(|a| a == "--warnings-as-errors");

    let mut files = Vec::new();
    if package_path.is_file() {
        files.push(package_path.to_path_buf());
    } else if package_path.is_dir() {
        collect_ron_files(package_path, &mut files);
        files.sort();
    } else {
        eprintln!("ERROR: Path '{}' does not exist", package_path.display());
        process::exit(1);
    }

    let mut builder = NarrativeStore::builder().strict(false);
    for file in &files {
        println!("  Loading: {}", file.display());
        builder = builder.package_file(file);
    }

    let store = match builder.build() {
        Ok(store) => store,
        Err(e) => {
            eprintln!("ERROR: Failed to load package: {}", e);
            process::exit(1);
        }
    };

    println!("Loaded {} nodes from {} file(s)", store.len(), files.len());

    let issues = store.validate();

    println!("\n=== Package Lint Report ===\n");

    if issues.is_empty() {
        println!("All checks passed!");
    }

    let mut errors = 0;
    let mut warnings = 0;
    for issue in &issues {
        match issue.severity() {
            Severity::Warning => {
                warnings += 1;
                println!("WARNING: {}", issue);
            }
            Severity::Error => {
                errors += 1;
                println!("ERROR: {}", issue);
            }
        }
    }

    println!("\nSummary: {} errors, {} warnings", errors, warnings);

    if errors > 0 || (warnings_as_errors && warnings > 0) {
        process::exit(1);
    }
}

fn collect_ron_files(dir: &Path, files: &mut Vec<PathBuf>) {
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                collect_ron_files(&path, files);
            } else if path.extension().and_then(|s| s.to_str()) == Some("ron") {
                files.push(path);
            }
        }
    }
}

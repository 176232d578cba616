// SPDX-License-Identifier: AGPL-3.0-or-later
//! CLI command implementations

use console::style;
use std::io::Write;
use std::path::Path as StdPath;
use std::thread;
use std::time::Duration;
use strata_core::{Part, VfsError, VfsResult};
use strata_vfs::{ChangeEvent, ChangeTracker, MountConfig, Path, Vfs, VfsConfig};
use tabled::{Table, Tabled};
use tracing::Level;

/// Logs go to stderr so they never mix with file contents on stdout.
pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

/// Parses `DOMAIN=DIR`.
pub fn parse_mount(s: &str) -> Result<MountConfig, String> {
    let (domain, root) = s
        .split_once('=')
        .ok_or_else(|| format!("expected DOMAIN=DIR, got `{s}`"))?;
    if domain.is_empty() || root.is_empty() {
        return Err(format!("expected DOMAIN=DIR, got `{s}`"));
    }
    Ok(MountConfig::new(domain, root))
}

/// Builds the VFS from the config file plus mounts given on the command line.
pub fn open_vfs(config_path: Option<&StdPath>, mounts: Vec<MountConfig>) -> VfsResult<Vfs> {
    let mut config = match config_path {
        Some(path) => VfsConfig::load(path)?,
        None => VfsConfig::load_default()?,
    };
    config.mounts.extend(mounts);
    Vfs::from_config(&config)
}

/// Domain-less arguments get the first domain that has them.
fn resolve_path(vfs: &Vfs, arg: &str) -> VfsResult<Path> {
    let path = Path::new(arg);
    vfs.make_canonical(&path)
        .ok_or_else(|| VfsError::NotFound(path.to_string()))
}

fn yes_no(value: bool) -> String {
    if value {
        style("yes").green().to_string()
    } else {
        style("no").dim().to_string()
    }
}

/// Display file contents
pub fn cat(vfs: &Vfs, path: &str) -> VfsResult<()> {
    let path = resolve_path(vfs, path)?;
    let bytes = vfs.read_file(&path)?;
    std::io::stdout().write_all(&bytes)?;
    Ok(())
}

/// Print fingerprints, one per line
pub fn fingerprint(vfs: &Vfs, paths: &[String], exact: bool) -> VfsResult<()> {
    for arg in paths {
        let path = resolve_path(vfs, arg)?;
        let fingerprint = if exact {
            vfs.lookup_backend(&path)
                .ok_or_else(|| VfsError::BackendNotFound(path.domain().to_string()))?
                .file_fingerprint(&path, true)?
        } else {
            vfs.get_fingerprint(&path, false)?
        };
        println!("{}  {}", style(fingerprint).cyan(), path);
    }
    Ok(())
}

/// Show file/directory information
pub fn stat(vfs: &Vfs, path: &str, json: bool) -> VfsResult<()> {
    let path = resolve_path(vfs, path)?;
    let entry = vfs.stat(&path)?;

    if json {
        let out = serde_json::to_string_pretty(&entry).map_err(std::io::Error::from)?;
        println!("{out}");
        return Ok(());
    }

    println!("  Path: {}", entry.path);
    println!("  Type: {:?}", entry.kind);
    if let Some(size) = entry.size {
        println!("  Size: {} ({})", size, bytesize::ByteSize(size));
    }
    if let Some(fingerprint) = entry.fingerprint {
        println!("  Fingerprint: {}", fingerprint);
    }
    if let Some(backend) = vfs.lookup_backend(&path) {
        println!("  Backend: {}", backend.display_name());
    }
    Ok(())
}

#[derive(Tabled)]
struct PartsRow {
    #[tabled(rename = "Input")]
    input: String,
    #[tabled(rename = "Domain")]
    domain: String,
    #[tabled(rename = "Parents")]
    parents: String,
    #[tabled(rename = "Stem")]
    stem: String,
    #[tabled(rename = "Extension")]
    extension: String,
    #[tabled(rename = "Absolute")]
    absolute: String,
}

impl PartsRow {
    fn new(input: &str) -> Self {
        let path = Path::new(input);
        let quoted = |part| format!("{:?}", path.part(part));
        Self {
            input: format!("{input:?}"),
            domain: quoted(Part::Domain),
            parents: quoted(Part::Parents),
            stem: quoted(Part::Stem),
            extension: quoted(Part::Extension),
            absolute: yes_no(path.is_absolute()),
        }
    }
}

/// Print the decomposition of each path
pub fn parts(paths: &[String]) -> VfsResult<()> {
    let rows: Vec<PartsRow> = paths.iter().map(|p| PartsRow::new(p)).collect();
    println!("{}", Table::new(rows));
    Ok(())
}

pub fn canonical(vfs: &Vfs, path: &str) -> VfsResult<()> {
    println!("{}", resolve_path(vfs, path)?);
    Ok(())
}

#[derive(Tabled)]
struct BackendRow {
    #[tabled(rename = "Domain")]
    domain: String,
    #[tabled(rename = "Backend")]
    name: String,
    #[tabled(rename = "Directories")]
    directories: String,
    #[tabled(rename = "Symlinks")]
    symlinks: String,
    #[tabled(rename = "Exact fingerprints")]
    exact: String,
}

/// List mounted backends
pub fn backends(vfs: &Vfs) -> VfsResult<()> {
    let rows: Vec<BackendRow> = vfs
        .domains()
        .filter_map(|domain| {
            let backend = vfs.get_backend(domain)?;
            let caps = backend.capabilities();
            Some(BackendRow {
                domain: style(domain).bold().to_string(),
                name: backend.display_name().to_string(),
                directories: yes_no(caps.directories),
                symlinks: yes_no(caps.symlinks),
                exact: yes_no(caps.exact_fingerprints),
            })
        })
        .collect();

    if rows.is_empty() {
        println!("(no backends mounted; use --mount DOMAIN=DIR or a config file)");
    } else {
        println!("{}", Table::new(rows));
    }
    Ok(())
}

/// Poll watched files and print every change
pub fn watch(vfs: &Vfs, paths: &[String], interval_ms: u64, count: Option<u64>) -> VfsResult<()> {
    let mut tracker = ChangeTracker::new();
    for arg in paths {
        // Domain-less paths bind to a domain once some backend has them.
        tracker.watch(vfs, Path::new(arg.as_str()));
    }
    eprintln!("Watching {} path(s), Ctrl-C to stop", tracker.len());

    let interval = Duration::from_millis(interval_ms);
    let mut polls = 0u64;
    while count.map_or(true, |max| polls < max) {
        thread::sleep(interval);
        polls += 1;
        for change in tracker.poll(vfs) {
            let event = match change.event {
                ChangeEvent::Created => style(change.event).green(),
                ChangeEvent::Changed => style(change.event).yellow(),
                ChangeEvent::Deleted => style(change.event).red(),
            };
            println!("{:>8}  {}", event, change.path);
        }
    }
    Ok(())
}

use crate::{
    backup::{self, BackupGate, BackupOutcome},
    events::{ChannelSink, EngineEvent, EventSink, NullSink},
    fsops, install, pal,
    plan::{ModPlan, PROCESS_NAME},
    process,
    rollback::{self, RollbackOutcome},
    verify::{self, VerifyReport},
};
use anyhow::{bail, Context, Result};
use std::{
    fs,
    io::{self, BufRead, Write},
    path::PathBuf,
    sync::mpsc,
    thread,
};
use time::{macros::format_description, OffsetDateTime};

const REPORT_LIST_CAP: usize = 25;

#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

struct GlobalOptions {
    root: Option<PathBuf>,
    format: OutputFormat,
    assume_yes: bool,
}

enum CliCommand {
    Backup,
    Install { archive: PathBuf },
    Verify,
    Rollback { snapshot: PathBuf },
    Backups,
    Paths,
    Help,
    Version,
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, options) = parse_args(&args)?;
    match command {
        CliCommand::Help => {
            print_help();
            Ok(())
        }
        CliCommand::Version => {
            println!("palsmith {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliCommand::Paths => cmd_paths(&options),
        CliCommand::Backups => cmd_backups(),
        CliCommand::Backup => cmd_backup(&options),
        CliCommand::Install { archive } => cmd_install(&options, archive),
        CliCommand::Verify => cmd_verify(&options),
        CliCommand::Rollback { snapshot } => cmd_rollback(&options, snapshot),
    }
}

fn parse_args(args: &[String]) -> Result<(CliCommand, GlobalOptions)> {
    let mut options = GlobalOptions {
        root: None,
        format: OutputFormat::Text,
        assume_yes: false,
    };
    let mut positional: Vec<String> = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--root" | "-r" => {
                let Some(value) = iter.next() else {
                    bail!("--root requires a path");
                };
                options.root = Some(PathBuf::from(value));
            }
            "--format" | "-f" => {
                let Some(value) = iter.next() else {
                    bail!("--format requires 'text' or 'json'");
                };
                options.format = OutputFormat::parse(value)
                    .with_context(|| format!("unknown format {value:?}"))?;
            }
            "--yes" | "-y" => options.assume_yes = true,
            "--help" | "-h" => return Ok((CliCommand::Help, options)),
            "--version" | "-V" => return Ok((CliCommand::Version, options)),
            other if other.starts_with('-') => bail!("unknown flag: {other}"),
            other => positional.push(other.to_string()),
        }
    }

    let command = match positional.first().map(String::as_str) {
        None | Some("help") => CliCommand::Help,
        Some("version") => CliCommand::Version,
        Some("backup") => CliCommand::Backup,
        Some("install") => {
            let Some(archive) = positional.get(1) else {
                bail!("usage: palsmith install <pack.zip>");
            };
            CliCommand::Install {
                archive: PathBuf::from(archive),
            }
        }
        Some("verify") => CliCommand::Verify,
        Some("rollback") | Some("restore") => {
            let Some(snapshot) = positional.get(1) else {
                bail!("usage: palsmith rollback <backup-dir>");
            };
            CliCommand::Rollback {
                snapshot: PathBuf::from(snapshot),
            }
        }
        Some("backups") => CliCommand::Backups,
        Some("paths") => CliCommand::Paths,
        Some(other) => bail!("unknown command: {other}"),
    };

    Ok((command, options))
}

fn print_help() {
    println!("palsmith — Palworld mod-pack installer");
    println!();
    println!("Usage: palsmith [options] <command>");
    println!();
    println!("Commands:");
    println!("  backup                 Move mod files into a timestamped backup");
    println!("  install <pack.zip>     Install a mod pack and record its manifest");
    println!("  verify                 Check installed files against the manifest");
    println!("  rollback <backup-dir>  Restore a previous backup");
    println!("  backups                List available backups");
    println!("  paths                  Show the resolved paths palsmith works with");
    println!();
    println!("Options:");
    println!("  -r, --root <dir>       Palworld install directory (default: Steam scan)");
    println!("  -f, --format <fmt>     Output format for verify: text or json");
    println!("  -y, --yes              Close a running game without asking");
}

fn resolve_root(options: &GlobalOptions) -> Result<PathBuf> {
    let root = match &options.root {
        Some(root) => root.clone(),
        None => pal::find_game_root()
            .context("could not locate the Palworld install; pass --root <dir>")?,
    };
    pal::validate_root(&root)?;
    Ok(root)
}

/// The engine never prompts; the running-game question is asked here
/// and only the decision is handed over.
fn clearance(options: &GlobalOptions) -> Result<BackupGate> {
    if !process::is_running(PROCESS_NAME) {
        return Ok(BackupGate::Proceed);
    }
    let close =
        options.assume_yes || confirm("Palworld is running. Close it before continuing?")?;
    if close {
        if process::kill(PROCESS_NAME) {
            println!("Palworld terminated.");
        }
        Ok(BackupGate::Proceed)
    } else {
        Ok(BackupGate::Declined)
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush().context("flush prompt")?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("read answer")?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes" | "YES"))
}

/// Runs one operation on a dedicated worker thread and renders its
/// events on the control thread until the sink closes. A panic inside
/// the worker surfaces as an error instead of taking the process down.
fn run_worker<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn EventSink) -> Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let sink = ChannelSink::new(tx);
        task(&sink)
    });

    let mut progress_open = false;
    for event in rx {
        match event {
            EngineEvent::Log(message) => {
                if progress_open {
                    println!();
                    progress_open = false;
                }
                println!("{} | {message}", clock());
            }
            EngineEvent::Progress { current, total } => {
                print!("\r  {current}/{total}");
                let _ = io::stdout().flush();
                progress_open = true;
            }
        }
    }
    if progress_open {
        println!();
    }

    match handle.join() {
        Ok(result) => result,
        Err(_) => bail!("operation worker panicked"),
    }
}

/// Same worker contract with events discarded; used for
/// machine-readable output.
fn run_quiet<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn EventSink) -> Result<T> + Send + 'static,
{
    match thread::spawn(move || task(&NullSink)).join() {
        Ok(result) => result,
        Err(_) => bail!("operation worker panicked"),
    }
}

fn clock() -> String {
    let format = format_description!("[hour]:[minute]:[second]");
    OffsetDateTime::now_utc()
        .format(format)
        .unwrap_or_else(|_| "--:--:--".to_string())
}

fn cmd_backup(options: &GlobalOptions) -> Result<()> {
    let root = resolve_root(options)?;
    let plan = ModPlan::palworld();
    let gate = clearance(options)?;
    let outcome = run_worker(move |sink| backup::backup(&root, &plan, gate, sink))?;
    match outcome {
        BackupOutcome::Completed {
            snapshot_dir,
            leftovers,
        } => {
            println!("Backup written to {}", snapshot_dir.display());
            if !leftovers.is_empty() {
                println!("Copied but could not remove from the install:");
                for rel in leftovers {
                    println!("  - {rel}");
                }
            }
        }
        BackupOutcome::Skipped => println!("Backup skipped; Palworld is still running."),
    }
    Ok(())
}

fn cmd_install(options: &GlobalOptions, archive: PathBuf) -> Result<()> {
    let root = resolve_root(options)?;
    let plan = ModPlan::palworld();
    let copied = run_worker(move |sink| install::install(&root, &archive, &plan, sink))?;
    println!("Mod pack installed ({copied} files).");
    Ok(())
}

fn cmd_verify(options: &GlobalOptions) -> Result<()> {
    let root = resolve_root(options)?;
    let plan = ModPlan::palworld();
    let report = match options.format {
        OutputFormat::Json => run_quiet(move |sink| verify::verify(&root, &plan, sink))?,
        OutputFormat::Text => run_worker(move |sink| verify::verify(&root, &plan, sink))?,
    };
    match options.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).context("serialize report")?
        ),
        OutputFormat::Text => render_report(&report),
    }
    if !report.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}

fn render_report(report: &VerifyReport) {
    if report.is_clean() {
        println!("All {} files match the installed mod pack.", report.ok);
        return;
    }
    println!(
        "Integrity report: {} ok, {} changed, {} missing.",
        report.ok,
        report.changed.len(),
        report.missing.len()
    );
    print_section("Missing files", &report.missing);
    print_section("Changed files", &report.changed);
    println!("Run 'palsmith rollback <backup-dir>' or reinstall the mod pack to repair.");
}

fn print_section(title: &str, entries: &[String]) {
    if entries.is_empty() {
        return;
    }
    println!("{title} ({}):", entries.len());
    for entry in entries.iter().take(REPORT_LIST_CAP) {
        println!("  - {entry}");
    }
    if entries.len() > REPORT_LIST_CAP {
        println!("  ...and {} more", entries.len() - REPORT_LIST_CAP);
    }
}

fn cmd_rollback(options: &GlobalOptions, snapshot: PathBuf) -> Result<()> {
    let root = resolve_root(options)?;
    let plan = ModPlan::palworld();
    // Bare snapshot names resolve against the backup root.
    let snapshot_dir = if snapshot.is_dir() {
        snapshot
    } else {
        plan.backup_root.join(&snapshot)
    };
    let gate = clearance(options)?;
    let outcome =
        run_worker(move |sink| rollback::rollback(&root, &snapshot_dir, &plan, gate, sink))?;
    match outcome {
        RollbackOutcome::Completed { restored, .. } => {
            println!("Rollback complete ({restored} files restored).");
        }
        RollbackOutcome::Skipped => println!("Rollback skipped; Palworld is still running."),
    }
    Ok(())
}

fn cmd_backups() -> Result<()> {
    let plan = ModPlan::palworld();
    if !plan.backup_root.is_dir() {
        println!("No backups under {}", plan.backup_root.display());
        return Ok(());
    }
    let mut names: Vec<String> = fs::read_dir(&plan.backup_root)
        .context("read backup root")?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    if names.is_empty() {
        println!("No backups under {}", plan.backup_root.display());
        return Ok(());
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn cmd_paths(options: &GlobalOptions) -> Result<()> {
    let plan = ModPlan::palworld();
    match resolve_root(options) {
        Ok(root) => {
            println!("root:       {}", root.display());
            println!("manifest:   {}", plan.manifest_path(&root).display());
        }
        Err(err) => println!("root:       not found ({err})"),
    }
    println!("backups:    {}", plan.backup_root.display());
    println!("mod paths:");
    for rel in &plan.mod_paths {
        println!("  {}", fsops::rel_key(rel));
    }
    println!(
        "loose area: {} (except {})",
        fsops::rel_key(&plan.loose_dir),
        plan.vanilla_pak
    );
    Ok(())
}

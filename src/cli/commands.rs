use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;

use chrono::Utc;
use colored::Colorize;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};

use crate::config::Settings;
use crate::error::{TransyncError, TransyncResult};
use crate::format::{FileFormat, FuzzyMode, PoFile};
use crate::spreadsheet::{SpreadsheetExporter, SpreadsheetImporter};
use crate::translation::{MergeSummary, UploadMethod, UploadOptions};
use crate::workspace::{SyncReport, Workspace};

fn open_workspace(config: &Path) -> TransyncResult<Workspace> {
    let settings = Settings::load(config)?;
    Workspace::open(&settings)
}

fn print_reports(reports: &[SyncReport], verbose: bool) {
    for report in reports {
        match &report.error {
            Some(error) => println!(
                "   {} {} {}",
                "❌".red(),
                report.translation.to_string().bright_blue(),
                error.red()
            ),
            None if report.synced => println!(
                "   {} {} ({})",
                "🔄".cyan(),
                report.translation.to_string().bright_blue(),
                report.filename.display()
            ),
            None if verbose => println!(
                "   {} {} unchanged",
                "✅".green(),
                report.translation.to_string().bright_blue()
            ),
            None => {}
        }
    }
}

/// Execute the sync command
pub fn sync(config: PathBuf, force: bool, verbose: bool) -> TransyncResult<()> {
    println!("{}", "🔄 Transync - Synchronizing translations".bold().green());
    println!("   Config: {}", config.display());
    if force {
        println!("   {}", "Forced: every file is re-read".yellow());
    }
    println!();

    let mut workspace = open_workspace(&config)?;
    let reports = workspace.sync_all(force)?;
    print_reports(&reports, verbose);

    let synced = reports.iter().filter(|r| r.synced).count();
    let failed = reports.iter().filter(|r| r.error.is_some()).count();
    println!(
        "\n{} {} translations, {} synchronized, {} failed",
        "✅".green(),
        reports.len(),
        synced,
        failed
    );
    if failed > 0 {
        return Err(TransyncError::Config(format!(
            "{} translation(s) could not be synchronized",
            failed
        )));
    }
    Ok(())
}

/// Execute the status command
pub fn status(config: PathBuf) -> TransyncResult<()> {
    let mut workspace = open_workspace(&config)?;
    workspace.sync_all(false)?;

    println!("{}", "📊 Transync - Translation status".bold().green());
    println!();
    println!(
        "   {:<40} {:>8} {:>8} {:>8} {:>8}",
        "Translation".bold(),
        "Strings".bold(),
        "Done %".bold(),
        "Fuzzy %".bold(),
        "Checks".bold()
    );
    for stats in workspace.statistics() {
        let done = format!("{:.1}", stats.translated_percent);
        let done = if stats.translated_percent >= 100.0 {
            done.green()
        } else {
            done.yellow()
        };
        println!(
            "   {:<40} {:>8} {:>8} {:>8} {:>8}",
            stats.translation.to_string().bright_blue(),
            stats.counts.total,
            done,
            format!("{:.1}", stats.fuzzy_percent),
            stats.counts.failing_checks
        );
        if let Some(user) = stats.locked_by {
            println!("      🔒 locked by {}", user.yellow());
        }
    }
    Ok(())
}

/// Execute the export command: PO file(s) to one workbook
pub fn export(
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
    revision: Option<String>,
) -> TransyncResult<()> {
    println!("{}", "📤 Transync - Excel Export".bold().green());
    for input in &inputs {
        println!("   Input:  {}", input.display());
    }

    let first = inputs
        .first()
        .ok_or_else(|| TransyncError::Spreadsheet("No PO files to export".to_string()))?;
    let output = output.unwrap_or_else(|| {
        if inputs.len() > 1 {
            let mut name = first.with_extension("").into_os_string();
            name.push(".all.xlsx");
            PathBuf::from(name)
        } else {
            first.with_extension("xlsx")
        }
    });
    println!("   Output: {}\n", output.display());

    let po_data = inputs
        .iter()
        .map(|path| PoFile::open(path))
        .collect::<TransyncResult<Vec<_>>>()?;
    let entries: usize = po_data.iter().map(|po| po.units.len()).sum();
    SpreadsheetExporter::new(po_data, revision).export(&output)?;

    println!("{}", "✅ Export Complete!".bold().green());
    println!("   {} entries written to {}\n", entries, output.display());
    Ok(())
}

/// Execute the import command: workbook to PO file
pub fn import(
    input: PathBuf,
    output: Option<PathBuf>,
    simple: bool,
    alt_column: Option<String>,
) -> TransyncResult<()> {
    println!("{}", "📥 Transync - Excel Import".bold().green());
    let output = output.unwrap_or_else(|| input.with_extension("po"));
    println!("   Input:  {}", input.display());
    println!("   Output: {}\n", output.display());

    let (po, revision) = SpreadsheetImporter::new(&input).import(simple, alt_column.as_deref())?;
    po.save(&output)?;

    println!("{}", "✅ Import Complete!".bold().green());
    println!("   {} entries written to {}", po.units.len(), output.display());
    if let Some(revision) = revision {
        println!("   Exported from revision {}", revision.cyan());
    }
    println!();
    Ok(())
}

/// Arguments of the upload command
pub struct UploadArgs {
    pub project: String,
    pub component: String,
    pub language: String,
    pub file: PathBuf,
    pub author: String,
    pub method: String,
    pub overwrite: bool,
    pub fuzzy: String,
}

fn print_summary(summary: &MergeSummary) {
    if summary.total == 0 {
        println!("{}", "⚠️  No strings were imported from the uploaded file.".yellow());
        return;
    }
    println!(
        "{} Processed {} strings (skipped: {}, not found: {}, updated: {})",
        "✅".green(),
        summary.total,
        summary.skipped,
        summary.not_found,
        summary.accepted.to_string().bold()
    );
}

/// Execute the upload command
pub fn upload(config: PathBuf, args: UploadArgs) -> TransyncResult<()> {
    println!("{}", "📥 Transync - Upload".bold().green());
    println!(
        "   Target: {}/{}/{}",
        args.project, args.component, args.language
    );
    println!("   File:   {}\n", args.file.display());

    let options = UploadOptions {
        overwrite: args.overwrite,
        method: UploadMethod::from_id(&args.method)?,
        fuzzy: FuzzyMode::from_id(&args.fuzzy)?,
        ..Default::default()
    };
    let content = fs::read(&args.file)?;
    let file_name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut workspace = open_workspace(&config)?;
    workspace.sync_all(false)?;
    let summary = workspace.upload(
        &args.project,
        &args.component,
        &args.language,
        &args.author,
        &file_name,
        &content,
        options,
    )?;
    print_summary(&summary);
    Ok(())
}

/// Execute the commit command
pub fn commit(config: PathBuf, author: String) -> TransyncResult<()> {
    println!("{}", "💾 Transync - Commit".bold().green());
    let mut workspace = open_workspace(&config)?;
    workspace.sync_all(false)?;
    let committed = workspace.commit_all(&author)?;
    println!("{} {} translation(s) committed", "✅".green(), committed);
    Ok(())
}

/// Execute the watch command: re-sync components when their files change
pub fn watch(config: PathBuf, verbose: bool) -> TransyncResult<()> {
    println!("{}", "👁️  Transync - Watch Mode".bold().green());
    println!("   Config: {}", config.display());
    println!("   Press {} to stop\n", "Ctrl+C".bold().yellow());

    let mut workspace = open_workspace(&config)?;

    // (project, component, canonical repo, file extension)
    let mut watched = Vec::new();
    for component in workspace.components() {
        let repo = component.config.repo.canonicalize()?;
        watched.push((
            component.project().to_string(),
            component.slug().to_string(),
            repo,
            component.format.extension(),
        ));
    }

    let (tx, rx) = channel();
    let mut debouncer = new_debouncer(Duration::from_millis(200), tx)
        .map_err(|e| TransyncError::Config(format!("Failed to create file watcher: {}", e)))?;
    for (_, _, repo, _) in &watched {
        debouncer
            .watcher()
            .watch(repo, RecursiveMode::Recursive)
            .map_err(|e| TransyncError::Config(format!("Failed to watch directory: {}", e)))?;
        if verbose {
            println!("   {} {}", "Watching directory:".cyan(), repo.display());
        }
    }

    println!("{}", "🔄 Initial sync...".cyan());
    print_reports(&workspace.sync_all(false)?, verbose);
    println!();

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let mut touched: Vec<(String, String)> = Vec::new();
                for event in events.iter().filter(|e| e.kind == DebouncedEventKind::Any) {
                    let path = event.path.canonicalize().unwrap_or_else(|_| event.path.clone());
                    let extension = path
                        .extension()
                        .map(|e| e.to_string_lossy().to_string())
                        .unwrap_or_default();
                    for (project, slug, repo, ext) in &watched {
                        let key = (project.clone(), slug.clone());
                        if path.starts_with(repo) && extension == *ext && !touched.contains(&key) {
                            touched.push(key);
                        }
                    }
                }

                for (project, slug) in touched {
                    println!(
                        "{} {}/{} at {}",
                        "🔄 Change detected in".cyan(),
                        project,
                        slug,
                        Utc::now().format("%H:%M:%S UTC").to_string().cyan()
                    );
                    match workspace.sync_component_by_slug(&project, &slug, false) {
                        Ok(reports) => print_reports(&reports, verbose),
                        Err(e) => println!("{} {}", "❌ Sync failed:".bold().red(), e),
                    }
                }
            }
            Ok(Err(error)) => {
                eprintln!("{} Watch error: {}", "❌".red(), error);
            }
            Err(e) => {
                eprintln!("{} Channel error: {}", "❌".red(), e);
                break;
            }
        }
    }

    Ok(())
}

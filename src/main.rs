use clap::{Parser, Subcommand};
use std::path::PathBuf;
use transync::api::{run_api_server, server::ApiConfig};
use transync::cli;

#[derive(Parser)]
#[command(name = "transync")]
#[command(about = "Keep translation files in VCS checkouts in sync with a unit database.")]
#[command(long_about = "Transync - translation file synchronization and merge engine

COMMANDS:
  sync     - Re-read changed translation files into the database
  status   - Per-translation statistics
  export   - PO to Excel (.xlsx)
  import   - Excel to PO
  upload   - Merge a file into a translation
  commit   - Write pending edits and commit them
  watch    - Re-sync whenever translation files change
  serve    - Run the HTTP API

EXAMPLES:
  transync sync --force
  transync export po/de.po po/fr.po -o all.xlsx
  transync upload demo app de translated.xlsx --overwrite
  transync serve --port 3000")]
#[command(version)]
struct Cli {
    /// Workspace configuration file
    #[arg(
        short,
        long,
        global = true,
        default_value = "transync.yaml",
        env = "TRANSYNC_CONFIG"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize every configured translation file
    Sync {
        /// Re-read files even when their hash did not change
        #[arg(short, long)]
        force: bool,

        /// Also list unchanged translations
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show translation statistics
    Status,

    #[command(long_about = "Export gettext PO files to an Excel workbook.

One file gives a single-language workbook with an obsolete sheet; several
files give one workbook with a translation column per language (titled by
the Language header).

EXAMPLE:
  transync export po/de.po --revision 4f2a9c1")]
    /// Export PO file(s) to Excel
    Export {
        /// PO file(s) to export
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output workbook (default: next to the first input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Repository revision recorded in the metadata sheet
        #[arg(short, long)]
        revision: Option<String>,
    },

    /// Import an Excel workbook into a PO file
    Import {
        /// Workbook to read
        input: PathBuf,

        /// Output PO file (default: next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only pick up translations (no comments, occurrences or obsolete sheet)
        #[arg(short, long)]
        simple: bool,

        /// Column to read translations from when there is no "Translation" column
        #[arg(short, long)]
        alt_column: Option<String>,
    },

    /// Merge a file (PO, JSON or xlsx) into a translation
    Upload {
        project: String,
        component: String,
        language: String,
        file: PathBuf,

        /// Recorded as author of the merged edits
        #[arg(short, long, default_value = "Transync CLI")]
        author: String,

        /// translate, fuzzy or suggest
        #[arg(short, long, default_value = "translate")]
        method: String,

        /// Replace existing translations
        #[arg(long)]
        overwrite: bool,

        /// Fuzzy strings in the file: skip, process or approve
        #[arg(long, default_value = "skip")]
        fuzzy: String,
    },

    /// Commit pending edits of every translation
    Commit {
        /// Author for translations without a recorded editor
        #[arg(short, long, default_value = "Transync CLI")]
        author: String,
    },

    /// Re-sync components when their files change
    Watch {
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run the HTTP API server
    Serve {
        /// Host address to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1", env = "TRANSYNC_HOST")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "8080", env = "TRANSYNC_PORT")]
        port: u16,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    transync::api::server::init_tracing();

    match cli.command {
        Commands::Sync { force, verbose } => cli::sync(cli.config, force, verbose)?,

        Commands::Status => cli::status(cli.config)?,

        Commands::Export {
            inputs,
            output,
            revision,
        } => cli::export(inputs, output, revision)?,

        Commands::Import {
            input,
            output,
            simple,
            alt_column,
        } => cli::import(input, output, simple, alt_column)?,

        Commands::Upload {
            project,
            component,
            language,
            file,
            author,
            method,
            overwrite,
            fuzzy,
        } => cli::upload(
            cli.config,
            cli::UploadArgs {
                project,
                component,
                language,
                file,
                author,
                method,
                overwrite,
                fuzzy,
            },
        )?,

        Commands::Commit { author } => cli::commit(cli.config, author)?,

        Commands::Watch { verbose } => cli::watch(cli.config, verbose)?,

        Commands::Serve { host, port } => {
            let config = ApiConfig {
                host,
                port,
                config: cli.config,
            };
            tokio::runtime::Runtime::new()?.block_on(run_api_server(config))?;
        }
    }
    Ok(())
}

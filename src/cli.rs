//! The command line interface for the batch-shaped operations.
use crate::compose::{calc_least_cost, compose_map_table};
use crate::config::ProjectConfig;
use crate::diff::Difference;
use crate::log;
use crate::request::TableRequest;
use crate::settings::Settings;
use crate::table::{GID_COL, TOTAL_LCOE_COL, Table};
use ::log::info;
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};

pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for the supply curve outlook tool.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for the table command
#[derive(Args)]
pub struct TableOpts {
    /// Where to write the composed table; stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Filter predicates of the form "<column> <op> <value>"
    #[arg(short, long = "filter")]
    pub filters: Vec<String>,
    /// A second scenario to difference or mask against
    #[arg(long)]
    pub path2: Option<String>,
    /// Compute the difference against the second scenario
    #[arg(long, requires = "path2")]
    pub diff: bool,
    /// Drop rows whose site appears in the primary scenario
    #[arg(long, requires = "path2")]
    pub mask: bool,
    /// Restrict to these states; "offshore"/"onshore" select by the offshore flag
    #[arg(long)]
    pub states: Vec<String>,
    /// Restrict to these aggregation regions
    #[arg(long)]
    pub regions: Vec<String>,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Write the difference table of two scenario files.
    Diff {
        /// The base scenario file.
        path_a: PathBuf,
        /// The scenario file to compare against the base.
        path_b: PathBuf,
        /// Where to write the difference table.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Build a least-cost composite of several scenario files.
    LeastCost {
        /// The scenario files to combine.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Where to write the composite table.
        #[arg(short, long)]
        output: PathBuf,
        /// The cost column to minimise.
        #[arg(long, default_value = TOTAL_LCOE_COL)]
        by: String,
        /// Whether to overwrite an existing output file.
        #[arg(long)]
        overwrite: bool,
    },
    /// Compose one scenario's supply curve table for a project.
    Table {
        /// Path to the project directory.
        project_path: PathBuf,
        /// The scenario, as a name from the project file or a path on disk.
        scenario: String,
        /// Other table options
        #[command(flatten)]
        opts: TableOpts,
    },
    /// Manage the program settings file.
    Settings {
        /// The available subcommands for managing settings.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Diff {
                path_a,
                path_b,
                output,
            } => handle_diff_command(&path_a, &path_b, &output, None),
            Self::LeastCost {
                paths,
                output,
                by,
                overwrite,
            } => handle_least_cost_command(&paths, &output, &by, overwrite, None),
            Self::Table {
                project_path,
                scenario,
                opts,
            } => handle_table_command(&project_path, &scenario, &opts, None),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start scout
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ scout --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Handle the `diff` command.
pub fn handle_diff_command(
    path_a: &Path,
    path_b: &Path,
    output: &Path,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;
    log::init(&settings.log_level, None).context("Failed to initialise logging.")?;

    let table_a = Table::from_csv(path_a)?;
    let table_b = Table::from_csv(path_b)?;
    let result = Difference::new(GID_COL).calc(&table_a, &table_b)?;
    result.to_csv(output)?;
    info!("Difference table written to {}", output.display());

    Ok(())
}

/// Handle the `least-cost` command.
///
/// Log files are kept next to the output file, since the command can run for a while over many
/// scenarios.
pub fn handle_least_cost_command(
    paths: &[PathBuf],
    output: &Path,
    by: &str,
    overwrite: bool,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;
    let log_dir = output.parent().unwrap_or(Path::new("."));
    log::init(&settings.log_level, Some(log_dir)).context("Failed to initialise logging.")?;

    calc_least_cost(paths, output, by, overwrite || settings.overwrite)
}

/// Handle the `table` command.
pub fn handle_table_command(
    project_path: &Path,
    scenario: &str,
    opts: &TableOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;
    log::init(&settings.log_level, None).context("Failed to initialise logging.")?;

    let config = ProjectConfig::from_dir(resolve_project_dir(project_path))?;
    let request = TableRequest {
        path: scenario.to_string(),
        path2: opts.path2.clone(),
        filters: opts.filters.clone(),
        diff: opts.diff,
        mask: opts.mask,
        states: opts.states.clone(),
        regions: opts.regions.clone(),
        ..TableRequest::default()
    };
    let table = compose_map_table(&config, &request)?;

    match &opts.output {
        Some(output) => {
            table.to_csv(output)?;
            info!("Table written to {}", output.display());
        }
        None => table.write_csv(io::stdout())?,
    }

    Ok(())
}

/// Accept either the project directory or the project file within it
fn resolve_project_dir(path: &Path) -> &Path {
    if path.is_file() {
        path.parent().unwrap_or(path)
    } else {
        path
    }
}

/// Load program settings, if not provided
fn load_settings(settings: Option<Settings>) -> Result<Settings> {
    match settings {
        Some(settings) => Ok(settings),
        None => Settings::load().context("Failed to load settings."),
    }
}

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use sdg_catalog_publisher::app::{App, RunOptions, RunReport};
use sdg_catalog_publisher::catalog::{CatalogClient, CatalogHttpClient};
use sdg_catalog_publisher::config::ConfigLoader;
use sdg_catalog_publisher::error::PublishError;
use sdg_catalog_publisher::output::{ConsoleOutput, JsonOutput, OutputMode};
use sdg_catalog_publisher::sdgapi::{SdgApiClient, SdgApiHttpClient};
use sdg_catalog_publisher::store::DataStore;
use sdg_catalog_publisher::taxonomy::{LevelFilter, TaxonomyFilter};

#[derive(Parser)]
#[command(name = "sdg-catalog")]
#[command(about = "Publish UN SDG indicator series as open data items on ArcGIS Online")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Walk the SDG taxonomy and publish or update catalog items")]
    Publish(PublishArgs),
    #[command(about = "Reassign every published item to the admin account")]
    Reassign(ReassignArgs),
    #[command(about = "Delete every item owned by the publishing account")]
    Cleanup(CleanupArgs),
}

#[derive(Args, Clone)]
struct PublishArgs {
    #[arg(long)]
    goal: Option<String>,

    #[arg(long)]
    target: Option<String>,

    #[arg(long)]
    indicator: Option<String>,

    #[arg(long)]
    series: Option<String>,

    #[arg(long)]
    metadata_only: bool,

    #[arg(long)]
    config: Option<String>,
}

#[derive(Args)]
struct ReassignArgs {
    #[arg(long)]
    config: Option<String>,
}

#[derive(Args)]
struct CleanupArgs {
    #[arg(long)]
    yes: bool,

    #[arg(long)]
    config: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(publish) = report.downcast_ref::<PublishError>() {
            return ExitCode::from(map_exit_code(publish));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PublishError) -> u8 {
    match error {
        PublishError::MissingCredentials => 2,
        PublishError::ConfigRead(_) | PublishError::ConfigParse(_) => 2,
        PublishError::ConfirmationRequired(_) => 2,
        PublishError::GroupNotFound(_) => 2,
        PublishError::SdgApiHttp(_)
        | PublishError::SdgApiStatus { .. }
        | PublishError::DisplayMetadataHttp(_)
        | PublishError::DisplayMetadataStatus { .. }
        | PublishError::CatalogHttp(_)
        | PublishError::CatalogStatus { .. }
        | PublishError::CatalogApi(_)
        | PublishError::Authentication { .. }
        | PublishError::Analyze { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    match cli.command {
        Commands::Publish(args) => run_publish(args, output_mode),
        Commands::Reassign(args) => run_reassign(args, output_mode),
        Commands::Cleanup(args) => run_cleanup(args, output_mode),
    }
}

#[derive(Clone, Copy)]
struct NopSdg;

impl SdgApiClient for NopSdg {
    fn fetch_goal_tree(
        &self,
    ) -> Result<Vec<sdg_catalog_publisher::taxonomy::Goal>, PublishError> {
        Err(PublishError::SdgApiHttp(
            "SDG API client not configured".to_string(),
        ))
    }

    fn fetch_display_metadata(
        &self,
    ) -> Result<Vec<sdg_catalog_publisher::taxonomy::GoalDisplay>, PublishError> {
        Err(PublishError::SdgApiHttp(
            "SDG API client not configured".to_string(),
        ))
    }
}

fn run_publish(args: PublishArgs, output_mode: OutputMode) -> miette::Result<()> {
    let (config, credentials) = ConfigLoader::resolve(args.config.as_deref()).into_diagnostic()?;
    let sdg =
        SdgApiHttpClient::new(&config.goal_list_url, &config.metadata_url).into_diagnostic()?;
    let catalog = CatalogHttpClient::connect(
        &config.portal_url,
        &credentials.username,
        &credentials.password,
    )
    .into_diagnostic()?;
    let store = DataStore::new(config.data_dir.clone());
    let app = App::new(store, sdg, catalog, config);

    let options = RunOptions {
        filter: TaxonomyFilter {
            goal: LevelFilter::from_option(args.goal),
            target: LevelFilter::from_option(args.target),
            indicator: LevelFilter::from_option(args.indicator),
            series: LevelFilter::from_option(args.series),
        },
        metadata_only: args.metadata_only,
    };

    run_taxonomy(app, options, output_mode)
}

fn run_taxonomy<S: SdgApiClient + 'static, C: CatalogClient + 'static>(
    app: App<S, C>,
    options: RunOptions,
    output_mode: OutputMode,
) -> miette::Result<()> {
    match output_mode {
        OutputMode::NonInteractive => {
            let report = app.process_taxonomy(&options, &JsonOutput);
            JsonOutput::print_run(&report).into_diagnostic()?;
            Ok(())
        }
        OutputMode::Interactive => {
            let report = app.process_taxonomy(&options, &ConsoleOutput);
            print_run_summary(&report);
            Ok(())
        }
    }
}

fn run_reassign(args: ReassignArgs, output_mode: OutputMode) -> miette::Result<()> {
    let (config, credentials) = ConfigLoader::resolve(args.config.as_deref()).into_diagnostic()?;
    let catalog = CatalogHttpClient::connect(
        &config.portal_url,
        &credentials.username,
        &credentials.password,
    )
    .into_diagnostic()?;
    let store = DataStore::new(config.data_dir.clone());
    let app = App::new(store, NopSdg, catalog, config);

    match output_mode {
        OutputMode::NonInteractive => {
            let report = app.reassign_to_admin(&JsonOutput).into_diagnostic()?;
            JsonOutput::print_reassign(&report).into_diagnostic()?;
            Ok(())
        }
        OutputMode::Interactive => {
            let report = app.reassign_to_admin(&ConsoleOutput).into_diagnostic()?;
            println!(
                "reassigned {} items to {}",
                report.reassigned, report.admin_username
            );
            Ok(())
        }
    }
}

fn run_cleanup(args: CleanupArgs, output_mode: OutputMode) -> miette::Result<()> {
    let (config, credentials) = ConfigLoader::resolve(args.config.as_deref()).into_diagnostic()?;
    let catalog = CatalogHttpClient::connect(
        &config.portal_url,
        &credentials.username,
        &credentials.password,
    )
    .into_diagnostic()?;
    let store = DataStore::new(config.data_dir.clone());
    let app = App::new(store, NopSdg, catalog, config);

    match output_mode {
        OutputMode::NonInteractive => {
            let report = app
                .cleanup_owned_items(args.yes, &JsonOutput)
                .into_diagnostic()?;
            JsonOutput::print_cleanup(&report).into_diagnostic()?;
            Ok(())
        }
        OutputMode::Interactive => {
            let report = app
                .cleanup_owned_items(args.yes, &ConsoleOutput)
                .into_diagnostic()?;
            println!("deleted {} items", report.deleted);
            Ok(())
        }
    }
}

fn print_run_summary(report: &RunReport) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    println!("{cyan}SDG catalog run summary{reset}");
    println!(
        "{green}Series processed: {} (published {}, updated {}){reset}",
        report.processed, report.published, report.updated
    );
    println!(
        "{yellow}Failed series: {}{reset}",
        report.failed_series.len()
    );
    for code in &report.failed_series {
        println!("{yellow}  {code}{reset}");
    }
    if let Some(reason) = &report.aborted {
        println!("{red}Run aborted: {reason}{reset}");
    }
}

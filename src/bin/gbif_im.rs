use std::process::ExitCode;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use gbif_image_manager::domain::{DownloadCredentials, RecordType};
use gbif_image_manager::error::GbifImageError;
use gbif_image_manager::fetch::{FetchOptions, fetch_and_transform};
use gbif_image_manager::gbif::GbifHttpClient;
use gbif_image_manager::media::HttpMediaFetcher;
use gbif_image_manager::results::{read_metadata, write_metadata};
use gbif_image_manager::search::{SearchOptions, search_media};

#[derive(Parser)]
#[command(name = "gbif-im")]
#[command(about = "Search GBIF specimen images and download them with per-row result tracking")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Query occurrences with images and write the flattened metadata table")]
    Search(SearchArgs),
    #[command(about = "Download and post-process the images referenced by a metadata table")]
    Fetch(FetchArgs),
}

#[derive(Args)]
struct SearchArgs {
    #[arg(long)]
    taxon: Option<String>,

    #[arg(long, requires = "lon")]
    lat: Option<f64>,

    #[arg(long, requires = "lat")]
    lon: Option<f64>,

    /// Half-width of the square geographic filter around --lat/--lon.
    #[arg(long, default_value_t = 1.0)]
    buffer: f64,

    #[arg(long, default_value_t = 100)]
    limit: u32,

    /// herbarium, cs, or a raw basis-of-record value passed through.
    #[arg(long, default_value = "herbarium")]
    record_type: String,

    /// Extra key=value filter parameters passed through to GBIF.
    #[arg(long = "filter", value_name = "KEY=VALUE")]
    filters: Vec<String>,

    #[arg(long, requires_all = ["password", "email"])]
    username: Option<String>,

    #[arg(long, requires_all = ["username", "email"])]
    password: Option<String>,

    #[arg(long, requires_all = ["username", "password"])]
    email: Option<String>,

    #[arg(long)]
    output: Utf8PathBuf,
}

#[derive(Args)]
struct FetchArgs {
    #[arg(long)]
    metadata: Utf8PathBuf,

    #[arg(long)]
    output_dir: Utf8PathBuf,

    /// Re-encode every downloaded image at this JPEG quality.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// Downscale images above this megapixel count.
    #[arg(long)]
    max_megapixels: Option<f64>,

    #[arg(long, default_value_t = 1000)]
    delay_ms: u64,

    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    #[arg(long)]
    results: Utf8PathBuf,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<GbifImageError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &GbifImageError) -> u8 {
    match error {
        GbifImageError::EmptyMetadata
        | GbifImageError::InvalidQuality(_)
        | GbifImageError::MetadataRead { .. } => 2,
        GbifImageError::GbifHttp(_)
        | GbifImageError::GbifStatus { .. }
        | GbifImageError::MediaHttp(_)
        | GbifImageError::MediaStatus { .. } => 3,
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
    match cli.command {
        Commands::Search(args) => run_search(args),
        Commands::Fetch(args) => run_fetch(args),
    }
}

fn run_search(args: SearchArgs) -> miette::Result<()> {
    let credentials = match (args.username, args.password, args.email) {
        (Some(username), Some(password), Some(email)) => Some(DownloadCredentials {
            username,
            password,
            email,
        }),
        _ => None,
    };

    let options = SearchOptions {
        taxon: args.taxon,
        center: args.lat.zip(args.lon),
        buffer_distance: args.buffer,
        limit: args.limit,
        record_type: RecordType::from(args.record_type.as_str()),
        extra_filters: parse_filters(&args.filters)?,
        credentials,
    };

    let client = GbifHttpClient::new().into_diagnostic()?;
    let rows = search_media(&client, &options).into_diagnostic()?;
    write_metadata(&args.output, &rows).into_diagnostic()?;
    println!("wrote {} metadata rows to {}", rows.len(), args.output);
    Ok(())
}

fn run_fetch(args: FetchArgs) -> miette::Result<()> {
    let rows = read_metadata(&args.metadata).into_diagnostic()?;
    let fetcher =
        HttpMediaFetcher::new(Duration::from_secs(args.timeout_secs)).into_diagnostic()?;
    let options = FetchOptions {
        output_dir: args.output_dir,
        results_path: args.results.clone(),
        quality: args.quality,
        max_megapixels: args.max_megapixels,
        delay: Duration::from_millis(args.delay_ms),
    };

    let results = fetch_and_transform(&fetcher, &rows, &options).into_diagnostic()?;
    let succeeded = results
        .iter()
        .filter(|row| {
            matches!(
                row.status,
                Some(gbif_image_manager::domain::RowStatus::Succeeded)
            )
        })
        .count();
    println!(
        "processed {} rows ({} succeeded), results at {}",
        results.len(),
        succeeded,
        args.results
    );
    Ok(())
}

fn parse_filters(raw: &[String]) -> miette::Result<Vec<(String, String)>> {
    let mut filters = Vec::new();
    for entry in raw {
        let Some((key, value)) = entry.split_once('=') else {
            return Err(miette::Report::msg(format!(
                "invalid filter '{entry}': expected KEY=VALUE"
            )));
        };
        filters.push((key.to_string(), value.to_string()));
    }
    Ok(filters)
}

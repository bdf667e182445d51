use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use spotify_kmeans::pagination::get_all_user_playlists;
use spotify_kmeans::spotify::parse_playlist_ref;
use spotify_kmeans::sync::DEFAULT_MAX_CLEAR_ROUNDS;
use spotify_kmeans::{CatalogApi, ClusterPipeline, Config, RunConfig, SpotifyClient};

#[derive(Parser)]
#[command(name = "spotify-kmeans")]
#[command(about = "Cluster your saved Spotify tracks by audio features")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON file with Spotify API keys (defaults to environment / .env)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster tracks and save a sample of clusters as playlists
    Cluster(ClusterArgs),

    /// List all your Spotify playlists
    ListPlaylists,

    /// Show setup guide
    Setup,
}

#[derive(Args)]
struct ClusterArgs {
    /// Number of k-means clusters
    #[arg(short = 'k', long, default_value_t = 100)]
    clusters: usize,

    /// Number of clusters saved as playlists
    #[arg(short, long, default_value_t = 3)]
    sample: usize,

    /// Cluster on raw feature values instead of standardized ones
    #[arg(long)]
    no_normalize: bool,

    /// Playlist name prefix; playlists are named "<prefix> <n>"
    #[arg(long, default_value = "k-means, cluster")]
    prefix: String,

    /// Tracks shown per sampled cluster
    #[arg(long, default_value_t = 5)]
    preview: usize,

    /// Seed for reproducible clustering and sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Cluster this playlist (id, URI or URL) instead of your saved tracks
    #[arg(long)]
    source_playlist: Option<String>,

    /// Leave a feature out of clustering (repeatable), e.g. --drop-feature tempo
    #[arg(long = "drop-feature")]
    drop_features: Vec<String>,

    /// Give up emptying a playlist after this many rounds
    #[arg(long, default_value_t = DEFAULT_MAX_CLEAR_ROUNDS)]
    max_clear_rounds: usize,

    /// Where the JSON run report is written
    #[arg(long, default_value = "cluster_results")]
    results_dir: PathBuf,

    /// Do not write the JSON run report
    #[arg(long)]
    no_report: bool,

    /// Preview clusters without touching any playlist
    #[arg(long)]
    dry_run: bool,
}

impl ClusterArgs {
    fn into_run_config(self) -> Result<RunConfig> {
        let source_playlist = self
            .source_playlist
            .as_deref()
            .map(parse_playlist_ref)
            .transpose()
            .context("Invalid --source-playlist")?;

        Ok(RunConfig {
            num_clusters: self.clusters,
            sample_size: self.sample,
            normalize: !self.no_normalize,
            playlist_prefix: self.prefix,
            preview_rows: self.preview,
            seed: self.seed,
            max_clear_rounds: self.max_clear_rounds,
            source_playlist,
            drop_features: self.drop_features,
            dry_run: self.dry_run,
            results_dir: (!self.no_report).then_some(self.results_dir),
        })
    }
}

fn setup_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose);

    match cli.command {
        Commands::Cluster(args) => {
            let run = args.into_run_config()?;
            cluster(cli.config, run).await?;
        }
        Commands::ListPlaylists => {
            list_playlists(cli.config).await?;
        }
        Commands::Setup => {
            show_setup_guide();
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let config = Config::load(path.as_deref()).context("Failed to load configuration")?;

    let missing = config.get_missing_config();
    if !missing.is_empty() {
        println!("{}", "Missing configuration:".red());
        for item in &missing {
            println!("   - {}", item);
        }
        println!(
            "\n{}",
            "Run `spotify-kmeans setup` to see how to provide credentials.".yellow()
        );
        std::process::exit(1);
    }

    Ok(config)
}

async fn cluster(config_path: Option<PathBuf>, run: RunConfig) -> Result<()> {
    println!("{}", "Spotify k-means playlists".cyan().bold());
    println!("{}", "=".repeat(50));

    if run.dry_run {
        println!(
            "{}",
            "DRY RUN MODE - No playlists will be modified".yellow()
        );
    }

    let config = load_config(config_path)?;

    let client = SpotifyClient::new(&config)
        .await
        .context("Failed to connect to Spotify")?;

    let pipeline = ClusterPipeline::new(&client, run).context("Invalid run configuration")?;
    let report = pipeline.run().await?;

    if report.dry_run {
        println!("\n{}", "Dry run completed - no changes made".yellow());
    } else {
        println!(
            "\n{}",
            format!("Saved {} cluster playlists!", report.playlists_written()).green()
        );
    }

    Ok(())
}

async fn list_playlists(config_path: Option<PathBuf>) -> Result<()> {
    println!("{}", "Your Spotify Playlists".cyan().bold());
    println!("{}", "=".repeat(50));

    let config = load_config(config_path)?;

    let client = SpotifyClient::new(&config)
        .await
        .context("Failed to connect to Spotify")?;

    let playlists = get_all_user_playlists(&client)
        .await
        .context("Failed to fetch playlists")?;

    if playlists.is_empty() {
        println!("{}", "No playlists found".yellow());
        return Ok(());
    }

    for (i, playlist) in playlists.iter().enumerate() {
        let owned = if playlist.owner_id == client.user_id() {
            ""
        } else {
            " (followed)"
        };
        println!(
            "{:2}. {} ({} tracks){}",
            i + 1,
            playlist.name.green(),
            playlist.total_tracks,
            owned
        );
        println!("     {}", playlist.id.cyan());
    }

    println!("\n{}", format!("Total: {} playlists", playlists.len()).cyan());

    Ok(())
}

fn show_setup_guide() {
    println!("{}", "Spotify k-means Setup Guide".cyan().bold());
    println!("{}", "=".repeat(50));

    println!("\n{}", "1. Spotify API Setup".yellow());
    println!("   - Go to https://developer.spotify.com/dashboard/");
    println!("   - Create a new app");
    println!("   - Copy your Client ID and Client Secret");
    println!("   - Add 'http://127.0.0.1:8080/callback' as a redirect URI");

    println!("\n{}", "2. Configuration".yellow());
    println!("   - Either create a .env file with:");
    println!("     SPOTIFY_CLIENT_ID=your_spotify_client_id");
    println!("     SPOTIFY_CLIENT_SECRET=your_spotify_client_secret");
    println!("     SPOTIFY_REDIRECT_URI=http://127.0.0.1:8080/callback");
    println!("   - Or a JSON key file passed with --config:");
    println!("     {{\"spotify_client_id\": \"...\", \"spotify_client_secret\": \"...\",");
    println!("      \"spotify_redirect_uri\": \"http://127.0.0.1:8080/callback\"}}");

    println!("\n{}", "3. Usage".yellow());
    println!("   - spotify-kmeans list-playlists              (to see your playlists)");
    println!("   - spotify-kmeans cluster --dry-run           (to preview clusters)");
    println!("   - spotify-kmeans cluster -k 50 --sample 5    (to save 5 of 50 clusters)");
    println!("   - spotify-kmeans cluster --source-playlist <url>");

    println!("\n{}", "Ready to cluster!".green());
}

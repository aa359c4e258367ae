//! CLI for SkySync - geolocated weather card with generated backgrounds.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use skysync::{App, BackgroundImage, Coordinates, ImageClient, VideoClient, WeatherClient};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "skysync")]
#[command(about = "Geolocated weather card with AI-generated cinematic backgrounds")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SKYSYNC_LOG", default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one full sync cycle and render the card
    Sync(SyncArgs),

    /// Apply a natural-language edit to a saved background image
    Edit(EditArgs),

    /// Check credential availability and endpoint reachability
    Check,
}

#[derive(Args)]
struct SyncArgs {
    /// Latitude override, skipping IP geolocation (requires --lng)
    #[arg(long, requires = "lng", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Longitude override, skipping IP geolocation (requires --lat)
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lng: Option<f64>,

    /// Skip video synthesis even when a credential is available
    #[arg(long)]
    no_video: bool,

    /// Where to save the background image
    #[arg(long, default_value = "background.png")]
    image_out: PathBuf,

    /// Where to save the background video
    #[arg(long, default_value = "background.mp4")]
    video_out: PathBuf,

    /// Re-run the cycle up to N times after a lookup failure
    #[arg(long, default_value_t = 0)]
    retry: u32,
}

#[derive(Args)]
struct EditArgs {
    /// Image file to edit
    input: PathBuf,

    /// Free-text edit instruction, e.g. "make it snow"
    instruction: String,

    /// Output file path
    #[arg(short, long, default_value = "edited.png")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .init();

    match cli.command {
        Commands::Sync(args) => run_sync(args, cli.json).await,
        Commands::Edit(args) => run_edit(args, cli.json).await,
        Commands::Check => run_check(cli.json).await,
    }
}

async fn run_sync(args: SyncArgs, json_output: bool) -> anyhow::Result<()> {
    let mut builder = App::builder();
    if args.no_video {
        builder = builder.video(false);
    }
    if let (Some(lat), Some(lng)) = (args.lat, args.lng) {
        builder = builder.coordinates(Coordinates {
            latitude: lat,
            longitude: lng,
        });
    }
    let mut app = builder.build().context("failed to initialize clients")?;

    app.load().await;

    let mut attempts = 0;
    while app.state().error().is_some() && attempts < args.retry {
        attempts += 1;
        eprintln!("Sync failed, retrying ({attempts}/{})...", args.retry);
        app.retry().await;
    }

    let image_saved = match app.state().image() {
        Some(image) => {
            image.save(&args.image_out)?;
            Some((args.image_out.clone(), image.size()))
        }
        None => None,
    };
    let video_saved = match app.state().video() {
        Some(video) => {
            video.save(&args.video_out)?;
            Some((args.video_out.clone(), video.size()))
        }
        None => None,
    };

    if json_output {
        let state = app.state();
        let snapshot = state.snapshot();
        let result = serde_json::json!({
            "city": snapshot.and_then(|s| s.city.clone()),
            "temperature": snapshot.and_then(|s| s.temperature.clone()),
            "condition": snapshot.and_then(|s| s.condition.clone()),
            "landmark_name": snapshot.and_then(|s| s.landmark_name.clone()),
            "landmark_description": snapshot.and_then(|s| s.landmark_description.clone()),
            "sources": snapshot.map(|s| s.sources.clone()).unwrap_or_default(),
            "image": image_saved.as_ref().map(|(path, size)| serde_json::json!({
                "output": path.display().to_string(),
                "size_bytes": size,
            })),
            "video": video_saved.as_ref().map(|(path, size)| serde_json::json!({
                "output": path.display().to_string(),
                "size_bytes": size,
            })),
            "error": state.error(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", skysync::view::render(app.state()));
        if let Some((path, size)) = &image_saved {
            println!("Saved background image: {} ({} bytes)", path.display(), size);
        }
        if let Some((path, size)) = &video_saved {
            println!("Saved background video: {} ({} bytes)", path.display(), size);
        }
    }

    if let Some(message) = app.state().error() {
        anyhow::bail!("{message}");
    }
    Ok(())
}

async fn run_edit(args: EditArgs, json_output: bool) -> anyhow::Result<()> {
    let data = std::fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let image = BackgroundImage {
        data,
        mime_type: mime_for_path(&args.input),
    };

    let client = ImageClient::builder()
        .build()
        .context("failed to initialize image client")?;
    let edited = client
        .edit(&image, &args.instruction)
        .await
        .context("image edit failed")?;
    edited.save(&args.output)?;

    if json_output {
        let result = serde_json::json!({
            "type": "edit",
            "success": true,
            "output": args.output.display().to_string(),
            "size_bytes": edited.size(),
            "mime_type": edited.mime_type,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Edited image: {} ({} bytes)",
            args.output.display(),
            edited.size()
        );
    }

    Ok(())
}

async fn run_check(json_output: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct EndpointCheck {
        endpoint: &'static str,
        ok: bool,
        detail: Option<String>,
    }

    let credential = skysync::credential_available();
    let mut checks = Vec::new();

    if credential {
        let weather = WeatherClient::builder().build()?;
        checks.push(to_check("weather lookup", weather.health_check().await));

        let image = ImageClient::builder().build()?;
        checks.push(to_check("image synthesis", image.health_check().await));

        let video = VideoClient::builder().build()?;
        checks.push(to_check("video synthesis", video.health_check().await));
    }

    fn to_check(endpoint: &'static str, result: skysync::Result<()>) -> EndpointCheck {
        match result {
            Ok(()) => EndpointCheck {
                endpoint,
                ok: true,
                detail: None,
            },
            Err(e) => EndpointCheck {
                endpoint,
                ok: false,
                detail: Some(e.to_string()),
            },
        }
    }

    if json_output {
        let result = serde_json::json!({
            "credential_available": credential,
            "checks": checks,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let mark = if credential { "✓" } else { "✗" };
        println!(
            "{} credential ({} {})",
            mark,
            skysync::API_KEY_ENV,
            if credential { "set" } else { "not set" }
        );
        for check in &checks {
            let mark = if check.ok { "✓" } else { "✗" };
            match &check.detail {
                Some(detail) => println!("{} {}: {}", mark, check.endpoint, detail),
                None => println!("{} {}", mark, check.endpoint),
            }
        }
        if !credential {
            println!("Video synthesis will be skipped; weather sync requires a key.");
        }
    }

    Ok(())
}

fn mime_for_path(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
    .to_string()
}

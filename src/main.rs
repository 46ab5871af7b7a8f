mod cli;

use vidlock::{config, service};
use vidlock_core::VideoId;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "vidlock=trace,vidlock_pipeline=trace,vidlock_bus=debug,vidlock_store=debug,vidlock_av=debug,vidlock_core=debug,async_nats=info".to_string()
        } else {
            "vidlock=info,vidlock_pipeline=info,vidlock_bus=info,vidlock_store=info,vidlock_av=info,vidlock_core=info,async_nats=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve => runtime()?.block_on(serve(cli.config.as_deref())),
        Commands::Process { video_id, json } => {
            let video_id = parse_video_id(&video_id)?;
            runtime()?.block_on(process(cli.config.as_deref(), &video_id, json))
        }
        Commands::Ingest {
            file,
            video_id,
            user_id,
        } => {
            let video_id = video_id.as_deref().map(parse_video_id).transpose()?;
            runtime()?.block_on(ingest(cli.config.as_deref(), &file, video_id, user_id))
        }
        Commands::EnsureStream => runtime()?.block_on(ensure_stream(cli.config.as_deref())),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("vidlock {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("Failed to start async runtime")
}

fn parse_video_id(raw: &str) -> Result<VideoId> {
    VideoId::parse(raw).with_context(|| format!("Invalid video id {:?}", raw))
}

/// Cancel `token` on Ctrl-C or SIGTERM.
fn spawn_shutdown_listener(token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = term.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        tracing::info!("Shutdown requested; finishing running videos");
        token.cancel();
    });
}

async fn serve(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    tracing::info!("Starting vidlock processor");

    let shutdown = CancellationToken::new();
    spawn_shutdown_listener(shutdown.clone());

    let stats = service::serve(&config, shutdown).await?;
    tracing::info!(
        "Processor stopped: {} received, {} succeeded, {} failed, {} rejected",
        stats.received,
        stats.succeeded,
        stats.failed,
        stats.rejected
    );
    Ok(())
}

async fn process(config_path: Option<&std::path::Path>, video_id: &VideoId, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let report = service::process_one(&config, video_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Video: {}", report.video_id);
    println!("Locator: {}", report.locator);
    println!(
        "Segments: {}/{} uploaded",
        report.segments_uploaded(),
        report.segments_total()
    );
    for segment in report.skipped() {
        if let Some(ref failure) = segment.failure {
            println!("  skipped {} ({}): {}", segment.segment_id, failure.stage, failure.message);
        }
    }
    if !report.completion_published {
        println!("Warning: completion event could not be published");
    }
    Ok(())
}

async fn ingest(
    config_path: Option<&std::path::Path>,
    file: &std::path::Path,
    video_id: Option<VideoId>,
    user_id: Option<String>,
) -> Result<()> {
    if !file.is_file() {
        anyhow::bail!("Input file does not exist: {:?}", file);
    }
    let config = config::load_config_or_default(config_path)?;
    let report = service::ingest(&config, file, video_id, user_id).await?;
    println!("{}", report.video_id);
    tracing::info!("Published {} chunks ({} bytes)", report.chunks, report.bytes);
    Ok(())
}

async fn ensure_stream(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let context = service::connect_jetstream(&config).await?;
    let outcome = service::provision(&context, &config).await?;
    println!("Stream {}: {:?}", config.nats.stream, outcome);
    Ok(())
}

fn check_tools(config_path: Option<&std::path::Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tools = service::tool_registry(&config).check_all();
    let mut ffmpeg_ok = false;

    for tool in &tools {
        let status = if tool.available { "✓" } else { "✗" };
        if tool.name == "ffmpeg" && tool.available {
            ffmpeg_ok = true;
        }

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if ffmpeg_ok {
        println!("All required tools are available!");
    } else {
        println!("ffmpeg is missing. Install it to enable processing.");
    }

    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            config::load_config_or_default(None)?
        }
    };

    println!("✓ Configuration is valid");
    println!("  NATS: {} (stream {})", config.nats.url, config.nats.stream);
    println!("  Max concurrent runs: {}", config.nats.max_concurrent_runs);
    println!("  Vault: {} (mount {}, prefix {})", config.vault.address, config.vault.mount, config.vault.prefix);
    println!("  IPFS: {}", config.ipfs.api_url);
    println!("  Segment duration: {}s", config.processing.segment_duration_secs);
    println!("  Work dir: {:?}", config.processing.work_dir());

    for warning in config.validate() {
        println!("  warning: {}", warning);
    }

    Ok(())
}

mod cli;

use lanplay::{config, delivery, server};
use lanplay_av::ToolPaths;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

fn tool_paths(config: &config::Config) -> ToolPaths {
    ToolPaths::discover(
        config.tools.ffmpeg_path.as_deref(),
        config.tools.ffprobe_path.as_deref(),
    )
}

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let tools = tool_paths(&config);

    tracing::info!("Starting lanplay server");
    tracing::info!("Library root: {:?}", config.library.root);
    tracing::info!(
        "Client profile: video={} audio={}",
        config.delivery.video_codec,
        config.delivery.audio_codec
    );
    tracing::debug!("ffmpeg: {:?}, ffprobe: {:?}", tools.ffmpeg, tools.ffprobe);

    server::start_server(config, tools).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "lanplay=trace,lanplay_av=trace,tower_http=debug".to_string()
        } else {
            "lanplay=debug,lanplay_av=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate { file } => {
            let path = file.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("lanplay {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let tools = tool_paths(&config);
    let desc = lanplay_av::probe(&tools.ffprobe, file).await?;
    let action = delivery::decide(&config.delivery.client_profile(), &desc);

    if json {
        let value = serde_json::json!({
            "description": desc,
            "action": action,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("File: {}", desc.file_path.display());
    if let Some(ref duration) = desc.duration {
        let secs = duration.as_secs();
        let mins = secs / 60;
        let hours = mins / 60;
        println!("Duration: {:02}:{:02}:{:02}", hours, mins % 60, secs % 60);
    }

    println!("\nStreams: {}", desc.streams.len());
    for stream in &desc.streams {
        let codec = if stream.codec.is_empty() {
            "unknown"
        } else {
            stream.codec.as_str()
        };
        print!("  [{}] {:?} {}", stream.index, stream.kind, codec);
        if let Some(channels) = stream.channels {
            print!(" {}ch", channels);
        }
        if let Some(ref layout) = stream.channel_layout {
            print!(" {}", layout);
        }
        if let Some(ref lang) = stream.language {
            print!(" ({})", lang);
        }
        if let Some(ref title) = stream.title {
            print!(" \"{}\"", title);
        }
        if stream.default {
            print!(" [default]");
        }
        println!();
    }

    println!(
        "\nDelivery: {} (client profile {}/{})",
        action, config.delivery.video_codec, config.delivery.audio_codec
    );

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tools = lanplay_av::check_tools(&tool_paths(&config));
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
        Ok(())
    } else {
        anyhow::bail!("ffmpeg and ffprobe are both required for playback")
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_summary(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            print_summary(&config::Config::default());
        }
    }

    Ok(())
}

fn print_summary(config: &config::Config) {
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Library root: {:?}", config.library.root);
    println!("  Thumbnails: {:?}", config.library.thumbnail_dir);
    println!("  Extensions: {}", config.library.extensions.join(", "));
    println!(
        "  Client profile: {}/{}",
        config.delivery.video_codec, config.delivery.audio_codec
    );
    println!("  Idle grace: {} ms", config.delivery.idle_grace_ms);
    println!(
        "  Encoders: {}/{}",
        config.transcode.video_encoder, config.transcode.audio_encoder
    );
}

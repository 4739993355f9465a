mod cli;

use vidforge::{
    client::{ClientOptions, Connection},
    config::{self, Config},
    server::{Server, ServerContext},
    store::hash_password as bcrypt_hash,
};
use vidforge_av::{FfmpegTranscoder, Transcoder};
use vidforge_common::{Quality, VideoId};
use vidforge_db::pool::init_pool;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, Login, Remote};
use std::path::Path;
use std::sync::Arc;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting vidforge server");

    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!(
            "Failed to create data directory {:?}",
            config.server.data_dir
        )
    })?;

    let db_path = config.server.db_path();
    let db_path_str = db_path.to_string_lossy();
    tracing::info!("Initializing database at {}", db_path_str);
    let db_pool = init_pool(&db_path_str)?;

    let transcoder: Arc<dyn Transcoder> =
        Arc::new(FfmpegTranscoder::new(config.pipeline.ffmpeg_options()));
    match transcoder.check_available() {
        Ok(encoder) => tracing::info!("Using encoder {}", encoder),
        Err(e) => tracing::warn!("Uploads will be rejected: {}", e),
    }

    let ctx = ServerContext::from_config(&config, db_pool, transcoder);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let server = Server::bind(&addr, ctx, config.server.max_connections)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Listening on {}", server.local_addr()?);

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("Shutting down...");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "vidforge=trace,vidforge_av=trace,vidforge_db=debug,vidforge_common=debug".to_string()
        } else {
            "vidforge=info,vidforge_av=info,vidforge_db=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, config_path))
        }
        Commands::Upload { file, title, login } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(upload(&file, title, &login, config_path))
        }
        Commands::Users { page, remote } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(list_users(page, &remote, config_path))
        }
        Commands::Videos {
            page,
            author,
            remote,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(list_videos(page, author.as_deref(), &remote, config_path))
        }
        Commands::Fetch {
            video_id,
            quality,
            segment,
            remote,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(fetch(video_id, quality, segment, &remote, config_path))
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, config_path))
        }
        Commands::CheckTools => check_tools(config_path),
        Commands::Validate {
            config: validate_path,
        } => validate_config(validate_path.as_deref().or(config_path)),
        Commands::Version => {
            println!("vidforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::HashPassword { password } => hash_password(&password, config_path),
    }
}

async fn connect(server: Option<&str>, config: &Config) -> Result<Connection> {
    let addr = server.unwrap_or(&config.client.server);
    Connection::connect(addr, ClientOptions::from(&config.client))
        .await
        .with_context(|| format!("Failed to connect to {}", addr))
}

async fn upload(
    file: &Path,
    title: Option<String>,
    login: &Login,
    config_path: Option<&Path>,
) -> Result<()> {
    if !file.is_file() {
        anyhow::bail!("File does not exist: {:?}", file);
    }
    let config = config::load_config_or_default(config_path)?;
    let title = title.unwrap_or_else(|| {
        file.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_string())
    });

    let mut conn = connect(login.server.as_deref(), &config).await?;
    conn.login(&login.username, &login.password)
        .await
        .context("Login failed")?;

    println!("Uploading {} as {:?}...", file.display(), title);
    let video_id = conn.upload(file, &title).await.context("Upload failed")?;
    let video = conn.video_info(video_id).await?;

    println!("✓ Video {} is ready", video_id);
    println!("  Length: {:.1}s", video.length);
    if let Some(quality) = video.top_quality() {
        println!("  Quality: {}", quality);
    }
    println!("  Segments: {}", video.num_segments);

    conn.logout().await?;
    Ok(())
}

async fn list_users(page: u32, remote: &Remote, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let mut conn = connect(remote.server.as_deref(), &config).await?;
    let users = conn.users(page).await?;

    println!(
        "Users (page {} of {}, {} total)",
        users.current_page, users.max_page, users.total_count
    );
    for user in &users.items {
        print!("  {} joined {}", user.username, user.joined_at.format("%Y-%m-%d"));
        if let Some(last) = user.last_login {
            print!(", last login {}", last.format("%Y-%m-%d %H:%M"));
        }
        println!();
    }

    Ok(())
}

async fn list_videos(
    page: u32,
    author: Option<&str>,
    remote: &Remote,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let mut conn = connect(remote.server.as_deref(), &config).await?;
    let videos = conn.video_page(page, author).await?;

    println!(
        "Videos (page {} of {}, {} total)",
        videos.current_page, videos.max_page, videos.total_count
    );
    for video in &videos.items {
        let secs = video.length.round() as u64;
        println!(
            "  [{}] {} by {} ({:02}:{:02})",
            video.id,
            video.title,
            video.author,
            secs / 60,
            secs % 60
        );
    }

    Ok(())
}

async fn fetch(
    video_id: VideoId,
    quality: Option<Quality>,
    segment: u32,
    remote: &Remote,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let mut conn = connect(remote.server.as_deref(), &config).await?;

    let quality = match quality {
        Some(quality) => quality,
        None => conn
            .video_info(video_id)
            .await?
            .top_quality()
            .with_context(|| format!("Video {} is not ready", video_id))?,
    };

    let path = conn.fetch_segment(video_id, quality, segment).await?;
    println!("{}", path.display());
    Ok(())
}

async fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }
    let config = config::load_config_or_default(config_path)?;
    let transcoder = FfmpegTranscoder::new(config.pipeline.ffmpeg_options());
    let info = transcoder.probe(file).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let ladder = Quality::ladder_for_height(info.height);
    let segments = info.expected_segments(config.pipeline.segment_duration_secs);

    println!("File: {}", file.display());
    println!("Video: {} {}x{} @ {:.3} fps", info.codec, info.width, info.height, info.fps);
    println!("Duration: {:.2}s", info.duration);
    println!(
        "Renditions: {}",
        ladder
            .iter()
            .map(|q| q.label())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Segments per rendition: {}", segments);

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = vidforge_av::check_tools();
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
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        let config = config::load_config_or_default(config_path)?;
        let transcoder = FfmpegTranscoder::new(config.pipeline.ffmpeg_options());
        println!("Encoder: {}", transcoder.check_available()?);
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Uploads are rejected until they are installed.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Data dir: {}", config.server.data_dir.display());
            println!("  Page size: {}", config.catalog.page_size);
            println!(
                "  Pipeline: {} workers, {}s segments, encoder {}",
                config.pipeline.workers,
                config.pipeline.segment_duration_secs,
                config.pipeline.hw_accel
            );
        }
        None => {
            println!("No config file specified, using defaults");
            let config = Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}

fn hash_password(password: &str, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let hash = bcrypt_hash(password, config.auth.bcrypt_cost)?;
    println!("{}", hash);
    Ok(())
}

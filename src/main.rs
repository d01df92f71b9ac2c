use anyhow::{Context as _, Result};
use clap::Parser;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

mod audio;
mod bot;
mod catalog;
mod config;
mod error;
mod storage;
mod ui;

use crate::audio::{player::SongbirdBackend, registry::SessionRegistry, ytdlp};
use crate::bot::OpenMusicBot;
use crate::config::Config;
use crate::storage::CredentialStore;

/// Discord music bot with per-guild playback sessions.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Store a Discord bot token read from standard input, then exit
    #[arg(long)]
    token: bool,

    /// Verify that yt-dlp is available, then exit
    #[arg(long)]
    health_check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("musebot=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando musebot v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    let credentials = CredentialStore::new(&config.data_dir);

    if cli.health_check {
        return health_check().await;
    }
    if cli.token {
        return store_token(&credentials).await;
    }

    info!("{}", config.summary());

    let token = match config.discord_token.clone() {
        Some(token) => token,
        None => credentials.load().await.discord_token.with_context(|| {
            format!(
                "No Discord token found. Set DISCORD_TOKEN or run with --token to store one in {}",
                credentials.path().display()
            )
        })?,
    };

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    // Backend de audio y sesiones
    let manager = Songbird::serenity();
    let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
    let backend = Arc::new(SongbirdBackend::new(
        manager.clone(),
        config.default_volume,
        events_tx,
    ));
    let registry = Arc::new(SessionRegistry::new(backend, config.default_volume));

    // Crear handler del bot
    let handler = OpenMusicBot::new(config, registry, events_rx);

    // Construir cliente
    let mut client = Client::builder(&token, intents)
        .event_handler(handler)
        .register_songbird_with(manager)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    client.start().await.context("Error al ejecutar cliente")?;

    Ok(())
}

/// Reads one line from stdin and stores it as the bot token.
async fn store_token(credentials: &CredentialStore) -> Result<()> {
    println!("Paste the Discord bot token and press Enter:");

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    let token = line.trim();
    if token.is_empty() {
        anyhow::bail!("No token entered");
    }

    credentials.save_token(token).await?;
    println!("Token saved to {}", credentials.path().display());
    Ok(())
}

async fn health_check() -> Result<()> {
    // Verificar dependencias críticas
    let version = ytdlp::version().await?;
    println!("OK (yt-dlp {})", version);
    Ok(())
}

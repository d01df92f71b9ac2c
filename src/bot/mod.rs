//! # Bot Module
//!
//! Discord side of the bot: slash command catalog, command dispatch and the
//! gateway event handler.
//!
//! ## Architecture
//!
//! [`OpenMusicBot`] implements Serenity's [`EventHandler`]. It owns:
//!
//! - The [`SessionRegistry`] with one playback session per guild
//! - The receiving end of the backend event channel, handed to
//!   [`events::run_dispatcher`] on the first `ready`
//! - The bot configuration
//!
//! The command catalog is synchronized with Discord once per process, on the
//! first `ready`, and only republished when its hash changes.
//!
//! ## Example
//!
//! ```rust,ignore
//! let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
//! let backend = Arc::new(SongbirdBackend::new(manager.clone(), config.default_volume, events_tx));
//! let registry = Arc::new(SessionRegistry::new(backend, config.default_volume));
//! let bot = OpenMusicBot::new(config, registry, events_rx);
//! ```

use parking_lot::Mutex;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod events;
pub mod handlers;

use crate::{
    audio::{backend::BackendEvent, registry::SessionRegistry},
    catalog::{CatalogSynchronizer, HashStore, SyncOutcome},
    config::Config,
};

/// Gateway event handler for the bot.
pub struct OpenMusicBot {
    /// Bot configuration loaded from environment variables
    pub config: Arc<Config>,
    /// Playback sessions per Discord guild
    pub registry: Arc<SessionRegistry>,
    /// Taken by the dispatcher on the first `ready`
    events: Mutex<Option<UnboundedReceiver<BackendEvent>>>,
    catalog_synced: AtomicBool,
}

impl OpenMusicBot {
    pub fn new(
        config: Config,
        registry: Arc<SessionRegistry>,
        events: UnboundedReceiver<BackendEvent>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            events: Mutex::new(Some(events)),
            catalog_synced: AtomicBool::new(false),
        }
    }

    /// Publishes the command catalog if it changed since the last publish.
    ///
    /// Commands go to `GUILD_ID` when set (instant propagation, for
    /// development) and globally otherwise.
    async fn sync_commands(&self, ctx: &Context) {
        if self.catalog_synced.swap(true, Ordering::SeqCst) {
            debug!("Catálogo ya sincronizado en este proceso");
            return;
        }

        let publisher =
            commands::SerenityPublisher::new(ctx.http.clone(), self.config.guild_id.map(GuildId::new));
        let synchronizer = CatalogSynchronizer::new(HashStore::new(self.config.catalog_hash_path()));

        match synchronizer.sync(&commands::catalog(), &publisher).await {
            Ok(SyncOutcome::Published(_)) => info!("✅ Comandos slash registrados"),
            Ok(SyncOutcome::Unchanged(_)) => {}
            Err(e) => {
                error!("❌ Error registrando comandos: {:?}", e);
                // Permitir reintento en el próximo ready
                self.catalog_synced.store(false, Ordering::SeqCst);
            }
        }
    }
}

#[async_trait]
impl EventHandler for OpenMusicBot {
    /// Called after authentication; may fire again after a reconnect.
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        self.sync_commands(&ctx).await;

        let receiver = self.events.lock().take();
        if let Some(receiver) = receiver {
            tokio::spawn(events::run_dispatcher(
                self.registry.clone(),
                ctx.http.clone(),
                receiver,
            ));
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        // Los componentes de la vista de cola los atiende su propio colector
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Tracks the bot's own voice link: a kick or channel deletion ends the
    /// session, a move drags it along.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id {
            return;
        }
        let Some(guild_id) = new.guild_id else {
            return;
        };

        match new.channel_id {
            None => {
                if old.is_some() {
                    info!("🔌 Bot desconectado en guild {}", guild_id);
                }
                self.registry.on_link_lost(guild_id).await;
            }
            Some(channel_id) => {
                let Some(shared) = self.registry.get(guild_id) else {
                    return;
                };
                let mut session = shared.lock().await;
                if session.channel_id() != channel_id {
                    warn!(
                        "🔀 Bot movido de {} a {} en guild {}",
                        session.channel_id(),
                        channel_id,
                        guild_id
                    );
                    session.move_to(channel_id);
                }
            }
        }
    }
}

use serenity::{builder::CreateMessage, http::Http};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::{
    audio::{
        backend::BackendEvent,
        registry::{Announcement, SessionRegistry},
    },
    ui::embeds,
};

/// Aplica los eventos del backend en orden hasta que se cierre el canal.
///
/// Los anuncios "Now Playing" se envían en tareas aparte para no frenar la cola.
pub async fn run_dispatcher(
    registry: Arc<SessionRegistry>,
    http: Arc<Http>,
    mut events: UnboundedReceiver<BackendEvent>,
) {
    info!("📡 Despachador de eventos de audio iniciado");

    while let Some(event) = events.recv().await {
        debug!("Evento de audio: {:?}", event);

        if let Some(announcement) = registry.apply(event).await {
            let http = http.clone();
            tokio::spawn(async move {
                announce(&http, announcement).await;
            });
        }
    }

    info!("📡 Canal de eventos cerrado, despachador detenido");
}

async fn announce(http: &Http, announcement: Announcement) {
    let embed = embeds::create_track_embed("Now Playing", &announcement.track);

    if let Err(e) = announcement
        .channel_id
        .send_message(http, CreateMessage::new().embed(embed))
        .await
    {
        warn!(
            "⚠️ No se pudo anunciar la canción en el canal {}: {:?}",
            announcement.channel_id, e
        );
    }
}

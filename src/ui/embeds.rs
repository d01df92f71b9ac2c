use serenity::{
    builder::{CreateEmbed, CreateEmbedFooter},
    utils::{EmbedMessageBuilding, MessageBuilder},
};
use std::time::Duration;

use crate::{
    audio::track::Track,
    catalog::{CommandSpec, OptionKind},
    ui::pagination::Page,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const TRACK_GREEN: Colour = Colour::new(0x76C3A2);
    pub const QUEUE_BLUE: Colour = Colour::new(0x149CDF);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
}

/// Embed de un track ("Now Playing", etc.)
pub fn create_track_embed(title: &str, track: &Track) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title(format!("{} {}", track.source().icon(), title))
        .description(track_description(track))
        .color(colors::TRACK_GREEN);

    if let Some(artwork) = track.artwork() {
        embed = embed.thumbnail(artwork);
    }
    if let Some(requester) = track.requester() {
        embed = embed.field("Requested By", requester, true);
    }
    embed
}

pub fn create_nothing_playing_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("Now Playing")
        .description("Nothing is playing currently.")
        .color(colors::QUEUE_BLUE)
}

/// Página de la cola tal como la renderiza la vista paginada
pub fn create_queue_page_embed(page: &Page) -> CreateEmbed {
    CreateEmbed::default()
        .title("Music Queue")
        .description(&page.description)
        .color(colors::QUEUE_BLUE)
        .footer(CreateEmbedFooter::new(&page.footer))
}

/// Ayuda generada a partir del catálogo de comandos
pub fn create_help_embed(catalog: &[CommandSpec]) -> CreateEmbed {
    catalog
        .iter()
        .flat_map(|command| {
            let subcommands: Vec<_> = command
                .options
                .iter()
                .filter(|opt| opt.kind == OptionKind::SubCommand)
                .collect();

            if subcommands.is_empty() {
                vec![(format!("/{}", command.name), command.description.clone())]
            } else {
                subcommands
                    .into_iter()
                    .map(|sub| (format!("/{} {}", command.name, sub.name), sub.description.clone()))
                    .collect()
            }
        })
        .fold(
            CreateEmbed::default().title("Help").color(colors::INFO_BLUE),
            |embed, (name, description)| embed.field(name, description, false),
        )
}

pub fn create_invite_embed() -> CreateEmbed {
    CreateEmbed::default()
        .description("Click the link below to invite me to one of your servers.")
        .color(colors::INFO_BLUE)
}

/// `[title](uri)`, el autor y el rango de duración
fn track_description(track: &Track) -> String {
    let end = track
        .duration()
        .map(format_duration)
        .unwrap_or_else(|| "∞".to_string());

    MessageBuilder::new()
        .push_named_link_safe(track.title(), track.uri())
        .push("\n")
        .push_safe(track.author())
        .push(format!("\n`[0:00-{}]`", end))
        .build()
}

/// Formatea una duración en formato legible
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

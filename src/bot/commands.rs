use anyhow::Result;
use async_trait::async_trait;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    http::Http,
    model::{
        application::{Command, CommandOptionType},
        id::GuildId,
    },
};
use std::sync::Arc;
use tracing::info;

use crate::catalog::{CatalogPublisher, CommandSpec, OptionKind, OptionSpec};

/// Permisos que pide el enlace de invitación
pub const INVITE_PERMISSIONS: u64 = 274_881_367_040;

pub const LOOP_ALL: &str = "All Tracks";
pub const LOOP_ONE: &str = "Current Track";
pub const LOOP_OFF: &str = "Off";

/// Todos los comandos slash del bot
pub fn catalog() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("connect", "Join a voice channel."),
        CommandSpec::new("play", "Play audio from a YouTube url or search term.").option(
            OptionSpec::new(
                OptionKind::String,
                "search",
                "A search term/url that is converted into a track or list of tracks.",
            )
            .required(),
        ),
        CommandSpec::new("pause", "Pause the audio."),
        CommandSpec::new("resume", "Resume the audio if paused."),
        CommandSpec::new("stop", "Stop playback and disconnect the bot from voice."),
        CommandSpec::new("current", "Display the current track."),
        CommandSpec::new(
            "queue",
            "Music queue-related commands. Use `play` to add things to the queue.",
        )
        .option(OptionSpec::subcommand("get", "Display everything in the queue."))
        .option(
            OptionSpec::subcommand("remove", "Remove a track from the queue by position.").option(
                OptionSpec::new(OptionKind::Integer, "entry", "The track's position.").required(),
            ),
        )
        .option(OptionSpec::subcommand("clear", "Empty the queue.")),
        CommandSpec::new("move", "Move a track from one spot to another within the queue.")
            .option(
                OptionSpec::new(OptionKind::Integer, "before", "The index of the track you want moved.")
                    .required(),
            )
            .option(
                OptionSpec::new(OptionKind::Integer, "after", "The index you want to move it to.")
                    .required(),
            ),
        CommandSpec::new(
            "skip",
            "Skip to the numbered track in the queue. If no number is given, skip to the next track.",
        )
        .option(OptionSpec::new(
            OptionKind::Integer,
            "index",
            "The place in the queue to skip to.",
        )),
        CommandSpec::new("shuffle", "Shuffle the tracks in the queue."),
        CommandSpec::new("loop", "Loop the current track(s).").option(
            OptionSpec::new(OptionKind::String, "loop", "The loop settings.")
                .choice(LOOP_ALL)
                .choice(LOOP_ONE)
                .choice(LOOP_OFF),
        ),
        CommandSpec::new(
            "seek",
            "Seek to a particular position in the current track, provided with a `hours:minutes:seconds` string.",
        )
        .option(
            OptionSpec::new(
                OptionKind::String,
                "position",
                "The time to jump to, like `<hours>:<minutes>:<seconds>` or `<minutes>:<seconds>`.",
            )
            .required(),
        ),
        CommandSpec::new(
            "volume",
            "Show the player's volume. If given a number, you can change it as well, with 1000 as the limit.",
        )
        .option(
            OptionSpec::new(
                OptionKind::Integer,
                "volume",
                "The volume to change to, with a maximum of 1000.",
            )
            .min(0)
            .max(1000),
        ),
        CommandSpec::new("help", "See a brief overview of all the bot's available commands.")
            .anywhere()
            .option(OptionSpec::new(
                OptionKind::Boolean,
                "ephemeral",
                "Whether the output should be visible to only you. Defaults to True.",
            )),
        CommandSpec::new("invite", "Get a link to invite this bot to a server.").anywhere(),
    ]
}

pub fn invite_link(application_id: u64) -> String {
    format!(
        "https://discord.com/api/oauth2/authorize?client_id={}&scope=bot%20applications.commands&permissions={}",
        application_id, INVITE_PERMISSIONS
    )
}

fn option_type(kind: OptionKind) -> CommandOptionType {
    match kind {
        OptionKind::SubCommand => CommandOptionType::SubCommand,
        OptionKind::String => CommandOptionType::String,
        OptionKind::Integer => CommandOptionType::Integer,
        OptionKind::Boolean => CommandOptionType::Boolean,
    }
}

fn to_create_option(spec: &OptionSpec) -> CreateCommandOption {
    let mut option = CreateCommandOption::new(option_type(spec.kind), &spec.name, &spec.description)
        .required(spec.required);

    for choice in &spec.choices {
        option = option.add_string_choice(choice, choice);
    }
    if let Some(min) = spec.min_value {
        option = option.min_number_value(min as f64);
    }
    if let Some(max) = spec.max_value {
        option = option.max_number_value(max as f64);
    }
    for sub in &spec.options {
        option = option.add_sub_option(to_create_option(sub));
    }
    option
}

pub fn to_create_command(spec: &CommandSpec) -> CreateCommand {
    spec.options.iter().fold(
        CreateCommand::new(&spec.name)
            .description(&spec.description)
            .dm_permission(!spec.guild_only),
        |command, option| command.add_option(to_create_option(option)),
    )
}

/// Publica el catálogo en Discord, global o para una guild de desarrollo
pub struct SerenityPublisher {
    http: Arc<Http>,
    guild_id: Option<GuildId>,
}

impl SerenityPublisher {
    pub fn new(http: Arc<Http>, guild_id: Option<GuildId>) -> Self {
        Self { http, guild_id }
    }
}

#[async_trait]
impl CatalogPublisher for SerenityPublisher {
    async fn publish(&self, commands: &[CommandSpec]) -> Result<()> {
        let builders: Vec<CreateCommand> = commands.iter().map(to_create_command).collect();

        match self.guild_id {
            Some(guild_id) => {
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);
                guild_id.set_commands(&self.http, builders).await?;
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                Command::set_global_commands(&self.http, builders).await?;
            }
        }
        Ok(())
    }
}

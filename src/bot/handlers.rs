use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbedFooter, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::{CommandDataOption, CommandDataOptionValue, CommandInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{error, info};

use crate::{
    audio::{
        queue::LoopMode,
        registry::{ConnectOutcome, SharedSession},
        session::PlaybackState,
    },
    bot::{commands, OpenMusicBot},
    error::{MusicError, MusicResult},
    ui::{buttons, embeds, pagination},
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &OpenMusicBot,
) -> Result<()> {
    info!(
        "📝 Comando /{} usado por {} en guild {:?}",
        command.data.name, command.user.name, command.guild_id
    );

    match command.data.name.as_str() {
        "help" => return handle_help(ctx, &command).await,
        "invite" => return handle_invite(ctx, &command, bot).await,
        "play" => return handle_play(ctx, &command, bot).await,
        "queue" if subcommand(&command).map(|(name, _)| name) == Some("get") => {
            return handle_queue_get(ctx, &command, bot).await
        }
        _ => {}
    }

    let reply = match dispatch(ctx, &command, bot).await {
        Ok(reply) => reply,
        Err(e) => error_reply(&command.data.name, &e),
    };
    command
        .create_response(&ctx.http, CreateInteractionResponse::Message(reply))
        .await?;
    Ok(())
}

/// Commands answered with a single immediate message.
async fn dispatch(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &OpenMusicBot,
) -> MusicResult<CreateInteractionResponseMessage> {
    let guild_id = command.guild_id.ok_or(MusicError::NotConnected)?;
    let options = command.data.options.as_slice();

    let content = match command.data.name.as_str() {
        "connect" => handle_connect(ctx, command, bot, guild_id).await?,
        "current" => {
            let embed = match bot.registry.get(guild_id) {
                Some(shared) => {
                    let session = shared.lock().await;
                    session
                        .current()
                        .map(|track| embeds::create_track_embed("Now Playing", track))
                }
                None => None,
            };
            let embed = embed.unwrap_or_else(embeds::create_nothing_playing_embed);
            return Ok(CreateInteractionResponseMessage::new().embed(embed));
        }
        "pause" => {
            let shared = in_bot_voice_channel(ctx, command, bot, guild_id).await?;
            let state = shared.lock().await.pause_toggle().await?;
            match state {
                PlaybackState::Paused => "Paused playback.".to_string(),
                _ => "Resumed playback.".to_string(),
            }
        }
        "resume" => {
            let shared = in_bot_voice_channel(ctx, command, bot, guild_id).await?;
            if shared.lock().await.resume().await? {
                "Resumed playback.".to_string()
            } else {
                "The music player is not paused.".to_string()
            }
        }
        "stop" => {
            in_bot_voice_channel(ctx, command, bot, guild_id).await?;
            bot.registry.disconnect(guild_id).await?;
            "Disconnected from voice channel.".to_string()
        }
        "queue" => {
            let shared = in_bot_voice_channel(ctx, command, bot, guild_id).await?;
            let mut session = shared.lock().await;
            match subcommand(command) {
                Some(("remove", sub_options)) => {
                    let entry = int_option(sub_options, "entry").unwrap_or_default();
                    session.queue_mut().remove_at(to_index(entry)?)?;
                    format!("Removed {} from the queue.", entry)
                }
                Some(("clear", _)) if session.queue().is_empty() => {
                    "The queue is already empty.".to_string()
                }
                Some(("clear", _)) => {
                    session.queue_mut().clear();
                    "Queue cleared.".to_string()
                }
                _ => "Unknown queue command.".to_string(),
            }
        }
        "move" => {
            let shared = in_bot_voice_channel(ctx, command, bot, guild_id).await?;
            let before = int_option(options, "before").unwrap_or_default();
            let after = int_option(options, "after").unwrap_or_default();
            shared
                .lock()
                .await
                .queue_mut()
                .move_track(to_index(before)?, to_index(after)?)?;
            format!("Successfully moved the track at {} to {} in the queue.", before, after)
        }
        "skip" => {
            let shared = in_bot_voice_channel(ctx, command, bot, guild_id).await?;
            let index = int_option(options, "index").unwrap_or(1);
            let mut session = shared.lock().await;
            if session.queue().is_empty() {
                "The queue is empty and can't be skipped into.".to_string()
            } else {
                session.skip(to_index(index)?).await?;
                format!("Skipped to the track at position {}", index)
            }
        }
        "shuffle" => {
            let shared = in_bot_voice_channel(ctx, command, bot, guild_id).await?;
            let mut session = shared.lock().await;
            if session.queue().is_empty() {
                "There's nothing in the queue to shuffle right now.".to_string()
            } else {
                session.queue_mut().shuffle();
                "Shuffled the queue.".to_string()
            }
        }
        "loop" => {
            let shared = in_bot_voice_channel(ctx, command, bot, guild_id).await?;
            let mode = parse_loop_mode(str_option(options, "loop").unwrap_or(commands::LOOP_OFF));
            shared.lock().await.queue_mut().set_mode(mode);
            loop_message(mode).to_string()
        }
        "seek" => {
            let shared = in_bot_voice_channel(ctx, command, bot, guild_id).await?;
            let position = str_option(options, "position").unwrap_or_default();
            let millis = parse_short_time(position)?;
            shared.lock().await.seek(millis).await?;
            format!("Jumped to position `{}` in the current track.", position)
        }
        "volume" => {
            let shared = in_bot_voice_channel(ctx, command, bot, guild_id).await?;
            let mut session = shared.lock().await;
            match int_option(options, "volume") {
                Some(volume) => {
                    let volume = session.set_volume(volume).await?;
                    format!("Changed volume to {}.", volume)
                }
                None => format!("Current volume is {}.", session.volume()),
            }
        }
        other => {
            info!("Comando desconocido: {}", other);
            "❌ Comando no reconocido".to_string()
        }
    };

    Ok(CreateInteractionResponseMessage::new().content(content))
}

async fn handle_connect(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &OpenMusicBot,
    guild_id: GuildId,
) -> MusicResult<String> {
    let channel_id = user_voice_channel(ctx, guild_id, command.user.id)
        .ok_or(MusicError::NotInVoiceChannel)?;

    let (outcome, _) = bot
        .registry
        .connect(guild_id, channel_id, is_admin(command))
        .await?;

    Ok(match outcome {
        ConnectOutcome::Joined | ConnectOutcome::Moved => format!("Joined the <#{}> channel.", channel_id),
        ConnectOutcome::AlreadyHere => "Voice player already connected to this voice channel.".to_string(),
    })
}

async fn handle_play(ctx: &Context, command: &CommandInteraction, bot: &OpenMusicBot) -> Result<()> {
    // Defer la respuesta ya que puede tomar tiempo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let content = match play(ctx, command, bot).await {
        Ok(notification) => notification,
        Err(e) => {
            log_if_transport("play", &e);
            e.to_string()
        }
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;
    Ok(())
}

async fn play(ctx: &Context, command: &CommandInteraction, bot: &OpenMusicBot) -> MusicResult<String> {
    let guild_id = command.guild_id.ok_or(MusicError::NotConnected)?;
    let query = str_option(&command.data.options, "search").unwrap_or_default();

    // Conectar al canal de voz si no está conectado
    let shared = match bot.registry.get(guild_id) {
        Some(shared) => shared,
        None => {
            let channel_id = user_voice_channel(ctx, guild_id, command.user.id)
                .ok_or(MusicError::NotInVoiceChannel)?;
            bot.registry.connect(guild_id, channel_id, false).await?.1
        }
    };

    // La búsqueda no toma el lock de la sesión
    let playable = bot
        .registry
        .backend()
        .search(query)
        .await?
        .filter(|found| !found.is_empty())
        .ok_or_else(|| MusicError::SearchFailed(query.to_string()))?;

    let notification = playable.added_notification();
    let requester = format!("<@{}>", command.user.id);
    shared.lock().await.enqueue(playable, &requester).await?;

    Ok(notification)
}

async fn handle_queue_get(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &OpenMusicBot,
) -> Result<()> {
    let snapshot = match command.guild_id.and_then(|guild_id| bot.registry.get(guild_id)) {
        Some(shared) => {
            let session = shared.lock().await;
            let queue = session.queue();
            let header = session.current().map(|track| {
                embeds::create_track_embed("Now Playing", track).footer(CreateEmbedFooter::new(format!(
                    "Loop: {} | Queued: {}",
                    queue.mode().describe(),
                    embeds::format_duration(queue.total_duration())
                )))
            });
            (header, queue.titles())
        }
        None => (None, Vec::new()),
    };
    let (header, titles) = snapshot;

    let view = pagination::PaginatedView::new(titles, bot.config.queue_page_size);
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(pagination::initial_response(header.as_ref(), &view)),
        )
        .await?;
    let message = command.get_response(&ctx.http).await?;

    pagination::run_queue_view(
        ctx,
        message,
        command.user.id,
        header,
        view,
        bot.config.view_timeout,
    )
    .await
}

async fn handle_help(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let ephemeral = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "ephemeral")
        .and_then(|opt| opt.value.as_bool())
        .unwrap_or(true);

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::create_help_embed(&commands::catalog()))
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

async fn handle_invite(ctx: &Context, command: &CommandInteraction, bot: &OpenMusicBot) -> Result<()> {
    let application_id = ctx
        .http
        .application_id()
        .map(|id| id.get())
        .or(bot.config.application_id)
        .ok_or_else(|| anyhow::anyhow!("Application ID desconocido"))?;

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::create_invite_embed())
                    .components(vec![buttons::invite_button(&commands::invite_link(application_id))])
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

/// Admins pass; everyone else must share the bot's voice channel.
async fn in_bot_voice_channel(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &OpenMusicBot,
    guild_id: GuildId,
) -> MusicResult<SharedSession> {
    let session = bot.registry.get(guild_id);
    if is_admin(command) {
        return session.ok_or(MusicError::NotConnected);
    }

    let shared = session.ok_or(MusicError::NotInBotVoiceChannel)?;
    let bot_channel = shared.lock().await.channel_id();
    match user_voice_channel(ctx, guild_id, command.user.id) {
        Some(channel_id) if channel_id == bot_channel => Ok(shared),
        _ => Err(MusicError::NotInBotVoiceChannel),
    }
}

fn is_admin(command: &CommandInteraction) -> bool {
    command
        .member
        .as_ref()
        .and_then(|member| member.permissions)
        .map_or(false, |permissions| permissions.administrator())
}

fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

fn subcommand(command: &CommandInteraction) -> Option<(&str, &[CommandDataOption])> {
    command.data.options.first().and_then(|opt| match &opt.value {
        CommandDataOptionValue::SubCommand(options) => Some((opt.name.as_str(), options.as_slice())),
        _ => None,
    })
}

fn str_option<'a>(options: &'a [CommandDataOption], name: &str) -> Option<&'a str> {
    options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn int_option(options: &[CommandDataOption], name: &str) -> Option<i64> {
    options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

/// 1-based user position to 0-based queue index.
fn to_index(position: i64) -> MusicResult<usize> {
    usize::try_from(position)
        .ok()
        .and_then(|p| p.checked_sub(1))
        .ok_or(MusicError::IndexOutOfRange { index: 0, len: 0 })
}

/// `[[[days:]hours:]minutes:]seconds` to milliseconds. Fractions are allowed
/// in every segment.
pub fn parse_short_time(input: &str) -> MusicResult<i64> {
    let invalid = || MusicError::InvalidTimeFormat(input.to_string());
    let segments: Vec<&str> = input.trim().split(':').collect();
    if segments.len() > 4 {
        return Err(invalid());
    }

    let seconds = segments
        .iter()
        .rev()
        .zip([1.0, 60.0, 3600.0, 86400.0])
        .try_fold(0.0_f64, |total, (segment, scale)| {
            let value: f64 = segment.trim().parse().map_err(|_| invalid())?;
            if !value.is_finite() {
                return Err(invalid());
            }
            Ok(total + value * scale)
        })?;

    Ok((seconds * 1000.0) as i64)
}

fn parse_loop_mode(choice: &str) -> LoopMode {
    match choice {
        commands::LOOP_ALL => LoopMode::LoopAll,
        commands::LOOP_ONE => LoopMode::LoopOne,
        _ => LoopMode::Normal,
    }
}

fn loop_message(mode: LoopMode) -> &'static str {
    match mode {
        LoopMode::LoopAll => "Looping over all tracks in the queue until disabled.",
        LoopMode::LoopOne => "Looping the current track until disabled.",
        LoopMode::Normal => "Reset the looping settings.",
    }
}

/// User-facing text for a failed command, with per-command wording where the
/// generic message would be vague.
fn error_message(command: &str, err: &MusicError) -> String {
    match (command, err) {
        ("queue", MusicError::IndexOutOfRange { .. }) => {
            "That track does not exist and cannot be removed.".to_string()
        }
        ("move", MusicError::IndexOutOfRange { .. } | MusicError::InvalidIndex { .. }) => {
            "Please enter valid queue indices.".to_string()
        }
        ("skip", MusicError::IndexOutOfRange { .. }) => "Please enter a valid queue index.".to_string(),
        ("seek", MusicError::NoActiveTrack) => "No track currently playing to seek within.".to_string(),
        ("connect", MusicError::NotInVoiceChannel) => {
            "Please join a voice channel and try again.".to_string()
        }
        _ => err.to_string(),
    }
}

fn log_if_transport(command: &str, err: &MusicError) {
    if err.is_transport() {
        error!("❌ Error en /{}: {:?}", command, err);
    }
}

fn error_reply(command: &str, err: &MusicError) -> CreateInteractionResponseMessage {
    log_if_transport(command, err);
    CreateInteractionResponseMessage::new().content(error_message(command, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_time_formats() {
        assert_eq!(parse_short_time("45").unwrap(), 45_000);
        assert_eq!(parse_short_time("1:30").unwrap(), 90_000);
        assert_eq!(parse_short_time("1:00:05").unwrap(), 3_605_000);
        assert_eq!(parse_short_time("1:0:0:0").unwrap(), 86_400_000);
        assert_eq!(parse_short_time("0:01.5").unwrap(), 1_500);
    }

    #[test]
    fn test_short_time_rejects_garbage() {
        assert!(matches!(parse_short_time("abc"), Err(MusicError::InvalidTimeFormat(_))));
        assert!(matches!(parse_short_time("1::2"), Err(MusicError::InvalidTimeFormat(_))));
        assert!(matches!(parse_short_time("1:2:3:4:5"), Err(MusicError::InvalidTimeFormat(_))));
        assert!(matches!(parse_short_time("inf"), Err(MusicError::InvalidTimeFormat(_))));
    }

    #[test]
    fn test_negative_time_is_left_to_the_session() {
        assert_eq!(parse_short_time("-5").unwrap(), -5_000);
    }

    #[test]
    fn test_positions_are_one_based() {
        assert_eq!(to_index(1).unwrap(), 0);
        assert_eq!(to_index(5).unwrap(), 4);
        assert!(to_index(0).is_err());
        assert!(to_index(-2).is_err());
    }

    #[test]
    fn test_loop_choices() {
        assert_eq!(parse_loop_mode(commands::LOOP_ALL), LoopMode::LoopAll);
        assert_eq!(parse_loop_mode(commands::LOOP_ONE), LoopMode::LoopOne);
        assert_eq!(parse_loop_mode("Off"), LoopMode::Normal);
        assert_eq!(parse_loop_mode("garbage"), LoopMode::Normal);
    }

    #[test]
    fn test_error_wording_per_command() {
        let out_of_range = MusicError::IndexOutOfRange { index: 9, len: 2 };
        assert_eq!(
            error_message("queue", &out_of_range),
            "That track does not exist and cannot be removed."
        );
        assert_eq!(
            error_message("move", &MusicError::InvalidIndex { from: 1, to: 1 }),
            "Please enter valid queue indices."
        );
        assert_eq!(error_message("skip", &out_of_range), "Please enter a valid queue index.");
        assert_eq!(
            error_message("pause", &MusicError::NotInBotVoiceChannel),
            "You are not connected to the same voice channel as the bot."
        );
    }
}

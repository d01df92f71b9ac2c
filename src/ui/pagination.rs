//! Paged view over a frozen copy of the queue.
//!
//! [`PaginatedView`] is a plain state machine so it can be tested without a
//! gateway; [`run_queue_view`] drives it from Discord component interactions
//! until the author quits or the view goes idle.

use anyhow::Result;
use futures::StreamExt;
use serenity::{
    all::{ComponentInteraction, Context, Message, UserId},
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage, EditMessage,
    },
    collector::ComponentInteractionCollector,
    utils::{CreateQuickModal, QuickModalResponse},
};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::ui::{buttons, embeds};

/// Navigation and exit controls of the queue view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    First,
    Previous,
    Jump,
    Next,
    Last,
    Quit,
}

impl Control {
    pub fn custom_id(&self) -> &'static str {
        match self {
            Control::First => "page_view:first",
            Control::Previous => "page_view:prev",
            Control::Jump => "page_view:enter",
            Control::Next => "page_view:next",
            Control::Last => "page_view:last",
            Control::Quit => "page_view:quit",
        }
    }

    pub fn from_custom_id(id: &str) -> Option<Self> {
        [
            Control::First,
            Control::Previous,
            Control::Jump,
            Control::Next,
            Control::Last,
            Control::Quit,
        ]
        .into_iter()
        .find(|control| control.custom_id() == id)
    }
}

/// Which navigation controls are currently usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub first: bool,
    pub previous: bool,
    pub jump: bool,
    pub next: bool,
    pub last: bool,
}

impl ControlState {
    pub fn is_enabled(&self, control: Control) -> bool {
        match control {
            Control::First => self.first,
            Control::Previous => self.previous,
            Control::Jump => self.jump,
            Control::Next => self.next,
            Control::Last => self.last,
            Control::Quit => true,
        }
    }
}

/// Rendered text of the page on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub description: String,
    pub footer: String,
}

#[derive(Debug, Clone)]
pub struct PaginatedView {
    items: Vec<String>,
    page_size: usize,
    page_index: usize,
    detached: bool,
}

impl PaginatedView {
    pub fn new(items: Vec<String>, page_size: usize) -> Self {
        Self {
            items,
            page_size: page_size.max(1),
            page_index: 0,
            detached: false,
        }
    }

    pub fn total_pages(&self) -> usize {
        self.items.len().div_ceil(self.page_size)
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// Each navigation method returns whether the page changed.
    pub fn first(&mut self) -> bool {
        self.go_to(0)
    }

    pub fn previous(&mut self) -> bool {
        match self.page_index.checked_sub(1) {
            Some(index) => self.go_to(index),
            None => false,
        }
    }

    pub fn next(&mut self) -> bool {
        self.go_to(self.page_index + 1)
    }

    pub fn last(&mut self) -> bool {
        match self.total_pages().checked_sub(1) {
            Some(index) => self.go_to(index),
            None => false,
        }
    }

    /// Jumps to a 1-based page number; anything outside `1..=total` is ignored.
    pub fn jump_to(&mut self, page: i64) -> bool {
        match usize::try_from(page).ok().and_then(|p| p.checked_sub(1)) {
            Some(index) => self.go_to(index),
            None => false,
        }
    }

    /// Same as [`jump_to`](Self::jump_to) for raw modal input.
    pub fn jump_to_input(&mut self, input: &str) -> bool {
        input.trim().parse::<i64>().map_or(false, |page| self.jump_to(page))
    }

    fn go_to(&mut self, index: usize) -> bool {
        if self.detached || index >= self.total_pages() || index == self.page_index {
            return false;
        }
        self.page_index = index;
        true
    }

    /// Ends interaction; the view only renders from here on.
    pub fn detach(&mut self) {
        self.detached = true;
    }

    pub fn controls(&self) -> ControlState {
        let total = self.total_pages();
        if self.detached || total <= 1 {
            return ControlState {
                first: false,
                previous: false,
                jump: false,
                next: false,
                last: false,
            };
        }

        let at_start = self.page_index == 0;
        let at_end = self.page_index == total - 1;
        ControlState {
            first: !at_start,
            previous: !at_start,
            jump: true,
            next: !at_end,
            last: !at_end,
        }
    }

    /// Controls shown on the message, in display order.
    pub fn visible_controls(&self) -> Vec<Control> {
        if self.detached {
            return Vec::new();
        }
        match self.total_pages() {
            0 | 1 => vec![Control::Quit],
            2 => vec![Control::Previous, Control::Next, Control::Quit],
            _ => vec![
                Control::First,
                Control::Previous,
                Control::Jump,
                Control::Next,
                Control::Last,
                Control::Quit,
            ],
        }
    }

    pub fn render(&self) -> Page {
        let total = self.total_pages();
        if total == 0 {
            return Page {
                description: "The queue is empty.".to_string(),
                footer: "Page 0/0".to_string(),
            };
        }

        let start = self.page_index * self.page_size;
        let description = self
            .items
            .iter()
            .enumerate()
            .skip(start)
            .take(self.page_size)
            .map(|(i, item)| format!("{}. {}", i + 1, item))
            .collect::<Vec<_>>()
            .join("\n");

        Page {
            description,
            footer: format!("Page {}/{}", self.page_index + 1, total),
        }
    }
}

fn view_embeds(header: Option<&CreateEmbed>, view: &PaginatedView) -> Vec<CreateEmbed> {
    header
        .cloned()
        .into_iter()
        .chain(std::iter::once(embeds::create_queue_page_embed(&view.render())))
        .collect()
}

/// Initial message content for a fresh view.
pub fn initial_response(
    header: Option<&CreateEmbed>,
    view: &PaginatedView,
) -> CreateInteractionResponseMessage {
    page_message(header, view)
}

/// Serves component presses on `message` until quit or `timeout` of inactivity.
///
/// One collector stream covers the whole view. The jump modal is awaited in
/// its own task so presses keep being answered while it is open.
pub async fn run_queue_view(
    ctx: &Context,
    mut message: Message,
    author: UserId,
    header: Option<CreateEmbed>,
    mut view: PaginatedView,
    timeout: Duration,
) -> Result<()> {
    let presses = ComponentInteractionCollector::new(&ctx.shard)
        .message_id(message.id)
        .stream();
    let mut presses = std::pin::pin!(presses);
    let (jumps_tx, mut jumps) = mpsc::unbounded_channel::<QuickModalResponse>();

    loop {
        let event = tokio::select! {
            press = presses.next() => press.map(ViewEvent::Press),
            Some(jump) = jumps.recv() => Some(ViewEvent::Jump(jump)),
            _ = tokio::time::sleep(timeout) => None,
        };

        let press = match event {
            None => {
                view.detach();
                debug!("⌛ Vista de cola expirada en mensaje {}", message.id);
                message.edit(ctx, EditMessage::new().components(Vec::new())).await?;
                return Ok(());
            }
            Some(ViewEvent::Jump(response)) => {
                let reply = if apply_jump(&mut view, &response.inputs) {
                    CreateInteractionResponse::UpdateMessage(page_message(header.as_ref(), &view))
                } else {
                    CreateInteractionResponse::Acknowledge
                };
                response.interaction.create_response(ctx, reply).await?;
                continue;
            }
            Some(ViewEvent::Press(press)) => press,
        };

        if press.user.id != author {
            let reply = CreateInteractionResponseMessage::new()
                .content("You cannot interact with this view.")
                .ephemeral(true);
            press
                .create_response(ctx, CreateInteractionResponse::Message(reply))
                .await?;
            continue;
        }

        let Some(control) = Control::from_custom_id(&press.data.custom_id) else {
            warn!("Componente desconocido en la vista de cola: {}", press.data.custom_id);
            continue;
        };

        let navigate: fn(&mut PaginatedView) -> bool = match control {
            Control::Quit => {
                press.defer(ctx).await?;
                tokio::time::sleep(Duration::from_millis(250)).await;
                message.delete(ctx).await?;
                return Ok(());
            }
            Control::Jump => {
                open_jump_modal(ctx.clone(), press, jumps_tx.clone(), timeout);
                continue;
            }
            Control::First => PaginatedView::first,
            Control::Previous => PaginatedView::previous,
            Control::Next => PaginatedView::next,
            Control::Last => PaginatedView::last,
        };

        navigate(&mut view);
        debug!("📄 Vista de cola en página {}/{}", view.page_index() + 1, view.total_pages());
        press
            .create_response(
                ctx,
                CreateInteractionResponse::UpdateMessage(page_message(header.as_ref(), &view)),
            )
            .await?;
    }
}

enum ViewEvent {
    Press(ComponentInteraction),
    Jump(QuickModalResponse),
}

fn page_message(header: Option<&CreateEmbed>, view: &PaginatedView) -> CreateInteractionResponseMessage {
    CreateInteractionResponseMessage::new()
        .embeds(view_embeds(header, view))
        .components(buttons::pagination_controls(view))
}

/// Applies a submitted page prompt. Empty or invalid answers change nothing.
fn apply_jump(view: &mut PaginatedView, inputs: &[String]) -> bool {
    inputs
        .first()
        .is_some_and(|input| view.jump_to_input(input))
}

/// Shows the page prompt and forwards a submitted answer to the view loop.
fn open_jump_modal(
    ctx: Context,
    press: ComponentInteraction,
    jumps: mpsc::UnboundedSender<QuickModalResponse>,
    timeout: Duration,
) {
    tokio::spawn(async move {
        let modal = CreateQuickModal::new("Page Jump").timeout(timeout).short_field("Page");
        match press.quick_modal(&ctx, modal).await {
            Ok(Some(response)) => {
                // La vista pudo cerrarse mientras el modal estaba abierto
                if let Err(mpsc::error::SendError(late)) = jumps.send(response) {
                    let _ = late
                        .interaction
                        .create_response(&ctx, CreateInteractionResponse::Acknowledge)
                        .await;
                }
            }
            Ok(None) => debug!("Modal de salto sin respuesta"),
            Err(e) => warn!("⚠️ Error mostrando el modal de salto: {:?}", e),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn items(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("🎵 Track {i}")).collect()
    }

    #[test]
    fn test_twenty_three_items_make_three_pages() {
        let mut view = PaginatedView::new(items(23), 10);
        assert_eq!(view.total_pages(), 3);

        assert!(view.jump_to(2));
        assert_eq!(view.page_index(), 1);
        assert_eq!(
            view.controls(),
            ControlState { first: true, previous: true, jump: true, next: true, last: true }
        );

        assert!(!view.jump_to(0));
        assert!(!view.jump_to(4));
        assert!(!view.jump_to(-1));
        assert_eq!(view.page_index(), 1);
    }

    #[test]
    fn test_controls_at_edges() {
        let mut view = PaginatedView::new(items(23), 10);
        let start = view.controls();
        assert!(!start.first && !start.previous);
        assert!(start.jump && start.next && start.last);

        assert!(view.last());
        let end = view.controls();
        assert!(end.first && end.previous && end.jump);
        assert!(!end.next && !end.last);
        assert!(!view.next());
        assert_eq!(view.page_index(), 2);
    }

    #[test]
    fn test_single_page_disables_everything() {
        let view = PaginatedView::new(items(10), 10);
        assert_eq!(view.total_pages(), 1);
        assert!(!view.controls().jump);
        assert_eq!(view.visible_controls(), vec![Control::Quit]);
    }

    #[test]
    fn test_layout_depends_on_page_count() {
        let two = PaginatedView::new(items(11), 10);
        assert_eq!(two.visible_controls(), vec![Control::Previous, Control::Next, Control::Quit]);

        let three = PaginatedView::new(items(21), 10);
        assert_eq!(three.visible_controls().len(), 6);
    }

    #[test]
    fn test_render_uses_global_positions() {
        let mut view = PaginatedView::new(items(23), 10);
        view.last();

        let page = view.render();
        assert_eq!(page.description, "21. 🎵 Track 21\n22. 🎵 Track 22\n23. 🎵 Track 23");
        assert_eq!(page.footer, "Page 3/3");
    }

    #[test]
    fn test_empty_view() {
        let mut view = PaginatedView::new(Vec::new(), 10);
        assert_eq!(view.total_pages(), 0);
        assert!(!view.last());
        assert!(!view.previous());
        assert_eq!(
            view.render(),
            Page { description: "The queue is empty.".into(), footer: "Page 0/0".into() }
        );
    }

    #[test]
    fn test_modal_input_parsing() {
        let mut view = PaginatedView::new(items(23), 10);
        assert!(!view.jump_to_input("abc"));
        assert!(!view.jump_to_input(""));
        assert!(view.jump_to_input(" 3 "));
        assert_eq!(view.page_index(), 2);
    }

    #[test]
    fn test_detach_is_terminal() {
        let mut view = PaginatedView::new(items(23), 10);
        view.detach();

        assert!(!view.next());
        assert!(!view.jump_to(3));
        assert!(view.visible_controls().is_empty());
        assert!(!view.controls().next);
        assert_eq!(view.render().footer, "Page 1/3");
    }

    #[test]
    fn test_custom_ids_round_trip() {
        for control in [Control::First, Control::Jump, Control::Quit] {
            assert_eq!(Control::from_custom_id(control.custom_id()), Some(control));
        }
        assert_eq!(Control::from_custom_id("music_skip"), None);
    }

    #[test]
    fn test_jump_answer_applies_to_the_current_view_state() {
        let mut view = PaginatedView::new(items(23), 10);

        // El usuario sigue navegando mientras el modal está abierto
        assert!(view.next());
        assert!(view.next());
        assert_eq!(view.page_index(), 2);

        assert!(apply_jump(&mut view, &["1".to_string()]));
        assert_eq!(view.page_index(), 0);
        assert!(!apply_jump(&mut view, &["9".to_string()]));
        assert!(!apply_jump(&mut view, &[]));
        assert_eq!(view.page_index(), 0);
    }
}

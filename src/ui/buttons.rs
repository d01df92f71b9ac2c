use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

use crate::ui::pagination::{Control, PaginatedView};

/// Botones de la vista paginada de la cola
pub fn pagination_controls(view: &PaginatedView) -> Vec<CreateActionRow> {
    let state = view.controls();
    let buttons: Vec<CreateButton> = view
        .visible_controls()
        .into_iter()
        .map(|control| {
            let (label, style) = match control {
                Control::First => ("≪", ButtonStyle::Primary),
                Control::Previous => ("<", ButtonStyle::Primary),
                Control::Jump => ("📖", ButtonStyle::Success),
                Control::Next => (">", ButtonStyle::Primary),
                Control::Last => ("≫", ButtonStyle::Primary),
                Control::Quit => ("✖", ButtonStyle::Danger),
            };
            CreateButton::new(control.custom_id())
                .label(label)
                .style(style)
                .disabled(!state.is_enabled(control))
        })
        .collect();

    if buttons.is_empty() {
        return Vec::new();
    }
    vec![CreateActionRow::Buttons(buttons)]
}

/// Botón con el enlace de invitación del bot
pub fn invite_button(url: &str) -> CreateActionRow {
    CreateActionRow::Buttons(vec![CreateButton::new_link(url).label("Invite")])
}

//! Discord presentation: embeds, buttons and the paged queue view.

pub mod buttons;
pub mod embeds;
pub mod pagination;

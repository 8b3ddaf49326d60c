use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Message,
    MessageEdit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorInfo {
    pub id: u64,
    pub role_ids: Vec<u64>,
    pub is_bot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: u64,
    /// Parent category, if any.
    pub category_id: Option<u64>,
    pub is_dm: bool,
}

/// What the filters look at: raw message text, or guild IDs resolved from invites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterContent {
    Text(String),
    Guilds(HashSet<u64>),
}

impl FilterContent {
    pub fn as_text(&self) -> &str {
        match self {
            FilterContent::Text(text) => text,
            FilterContent::Guilds(_) => "",
        }
    }
}

/// Summary of a guild an invite points to, rendered into alerts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEmbed {
    pub title: String,
    pub description: String,
    pub footer: Option<String>,
    pub thumbnail: Option<String>,
}

/// A single filtering pass over one event.
#[derive(Debug, Clone)]
pub struct FilterContext {
    pub event: Event,
    pub author: Option<AuthorInfo>,
    pub channel: Option<ChannelInfo>,
    pub content: FilterContent,
    pub message_id: Option<u64>,
    pub jump_url: Option<String>,
    /// Text fragments that caused a block.
    pub matches: Vec<String>,
    pub alert_embeds: Vec<AlertEmbed>,
    /// Invite codes that were neither allowed nor explicitly denied.
    pub potential_phish: BTreeSet<String>,
}

impl FilterContext {
    pub fn new(
        event: Event,
        author: Option<AuthorInfo>,
        channel: Option<ChannelInfo>,
        content: FilterContent,
    ) -> Self {
        Self {
            event,
            author,
            channel,
            content,
            message_id: None,
            jump_url: None,
            matches: vec![],
            alert_embeds: vec![],
            potential_phish: BTreeSet::new(),
        }
    }

    /// A copy of this context looking at different content, with fresh result collectors.
    pub fn replace(&self, content: FilterContent) -> FilterContext {
        FilterContext {
            content,
            matches: vec![],
            alert_embeds: vec![],
            potential_phish: BTreeSet::new(),
            ..self.clone()
        }
    }
}

use super::clean::clean_input;
use super::context::{AlertEmbed, FilterContent, FilterContext};
use super::filter_list::{AtomicList, Filter};
use super::settings::ActionSettings;
use crate::db::entities::filter_lists::ListType;
use crate::error::ApiError;
use poise::serenity_prelude as serenity;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;
use thiserror::Error;

/// Invite links, including the usual obfuscations (`discord dot gg`, `discord,gg slash code`).
/// The bare `.gg` form must not follow a word character; that is checked in [`find_invites`].
static DISCORD_INVITE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)(?:https?://)?(?:www\.)?",
        r"(?:discord(?:[.,]|dot)gg|",
        r"discord(?:[.,]|dot)com(?:/|slash)invite|",
        r"discordapp(?:[.,]|dot)com(?:/|slash)invite|",
        r"discord(?:[.,]|dot)me|",
        r"discord(?:[.,]|dot)li|",
        r"discord(?:[.,]|dot)io|",
        r"(?P<bare>(?:[.,]|dot)gg)",
        r")(?:/|slash)",
        r"(?P<invite>\S+)",
    ))
    .expect("invite pattern is valid")
});

/// The plausible invite code, ignoring anything after the first invalid character.
static REFINED_INVITE_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<invite>[a-zA-Z0-9/_-]+)(?:[^a-zA-Z0-9/].*)?$")
        .expect("refined invite pattern is valid")
});

const PROTECTED_FEATURES: [&str; 2] = ["PARTNERED", "VERIFIED"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteMatch {
    /// The whole link as written in the message.
    pub text: String,
    /// The raw code as captured, before refinement.
    pub code: String,
}

pub fn find_invites(text: &str) -> Vec<InviteMatch> {
    let mut found = vec![];
    let mut pos = 0;

    while let Some(caps) = DISCORD_INVITE.captures_at(text, pos) {
        let (Some(whole), Some(code)) = (caps.get(0), caps.name("invite")) else {
            break;
        };

        let glued_to_word = caps.name("bare").is_some_and(|bare| {
            text[..bare.start()]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
        });

        if glued_to_word {
            // Retry from the next character, another link may start inside this one.
            pos = whole.start()
                + text[whole.start()..]
                    .chars()
                    .next()
                    .map_or(1, char::len_utf8);
            continue;
        }

        found.push(InviteMatch {
            text: whole.as_str().to_string(),
            code: code.as_str().to_string(),
        });
        pos = whole.end();
    }

    found
}

/// Attempts to recover the real code from an obfuscated one. A wrong guess never makes
/// the allow list more permissive or the deny list stricter.
pub fn refine_invite_code(code: &str) -> String {
    REFINED_INVITE_CODE
        .captures(code)
        .and_then(|caps| caps.name("invite"))
        .map_or_else(|| code.to_string(), |m| m.as_str().to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteGuildInfo {
    pub id: u64,
    pub name: String,
    pub icon_url: Option<String>,
    pub features: Vec<String>,
}

impl InviteGuildInfo {
    pub fn is_partnered_or_verified(&self) -> bool {
        self.features
            .iter()
            .any(|feature| PROTECTED_FEATURES.contains(&feature.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteInfo {
    pub code: String,
    /// `None` for group DM invites.
    pub guild: Option<InviteGuildInfo>,
    pub approximate_member_count: Option<u64>,
    pub approximate_presence_count: Option<u64>,
}

impl InviteInfo {
    pub fn guild_id(&self) -> Option<u64> {
        self.guild.as_ref().map(|guild| guild.id)
    }
}

impl From<serenity::Invite> for InviteInfo {
    fn from(invite: serenity::Invite) -> Self {
        let guild = invite.guild.map(|guild| InviteGuildInfo {
            id: guild.id.get(),
            icon_url: guild
                .icon
                .as_ref()
                .map(|hash| format!("https://cdn.discordapp.com/icons/{}/{}.webp", guild.id, hash)),
            name: guild.name,
            features: guild.features,
        });

        Self {
            code: invite.code,
            guild,
            approximate_member_count: invite.approximate_member_count,
            approximate_presence_count: invite.approximate_presence_count,
        }
    }
}

/// Looks invites up on the platform. `Ok(None)` means the invite does not exist.
#[async_trait::async_trait]
pub trait InviteResolver: Send + Sync {
    async fn fetch_invite(&self, code: &str) -> Result<Option<InviteInfo>, ApiError>;
}

#[async_trait::async_trait]
impl InviteResolver for serenity::Http {
    async fn fetch_invite(&self, code: &str) -> Result<Option<InviteInfo>, ApiError> {
        match self.get_invite(code, true, false, None).await {
            Ok(invite) => Ok(Some(invite.into())),
            Err(e) => match ApiError::from(e) {
                ApiError::NotFound { .. } => Ok(None),
                other => Err(other),
            },
        }
    }
}

/// Outcome of running a list against one event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListEvaluation {
    /// `None` when nothing needs to be done.
    pub actions: Option<ActionSettings>,
    /// Lines describing what triggered, for moderators.
    pub messages: Vec<String>,
    pub triggers: BTreeMap<ListType, Vec<Filter>>,
}

/// Filters looking for invites to specific guilds.
///
/// An invite that is not on the allow list is blocked, unless the guild is partnered or
/// verified. Those are let through unless they are on the deny list. The allow list's
/// defaults decide what happens to an invite that was not explicitly allowed; the deny
/// list's defaults decide what happens to an explicitly denied one.
///
/// Entries are stored as guild IDs. Invites are only used to find the guild when adding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InviteList {
    pub allow: Option<AtomicList>,
    pub deny: Option<AtomicList>,
}

impl InviteList {
    pub const NAME: &'static str = "invite";

    pub fn add_list(&mut self, list: AtomicList) {
        match list.list_type {
            ListType::Allow => self.allow = Some(list),
            ListType::Deny => self.deny = Some(list),
        }
    }

    pub fn get(&self, list_type: ListType) -> Option<&AtomicList> {
        match list_type {
            ListType::Allow => self.allow.as_ref(),
            ListType::Deny => self.deny.as_ref(),
        }
    }

    pub async fn actions_for(
        &self,
        ctx: &mut FilterContext,
        resolver: &dyn InviteResolver,
    ) -> Result<ListEvaluation, ApiError> {
        let text = clean_input(ctx.content.as_text(), true);

        let matches = find_invites(&text);
        if matches.is_empty() {
            return Ok(ListEvaluation::default());
        }

        let refined: HashMap<&str, String> = matches
            .iter()
            .map(|m| (m.code.as_str(), refine_invite_code(&m.code)))
            .collect();

        // If the allow list doesn't operate here, unknown invites are let through.
        let check_if_allowed = self
            .allow
            .as_ref()
            .is_some_and(|allow| allow.defaults.validations.evaluate(ctx).1.is_empty());

        // Guild invites that need inspecting, and invites that either don't resolve or are group DMs.
        let mut for_inspection: BTreeMap<String, InviteInfo> = BTreeMap::new();
        let mut unknown: BTreeMap<String, Option<InviteInfo>> = BTreeMap::new();

        let codes: BTreeSet<&String> = refined.values().collect();
        for code in codes {
            match resolver.fetch_invite(code).await? {
                None => {
                    if check_if_allowed {
                        unknown.insert(code.clone(), None);
                    }
                }
                Some(invite) if invite.guild.is_some() => {
                    for_inspection.insert(code.clone(), invite);
                }
                Some(invite) => {
                    if check_if_allowed {
                        unknown.insert(code.clone(), Some(invite));
                    }
                }
            }
        }

        let inspected_guilds: HashSet<u64> =
            for_inspection.values().filter_map(InviteInfo::guild_id).collect();
        let triggered = match &self.deny {
            Some(deny) => deny.filter_list_result(&ctx.replace(FilterContent::Guilds(inspected_guilds))),
            None => vec![],
        };
        let blocked_guilds: HashSet<u64> = triggered.iter().filter_map(Filter::guild_id).collect();

        // Set aside the denied ones and let partnered or verified guilds through.
        let mut blocked: BTreeMap<String, Option<InviteInfo>> = BTreeMap::new();
        for_inspection.retain(|code, invite| {
            let Some(guild) = &invite.guild else {
                return false;
            };
            if blocked_guilds.contains(&guild.id) {
                blocked.insert(code.clone(), Some(invite.clone()));
                return false;
            }
            !guild.is_partnered_or_verified()
        });

        let mut triggers = BTreeMap::new();
        if let Some(allow) = self.allow.as_ref().filter(|_| check_if_allowed) {
            let guilds = for_inspection.values().filter_map(InviteInfo::guild_id).collect();
            let allow_ctx = ctx.replace(FilterContent::Guilds(guilds));

            let allowed_filters: Vec<Filter> = allow
                .filters
                .values()
                .filter(|filter| filter.triggered_on(&allow_ctx))
                .cloned()
                .collect();
            let allowed: HashSet<u64> = allowed_filters.iter().filter_map(Filter::guild_id).collect();

            for (code, invite) in &for_inspection {
                if invite.guild_id().is_some_and(|id| !allowed.contains(&id)) {
                    unknown.insert(code.clone(), Some(invite.clone()));
                }
            }
            triggers.insert(ListType::Allow, allowed_filters);
        }

        if triggered.is_empty() && unknown.is_empty() {
            return Ok(ListEvaluation {
                actions: None,
                messages: vec![],
                triggers,
            });
        }

        let mut actions = None;
        if !unknown.is_empty() {
            actions = Some(
                self.allow
                    .as_ref()
                    .map(|allow| allow.defaults.actions.clone())
                    .unwrap_or_default(),
            );
        }
        // Denied invites come second so that their actions take preference.
        if let Some(deny) = self.deny.as_ref().filter(|_| !triggered.is_empty()) {
            let deny_actions = deny.merge_actions(&triggered);
            actions = Some(match actions {
                Some(allow_actions) => allow_actions.union(deny_actions),
                None => deny_actions,
            });
            triggers.insert(ListType::Deny, triggered.clone());
        }

        blocked.extend(unknown.iter().map(|(code, invite)| (code.clone(), invite.clone())));

        for m in &matches {
            let is_blocked = refined
                .get(m.code.as_str())
                .is_some_and(|code| blocked.contains_key(code));
            if is_blocked && !ctx.matches.contains(&m.text) {
                ctx.matches.push(m.text.clone());
            }
        }
        ctx.alert_embeds
            .extend(blocked.values().flatten().map(guild_embed));
        ctx.potential_phish.extend(unknown.keys().cloned());

        let mut messages = AtomicList::format_messages(&triggered);
        messages.extend(unknown.iter().map(|(code, invite)| {
            match invite.as_ref().and_then(InviteInfo::guild_id) {
                Some(guild_id) => format!("`{code} - {guild_id}`"),
                None => format!("`{code}`"),
            }
        }));

        Ok(ListEvaluation {
            actions,
            messages,
            triggers,
        })
    }
}

fn count(value: Option<u64>) -> String {
    value.map_or_else(|| "Unknown".to_string(), |v| v.to_string())
}

/// Summary of the guild an invite leads to.
pub fn guild_embed(invite: &InviteInfo) -> AlertEmbed {
    let description = format!(
        "**Invite Code:** {}\n**Members:** {}\n**Active:** {}",
        invite.code,
        count(invite.approximate_member_count),
        count(invite.approximate_presence_count),
    );

    match &invite.guild {
        Some(guild) => AlertEmbed {
            title: guild.name.clone(),
            description,
            footer: Some(format!("Guild ID: {}", guild.id)),
            thumbnail: guild.icon_url.clone(),
        },
        None => AlertEmbed {
            title: "Group DM".to_string(),
            description,
            footer: None,
            thumbnail: None,
        },
    }
}

#[derive(Debug, Error)]
pub enum InviteInputError {
    #[error("`{0}` is not a valid Discord invite.")]
    Malformed(String),

    #[error("`{0}` is not a valid Discord invite code.")]
    UnknownCode(String),

    #[error("Did you just try to add a group DM?")]
    GroupDm,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Turns an invite link or code into the guild ID stored on the list, and a description
/// that names the guild.
pub async fn process_invite_input(
    input: &str,
    description: Option<&str>,
    resolver: &dyn InviteResolver,
) -> Result<(u64, String), InviteInputError> {
    let input = input.trim();

    let invite_code = match find_invites(input).as_slice() {
        [single] if single.text == input => single.code.clone(),
        _ if !input.is_empty() && !input.contains(char::is_whitespace) => input.to_string(),
        _ => return Err(InviteInputError::Malformed(input.to_string())),
    };

    let invite = resolver
        .fetch_invite(&invite_code)
        .await?
        .ok_or_else(|| InviteInputError::UnknownCode(invite_code.clone()))?;

    let guild = invite.guild.ok_or(InviteInputError::GroupDm)?;

    let description = description.unwrap_or_default();
    let description = if description
        .to_lowercase()
        .contains(&guild.name.to_lowercase())
    {
        description.to_string()
    } else {
        [format!("Guild \"{}\"", guild.name), description.to_string()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" - ")
    };

    Ok((guild.id, description))
}

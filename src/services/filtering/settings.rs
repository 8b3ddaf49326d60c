use super::context::FilterContext;
use crate::db::entities::infractions::InfractionType;
use serde::{Deserialize, Serialize};

/// Infraction to apply when a filter triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfractionSetting {
    pub infraction_type: InfractionType,
    /// Seconds. `None` is permanent (or the type's default for timeouts).
    #[serde(default)]
    pub duration_secs: Option<i64>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl InfractionSetting {
    /// Harsher type wins; for the same type the longer duration wins, permanent being longest.
    fn harsher(self, other: InfractionSetting) -> InfractionSetting {
        let (a, b) = (self.infraction_type.severity(), other.infraction_type.severity());
        if a != b {
            return if a > b { self } else { other };
        }

        match (self.duration_secs, other.duration_secs) {
            (None, _) => self,
            (_, None) => other,
            (Some(x), Some(y)) if y > x => other,
            _ => self,
        }
    }
}

/// What to do when a list or filter is triggered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ActionSettings {
    /// Delete the offending message.
    pub remove_context: bool,
    pub send_alert: bool,
    pub infraction: Option<InfractionSetting>,
    /// Sent to the author in DMs.
    pub dm_content: Option<String>,
}

impl ActionSettings {
    pub fn is_empty(&self) -> bool {
        self == &ActionSettings::default()
    }

    /// Combine two sets of actions so that the strictest of each wins.
    pub fn union(mut self, other: ActionSettings) -> ActionSettings {
        self.remove_context |= other.remove_context;
        self.send_alert |= other.send_alert;

        self.infraction = match (self.infraction.take(), other.infraction) {
            (Some(a), Some(b)) => Some(a.harsher(b)),
            (a, b) => a.or(b),
        };

        self.dm_content = match (self.dm_content.take(), other.dm_content) {
            (Some(a), Some(b)) if a != b => Some(format!("{a}\n\n{b}")),
            (a, b) => a.or(b),
        };

        self
    }
}

/// Where and for whom a list or filter is in effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub enabled: bool,
    pub bypass_roles: Vec<u64>,
    pub enabled_channels: Vec<u64>,
    pub disabled_channels: Vec<u64>,
    pub enabled_categories: Vec<u64>,
    pub disabled_categories: Vec<u64>,
    pub filter_dm: bool,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bypass_roles: vec![],
            enabled_channels: vec![],
            disabled_channels: vec![],
            enabled_categories: vec![],
            disabled_categories: vec![],
            filter_dm: true,
        }
    }
}

impl ValidationSettings {
    /// Returns the names of the passed and failed validations for this context.
    pub fn evaluate(&self, ctx: &FilterContext) -> (Vec<&'static str>, Vec<&'static str>) {
        let mut passed = vec![];
        let mut failed = vec![];

        let mut record = |name: &'static str, ok: bool| {
            if ok {
                passed.push(name);
            } else {
                failed.push(name);
            }
        };

        record("enabled", self.enabled);

        let bypassed = ctx.author.as_ref().is_some_and(|author| {
            author
                .role_ids
                .iter()
                .any(|role| self.bypass_roles.contains(role))
        });
        record("bypass_roles", !bypassed);

        match &ctx.channel {
            Some(channel) if channel.is_dm => record("filter_dm", self.filter_dm),
            Some(channel) => {
                let category = channel.category_id;
                let explicitly_enabled = self.enabled_channels.contains(&channel.id)
                    || category.is_some_and(|c| self.enabled_categories.contains(&c));
                let disabled = self.disabled_channels.contains(&channel.id)
                    || category.is_some_and(|c| self.disabled_categories.contains(&c));
                record("channel_scope", explicitly_enabled || !disabled);
            }
            None => {}
        }

        (passed, failed)
    }
}

/// Defaults stored on a filter list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ListSettings {
    pub actions: ActionSettings,
    pub validations: ValidationSettings,
}

/// Per-filter overrides. When set, they replace the list's defaults for that filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FilterSettings {
    pub actions: Option<ActionSettings>,
    pub validations: Option<ValidationSettings>,
}

use super::context::{FilterContent, FilterContext};
use super::settings::{ActionSettings, FilterSettings, ListSettings};
use crate::db::entities::filter_lists::ListType;
use crate::db::entities::{filter_lists, filters};
use std::collections::BTreeMap;
use tracing::warn;

/// A single entry of a filter list. For invite lists the content is a guild ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub id: i32,
    pub content: String,
    pub description: Option<String>,
    pub settings: FilterSettings,
}

impl Filter {
    pub fn from_model(model: filters::Model) -> Self {
        let settings = serde_json::from_value(model.settings).unwrap_or_else(|e| {
            warn!("Filter #{} has unreadable settings, using defaults: {}", model.id, e);
            FilterSettings::default()
        });

        Self {
            id: model.id,
            content: model.content,
            description: model.description,
            settings,
        }
    }

    pub fn guild_id(&self) -> Option<u64> {
        self.content.trim().parse().ok()
    }

    /// Whether the guild this filter names is among the context's guilds.
    pub fn triggered_on(&self, ctx: &FilterContext) -> bool {
        match (&ctx.content, self.guild_id()) {
            (FilterContent::Guilds(guilds), Some(id)) => guilds.contains(&id),
            _ => false,
        }
    }
}

/// One side (allow or deny) of a filter list, with its default settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicList {
    pub id: i32,
    pub list_type: ListType,
    pub defaults: ListSettings,
    pub filters: BTreeMap<i32, Filter>,
}

impl AtomicList {
    pub fn new(id: i32, list_type: ListType, defaults: ListSettings) -> Self {
        Self {
            id,
            list_type,
            defaults,
            filters: BTreeMap::new(),
        }
    }

    pub fn from_models(list: filter_lists::Model, entries: Vec<filters::Model>) -> Self {
        let defaults = serde_json::from_value(list.settings).unwrap_or_else(|e| {
            warn!("Filter list #{} has unreadable settings, using defaults: {}", list.id, e);
            ListSettings::default()
        });

        let mut atomic = AtomicList::new(list.id, list.list_type, defaults);
        for entry in entries {
            atomic.add_filter(Filter::from_model(entry));
        }
        atomic
    }

    pub fn add_filter(&mut self, filter: Filter) {
        self.filters.insert(filter.id, filter);
    }

    /// Filters that trigger in the given context, honoring default or per-filter validations.
    pub fn filter_list_result(&self, ctx: &FilterContext) -> Vec<Filter> {
        let (_, failed_by_default) = self.defaults.validations.evaluate(ctx);
        let default_answer = failed_by_default.is_empty();

        self.filters
            .values()
            .filter(|filter| match &filter.settings.validations {
                None => default_answer,
                Some(validations) => validations.evaluate(ctx).1.is_empty(),
            })
            .filter(|filter| filter.triggered_on(ctx))
            .cloned()
            .collect()
    }

    /// The effective actions of a filter: its overrides or the list defaults.
    pub fn actions_of<'a>(&'a self, filter: &'a Filter) -> &'a ActionSettings {
        filter
            .settings
            .actions
            .as_ref()
            .unwrap_or(&self.defaults.actions)
    }

    pub fn merge_actions(&self, triggered: &[Filter]) -> ActionSettings {
        triggered
            .iter()
            .map(|filter| self.actions_of(filter).clone())
            .reduce(ActionSettings::union)
            .unwrap_or_else(|| self.defaults.actions.clone())
    }

    /// One line per triggered filter, for the moderator alert.
    pub fn format_messages(triggered: &[Filter]) -> Vec<String> {
        if let [single] = triggered {
            let mut message = format!("#{} (`{}`)", single.id, single.content);
            if let Some(description) = single.description.as_deref().filter(|d| !d.is_empty()) {
                message.push_str(" - ");
                message.push_str(description);
            }
            return vec![message];
        }

        triggered
            .iter()
            .map(|filter| format!("{} (`{}`)", filter.id, filter.content))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::filtering::context::{AuthorInfo, Event};
    use crate::services::filtering::settings::ValidationSettings;
    use std::collections::HashSet;

    fn filter(id: i32, content: &str, description: Option<&str>) -> Filter {
        Filter {
            id,
            content: content.to_string(),
            description: description.map(str::to_string),
            settings: FilterSettings::default(),
        }
    }

    fn guild_ctx(guilds: &[u64], roles: Vec<u64>) -> FilterContext {
        FilterContext::new(
            Event::Message,
            Some(AuthorInfo {
                id: 1,
                role_ids: roles,
                is_bot: false,
            }),
            None,
            FilterContent::Guilds(guilds.iter().copied().collect::<HashSet<_>>()),
        )
    }

    #[test]
    fn single_trigger_is_expanded_with_description() {
        let messages =
            AtomicList::format_messages(&[filter(3, "122000000000000", Some("Guild \"Spam\""))]);
        assert_eq!(messages, vec!["#3 (`122000000000000`) - Guild \"Spam\""]);
    }

    #[test]
    fn multiple_triggers_are_listed_briefly() {
        let messages = AtomicList::format_messages(&[
            filter(1, "10", Some("ignored")),
            filter(2, "20", None),
        ]);
        assert_eq!(messages, vec!["1 (`10`)", "2 (`20`)"]);
    }

    #[test]
    fn filter_triggers_on_matching_guild_only() {
        let f = filter(1, "122000000000000", None);
        assert!(f.triggered_on(&guild_ctx(&[122000000000000], vec![])));
        assert!(!f.triggered_on(&guild_ctx(&[1], vec![])));
        assert!(!filter(2, "not-a-guild", None).triggered_on(&guild_ctx(&[1], vec![])));
    }

    #[test]
    fn per_filter_validations_replace_defaults() {
        let mut list = AtomicList::new(
            1,
            ListType::Deny,
            ListSettings {
                validations: ValidationSettings {
                    bypass_roles: vec![9],
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        list.add_filter(filter(1, "10", None));
        let mut strict = filter(2, "20", None);
        strict.settings.validations = Some(ValidationSettings::default());
        list.add_filter(strict);

        // The author holds the bypass role, so only the filter with its own validations applies.
        let triggered = list.filter_list_result(&guild_ctx(&[10, 20], vec![9]));
        assert_eq!(triggered.iter().map(|f| f.id).collect::<Vec<_>>(), vec![2]);

        let triggered = list.filter_list_result(&guild_ctx(&[10, 20], vec![]));
        assert_eq!(triggered.len(), 2);
    }

    #[test]
    fn merge_actions_uses_overrides() {
        let mut list = AtomicList::new(1, ListType::Deny, ListSettings::default());
        let mut loud = filter(1, "10", None);
        loud.settings.actions = Some(ActionSettings {
            send_alert: true,
            ..Default::default()
        });
        let quiet = filter(2, "20", None);

        let merged = list.merge_actions(&[loud.clone(), quiet.clone()]);
        assert!(merged.send_alert);

        list.defaults.actions.remove_context = true;
        let merged = list.merge_actions(&[quiet]);
        assert!(merged.remove_context);
        assert!(!merged.send_alert);
    }
}

use fluent::{FluentArgs, FluentResource};
use fluent_bundle::bundle::FluentBundle;
use include_dir::{Dir, include_dir};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use unic_langid::LanguageIdentifier;

// Concurrent memoizer keeps the bundles Send + Sync
type ConcurrentBundle = FluentBundle<FluentResource, intl_memoizer::concurrent::IntlLangMemoizer>;

static LOCALES_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/locales");

pub const FALLBACK_LOCALE: &str = "en-US";

/// Slash command names and descriptions for one locale, read from `commands.yaml`.
#[derive(Debug, Deserialize)]
pub struct CommandLocale {
    pub name: Option<String>,
    pub desc: Option<String>,
    #[serde(default)]
    pub options: HashMap<String, OptionLocale>,
    #[serde(default)]
    pub subcommands: HashMap<String, CommandLocale>,
}

#[derive(Debug, Deserialize)]
pub struct OptionLocale {
    pub name: Option<String>,
    pub desc: Option<String>,
    #[serde(default)]
    pub choices: HashMap<String, String>,
}

pub struct LocalizationManager {
    bundles: HashMap<LanguageIdentifier, ConcurrentBundle>,
    command_locales: HashMap<LanguageIdentifier, HashMap<String, CommandLocale>>,
}

fn load_bundle(locale: &str, lang_id: &LanguageIdentifier, dir: &Dir<'_>) -> ConcurrentBundle {
    let mut bundle = ConcurrentBundle::new_concurrent(vec![lang_id.clone()]);
    // Mention and timestamp markup must reach Discord untouched.
    bundle.set_use_isolating(false);

    for file in dir.files() {
        if file.path().extension().and_then(|e| e.to_str()) != Some("ftl") {
            continue;
        }
        let Some(content) = file.contents_utf8() else {
            continue;
        };
        match FluentResource::try_new(content.to_string()) {
            Ok(resource) => {
                if let Err(errors) = bundle.add_resource(resource) {
                    for err in errors {
                        error!("Error adding resource for {}: {:?}", locale, err);
                    }
                }
            }
            Err((_, errors)) => {
                for err in errors {
                    error!("Error parsing resource for {}: {:?}", locale, err);
                }
            }
        }
    }
    bundle
}

fn load_commands(locale: &str, dir: &Dir<'_>) -> HashMap<String, CommandLocale> {
    let file = dir.files().find(|f| {
        matches!(
            f.path().file_name().and_then(|n| n.to_str()),
            Some("commands.yaml" | "commands.yml")
        )
    });
    let Some(content) = file.and_then(|f| f.contents_utf8()) else {
        return HashMap::new();
    };

    serde_yaml::from_str(content).unwrap_or_else(|err| {
        error!("Error parsing commands.yaml for {}: {:?}", locale, err);
        HashMap::new()
    })
}

impl LocalizationManager {
    /// Loads every locale directory embedded at compile time.
    pub fn new() -> Self {
        let mut bundles = HashMap::new();
        let mut command_locales = HashMap::new();

        for entry in LOCALES_DIR.dirs() {
            let locale = entry.path().to_string_lossy();
            let Ok(lang_id) = locale.parse::<LanguageIdentifier>() else {
                warn!("Skipping locale directory with invalid name: {}", locale);
                continue;
            };

            bundles.insert(lang_id.clone(), load_bundle(&locale, &lang_id, entry));
            command_locales.insert(lang_id, load_commands(&locale, entry));
            info!("Loaded embedded locale: {}", locale);
        }

        Self {
            bundles,
            command_locales,
        }
    }

    pub fn get_proxy(self: &Arc<Self>, locale: &str) -> L10nProxy {
        L10nProxy {
            manager: self.clone(),
            locale: locale.to_string(),
        }
    }

    fn format(&self, lang_id: &LanguageIdentifier, key: &str, args: Option<&FluentArgs>) -> Option<String> {
        let bundle = self.bundles.get(lang_id)?;
        let pattern = bundle.get_message(key)?.value()?;
        let mut errors = vec![];
        let text = bundle.format_pattern(pattern, args, &mut errors).into_owned();
        if !errors.is_empty() {
            warn!("Errors formatting {} for {}: {:?}", key, lang_id, errors);
        }
        Some(text)
    }

    /// Looks the key up in the requested locale, then en-US, then returns the key itself.
    pub fn translate(&self, locale: &str, key: &str, args: Option<&FluentArgs>) -> String {
        let fallback: LanguageIdentifier = FALLBACK_LOCALE.parse().unwrap_or_default();
        let lang_id = locale.parse::<LanguageIdentifier>().unwrap_or_else(|_| fallback.clone());

        self.format(&lang_id, key, args)
            .or_else(|| (lang_id != fallback).then(|| self.format(&fallback, key, args)).flatten())
            .unwrap_or_else(|| key.to_string())
    }

    pub fn apply_translations<U, E>(&self, commands: &mut [poise::Command<U, E>]) {
        for (lang_id, locales) in &self.command_locales {
            let locale_str = lang_id.to_string();
            for cmd in commands.iter_mut() {
                self.apply_to_command(cmd, locales, &locale_str);
            }
        }
    }

    fn apply_to_command<U, E>(
        &self,
        cmd: &mut poise::Command<U, E>,
        locales: &HashMap<String, CommandLocale>,
        locale_str: &str,
    ) {
        let Some(loc) = locales.get(cmd.name.as_str()) else {
            return;
        };
        let is_fallback = locale_str == FALLBACK_LOCALE;

        if let Some(name) = &loc.name {
            cmd.name_localizations
                .insert(locale_str.to_string(), name.clone());
        }
        if let Some(desc) = &loc.desc {
            cmd.description_localizations
                .insert(locale_str.to_string(), desc.clone());
            if is_fallback {
                cmd.description = Some(desc.clone());
            }
        }

        for param in cmd.parameters.iter_mut() {
            let Some(opt_loc) = loc.options.get(param.name.as_str()) else {
                continue;
            };
            if let Some(name) = &opt_loc.name {
                param
                    .name_localizations
                    .insert(locale_str.to_string(), name.clone());
            }
            if let Some(desc) = &opt_loc.desc {
                param
                    .description_localizations
                    .insert(locale_str.to_string(), desc.clone());
                if is_fallback {
                    param.description = Some(desc.clone());
                }
            }
            for choice in param.choices.iter_mut() {
                if let Some(choice_name) = opt_loc.choices.get(choice.name.as_str()) {
                    choice
                        .localizations
                        .insert(locale_str.to_string(), choice_name.clone());
                }
            }
        }

        for subcommand in cmd.subcommands.iter_mut() {
            self.apply_to_command(subcommand, &loc.subcommands, locale_str);
        }
    }
}

/// Translations bound to one locale.
pub struct L10nProxy {
    pub manager: Arc<LocalizationManager>,
    pub locale: String,
}

impl L10nProxy {
    pub fn t(&self, key: &str, args: Option<&FluentArgs>) -> String {
        self.manager.translate(&self.locale, key, args)
    }
}

/// Localization for the invoking user, falling back to the guild locale.
pub trait ContextL10nExt {
    fn l10n_user(&self) -> L10nProxy;
}

impl ContextL10nExt for crate::Context<'_> {
    fn l10n_user(&self) -> L10nProxy {
        let manager = self.data().l10n.clone();
        let locale = self
            .locale()
            .map(str::to_string)
            .or_else(|| self.guild().map(|g| g.preferred_locale.clone()))
            .unwrap_or_else(|| FALLBACK_LOCALE.to_string());
        L10nProxy { manager, locale }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_with_arguments_and_falls_back() {
        let manager = Arc::new(LocalizationManager::new());
        let mut args = FluentArgs::new();
        args.set("id", 42);

        let en = manager.get_proxy("en-US").t("invites-filter-removed", Some(&args));
        assert_eq!(en, "Removed filter #42.");

        let other = manager.get_proxy("tr").t("invites-filter-removed", Some(&args));
        assert_eq!(other, en);

        assert_eq!(manager.get_proxy("en-US").t("no-such-key", None), "no-such-key");
    }
}

use super::time::{discord_timestamp, humanize_delta};
use crate::db::entities::infractions::{self, InfractionType};

const INFRACTION_COLOUR: u32 = 0xe74c3c;
const PARDON_COLOUR: u32 = 0x68c290;

/// A direct message sent to the member an infraction concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub colour: u32,
    pub footer: Option<String>,
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn infraction_notice(infraction: &infractions::Model) -> Notice {
    let (duration, expires) = match infraction.expires_at {
        Some(expires_at) => (
            humanize_delta(expires_at - infraction.last_applied),
            discord_timestamp(expires_at),
        ),
        None if infraction.infraction_type.is_reversible() => {
            ("Permanent".to_string(), "N/A".to_string())
        }
        None => ("N/A".to_string(), "N/A".to_string()),
    };

    let reason = infraction
        .reason
        .as_deref()
        .filter(|r| !r.is_empty())
        .unwrap_or("No reason provided.");

    Notice {
        title: "Please review our rules".to_string(),
        description: format!(
            "**Type:** {}\n**Duration:** {}\n**Expires:** {}\n**Reason:** {}",
            capitalize(infraction.infraction_type.display_name()),
            duration,
            expires,
            reason
        ),
        colour: INFRACTION_COLOUR,
        footer: Some(
            "If you would like to discuss or appeal this infraction, contact the server moderators."
                .to_string(),
        ),
    }
}

/// Sent when a timeout or voice mute is lifted. Banned users cannot be reached, so bans have none.
pub fn pardon_notice(kind: InfractionType) -> Option<Notice> {
    let (title, description) = match kind {
        InfractionType::Timeout => (
            "Your timeout has ended",
            "You may now send messages in the server.",
        ),
        InfractionType::VoiceMute => (
            "You have been unmuted",
            "You may now speak in voice channels.",
        ),
        _ => return None,
    };

    Some(Notice {
        title: title.to_string(),
        description: description.to_string(),
        colour: PARDON_COLOUR,
        footer: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn infraction(kind: InfractionType, expires: bool) -> infractions::Model {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        infractions::Model {
            id: 1,
            guild_id: 4567,
            user_id: 456,
            actor_id: 789,
            infraction_type: kind,
            reason: Some("Test reason".into()),
            inserted_at: start,
            last_applied: start,
            expires_at: expires.then(|| start + chrono::Duration::days(1)),
            active: true,
            hidden: false,
            dm_sent: None,
            jump_url: None,
        }
    }

    #[test]
    fn temporary_infraction_lists_duration_and_expiry() {
        let notice = infraction_notice(&infraction(InfractionType::VoiceMute, true));
        assert!(notice.description.contains("**Type:** Voice mute"));
        assert!(notice.description.contains("**Duration:** 1 day"));
        assert!(notice.description.contains("**Expires:** <t:1672617600:f>"));
        assert!(notice.description.ends_with("**Reason:** Test reason"));
    }

    #[test]
    fn permanent_and_instant_infractions() {
        let ban = infraction_notice(&infraction(InfractionType::Ban, false));
        assert!(ban.description.contains("**Duration:** Permanent"));

        let warning = infraction_notice(&infraction(InfractionType::Warning, false));
        assert!(warning.description.contains("**Duration:** N/A"));
    }

    #[test]
    fn only_lifted_restrictions_get_a_pardon_notice() {
        assert!(pardon_notice(InfractionType::Timeout).is_some());
        assert!(pardon_notice(InfractionType::VoiceMute).is_some());
        assert!(pardon_notice(InfractionType::Ban).is_none());
    }
}

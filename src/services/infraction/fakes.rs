//! In-memory stand-ins for the infraction seams.

use super::notify::Notice;
use super::{InfractionStore, ModerationGateway, NewInfraction};
use crate::db::entities::infractions::{self, InfractionType};
use crate::error::ApiError;
use crate::services::logger::{ModLog, ModLogEntry};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::sync::Mutex;

pub fn at(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 1, day)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn infraction(id: i32, kind: InfractionType) -> infractions::Model {
    infractions::Model {
        id,
        guild_id: 4567,
        user_id: 456,
        actor_id: 789,
        infraction_type: kind,
        reason: Some("Test reason".into()),
        inserted_at: at(1),
        last_applied: at(1),
        expires_at: Some(at(2)),
        active: true,
        hidden: false,
        dm_sent: None,
        jump_url: None,
    }
}

#[derive(Default)]
pub struct FakeStore {
    pub rows: Mutex<Vec<infractions::Model>>,
    pub inactive_calls: Mutex<Vec<i32>>,
    pub deleted: Mutex<Vec<i32>>,
    pub dm_sent: Mutex<Vec<(i32, bool)>>,
    pub fail_updates: bool,
    pub fail_deletes: bool,
}

impl FakeStore {
    pub fn with(rows: Vec<infractions::Model>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl InfractionStore for FakeStore {
    async fn insert(&self, new: NewInfraction) -> Result<infractions::Model, crate::Error> {
        let mut rows = self.rows.lock().unwrap();
        let model = infractions::Model {
            id: rows.len() as i32 + 1,
            guild_id: new.guild_id as i64,
            user_id: new.user_id as i64,
            actor_id: new.actor_id as i64,
            infraction_type: new.kind,
            reason: new.reason,
            inserted_at: at(1),
            last_applied: at(1),
            expires_at: new.expires_at,
            active: new.active,
            hidden: new.hidden,
            dm_sent: None,
            jump_url: new.jump_url,
        };
        rows.push(model.clone());
        Ok(model)
    }

    async fn find_active(
        &self,
        guild_id: u64,
        user_id: u64,
        kind: InfractionType,
    ) -> Result<Vec<infractions::Model>, crate::Error> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r.active
                    && r.guild_id == guild_id as i64
                    && r.user_id == user_id as i64
                    && r.infraction_type == kind
            })
            .cloned()
            .collect())
    }

    async fn set_inactive(&self, id: i32) -> Result<(), crate::Error> {
        self.inactive_calls.lock().unwrap().push(id);
        if self.fail_updates {
            anyhow::bail!("database unavailable");
        }
        for row in self.rows.lock().unwrap().iter_mut() {
            if row.id == id {
                row.active = false;
            }
        }
        Ok(())
    }

    async fn set_dm_sent(&self, id: i32, sent: bool) -> Result<(), crate::Error> {
        self.dm_sent.lock().unwrap().push((id, sent));
        Ok(())
    }

    async fn delete(&self, id: i32) -> Result<(), crate::Error> {
        self.deleted.lock().unwrap().push(id);
        if self.fail_deletes {
            anyhow::bail!("database unavailable");
        }
        self.rows.lock().unwrap().retain(|r| r.id != id);
        Ok(())
    }

    async fn expired(&self, now: NaiveDateTime) -> Result<Vec<infractions::Model>, crate::Error> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.active && r.expires_at.is_some_and(|e| e <= now))
            .cloned()
            .collect())
    }

    async fn for_user(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Vec<infractions::Model>, crate::Error> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.guild_id == guild_id as i64 && r.user_id == user_id as i64)
            .cloned()
            .collect())
    }
}

/// How the fake gateway fails its moderation actions.
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Forbidden,
    NotFound,
    Http(u16, isize),
}

impl Failure {
    fn to_error(self) -> ApiError {
        match self {
            Failure::Forbidden => ApiError::Forbidden,
            Failure::NotFound => ApiError::NotFound { code: None },
            Failure::Http(status, code) => ApiError::Http {
                status,
                code: Some(code),
            },
        }
    }
}

pub struct FakeGateway {
    pub calls: Mutex<Vec<String>>,
    pub dms: Mutex<Vec<(u64, Notice)>>,
    pub fail: Option<Failure>,
    pub dm_fails: bool,
    pub is_member: bool,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            calls: Mutex::new(vec![]),
            dms: Mutex::new(vec![]),
            fail: None,
            dm_fails: false,
            is_member: true,
        }
    }
}

impl FakeGateway {
    pub fn failing(failure: Failure) -> Self {
        Self {
            fail: Some(failure),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(call);
        match self.fail {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl ModerationGateway for FakeGateway {
    async fn ban(
        &self,
        _guild_id: u64,
        user_id: u64,
        delete_message_days: u8,
        _reason: &str,
    ) -> Result<(), ApiError> {
        self.record(format!("ban {user_id} {delete_message_days}"))
    }

    async fn unban(&self, _guild_id: u64, user_id: u64, _reason: &str) -> Result<(), ApiError> {
        self.record(format!("unban {user_id}"))
    }

    async fn kick(&self, _guild_id: u64, user_id: u64, _reason: &str) -> Result<(), ApiError> {
        self.record(format!("kick {user_id}"))
    }

    async fn timeout(
        &self,
        _guild_id: u64,
        user_id: u64,
        _until: DateTime<Utc>,
        _reason: &str,
    ) -> Result<(), ApiError> {
        self.record(format!("timeout {user_id}"))
    }

    async fn remove_timeout(
        &self,
        _guild_id: u64,
        user_id: u64,
        _reason: &str,
    ) -> Result<(), ApiError> {
        self.record(format!("remove_timeout {user_id}"))
    }

    async fn set_voice_mute(
        &self,
        _guild_id: u64,
        user_id: u64,
        muted: bool,
        _reason: &str,
    ) -> Result<(), ApiError> {
        self.record(format!("voice_mute {user_id} {muted}"))
    }

    async fn is_member(&self, _guild_id: u64, _user_id: u64) -> Result<bool, ApiError> {
        Ok(self.is_member)
    }

    async fn send_dm(&self, user_id: u64, notice: &Notice) -> Result<(), ApiError> {
        if self.dm_fails {
            return Err(ApiError::Forbidden);
        }
        self.dms.lock().unwrap().push((user_id, notice.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeModLog {
    pub entries: Mutex<Vec<ModLogEntry>>,
}

impl FakeModLog {
    pub fn titles(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.title.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl ModLog for FakeModLog {
    async fn send(&self, entry: ModLogEntry) -> Result<(), crate::Error> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

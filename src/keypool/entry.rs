use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Active,
    Disabled,
    Cooldown,
}

/// Why a key was reported failed. Determines what happens to the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFailure {
    /// Key is rejected outright; the entry is disabled.
    Authentication,
    /// Key is throttled or out of budget; the entry cools down.
    Quota,
    /// Anything else; counted toward the consecutive-failure limit.
    Other,
}

/// One credential in the pool. Entries are owned by the pool and only
/// ever surface with their secret masked.
#[derive(Debug, Clone)]
pub struct KeyEntry {
    pub id: String,
    pub(super) secret: SecretString,
    pub name: String,
    pub status: KeyStatus,
    pub consecutive_failures: u32,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
}

impl KeyEntry {
    pub(super) fn new(secret: SecretString, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            secret,
            name: name.into(),
            status: KeyStatus::Active,
            consecutive_failures: 0,
            cooldown_until: None,
            last_used: None,
        }
    }

    /// First and last four characters, everything else elided. Short
    /// secrets are fully masked.
    pub fn masked_secret(&self) -> String {
        mask_secret(self.secret.expose_secret())
    }

    pub(super) fn cooldown_expired(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_none_or(|until| until <= now)
    }
}

pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

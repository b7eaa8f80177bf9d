//! RFID user records.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A registered RFID card holder.
///
/// Deserializes from both firmware dialects: `{uid, name, credits,
/// isActive, lastUsed}` and the legacy `{uid, nome, creditos}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Card UID, unique and stable.
    pub uid: String,
    /// Display name.
    #[serde(alias = "nome")]
    pub name: String,
    /// Remaining coffee allowance.
    #[serde(alias = "creditos", default)]
    pub credits: u32,
    /// Whether the card is enabled.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Last time the card was used, in milliseconds since the epoch.
    #[serde(default)]
    pub last_used: Option<i64>,
}

impl User {
    /// Merge a partial update (`{...user, ...patch}`).
    ///
    /// The uid is never changed. A patch that would produce an invalid
    /// record is ignored and `false` is returned.
    pub fn apply_patch(&mut self, patch: &Map<String, Value>) -> bool {
        let Ok(Value::Object(mut merged)) = serde_json::to_value(&*self) else {
            return false;
        };
        for (key, value) in patch {
            if key == "uid" {
                continue;
            }
            let key = match key.as_str() {
                "nome" => "name",
                "creditos" => "credits",
                other => other,
            };
            merged.insert(key.to_string(), value.clone());
        }
        match serde_json::from_value::<User>(Value::Object(merged)) {
            Ok(updated) => {
                *self = updated;
                true
            }
            Err(e) => {
                tracing::debug!(uid = %self.uid, error = %e, "Ignoring malformed user patch");
                false
            }
        }
    }

    /// Last use as a UTC timestamp.
    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }

    /// Whether the card was used since local midnight.
    pub fn is_active_today(&self, now: DateTime<Local>) -> bool {
        let Some(last_used) = self.last_used_at() else {
            return false;
        };
        let Some(midnight) = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .and_then(|m| Local.from_local_datetime(&m).earliest())
        else {
            return false;
        };
        last_used >= midnight.with_timezone(&Utc)
    }
}

/// Payload for registering a new card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    /// Card UID (normalized to upper case).
    pub uid: String,
    /// Display name.
    pub name: String,
}

impl NewUser {
    /// Build a registration, trimming both fields and upper-casing the UID.
    pub fn new(uid: &str, name: &str) -> Self {
        Self {
            uid: uid.trim().to_uppercase(),
            name: name.trim().to_string(),
        }
    }

    /// Both fields must be non-empty.
    pub fn is_complete(&self) -> bool {
        !self.uid.is_empty() && !self.name.is_empty()
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_legacy_fields_decode() {
        let user: User =
            serde_json::from_value(json!({"uid": "AB12", "nome": "Joana", "creditos": 3})).unwrap();
        assert_eq!(user.name, "Joana");
        assert_eq!(user.credits, 3);
        assert!(user.is_active);
        assert_eq!(user.last_used, None);
    }

    #[test]
    fn test_current_fields_decode() {
        let user: User = serde_json::from_value(json!({
            "uid": "CD34",
            "name": "Ana",
            "credits": 7,
            "isActive": false,
            "lastUsed": 1_700_000_000_000_i64
        }))
        .unwrap();
        assert_eq!(user.name, "Ana");
        assert!(!user.is_active);
        assert!(user.last_used_at().is_some());
    }

    #[test]
    fn test_negative_credits_rejected() {
        let result: Result<User, _> =
            serde_json::from_value(json!({"uid": "X", "name": "Y", "credits": -1}));
        assert!(result.is_err());
    }

    #[test]
    fn test_patch_merges_and_keeps_uid() {
        let mut user = User {
            uid: "AB12".into(),
            name: "Joana".into(),
            credits: 3,
            is_active: true,
            last_used: None,
        };
        let patch = json!({"uid": "ZZ", "creditos": 2, "lastUsed": 5}).as_object().cloned().unwrap();
        assert!(user.apply_patch(&patch));
        assert_eq!(user.uid, "AB12");
        assert_eq!(user.credits, 2);
        assert_eq!(user.last_used, Some(5));

        let bad = json!({"credits": "many"}).as_object().cloned().unwrap();
        assert!(!user.apply_patch(&bad));
        assert_eq!(user.credits, 2);
    }

    #[test]
    fn test_new_user_normalization() {
        let new_user = NewUser::new("  ab12 ", " Joana ");
        assert_eq!(new_user.uid, "AB12");
        assert_eq!(new_user.name, "Joana");
        assert!(new_user.is_complete());
        assert!(!NewUser::new(" ", "x").is_complete());
    }

    #[test]
    fn test_active_today() {
        let now = Local::now();
        let mut user = User {
            uid: "A".into(),
            name: "B".into(),
            credits: 1,
            is_active: true,
            last_used: Some(now.timestamp_millis()),
        };
        assert!(user.is_active_today(now));
        user.last_used = Some((now - chrono::Duration::days(2)).timestamp_millis());
        assert!(!user.is_active_today(now));
    }
}

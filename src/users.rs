//! User store. Collaborator glue: in-memory users with notification
//! settings, plus the demo commuters seeded at startup.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::MonitorError;
use crate::models::{parse_hhmm, QuietHours, User, UserSettings};

/// Navigation apps a user may pick as their default.
const KNOWN_NAV_APPS: [&str; 3] = ["google_maps", "apple_maps", "waze"];

pub struct UserStore {
    users: Arc<RwLock<HashMap<String, User>>>,
    /// Normalized email -> user id
    email_index: Arc<RwLock<HashMap<String, String>>>,
}

impl Clone for UserStore {
    fn clone(&self) -> Self {
        Self {
            users: self.users.clone(),
            email_index: self.email_index.clone(),
        }
    }
}

impl Default for UserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStore {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            email_index: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn create_user(
        &self,
        email: &str,
        name: &str,
        settings: Option<UserSettings>,
    ) -> Result<User, MonitorError> {
        let normalized = email.trim().to_lowercase();
        if normalized.is_empty() || !normalized.contains('@') {
            return Err(MonitorError::Validation("Valid email is required".to_string()));
        }
        if name.trim().is_empty() {
            return Err(MonitorError::Validation("User name is required".to_string()));
        }
        if self.email_index.read().contains_key(&normalized) {
            return Err(MonitorError::Validation(format!(
                "User with email {} already exists",
                normalized
            )));
        }

        let settings = settings.unwrap_or(UserSettings {
            default_nav_app: "google_maps".to_string(),
            quiet_hours: None,
        });
        Self::validate_settings(&settings)?;

        let user = User {
            id: Uuid::new_v4().to_string(),
            email: normalized.clone(),
            name: name.trim().to_string(),
            created_at: OffsetDateTime::now_utc(),
            settings,
        };
        self.users.write().insert(user.id.clone(), user.clone());
        self.email_index.write().insert(normalized, user.id.clone());
        Ok(user)
    }

    pub fn get_user(&self, user_id: &str) -> Option<User> {
        self.users.read().get(user_id).cloned()
    }

    pub fn get_user_by_email(&self, email: &str) -> Option<User> {
        let normalized = email.trim().to_lowercase();
        let id = self.email_index.read().get(&normalized).cloned()?;
        self.get_user(&id)
    }

    pub fn all_users(&self) -> Vec<User> {
        self.users.read().values().cloned().collect()
    }

    /// Replaces a user's notification settings. A job that is mid-poll
    /// picks the new settings up at its next delivery attempt.
    pub fn update_settings(
        &self,
        user_id: &str,
        settings: UserSettings,
    ) -> Result<User, MonitorError> {
        Self::validate_settings(&settings)?;
        let mut users = self.users.write();
        match users.get_mut(user_id) {
            Some(user) => {
                user.settings = settings;
                Ok(user.clone())
            }
            None => Err(MonitorError::NotFound(format!(
                "User {} not found",
                user_id
            ))),
        }
    }

    pub fn user_count(&self) -> usize {
        self.users.read().len()
    }

    /// Seeds the demo commuters. Idempotent: existing emails are reused.
    pub fn create_demo_users(&self) -> Vec<User> {
        let demo = [
            (
                "alex.kent@sevenoaks-demo.co.uk",
                "Alex Kent",
                "waze",
                Some(("22:00", "07:00", true)),
            ),
            (
                "chloe.wells@tunbridge-demo.co.uk",
                "Chloe Wells",
                "apple_maps",
                Some(("23:00", "06:00", false)),
            ),
            (
                "james.maidstone@kent-demo.co.uk",
                "James Maidstone",
                "google_maps",
                Some(("21:30", "07:30", true)),
            ),
        ];

        let mut users = Vec::new();
        for (email, name, nav_app, quiet) in demo {
            if let Some(existing) = self.get_user_by_email(email) {
                users.push(existing);
                continue;
            }
            let settings = UserSettings {
                default_nav_app: nav_app.to_string(),
                quiet_hours: quiet.map(|(start, end, enabled)| QuietHours {
                    enabled,
                    start: start.to_string(),
                    end: end.to_string(),
                }),
            };
            match self.create_user(email, name, Some(settings)) {
                Ok(user) => users.push(user),
                Err(e) => log::error!("Failed to create demo user {}: {}", email, e),
            }
        }
        users
    }

    fn validate_settings(settings: &UserSettings) -> Result<(), MonitorError> {
        if !KNOWN_NAV_APPS.contains(&settings.default_nav_app.as_str()) {
            return Err(MonitorError::Validation(format!(
                "Unknown navigation app: {}",
                settings.default_nav_app
            )));
        }
        if let Some(quiet) = &settings.quiet_hours {
            if parse_hhmm(&quiet.start).is_none() || parse_hhmm(&quiet.end).is_none() {
                return Err(MonitorError::Validation(
                    "Quiet hours must use HH:MM times".to_string(),
                ));
            }
        }
        Ok(())
    }
}

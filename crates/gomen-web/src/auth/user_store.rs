use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::UserConfig;

/// In-memory accounts, seeded from `[[users]]` and extended by registration.
pub struct UserStore {
    users: DashMap<u64, UserConfig>,
    /// Lower-cased email to user id.
    emails: DashMap<String, u64>,
    next_id: AtomicU64,
}

impl UserStore {
    pub fn new(seed: &[UserConfig]) -> Self {
        let users = DashMap::new();
        let emails = DashMap::new();
        for user in seed {
            emails.insert(email_key(&user.email), user.id);
            users.insert(user.id, user.clone());
        }

        let next_id = seed
            .iter()
            .map(|u| u.id)
            .max()
            .map_or(1, |max| max.saturating_add(1));

        Self {
            users,
            emails,
            next_id: AtomicU64::new(next_id),
        }
    }

    pub fn get(&self, id: u64) -> Option<UserConfig> {
        self.users.get(&id).map(|user| user.value().clone())
    }

    /// Case-insensitive lookup.
    pub fn find_by_email(&self, email: &str) -> Option<UserConfig> {
        let id = *self.emails.get(&email_key(email))?;
        self.get(id)
    }

    /// Creates an active account, or returns `None` if the email is taken.
    ///
    /// The email index entry stays locked until the account is stored, so two
    /// concurrent registrations of one address cannot both succeed.
    pub fn register(&self, name: &str, email: &str, password_hash: String) -> Option<UserConfig> {
        match self.emails.entry(email_key(email)) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let user = UserConfig {
                    id,
                    name: name.to_string(),
                    email: email.to_string(),
                    password_hash,
                    is_active: true,
                };
                self.users.insert(id, user.clone());
                vacant.insert(id);
                tracing::debug!(user_id = id, store_size = self.count(), "User stored");
                Some(user)
            }
        }
    }

    pub fn update_name(&self, id: u64, name: &str) -> Option<UserConfig> {
        let mut user = self.users.get_mut(&id)?;
        user.name = name.to_string();
        Some(user.value().clone())
    }

    /// Returns `false` if the user no longer exists.
    pub fn set_password_hash(&self, id: u64, password_hash: String) -> bool {
        match self.users.get_mut(&id) {
            Some(mut user) => {
                user.password_hash = password_hash;
                true
            }
            None => false,
        }
    }

    pub fn count(&self) -> usize {
        self.users.len()
    }
}

fn email_key(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::domain::UserId;

/// Per-user link posting record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: UserId,
    /// Last known `@username` (without `@`) or display name. Empty when the
    /// record was created by an admin command before the user ever posted.
    pub username: String,
    pub link_count: u32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub whitelisted: bool,
}

impl UserRecord {
    fn new(user_id: UserId, username: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            username: username.to_string(),
            link_count: 0,
            first_seen: now,
            last_seen: now,
            whitelisted: false,
        }
    }

    pub fn display_name(&self) -> String {
        if self.username.is_empty() {
            self.user_id.0.to_string()
        } else {
            self.username.clone()
        }
    }
}

#[derive(Clone, Debug)]
pub struct TrackerStats {
    pub total_users: usize,
    pub total_links: u64,
    pub whitelisted: usize,
    /// Sorted by link count (desc), then user id.
    pub users: Vec<UserRecord>,
}

/// In-memory link counters. Lives as long as the process; nothing is persisted.
#[derive(Debug, Default)]
pub struct UserTracker {
    users: HashMap<UserId, UserRecord>,
    /// Lowercased username (no `@`) -> id, for admin commands.
    usernames: HashMap<String, UserId>,
}

impl UserTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one link-bearing message and return the new total.
    ///
    /// Whitelisted users are not counted; their current total is returned.
    pub fn record_link(&mut self, user_id: UserId, username: &str) -> u32 {
        self.record_link_at(user_id, username, Utc::now())
    }

    pub fn record_link_at(&mut self, user_id: UserId, username: &str, now: DateTime<Utc>) -> u32 {
        let rec = self.users.entry(user_id).or_insert_with(|| {
            tracing::info!(user_id = user_id.0, username, "new user tracked");
            UserRecord::new(user_id, username, now)
        });

        rec.last_seen = now;
        if !username.is_empty() {
            rec.username = username.to_string();
        }
        if !rec.whitelisted {
            rec.link_count = rec.link_count.saturating_add(1);
        }
        let count = rec.link_count;

        if !username.is_empty() {
            self.usernames
                .insert(normalize_username(username), user_id);
        }

        tracing::debug!(user_id = user_id.0, username, count, "link count updated");
        count
    }

    pub fn count(&self, user_id: UserId) -> u32 {
        self.users.get(&user_id).map(|r| r.link_count).unwrap_or(0)
    }

    /// Whether the user has reached `threshold` links. Whitelisted users never do.
    pub fn is_over_threshold(&self, user_id: UserId, threshold: u32) -> bool {
        let Some(rec) = self.users.get(&user_id) else {
            return false;
        };
        !rec.whitelisted && threshold > 0 && rec.link_count >= threshold
    }

    pub fn get(&self, user_id: UserId) -> Option<&UserRecord> {
        self.users.get(&user_id)
    }

    /// Zero the user's count. Returns `false` if the user was never tracked.
    pub fn reset(&mut self, user_id: UserId) -> bool {
        let Some(rec) = self.users.get_mut(&user_id) else {
            return false;
        };
        let old = rec.link_count;
        rec.link_count = 0;
        tracing::info!(user_id = user_id.0, username = %rec.username, old, "link count reset");
        true
    }

    pub fn whitelist(&mut self, user_id: UserId) {
        let rec = self
            .users
            .entry(user_id)
            .or_insert_with(|| UserRecord::new(user_id, "", Utc::now()));
        rec.whitelisted = true;
        tracing::info!(user_id = user_id.0, username = %rec.username, "user whitelisted");
    }

    /// Returns `false` if the user was not whitelisted.
    pub fn unwhitelist(&mut self, user_id: UserId) -> bool {
        match self.users.get_mut(&user_id) {
            Some(rec) if rec.whitelisted => {
                rec.whitelisted = false;
                tracing::info!(user_id = user_id.0, username = %rec.username, "user removed from whitelist");
                true
            }
            _ => false,
        }
    }

    pub fn is_whitelisted(&self, user_id: UserId) -> bool {
        self.users
            .get(&user_id)
            .map(|r| r.whitelisted)
            .unwrap_or(false)
    }

    /// Case-insensitive lookup; a leading `@` is ignored.
    pub fn user_id_by_username(&self, username: &str) -> Option<UserId> {
        self.usernames.get(&normalize_username(username)).copied()
    }

    pub fn stats(&self) -> TrackerStats {
        let mut users: Vec<UserRecord> = self.users.values().cloned().collect();
        users.sort_by(|a, b| {
            b.link_count
                .cmp(&a.link_count)
                .then(a.user_id.cmp(&b.user_id))
        });

        TrackerStats {
            total_users: users.len(),
            total_links: users.iter().map(|u| u64::from(u.link_count)).sum(),
            whitelisted: users.iter().filter(|u| u.whitelisted).count(),
            users,
        }
    }

    /// Drop users not seen for longer than `max_age`. Whitelisted users are kept.
    pub fn prune_inactive(&mut self, max_age: Duration) -> usize {
        self.prune_inactive_at(max_age, Utc::now())
    }

    pub fn prune_inactive_at(&mut self, max_age: Duration, now: DateTime<Utc>) -> usize {
        let cutoff = now - max_age;
        let stale: Vec<UserId> = self
            .users
            .values()
            .filter(|r| !r.whitelisted && r.last_seen < cutoff)
            .map(|r| r.user_id)
            .collect();

        for id in &stale {
            if let Some(rec) = self.users.remove(id) {
                tracing::info!(user_id = id.0, username = %rec.username, "pruned inactive user");
            }
        }
        self.usernames.retain(|_, id| !stale.contains(id));
        stale.len()
    }
}

fn normalize_username(username: &str) -> String {
    username.trim().trim_start_matches('@').to_lowercase()
}

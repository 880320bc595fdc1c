//! Editor locking
//!
//! A soft, time-boxed lock keeping two people from editing one translation
//! at once. Expiry is lazy: an expired lock is cleared when it is checked.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use super::Translation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditorLock {
    pub user: String,
    pub expires: DateTime<Utc>,
}

impl EditorLock {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires < now
    }
}

impl Translation {
    /// Whether someone other than `user` holds the lock. With `user` unset,
    /// any live lock counts. An expired lock is released here.
    pub fn is_user_locked(&mut self, user: Option<&str>, now: DateTime<Utc>) -> bool {
        let Some(lock) = &self.lock else {
            return false;
        };
        if lock.is_expired(now) {
            debug!("{}lock of {} expired", self.log_prefix(), lock.user);
            self.create_lock(None, false, now);
            return false;
        }
        match user {
            Some(user) => lock.user != user,
            None => true,
        }
    }

    /// Take the lock for `user`, or release it with `None`
    pub fn create_lock(&mut self, user: Option<&str>, explicit: bool, now: DateTime<Utc>) {
        let is_new = self.lock.is_none();
        match user {
            None => self.lock = None,
            Some(user) => {
                let expires = self.lock.as_ref().map(|l| l.expires).unwrap_or(now);
                self.lock = Some(EditorLock {
                    user: user.to_string(),
                    expires,
                });
                self.update_lock_time(explicit, is_new, now);
            }
        }
    }

    /// Extend the lock. Explicit locks last `lock_time`, automatic ones
    /// `auto_lock_time`; an existing lock is never shortened.
    pub fn update_lock_time(&mut self, explicit: bool, is_new: bool, now: DateTime<Utc>) {
        let policy = self.services.lock_policy;
        let seconds = if explicit {
            policy.lock_time
        } else {
            policy.auto_lock_time
        };
        let new_expiry = now + Duration::seconds(seconds);
        if let Some(lock) = &mut self.lock {
            if is_new || new_expiry > lock.expires {
                lock.expires = new_expiry;
            }
        }
    }

    /// Refresh the lock on an edit by `user`. Returns false when someone
    /// else holds it or no lock could be taken.
    pub fn update_lock(&mut self, user: &str, create: bool, now: DateTime<Utc>) -> bool {
        if self.is_user_locked(Some(user), now) {
            return false;
        }
        if self.lock.as_ref().is_some_and(|l| l.user == user) {
            self.update_lock_time(false, false, now);
            return true;
        }
        if self.services.lock_policy.auto_lock && create {
            self.create_lock(Some(user), false, now);
            return true;
        }
        false
    }
}

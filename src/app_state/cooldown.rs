//! Per-member XP earning cooldowns.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serenity::model::prelude::{GuildId, UserId};

/// How long a member has to wait between two XP rolls.
pub(crate) const EARN_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
pub(crate) struct UserBucket {
    last_earned: Option<Instant>,
}

impl UserBucket {
    /// Returns true if the member can earn XP again.
    pub(crate) fn can_earn(&self) -> bool {
        match self.last_earned {
            None => true,
            Some(at) => at.elapsed() >= EARN_COOLDOWN,
        }
    }

    /// Puts the bucket on cooldown.
    pub(crate) fn touch(&mut self) {
        self.last_earned = Some(Instant::now());
    }

    #[cfg(test)]
    fn backdate(&mut self, by: Duration) {
        self.last_earned = Some(Instant::now() - by);
    }
}

/// Cooldown buckets for every member the bot has seen speak, keyed by
/// guild and user.
#[derive(Debug, Default)]
pub(crate) struct CooldownStorage {
    buckets: HashMap<(GuildId, UserId), UserBucket>,
}

impl CooldownStorage {
    pub(crate) fn bucket_mut(&mut self, guild_id: GuildId, user_id: UserId) -> &mut UserBucket {
        self.buckets.entry((guild_id, user_id)).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::{CooldownStorage, EARN_COOLDOWN};
    use serenity::model::prelude::{GuildId, UserId};
    use std::time::Duration;

    #[test]
    fn fresh_bucket_can_earn() {
        let mut storage = CooldownStorage::default();
        let bucket = storage.bucket_mut(GuildId(1), UserId(2));
        assert!(bucket.can_earn());
    }

    #[test]
    fn touched_bucket_is_on_cooldown() {
        let mut storage = CooldownStorage::default();
        let bucket = storage.bucket_mut(GuildId(1), UserId(2));
        bucket.touch();
        assert!(!bucket.can_earn());
    }

    #[test]
    fn cooldown_expires() {
        let mut storage = CooldownStorage::default();
        let bucket = storage.bucket_mut(GuildId(1), UserId(2));
        bucket.backdate(EARN_COOLDOWN + Duration::from_secs(1));
        assert!(bucket.can_earn());
    }

    #[test]
    fn buckets_are_per_guild() {
        let mut storage = CooldownStorage::default();
        storage.bucket_mut(GuildId(1), UserId(2)).touch();
        assert!(storage.bucket_mut(GuildId(3), UserId(2)).can_earn());
    }
}

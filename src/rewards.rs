//! Level reward resolution and the consumers that turn level changes
//! into queued role changes.
//!
//! Eligibility is a pure question ("what does level L entitle you to"),
//! answered here and by the range queries in [`crate::db`]. The guild's
//! `stack_level_rewards` flag decides what the answer means: stacked
//! guilds keep every earned reward role, non-stacked guilds keep only
//! the single best one.

use std::sync::Arc;
use std::time::Duration;

use serenity::cache::Cache;
use serenity::model::prelude::{GuildId, RoleId, UserId};
use sqlx::PgPool;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error};

use crate::app_state::LevelUpEvent;
use crate::db::{self, dao};
use crate::role_queue::{queue_role_add, queue_role_remove};
use crate::util::macros::u64_from_db_id;

/// All rewards of `sorted_desc` (highest required level first) a member
/// of `level` qualifies for, keeping the order.
pub(crate) fn eligible_rewards(
    sorted_desc: &[dao::LevelRewardRow],
    level: i64,
) -> Vec<&dao::LevelRewardRow> {
    sorted_desc.iter().filter(|r| r.level <= level).collect()
}

/// The reward with the highest required level not exceeding `level`.
pub(crate) fn eligible_reward(
    sorted_desc: &[dao::LevelRewardRow],
    level: i64,
) -> Option<&dao::LevelRewardRow> {
    sorted_desc.iter().find(|r| r.level <= level)
}

/// Spawns the consumer of the XP engine's level-up channel.
pub(crate) fn spawn_reward_issuer(pool: PgPool, mut level_ups: UnboundedReceiver<LevelUpEvent>) {
    tokio::spawn(async move {
        while let Some(event) = level_ups.recv().await {
            if let Err(e) = issue_level_up_rewards(&pool, &event).await {
                error!(
                    "Failed to issue level rewards for member {} in guild {}: {e}",
                    event.member_id, event.guild_id
                );
            }
        }
    });
}

/// Enqueues the role changes a freshly reached level entitles a member
/// to, honoring the guild's stacking policy.
async fn issue_level_up_rewards(pool: &PgPool, event: &LevelUpEvent) -> Result<(), sqlx::Error> {
    debug!(
        "Member {} went from level {} to {} in guild {}",
        event.member_id, event.old.level, event.new.level, event.guild_id
    );
    let config = db::fetch_guild_configuration(pool, event.guild_id).await?;
    let rewards = db::fetch_eligible_level_rewards(pool, event.guild_id, event.new.level).await?;
    let Some((top, lower)) = rewards.split_first() else {
        return Ok(());
    };

    if config.stack_level_rewards {
        let roles = reward_roles(&rewards);
        queue_role_add(pool, event.guild_id, event.member_id, &roles).await?;
    } else {
        queue_role_remove(pool, event.guild_id, event.member_id, &reward_roles(lower)).await?;
        queue_role_add(pool, event.guild_id, event.member_id, &[role_of(top)]).await?;
    }
    Ok(())
}

/// Back-fills a newly created reward to members that already qualify.
pub(crate) async fn handle_reward_added(
    pool: &PgPool,
    config: &dao::GuildConfigurationRow,
    reward: &dao::LevelRewardRow,
) -> Result<(), sqlx::Error> {
    let guild_id = GuildId(u64_from_db_id!(reward.guild_id));
    let affected = db::fetch_levels_between(pool, guild_id, reward.level, None).await?;
    for info in affected {
        let member_id = UserId(u64_from_db_id!(info.member_id));
        if config.stack_level_rewards {
            queue_role_add(pool, guild_id, member_id, &[role_of(reward)]).await?;
            continue;
        }
        // Non-stacked: only members whose best reward the new one became
        // are affected; they trade their previous best for it.
        let eligible = db::fetch_eligible_level_rewards(pool, guild_id, info.level).await?;
        let Some((top, lower)) = eligible.split_first() else {
            continue;
        };
        if top.id != reward.id {
            continue;
        }
        queue_role_add(pool, guild_id, member_id, &[role_of(top)]).await?;
        if let Some(previous_best) = lower.first() {
            queue_role_remove(pool, guild_id, member_id, &[role_of(previous_best)]).await?;
        }
    }
    Ok(())
}

/// Enqueues the cleanup after a reward row was deleted: every member at
/// or above its level loses the role, and in non-stacked guilds gets
/// the next best reward instead. Call this after the deletion so the
/// eligibility queries no longer see the removed reward.
pub(crate) async fn handle_reward_removed(
    pool: &PgPool,
    config: &dao::GuildConfigurationRow,
    reward: &dao::LevelRewardRow,
) -> Result<(), sqlx::Error> {
    let guild_id = GuildId(u64_from_db_id!(reward.guild_id));
    let affected = db::fetch_levels_between(pool, guild_id, reward.level, None).await?;
    for info in affected {
        let member_id = UserId(u64_from_db_id!(info.member_id));
        queue_role_remove(pool, guild_id, member_id, &[role_of(reward)]).await?;
        if !config.stack_level_rewards {
            if let Some(next_best) =
                db::fetch_eligible_level_reward(pool, guild_id, info.level).await?
            {
                queue_role_add(pool, guild_id, member_id, &[role_of(&next_best)]).await?;
            }
        }
    }
    Ok(())
}

/// Re-enqueues the rewards of a member that rejoined the guild.
pub(crate) async fn handle_member_rejoin(
    pool: &PgPool,
    guild_id: GuildId,
    member_id: UserId,
) -> Result<(), sqlx::Error> {
    let config = db::fetch_guild_configuration(pool, guild_id).await?;
    if !config.xp_system_active {
        return Ok(());
    }
    let Some(info) = db::fetch_member_level(pool, guild_id, member_id).await? else {
        return Ok(());
    };
    let rewards = db::fetch_eligible_level_rewards(pool, guild_id, info.level).await?;
    let Some((top, _)) = rewards.split_first() else {
        return Ok(());
    };
    if config.stack_level_rewards {
        queue_role_add(pool, guild_id, member_id, &reward_roles(&rewards)).await?;
    } else {
        queue_role_add(pool, guild_id, member_id, &[role_of(top)]).await?;
    }
    Ok(())
}

/// Drops the reward bound to a role that was deleted from the guild.
/// The role itself is gone, so there is nothing to revoke.
pub(crate) async fn handle_role_deleted(
    pool: &PgPool,
    guild_id: GuildId,
    role_id: RoleId,
) -> Result<(), sqlx::Error> {
    let Some(reward) = db::fetch_level_reward_by_role(pool, guild_id, role_id).await? else {
        return Ok(());
    };
    debug!("Removing {role_id} as a level reward for guild {guild_id} since the role is gone");
    db::delete_level_reward(pool, reward.id).await
}

/// Spawns the periodic task that re-asserts reward state across all
/// cached guilds. This covers rewards added while members were offline,
/// members rejoining while the bot was down, and manual role meddling;
/// re-enqueued grants are harmless because application is idempotent.
pub(crate) fn spawn_reward_sync(cache: Arc<Cache>, pool: PgPool, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            for guild_id in cache.guilds() {
                if let Err(e) = sync_guild(&cache, &pool, guild_id).await {
                    error!("Failed to sync level rewards for guild {guild_id}: {e}");
                }
            }
        }
    });
}

async fn sync_guild(cache: &Cache, pool: &PgPool, guild_id: GuildId) -> Result<(), sqlx::Error> {
    let rewards = db::fetch_all_guild_level_rewards(pool, guild_id).await?;
    if rewards.is_empty() {
        return Ok(());
    }
    let Some(guild_roles) = cache.guild_roles(guild_id) else {
        return Ok(());
    };

    // Prune rewards whose role no longer exists.
    let mut live = Vec::with_capacity(rewards.len());
    for reward in rewards {
        if guild_roles.contains_key(&role_of(&reward)) {
            live.push(reward);
        } else {
            debug!(
                "Removing {} as a level reward for guild {guild_id} since the role is gone",
                reward.role_id
            );
            db::delete_level_reward(pool, reward.id).await?;
        }
    }

    let config = db::fetch_guild_configuration(pool, guild_id).await?;
    if !config.xp_system_active || live.is_empty() {
        return Ok(());
    }

    for info in db::fetch_guild_level_infos(pool, guild_id).await? {
        let member_id = UserId(u64_from_db_id!(info.member_id));
        let Some(top) = eligible_reward(&live, info.level) else {
            continue;
        };
        if config.stack_level_rewards {
            let roles: Vec<RoleId> = eligible_rewards(&live, info.level)
                .into_iter()
                .map(role_of)
                .collect();
            queue_role_add(pool, guild_id, member_id, &roles).await?;
        } else {
            queue_role_add(pool, guild_id, member_id, &[role_of(top)]).await?;
            let lower: Vec<RoleId> = eligible_rewards(&live, info.level)
                .into_iter()
                .skip(1)
                .map(role_of)
                .collect();
            queue_role_remove(pool, guild_id, member_id, &lower).await?;
        }
    }
    Ok(())
}

fn role_of(reward: &dao::LevelRewardRow) -> RoleId {
    RoleId(u64_from_db_id!(reward.role_id))
}

fn reward_roles(rewards: &[dao::LevelRewardRow]) -> Vec<RoleId> {
    rewards.iter().map(role_of).collect()
}

#[cfg(test)]
mod tests {
    use super::{eligible_reward, eligible_rewards};
    use crate::db::dao::LevelRewardRow;

    fn reward(id: i64, level: i64) -> LevelRewardRow {
        LevelRewardRow {
            id,
            guild_id: 1,
            level,
            role_id: 1000 + id,
        }
    }

    // Rewards at levels {5, 10, 20}, sorted the way the db returns them.
    fn sample() -> Vec<LevelRewardRow> {
        vec![reward(3, 20), reward(2, 10), reward(1, 5)]
    }

    #[test]
    fn below_the_lowest_reward_nothing_is_eligible() {
        assert_eq!(eligible_reward(&sample(), 3), None);
        assert!(eligible_rewards(&sample(), 3).is_empty());
    }

    #[test]
    fn between_rewards_the_highest_passed_one_wins() {
        let rewards = sample();
        assert_eq!(eligible_reward(&rewards, 7).map(|r| r.level), Some(5));
    }

    #[test]
    fn exactly_at_a_reward_level_it_is_eligible() {
        let rewards = sample();
        assert_eq!(eligible_reward(&rewards, 20).map(|r| r.level), Some(20));
        let all = eligible_rewards(&rewards, 20);
        assert_eq!(
            all.iter().map(|r| r.level).collect::<Vec<_>>(),
            vec![20, 10, 5]
        );
    }

    #[test]
    fn duplicate_levels_resolve_to_the_oldest_row() {
        // The db orders by level desc, id asc; the first match wins.
        let rewards = vec![reward(4, 10), reward(9, 10), reward(1, 5)];
        assert_eq!(eligible_reward(&rewards, 12).map(|r| r.id), Some(4));
    }
}

use serenity::model::prelude::{GuildId, RoleId, UserId};
use sqlx::PgPool;

use crate::role_queue::{RoleAction, RoleQueueState};
use crate::util::macros::i64_from_id;

pub(crate) mod dao;

const MEMBER_LEVEL_COLUMNS: &str =
    "guild_id, member_id, total_xp, current_xp, xp_to_next_level, level, progress_character";

const LEVEL_REWARD_COLUMNS: &str = "id, guild_id, level, role_id";

const GUILD_CONFIGURATION_COLUMNS: &str = "xp_system_active, xp_per_message_min, \
    xp_per_message_max, xp_multiplier, xp_exempt_roles, xp_exempt_channels, stack_level_rewards";

/* Guild configuration */

/// Returns the leveling configuration of the guild, creating the row
/// with its schema defaults if the guild has never been seen before.
pub(crate) async fn fetch_guild_configuration(
    pool: &PgPool,
    guild_id: GuildId,
) -> Result<dao::GuildConfigurationRow, sqlx::Error> {
    sqlx::query_as::<_, dao::GuildConfigurationRow>(const_str::concat!(
        "INSERT INTO guild_configurations (guild_id) \
        VALUES ($1) \
        ON CONFLICT (guild_id) \
        DO UPDATE SET guild_id = EXCLUDED.guild_id \
        RETURNING ",
        GUILD_CONFIGURATION_COLUMNS,
    ))
    .bind(i64_from_id!(guild_id))
    .fetch_one(pool)
    .await
}

pub(crate) async fn update_xp_system_active(
    pool: &PgPool,
    guild_id: GuildId,
    active: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE guild_configurations \
        SET xp_system_active = $2 \
        WHERE guild_id = $1",
    )
    .bind(i64_from_id!(guild_id))
    .bind(active)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn update_stack_level_rewards(
    pool: &PgPool,
    guild_id: GuildId,
    stacked: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE guild_configurations \
        SET stack_level_rewards = $2 \
        WHERE guild_id = $1",
    )
    .bind(i64_from_id!(guild_id))
    .bind(stacked)
    .execute(pool)
    .await?;
    Ok(())
}

/* Member levels */

pub(crate) async fn fetch_member_level(
    pool: &PgPool,
    guild_id: GuildId,
    member_id: UserId,
) -> Result<Option<dao::MemberLevelRow>, sqlx::Error> {
    sqlx::query_as::<_, dao::MemberLevelRow>(const_str::concat!(
        "SELECT ",
        MEMBER_LEVEL_COLUMNS,
        " FROM user_levels WHERE guild_id = $1 AND member_id = $2",
    ))
    .bind(i64_from_id!(guild_id))
    .bind(i64_from_id!(member_id))
    .fetch_optional(pool)
    .await
}

/// Creates an empty member level row with the schema defaults. A
/// concurrent creation of the same row is absorbed by `DO NOTHING`;
/// returns whether this call created the row.
pub(crate) async fn insert_member_level(
    pool: &PgPool,
    guild_id: GuildId,
    member_id: UserId,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO user_levels (guild_id, member_id) \
        VALUES ($1, $2) \
        ON CONFLICT (guild_id, member_id) DO NOTHING",
    )
    .bind(i64_from_id!(guild_id))
    .bind(i64_from_id!(member_id))
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Writes back the result of one award. The progression columns are
/// last-writer-wins; only the `total_xp` increment is server-side.
pub(crate) async fn apply_xp_award(
    pool: &PgPool,
    guild_id: GuildId,
    member_id: UserId,
    current_xp: i64,
    xp_to_next_level: i64,
    level: i64,
    amount: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE user_levels \
        SET current_xp = $3, xp_to_next_level = $4, level = $5, total_xp = total_xp + $6 \
        WHERE guild_id = $1 AND member_id = $2",
    )
    .bind(i64_from_id!(guild_id))
    .bind(i64_from_id!(member_id))
    .bind(current_xp)
    .bind(xp_to_next_level)
    .bind(level)
    .bind(amount)
    .execute(pool)
    .await?;
    Ok(())
}

/// Returns one member's level row together with their rank by
/// `total_xp` within the guild.
pub(crate) async fn fetch_ranked_member_level(
    pool: &PgPool,
    guild_id: GuildId,
    member_id: UserId,
) -> Result<Option<dao::RankedMemberLevelRow>, sqlx::Error> {
    sqlx::query_as::<_, dao::RankedMemberLevelRow>(const_str::concat!(
        "SELECT ",
        MEMBER_LEVEL_COLUMNS,
        ", rank FROM (\
            SELECT *, RANK() OVER (ORDER BY total_xp DESC) AS rank \
            FROM user_levels WHERE guild_id = $1\
        ) AS ranked WHERE member_id = $2",
    ))
    .bind(i64_from_id!(guild_id))
    .bind(i64_from_id!(member_id))
    .fetch_optional(pool)
    .await
}

/// Returns a page of the guild leaderboard, ranked by `total_xp`
/// descending.
pub(crate) async fn fetch_guild_level_rankings(
    pool: &PgPool,
    guild_id: GuildId,
    offset: i64,
    limit: i64,
) -> Result<Vec<dao::RankedMemberLevelRow>, sqlx::Error> {
    sqlx::query_as::<_, dao::RankedMemberLevelRow>(const_str::concat!(
        "SELECT ",
        MEMBER_LEVEL_COLUMNS,
        ", RANK() OVER (ORDER BY total_xp DESC) AS rank \
        FROM user_levels WHERE guild_id = $1 \
        ORDER BY total_xp DESC LIMIT $2 OFFSET $3",
    ))
    .bind(i64_from_id!(guild_id))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Returns the bare level rows of every member of the guild.
pub(crate) async fn fetch_guild_level_infos(
    pool: &PgPool,
    guild_id: GuildId,
) -> Result<Vec<dao::MemberLevelRow>, sqlx::Error> {
    sqlx::query_as::<_, dao::MemberLevelRow>(const_str::concat!(
        "SELECT ",
        MEMBER_LEVEL_COLUMNS,
        " FROM user_levels WHERE guild_id = $1",
    ))
    .bind(i64_from_id!(guild_id))
    .fetch_all(pool)
    .await
}

/// Returns the level rows with `min_level <= level < max_level`, the
/// upper bound being optional.
pub(crate) async fn fetch_levels_between(
    pool: &PgPool,
    guild_id: GuildId,
    min_level: i64,
    max_level: Option<i64>,
) -> Result<Vec<dao::MemberLevelRow>, sqlx::Error> {
    match max_level {
        Some(max_level) => {
            sqlx::query_as::<_, dao::MemberLevelRow>(const_str::concat!(
                "SELECT ",
                MEMBER_LEVEL_COLUMNS,
                " FROM user_levels WHERE guild_id = $1 AND level >= $2 AND level < $3",
            ))
            .bind(i64_from_id!(guild_id))
            .bind(min_level)
            .bind(max_level)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, dao::MemberLevelRow>(const_str::concat!(
                "SELECT ",
                MEMBER_LEVEL_COLUMNS,
                " FROM user_levels WHERE guild_id = $1 AND level >= $2",
            ))
            .bind(i64_from_id!(guild_id))
            .bind(min_level)
            .fetch_all(pool)
            .await
        }
    }
}

pub(crate) async fn update_progress_character(
    pool: &PgPool,
    guild_id: GuildId,
    member_id: UserId,
    character: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE user_levels \
        SET progress_character = $3 \
        WHERE guild_id = $1 AND member_id = $2",
    )
    .bind(i64_from_id!(guild_id))
    .bind(i64_from_id!(member_id))
    .bind(character)
    .execute(pool)
    .await?;
    Ok(())
}

/* Level rewards */

pub(crate) async fn insert_level_reward(
    pool: &PgPool,
    guild_id: GuildId,
    role_id: RoleId,
    level: i64,
) -> Result<dao::LevelRewardRow, sqlx::Error> {
    sqlx::query_as::<_, dao::LevelRewardRow>(
        "INSERT INTO level_rewards (guild_id, role_id, level) \
        VALUES ($1, $2, $3) \
        RETURNING id, guild_id, level, role_id",
    )
    .bind(i64_from_id!(guild_id))
    .bind(i64_from_id!(role_id))
    .bind(level)
    .fetch_one(pool)
    .await
}

pub(crate) async fn update_level_reward(
    pool: &PgPool,
    id: i64,
    role_id: RoleId,
    level: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE level_rewards \
        SET role_id = $2, level = $3 \
        WHERE id = $1",
    )
    .bind(id)
    .bind(i64_from_id!(role_id))
    .bind(level)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn delete_level_reward(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM level_rewards WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// All rewards of the guild, highest required level first. Ties on the
/// level resolve to the oldest row.
pub(crate) async fn fetch_all_guild_level_rewards(
    pool: &PgPool,
    guild_id: GuildId,
) -> Result<Vec<dao::LevelRewardRow>, sqlx::Error> {
    sqlx::query_as::<_, dao::LevelRewardRow>(const_str::concat!(
        "SELECT ",
        LEVEL_REWARD_COLUMNS,
        " FROM level_rewards WHERE guild_id = $1 \
        ORDER BY level DESC, id ASC",
    ))
    .bind(i64_from_id!(guild_id))
    .fetch_all(pool)
    .await
}

pub(crate) async fn fetch_level_reward_by_role(
    pool: &PgPool,
    guild_id: GuildId,
    role_id: RoleId,
) -> Result<Option<dao::LevelRewardRow>, sqlx::Error> {
    sqlx::query_as::<_, dao::LevelRewardRow>(const_str::concat!(
        "SELECT ",
        LEVEL_REWARD_COLUMNS,
        " FROM level_rewards WHERE guild_id = $1 AND role_id = $2",
    ))
    .bind(i64_from_id!(guild_id))
    .bind(i64_from_id!(role_id))
    .fetch_optional(pool)
    .await
}

pub(crate) async fn fetch_level_reward_by_level(
    pool: &PgPool,
    guild_id: GuildId,
    level: i64,
) -> Result<Option<dao::LevelRewardRow>, sqlx::Error> {
    sqlx::query_as::<_, dao::LevelRewardRow>(const_str::concat!(
        "SELECT ",
        LEVEL_REWARD_COLUMNS,
        " FROM level_rewards WHERE guild_id = $1 AND level = $2 \
        ORDER BY id ASC LIMIT 1",
    ))
    .bind(i64_from_id!(guild_id))
    .bind(level)
    .fetch_optional(pool)
    .await
}

/// Every reward a member of the given level qualifies for, highest
/// required level first.
pub(crate) async fn fetch_eligible_level_rewards(
    pool: &PgPool,
    guild_id: GuildId,
    level: i64,
) -> Result<Vec<dao::LevelRewardRow>, sqlx::Error> {
    sqlx::query_as::<_, dao::LevelRewardRow>(const_str::concat!(
        "SELECT ",
        LEVEL_REWARD_COLUMNS,
        " FROM level_rewards WHERE guild_id = $1 AND level <= $2 \
        ORDER BY level DESC, id ASC",
    ))
    .bind(i64_from_id!(guild_id))
    .bind(level)
    .fetch_all(pool)
    .await
}

/// The single best reward a member of the given level qualifies for.
pub(crate) async fn fetch_eligible_level_reward(
    pool: &PgPool,
    guild_id: GuildId,
    level: i64,
) -> Result<Option<dao::LevelRewardRow>, sqlx::Error> {
    sqlx::query_as::<_, dao::LevelRewardRow>(const_str::concat!(
        "SELECT ",
        LEVEL_REWARD_COLUMNS,
        " FROM level_rewards WHERE guild_id = $1 AND level <= $2 \
        ORDER BY level DESC, id ASC LIMIT 1",
    ))
    .bind(i64_from_id!(guild_id))
    .bind(level)
    .fetch_optional(pool)
    .await
}

/// The nearest reward strictly below the given level.
pub(crate) async fn fetch_previous_level_reward(
    pool: &PgPool,
    guild_id: GuildId,
    level: i64,
) -> Result<Option<dao::LevelRewardRow>, sqlx::Error> {
    sqlx::query_as::<_, dao::LevelRewardRow>(const_str::concat!(
        "SELECT ",
        LEVEL_REWARD_COLUMNS,
        " FROM level_rewards WHERE guild_id = $1 AND level < $2 \
        ORDER BY level DESC, id ASC LIMIT 1",
    ))
    .bind(i64_from_id!(guild_id))
    .bind(level)
    .fetch_optional(pool)
    .await
}

/// The nearest reward strictly above the given level.
pub(crate) async fn fetch_next_level_reward(
    pool: &PgPool,
    guild_id: GuildId,
    level: i64,
) -> Result<Option<dao::LevelRewardRow>, sqlx::Error> {
    sqlx::query_as::<_, dao::LevelRewardRow>(const_str::concat!(
        "SELECT ",
        LEVEL_REWARD_COLUMNS,
        " FROM level_rewards WHERE guild_id = $1 AND level > $2 \
        ORDER BY level ASC, id ASC LIMIT 1",
    ))
    .bind(i64_from_id!(guild_id))
    .bind(level)
    .fetch_optional(pool)
    .await
}

/* Role-change queue */

/// Appends one immutable entry to the role-change queue. No
/// deduplication happens here; the drainer collapses duplicates when it
/// groups entries per member.
pub(crate) async fn insert_role_change(
    pool: &PgPool,
    action: RoleAction,
    guild_id: GuildId,
    member_id: UserId,
    role_id: RoleId,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO role_change_queue (action, status, guild_id, member_id, role_id) \
        VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(action.to_i32())
    .bind(RoleQueueState::Enqueued.to_i32())
    .bind(i64_from_id!(guild_id))
    .bind(i64_from_id!(member_id))
    .bind(i64_from_id!(role_id))
    .execute(pool)
    .await?;
    Ok(())
}

/// All pending queue entries of the guild, sorted so that entries of
/// the same member are adjacent for grouping.
pub(crate) async fn fetch_pending_role_changes(
    pool: &PgPool,
    guild_id: GuildId,
) -> Result<Vec<dao::RoleChangeRow>, sqlx::Error> {
    sqlx::query_as::<_, dao::RoleChangeRow>(
        "SELECT id, action, member_id, role_id \
        FROM role_change_queue \
        WHERE guild_id = $1 AND status = $2 \
        ORDER BY member_id ASC, id ASC",
    )
    .bind(i64_from_id!(guild_id))
    .bind(RoleQueueState::Enqueued.to_i32())
    .fetch_all(pool)
    .await
}

/// Removes processed queue entries. Idempotent: ids that are already
/// gone are skipped without an error.
pub(crate) async fn delete_role_changes(pool: &PgPool, ids: &[i64]) -> Result<(), sqlx::Error> {
    if ids.is_empty() {
        return Ok(());
    };
    sqlx::query("DELETE FROM role_change_queue WHERE id = ANY($1)")
        .bind(ids)
        .execute(pool)
        .await?;
    Ok(())
}

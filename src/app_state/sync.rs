//! The XP award engine: turns a message into an XP delta and applies
//! the level-up curve against the database.

use rand::Rng;
use serenity::model::prelude::{GuildId, UserId};
use sqlx::PgPool;
use tracing::debug;

use crate::db::{self, dao};

use super::exp::Exp;
use super::{LevelUpEvent, LevelUpSender, MemberLevelInfo};

/// Rolls the XP amount for one message from the guild's configured
/// range, scaled by the guild multiplier.
pub(crate) fn random_xp_amount(config: &dao::GuildConfigurationRow) -> Exp {
    let amount = rand::thread_rng().gen_range(config.xp_per_message_min..=config.xp_per_message_max);
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let scaled = (amount as f64 * config.xp_multiplier).floor() as i64;
    Exp::from_i64(scaled.max(0))
}

/// Awards `amount` XP to a member and persists the result, creating the
/// level row on first award.
///
/// The read-compute-write cycle is not atomic across concurrent
/// messages from the same member: two near-simultaneous awards can read
/// the same state and the later write wins. Only the `total_xp`
/// increment happens server-side. The per-member cooldown keeps such
/// overlap out of normal operation, so the race is accepted rather than
/// locked around.
///
/// When the member's level changed, a [`LevelUpEvent`] carrying the pre-
/// and post-states is sent on `level_ups`; the send is fire-and-forget.
pub(crate) async fn award_xp(
    pool: &PgPool,
    level_ups: &LevelUpSender,
    guild_id: GuildId,
    member_id: UserId,
    amount: Exp,
) -> Result<(MemberLevelInfo, MemberLevelInfo), sqlx::Error> {
    debug_assert!(amount > Exp(0));

    let old: MemberLevelInfo = match db::fetch_member_level(pool, guild_id, member_id).await? {
        Some(row) => row.into(),
        None => {
            if db::insert_member_level(pool, guild_id, member_id).await? {
                MemberLevelInfo::new_member(guild_id, member_id)
            } else {
                // A concurrent award created the row first; read its state.
                db::fetch_member_level(pool, guild_id, member_id)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?
                    .into()
            }
        }
    };

    let progression = old.progression().award(amount);
    db::apply_xp_award(
        pool,
        guild_id,
        member_id,
        progression.current_xp.to_i64(),
        progression.xp_to_next_level.to_i64(),
        progression.level,
        amount.to_i64(),
    )
    .await?;

    let new = old.clone().with_progression(progression);

    if new.level != old.level {
        debug!(
            "Member {member_id} reached level {} in guild {guild_id}",
            new.level
        );
        let event = LevelUpEvent {
            guild_id: new.guild_id,
            member_id: new.member_id,
            old: old.clone(),
            new: new.clone(),
        };
        // The receiver lives in the reward issuer task; it is only gone
        // during shutdown, when losing the event is fine.
        let _ = level_ups.send(event);
    }

    Ok((old, new))
}

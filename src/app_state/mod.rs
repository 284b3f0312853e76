use serenity::model::prelude::{GuildId, UserId};
use tokio::sync::mpsc::UnboundedSender;

use crate::db::dao;
use crate::util::macros::u64_from_db_id;

use self::cooldown::CooldownStorage;
use self::exp::Exp;
use self::progression::Progression;

pub(crate) mod cooldown;
pub(crate) mod exp;
pub(crate) mod progression;
pub(crate) mod sync;
pub(crate) mod type_map_keys;

/// Mutable runtime state shared with commands through the serenity
/// [`TypeMap`](serenity::prelude::TypeMap).
pub(crate) struct AppState {
    pub(crate) cooldowns: CooldownStorage,
}

impl AppState {
    pub(crate) fn new() -> Self {
        AppState {
            cooldowns: CooldownStorage::default(),
        }
    }
}

/// Level state of one member as the rest of the bot sees it.
///
/// For database operations, [`MemberLevelInfo`] is converted from
/// [`crate::db::dao::MemberLevelRow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MemberLevelInfo {
    pub(crate) guild_id: GuildId,
    pub(crate) member_id: UserId,
    pub(crate) total_xp: Exp,
    pub(crate) current_xp: Exp,
    pub(crate) xp_to_next_level: Exp,
    pub(crate) level: i64,
    pub(crate) progress_character: Option<String>,
    /// Position by `total_xp` within the guild; only present when the
    /// row came from a ranked query.
    pub(crate) rank: Option<i64>,
}

impl MemberLevelInfo {
    /// State of a member whose level row was just created.
    pub(crate) fn new_member(guild_id: GuildId, member_id: UserId) -> Self {
        let fresh = Progression::initial();
        MemberLevelInfo {
            guild_id,
            member_id,
            total_xp: fresh.total_xp,
            current_xp: fresh.current_xp,
            xp_to_next_level: fresh.xp_to_next_level,
            level: fresh.level,
            progress_character: None,
            rank: None,
        }
    }

    pub(crate) fn progression(&self) -> Progression {
        Progression {
            level: self.level,
            current_xp: self.current_xp,
            xp_to_next_level: self.xp_to_next_level,
            total_xp: self.total_xp,
        }
    }

    pub(crate) fn with_progression(self, progression: Progression) -> Self {
        MemberLevelInfo {
            total_xp: progression.total_xp,
            current_xp: progression.current_xp,
            xp_to_next_level: progression.xp_to_next_level,
            level: progression.level,
            ..self
        }
    }
}

impl From<dao::MemberLevelRow> for MemberLevelInfo {
    fn from(row: dao::MemberLevelRow) -> Self {
        MemberLevelInfo {
            guild_id: GuildId(u64_from_db_id!(row.guild_id)),
            member_id: UserId(u64_from_db_id!(row.member_id)),
            total_xp: Exp::from_i64(row.total_xp),
            current_xp: Exp::from_i64(row.current_xp),
            xp_to_next_level: Exp::from_i64(row.xp_to_next_level),
            level: row.level,
            progress_character: row.progress_character,
            rank: None,
        }
    }
}

impl From<dao::RankedMemberLevelRow> for MemberLevelInfo {
    fn from(row: dao::RankedMemberLevelRow) -> Self {
        MemberLevelInfo {
            guild_id: GuildId(u64_from_db_id!(row.guild_id)),
            member_id: UserId(u64_from_db_id!(row.member_id)),
            total_xp: Exp::from_i64(row.total_xp),
            current_xp: Exp::from_i64(row.current_xp),
            xp_to_next_level: Exp::from_i64(row.xp_to_next_level),
            level: row.level,
            progress_character: row.progress_character,
            rank: Some(row.rank),
        }
    }
}

/// Raised by the XP engine whenever a member's level changes.
#[derive(Debug, Clone)]
pub(crate) struct LevelUpEvent {
    pub(crate) guild_id: GuildId,
    pub(crate) member_id: UserId,
    pub(crate) old: MemberLevelInfo,
    pub(crate) new: MemberLevelInfo,
}

pub(crate) type LevelUpSender = UnboundedSender<LevelUpEvent>;

//! Module for Data Access Objects

use sqlx::FromRow;

/// Data Access Object for [`crate::app_state::MemberLevelInfo`].
#[derive(FromRow, Debug)]
pub(crate) struct MemberLevelRow {
    pub(crate) guild_id: i64,
    pub(crate) member_id: i64,
    pub(crate) total_xp: i64,
    pub(crate) current_xp: i64,
    pub(crate) xp_to_next_level: i64,
    pub(crate) level: i64,
    pub(crate) progress_character: Option<String>,
}

/// [`MemberLevelRow`] with the rank window column attached.
#[derive(FromRow, Debug)]
pub(crate) struct RankedMemberLevelRow {
    pub(crate) guild_id: i64,
    pub(crate) member_id: i64,
    pub(crate) total_xp: i64,
    pub(crate) current_xp: i64,
    pub(crate) xp_to_next_level: i64,
    pub(crate) level: i64,
    pub(crate) progress_character: Option<String>,
    pub(crate) rank: i64,
}

/// A role granted for reaching `level` in `guild_id`.
#[derive(FromRow, Debug, Clone, PartialEq, Eq)]
pub(crate) struct LevelRewardRow {
    pub(crate) id: i64,
    pub(crate) guild_id: i64,
    pub(crate) level: i64,
    pub(crate) role_id: i64,
}

/// One pending entry of the role-change queue.
#[derive(FromRow, Debug)]
pub(crate) struct RoleChangeRow {
    pub(crate) id: i64,
    pub(crate) action: i32,
    pub(crate) member_id: i64,
    pub(crate) role_id: i64,
}

/// Leveling knobs of one guild. The row is created lazily with the
/// schema defaults on first access.
#[derive(FromRow, Debug, Clone)]
pub(crate) struct GuildConfigurationRow {
    pub(crate) xp_system_active: bool,
    pub(crate) xp_per_message_min: i64,
    pub(crate) xp_per_message_max: i64,
    pub(crate) xp_multiplier: f64,
    pub(crate) xp_exempt_roles: Vec<i64>,
    pub(crate) xp_exempt_channels: Vec<i64>,
    pub(crate) stack_level_rewards: bool,
}

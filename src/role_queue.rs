//! Durable queue of pending role grants and revocations.
//!
//! Features that want a role changed append entries; a background
//! drainer applies them as one role-set diff per member, so a burst of
//! level-ups costs a handful of REST calls instead of one per entry.
//! Delivery is at-least-once: entries are deleted only after a member's
//! diff was applied, and Discord role mutation is idempotent.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use itertools::Itertools;
use serenity::cache::Cache;
use serenity::http::Http;
use serenity::model::prelude::{GuildId, RoleId, UserId};
use sqlx::PgPool;
use tracing::{error, warn};

use crate::db::{self, dao};
use crate::util::macros::u64_from_db_id;

/// Direction of a queued role mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RoleAction {
    Remove = 0,
    Add = 1,
}

impl RoleAction {
    pub(crate) fn to_i32(self) -> i32 {
        self as i32
    }
}

/// Lifecycle of a queue entry. Only [`Self::Enqueued`] rows are ever
/// consumed; the other states exist for manual inspection of a stuck
/// queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub(crate) enum RoleQueueState {
    Enqueued = 0,
    Processing = 1,
    Finished = 2,
}

impl RoleQueueState {
    pub(crate) fn to_i32(self) -> i32 {
        self as i32
    }
}

/// All pending role changes of one member, collapsed to a single diff.
///
/// A role that was enqueued for both a grant and a revoke shows up in
/// both sets; the grouping step never merges the conflict away, the
/// drainer resolves it (grant wins).
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct MemberRoleChanges {
    pub(crate) member_id: UserId,
    /// Queue row ids backing this diff, for deletion after application.
    pub(crate) row_ids: Vec<i64>,
    pub(crate) roles_added: HashSet<RoleId>,
    pub(crate) roles_removed: HashSet<RoleId>,
}

/// Groups raw queue rows into one diff per member. The rows must be
/// sorted by member id, which the fetch query guarantees.
pub(crate) fn group_by_member(rows: Vec<dao::RoleChangeRow>) -> Vec<MemberRoleChanges> {
    let mut changes = Vec::new();
    for (member_id, group) in &rows.into_iter().group_by(|row| row.member_id) {
        let mut row_ids = Vec::new();
        let mut roles_added = HashSet::new();
        let mut roles_removed = HashSet::new();
        for row in group {
            row_ids.push(row.id);
            let role_id = RoleId(u64_from_db_id!(row.role_id));
            match row.action {
                a if a == RoleAction::Add.to_i32() => {
                    roles_added.insert(role_id);
                }
                a if a == RoleAction::Remove.to_i32() => {
                    roles_removed.insert(role_id);
                }
                other => unreachable!("Unknown role action stored in the queue: {other}"),
            }
        }
        changes.push(MemberRoleChanges {
            member_id: UserId(u64_from_db_id!(member_id)),
            row_ids,
            roles_added,
            roles_removed,
        });
    }
    changes
}

pub(crate) async fn queue_role_add(
    pool: &PgPool,
    guild_id: GuildId,
    member_id: UserId,
    roles: &[RoleId],
) -> Result<(), sqlx::Error> {
    for role_id in roles {
        db::insert_role_change(pool, RoleAction::Add, guild_id, member_id, *role_id).await?;
    }
    Ok(())
}

pub(crate) async fn queue_role_remove(
    pool: &PgPool,
    guild_id: GuildId,
    member_id: UserId,
    roles: &[RoleId],
) -> Result<(), sqlx::Error> {
    for role_id in roles {
        db::insert_role_change(pool, RoleAction::Remove, guild_id, member_id, *role_id).await?;
    }
    Ok(())
}

/// Spawns the task that periodically applies and clears pending role
/// changes for every cached guild.
pub(crate) fn spawn_drainer(http: Arc<Http>, cache: Arc<Cache>, pool: PgPool, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            for guild_id in cache.guilds() {
                if let Err(e) = drain_guild(&http, &pool, guild_id).await {
                    error!("Failed to drain the role-change queue for guild {guild_id}: {e}");
                }
            }
        }
    });
}

/// Applies the pending diffs of one guild. A member whose diff fails to
/// apply keeps their entries queued for the next pass; entries are
/// deleted only after successful application (at-least-once delivery).
async fn drain_guild(http: &Http, pool: &PgPool, guild_id: GuildId) -> crate::error::Result<()> {
    let rows = db::fetch_pending_role_changes(pool, guild_id).await?;
    if rows.is_empty() {
        return Ok(());
    }
    for member_changes in group_by_member(rows) {
        if let Err(e) = apply_member_changes(http, guild_id, &member_changes).await {
            warn!(
                "Leaving the role changes of member {} queued after a failed application: {e}",
                member_changes.member_id
            );
            continue;
        }
        db::delete_role_changes(pool, &member_changes.row_ids).await?;
    }
    Ok(())
}

async fn apply_member_changes(
    http: &Http,
    guild_id: GuildId,
    changes: &MemberRoleChanges,
) -> serenity::Result<()> {
    // Removals first, and a role queued for both grant and revoke is
    // never removed: the grant wins.
    for role_id in changes.roles_removed.difference(&changes.roles_added) {
        http.remove_member_role(
            guild_id.0,
            changes.member_id.0,
            role_id.0,
            Some("Queued level reward revocation"),
        )
        .await?;
    }
    for role_id in &changes.roles_added {
        http.add_member_role(
            guild_id.0,
            changes.member_id.0,
            role_id.0,
            Some("Queued level reward grant"),
        )
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{group_by_member, RoleAction};
    use crate::db::dao::RoleChangeRow;
    use serenity::model::prelude::{RoleId, UserId};

    fn row(id: i64, action: RoleAction, member_id: i64, role_id: i64) -> RoleChangeRow {
        RoleChangeRow {
            id,
            action: action.to_i32(),
            member_id,
            role_id,
        }
    }

    #[test]
    fn empty_queue_groups_to_nothing() {
        assert!(group_by_member(Vec::new()).is_empty());
    }

    #[test]
    fn entries_group_per_member() {
        let rows = vec![
            row(1, RoleAction::Add, 10, 100),
            row(2, RoleAction::Add, 10, 101),
            row(3, RoleAction::Remove, 11, 100),
        ];
        let changes = group_by_member(rows);
        assert_eq!(changes.len(), 2);

        let first = &changes[0];
        assert_eq!(first.member_id, UserId(10));
        assert_eq!(first.row_ids, vec![1, 2]);
        assert_eq!(
            first.roles_added,
            [RoleId(100), RoleId(101)].into_iter().collect()
        );
        assert!(first.roles_removed.is_empty());

        let second = &changes[1];
        assert_eq!(second.member_id, UserId(11));
        assert_eq!(second.roles_removed, [RoleId(100)].into_iter().collect());
    }

    #[test]
    fn duplicate_entries_collapse_into_the_set() {
        let rows = vec![
            row(1, RoleAction::Add, 10, 100),
            row(2, RoleAction::Add, 10, 100),
        ];
        let changes = group_by_member(rows);
        assert_eq!(changes[0].row_ids, vec![1, 2]);
        assert_eq!(changes[0].roles_added.len(), 1);
    }

    #[test]
    fn grant_and_revoke_of_the_same_role_survive_grouping() {
        let rows = vec![
            row(1, RoleAction::Add, 10, 7),
            row(2, RoleAction::Remove, 10, 7),
        ];
        let changes = group_by_member(rows);
        assert_eq!(changes.len(), 1);
        assert!(changes[0].roles_added.contains(&RoleId(7)));
        assert!(changes[0].roles_removed.contains(&RoleId(7)));
    }
}

use std::collections::HashSet;

use serenity::{
    async_trait,
    model::gateway::Activity,
    model::prelude::{GuildId, Member, Message, Ready, Role, RoleId},
    prelude::{Context, EventHandler, TypeMap},
};
use shuttle_secrets::SecretStore;
use sqlx::{Executor, PgPool};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::{Mutex, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

use crate::{
    app_state::{
        exp::Exp,
        sync::{award_xp, random_xp_amount},
        type_map_keys::{AppStateKey, BotCfgKey, PgPoolKey},
        AppState, LevelUpEvent, LevelUpSender,
    },
    db,
    immut_data::{
        consts::{BOT_VERSION, QUEUE_DRAIN_PERIOD, REWARD_SYNC_PERIOD},
        dynamic::BotCfg,
    },
    rewards, role_queue,
    util::macros::i64_from_id,
};

use super::cfg_ext::impl_cfg_ext;
use super::CfgExt;

/// The bot structure that is used to
///
/// * populate the [`Context::data`] with run-time data during
///   [`EventHandler::ready`],
/// * spawn the background tasks (reward issuer, reward sync, queue
///   drainer),
/// * handle [`EventHandler`] events.
///
/// Note that commands do not have direct access to the [`MainBot`]
/// struct and use [`Context::data`] instead.
pub(crate) struct MainBot {
    /// Database connection pool for the PostgreSQL database.
    /// It is used to persist data between restarts.
    pub(crate) pool: PgPool,
    /// The configuration of the bot.
    pub(crate) cfg: BotCfg,
    /// Producer half of the level-up channel the XP engine writes to.
    level_ups: LevelUpSender,
    /// Consumer half, taken exactly once when the gateway is ready;
    /// this also guards the background tasks against re-spawning on
    /// reconnect.
    level_up_rx: Mutex<Option<UnboundedReceiver<LevelUpEvent>>>,
}

impl MainBot {
    /// Creates a new instance of the bot.
    pub(crate) async fn new(pool: PgPool, secret_store: &SecretStore) -> Self {
        let cfg = BotCfg::new(secret_store);
        pool.execute(crate::immut_data::consts::SCHEMA)
            .await
            .expect("Failed to initialize database");
        let (level_ups, level_up_rx) = mpsc::unbounded_channel();
        Self {
            pool,
            cfg,
            level_ups,
            level_up_rx: Mutex::new(Some(level_up_rx)),
        }
    }
}

impl_cfg_ext!(MainBot);

#[async_trait]
impl EventHandler for MainBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        {
            let mut wlock: RwLockWriteGuard<TypeMap> = ctx.data.write().await;
            wlock.insert::<AppStateKey>(AppState::new());
            wlock.insert::<PgPoolKey>(self.pool.clone());
            wlock.insert::<BotCfgKey>(self.cfg.clone());
        }

        if let Some(level_up_rx) = self.level_up_rx.lock().await.take() {
            rewards::spawn_reward_issuer(self.pool.clone(), level_up_rx);
            rewards::spawn_reward_sync(ctx.cache.clone(), self.pool.clone(), REWARD_SYNC_PERIOD);
            role_queue::spawn_drainer(
                ctx.http.clone(),
                ctx.cache.clone(),
                self.pool.clone(),
                QUEUE_DRAIN_PERIOD,
            );
        }

        ctx.set_activity(Activity::playing(BOT_VERSION)).await;
        info!("{} is at your service!", ready.user.name);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };
        if msg.content.starts_with(self.discord_prefix()) {
            return;
        }

        let config = match db::fetch_guild_configuration(&self.pool, guild_id).await {
            Ok(config) => config,
            Err(e) => {
                error!("Sqlx error during fetching the guild configuration: {e}");
                return;
            }
        };
        if !config.xp_system_active {
            return;
        }
        if config
            .xp_exempt_channels
            .contains(&i64_from_id!(msg.channel_id))
        {
            return;
        }

        let author: Member = match msg.member(&ctx).await {
            Ok(member) => member,
            Err(e) => {
                warn!("Failed to get member info for the message author: {e}");
                return;
            }
        };
        let exempt_roles: HashSet<i64> = config.xp_exempt_roles.iter().copied().collect();
        if author
            .roles
            .iter()
            .any(|role_id| exempt_roles.contains(&i64_from_id!(*role_id)))
        {
            return;
        }

        {
            let mut wlock = ctx.data.write().await;
            let app_state: &mut AppState = wlock
                .get_mut::<AppStateKey>()
                .expect("Failed to get the app state from the typemap");
            let bucket = app_state.cooldowns.bucket_mut(guild_id, msg.author.id);
            if !bucket.can_earn() {
                return;
            }
            // On cooldown right away; a failed award forfeits the roll.
            bucket.touch();
        }

        let amount = random_xp_amount(&config);
        if amount == Exp(0) {
            return;
        }
        match award_xp(&self.pool, &self.level_ups, guild_id, msg.author.id, amount).await {
            Ok((_old, new)) => {
                debug!(
                    "{}'s xp: {} (level {})",
                    msg.author.name, new.current_xp, new.level
                );
            }
            Err(e) => {
                error!("Sqlx error during awarding experience: {e}");
            }
        }
    }

    /// Re-queues the earned level rewards of a rejoining member.
    async fn guild_member_addition(&self, _ctx: Context, member: Member) {
        if member.user.bot {
            return;
        }
        if let Err(e) =
            rewards::handle_member_rejoin(&self.pool, member.guild_id, member.user.id).await
        {
            error!("Failed to re-queue level rewards for a rejoining member: {e}");
        }
    }

    /// Drops the level reward bound to a deleted role.
    async fn guild_role_delete(
        &self,
        _ctx: Context,
        guild_id: GuildId,
        role_id: RoleId,
        _role: Option<Role>,
    ) {
        if let Err(e) = rewards::handle_role_deleted(&self.pool, guild_id, role_id).await {
            error!("Failed to drop the level reward of a deleted role: {e}");
        }
    }
}

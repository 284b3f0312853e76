use serenity::{
    framework::standard::{macros::command, Args, CommandResult},
    model::prelude::{Message, RoleId},
    prelude::Context,
    utils::MessageBuilder,
};
use sqlx::PgPool;

use crate::{app_state::type_map_keys::PgPoolKey, db, rewards, util::macros::u64_from_db_id};

async fn pool(ctx: &Context) -> PgPool {
    let rlock = ctx.data.read().await;
    rlock
        .get::<PgPoolKey>()
        .expect("Failed to get the database pool from the typemap")
        .clone()
}

fn parse_role_arg(args: &mut Args) -> Option<RoleId> {
    let raw = args.single::<String>().ok()?;
    serenity::utils::parse_role(&raw)
        .or_else(|| raw.parse::<u64>().ok())
        .map(RoleId)
}

#[command]
#[only_in(guilds)]
#[description = "List the level rewards of this guild."]
async fn rewards(ctx: &Context, msg: &Message) -> CommandResult {
    let guild_id = msg.guild_id.expect("The command is guild-only");
    let pool = pool(ctx).await;
    let all = db::fetch_all_guild_level_rewards(&pool, guild_id).await?;
    if all.is_empty() {
        msg.reply(ctx, "This guild has no level rewards.").await?;
        return Ok(());
    }

    let content = {
        let mut msg_builder = MessageBuilder::new();
        msg_builder.push("Level rewards:\n");
        for reward in all {
            msg_builder
                .push("Level ")
                .push(reward.level.to_string())
                .push(": <@&")
                .push(u64_from_db_id!(reward.role_id).to_string())
                .push(">\n");
        }
        msg_builder.build()
    };
    msg.channel_id
        .send_message(&ctx.http, |m| {
            m.content(content)
                .allowed_mentions(|mentions| mentions.empty_parse())
        })
        .await?;
    Ok(())
}

#[command]
#[only_in(guilds)]
#[required_permissions("MANAGE_ROLES")]
#[description = "Make a role a level reward: addreward <role> <level>."]
async fn addreward(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let guild_id = msg.guild_id.expect("The command is guild-only");
    let Some(role_id) = parse_role_arg(&mut args) else {
        msg.reply(ctx, "I don't recognize that role.").await?;
        return Ok(());
    };
    let level = match args.single::<i64>() {
        Ok(level) if level >= 1 => level,
        _ => {
            msg.reply(ctx, "The level must be a positive number.")
                .await?;
            return Ok(());
        }
    };

    let pool = pool(ctx).await;

    // At most one reward per level, enforced here rather than by the
    // schema.
    if let Some(occupied) = db::fetch_level_reward_by_level(&pool, guild_id, level).await? {
        if RoleId(u64_from_db_id!(occupied.role_id)) != role_id {
            msg.reply(
                ctx,
                format!("Level {level} already rewards a different role."),
            )
            .await?;
            return Ok(());
        }
    }

    match db::fetch_level_reward_by_role(&pool, guild_id, role_id).await? {
        Some(existing) => {
            // Moving an existing reward; the periodic sync reconciles
            // member role state.
            db::update_level_reward(&pool, existing.id, role_id, level).await?;
            msg.reply(ctx, format!("The reward now requires level {level}."))
                .await?;
        }
        None => {
            let reward = db::insert_level_reward(&pool, guild_id, role_id, level).await?;
            let config = db::fetch_guild_configuration(&pool, guild_id).await?;
            rewards::handle_reward_added(&pool, &config, &reward).await?;
            msg.reply(
                ctx,
                format!("The role is now granted for reaching level {level}."),
            )
            .await?;
        }
    }
    Ok(())
}

#[command]
#[only_in(guilds)]
#[required_permissions("MANAGE_ROLES")]
#[description = "Stop a role from being a level reward: removereward <role>."]
async fn removereward(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let guild_id = msg.guild_id.expect("The command is guild-only");
    let Some(role_id) = parse_role_arg(&mut args) else {
        msg.reply(ctx, "I don't recognize that role.").await?;
        return Ok(());
    };

    let pool = pool(ctx).await;
    let Some(reward) = db::fetch_level_reward_by_role(&pool, guild_id, role_id).await? else {
        msg.reply(ctx, "That role is not a level reward.").await?;
        return Ok(());
    };
    let config = db::fetch_guild_configuration(&pool, guild_id).await?;
    db::delete_level_reward(&pool, reward.id).await?;
    rewards::handle_reward_removed(&pool, &config, &reward).await?;
    msg.reply(ctx, "The role is no longer a level reward.")
        .await?;
    Ok(())
}

#[command]
#[only_in(guilds)]
#[required_permissions("MANAGE_GUILD")]
#[description = "Turn the XP system of this guild on or off."]
async fn togglexp(ctx: &Context, msg: &Message) -> CommandResult {
    let guild_id = msg.guild_id.expect("The command is guild-only");
    let pool = pool(ctx).await;
    let config = db::fetch_guild_configuration(&pool, guild_id).await?;
    let active = !config.xp_system_active;
    db::update_xp_system_active(&pool, guild_id, active).await?;
    let state = if active { "enabled" } else { "disabled" };
    msg.reply(ctx, format!("The XP system is now {state}."))
        .await?;
    Ok(())
}

#[command]
#[only_in(guilds)]
#[required_permissions("MANAGE_GUILD")]
#[description = "Toggle whether members keep every earned reward role or only the best one."]
async fn togglestacking(ctx: &Context, msg: &Message) -> CommandResult {
    let guild_id = msg.guild_id.expect("The command is guild-only");
    let pool = pool(ctx).await;
    let config = db::fetch_guild_configuration(&pool, guild_id).await?;
    let stacked = !config.stack_level_rewards;
    db::update_stack_level_rewards(&pool, guild_id, stacked).await?;
    let response = if stacked {
        "Members now keep every earned reward role."
    } else {
        "Members now keep only their best reward role."
    };
    msg.reply(ctx, response).await?;
    Ok(())
}

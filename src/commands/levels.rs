use serenity::{
    framework::standard::{macros::command, Args, CommandResult},
    model::prelude::{Message, UserId},
    prelude::Context,
    utils::MessageBuilder,
};
use sqlx::PgPool;

use crate::{
    app_state::{type_map_keys::PgPoolKey, MemberLevelInfo},
    db,
    immut_data::consts::LEADERBOARD_PAGE_SIZE,
};

/// Theme colours a member can pick for their progress bar.
const COLOUR_BINDINGS: &[(&str, &str)] = &[
    ("blue", ":blue_square:"),
    ("brown", ":brown_square:"),
    ("green", ":green_square:"),
    ("orange", ":orange_square:"),
    ("purple", ":purple_square:"),
    ("red", ":red_square:"),
    ("white", ":white_large_square:"),
    ("yellow", ":yellow_square:"),
];

const DEFAULT_PROGRESS_CHARACTER: &str = ":green_square:";
const EMPTY_PROGRESS_CHARACTER: &str = ":black_large_square:";
const PROGRESS_BAR_SLOTS: u64 = 10;

fn progress_bar(info: &MemberLevelInfo) -> String {
    // The award invariant keeps xp_to_next_level positive.
    let filled =
        (info.current_xp.0 * PROGRESS_BAR_SLOTS / info.xp_to_next_level.0).min(PROGRESS_BAR_SLOTS);
    let character = info
        .progress_character
        .as_deref()
        .unwrap_or(DEFAULT_PROGRESS_CHARACTER);
    let mut bar = String::new();
    for _ in 0..filled {
        bar.push_str(character);
    }
    for _ in filled..PROGRESS_BAR_SLOTS {
        bar.push_str(EMPTY_PROGRESS_CHARACTER);
    }
    bar
}

async fn pool(ctx: &Context) -> PgPool {
    let rlock = ctx.data.read().await;
    rlock
        .get::<PgPoolKey>()
        .expect("Failed to get the database pool from the typemap")
        .clone()
}

fn parse_member_arg(args: &mut Args, fallback: UserId) -> Option<UserId> {
    match args.single::<String>() {
        Ok(raw) => serenity::utils::parse_username(&raw)
            .or_else(|| raw.parse::<u64>().ok())
            .map(UserId),
        Err(_) => Some(fallback),
    }
}

#[command]
#[only_in(guilds)]
#[description = "Show the level and rank of yourself or another member."]
async fn rank(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let guild_id = msg.guild_id.expect("The command is guild-only");
    let Some(member_id) = parse_member_arg(&mut args, msg.author.id) else {
        msg.reply(ctx, "I don't recognize that member.").await?;
        return Ok(());
    };

    let pool = pool(ctx).await;
    let Some(row) = db::fetch_ranked_member_level(&pool, guild_id, member_id).await? else {
        msg.reply(ctx, "That member hasn't earned any XP yet.")
            .await?;
        return Ok(());
    };
    let info = MemberLevelInfo::from(row);

    let response = {
        let mut msg_builder = MessageBuilder::new();
        msg_builder
            .push("Rank #")
            .push(info.rank.unwrap_or(0).to_string())
            .push(" | Level ")
            .push(info.level.to_string())
            .push("\n")
            .push(progress_bar(&info))
            .push("\n")
            .push(info.current_xp.to_string())
            .push(" / ")
            .push(info.xp_to_next_level.to_string())
            .push(" XP (")
            .push(info.total_xp.to_string())
            .push(" lifetime)");
        if let Some(previous) = db::fetch_previous_level_reward(&pool, guild_id, info.level).await?
        {
            msg_builder
                .push("\nLast reward tier passed: level ")
                .push(previous.level.to_string());
        }
        if let Some(next) = db::fetch_next_level_reward(&pool, guild_id, info.level).await? {
            msg_builder
                .push("\n")
                .push((next.level - info.level).to_string())
                .push(" level(s) until the next reward.");
        }
        msg_builder.build()
    };
    msg.reply(ctx, response).await?;
    Ok(())
}

#[command]
#[only_in(guilds)]
#[description = "Show the guild leaderboard. Takes an optional page number."]
async fn leaderboard(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let guild_id = msg.guild_id.expect("The command is guild-only");
    let page = args.single::<i64>().unwrap_or(1).max(1);
    let offset = (page - 1) * LEADERBOARD_PAGE_SIZE;

    let pool = pool(ctx).await;
    let rankings =
        db::fetch_guild_level_rankings(&pool, guild_id, offset, LEADERBOARD_PAGE_SIZE).await?;
    if rankings.is_empty() {
        msg.reply(ctx, "Nobody has earned any XP yet.").await?;
        return Ok(());
    }

    let content = {
        let mut msg_builder = MessageBuilder::new();
        msg_builder.push("Leaderboard, page ").push(page.to_string()).push(":\n");
        for row in rankings {
            let info = MemberLevelInfo::from(row);
            msg_builder
                .push("#")
                .push(info.rank.unwrap_or(0).to_string())
                .push(" <@")
                .push(info.member_id.0.to_string())
                .push("> — level ")
                .push(info.level.to_string())
                .push(", ")
                .push(info.total_xp.to_string())
                .push(" XP\n");
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
#[description = "Pick a colour theme for your progress bar."]
async fn settheme(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let guild_id = msg.guild_id.expect("The command is guild-only");
    let names = || {
        COLOUR_BINDINGS
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ")
    };
    let Ok(raw) = args.single::<String>() else {
        msg.reply(ctx, format!("Pick one of: {}.", names())).await?;
        return Ok(());
    };
    let Some((_, character)) = COLOUR_BINDINGS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(&raw))
    else {
        msg.reply(
            ctx,
            format!("I don't know that colour. Pick one of: {}.", names()),
        )
        .await?;
        return Ok(());
    };

    let pool = pool(ctx).await;
    if db::fetch_member_level(&pool, guild_id, msg.author.id)
        .await?
        .is_none()
    {
        msg.reply(ctx, "Earn some XP first, then pick a theme.")
            .await?;
        return Ok(());
    }
    db::update_progress_character(&pool, guild_id, msg.author.id, character).await?;
    msg.reply(ctx, format!("Your progress bar is now {raw}."))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{progress_bar, DEFAULT_PROGRESS_CHARACTER, EMPTY_PROGRESS_CHARACTER};
    use crate::app_state::exp::Exp;
    use crate::app_state::MemberLevelInfo;
    use serenity::model::prelude::{GuildId, UserId};

    fn info(current_xp: u64, xp_to_next_level: u64, character: Option<&str>) -> MemberLevelInfo {
        MemberLevelInfo {
            guild_id: GuildId(1),
            member_id: UserId(2),
            total_xp: Exp(current_xp),
            current_xp: Exp(current_xp),
            xp_to_next_level: Exp(xp_to_next_level),
            level: 0,
            progress_character: character.map(str::to_owned),
            rank: None,
        }
    }

    #[test]
    fn empty_bar_at_zero_progress() {
        let bar = progress_bar(&info(0, 100, None));
        assert!(!bar.contains(DEFAULT_PROGRESS_CHARACTER));
        assert_eq!(bar, EMPTY_PROGRESS_CHARACTER.repeat(10));
    }

    #[test]
    fn half_bar_at_half_progress() {
        let bar = progress_bar(&info(50, 100, None));
        assert_eq!(bar.matches(DEFAULT_PROGRESS_CHARACTER).count(), 5);
        assert_eq!(bar.matches(EMPTY_PROGRESS_CHARACTER).count(), 5);
    }

    #[test]
    fn custom_character_is_used() {
        let bar = progress_bar(&info(99, 100, Some(":red_square:")));
        assert_eq!(bar.matches(":red_square:").count(), 9);
    }
}

use std::time::Duration;

use serenity::prelude::GatewayIntents;

pub(crate) const SCHEMA: &str = include_str!("../../schema.pgsql");

pub(crate) const DISCORD_INTENTS: GatewayIntents = {
    let fst = GatewayIntents::GUILDS.bits();
    let snd = GatewayIntents::GUILD_MEMBERS.bits();
    let trd = GatewayIntents::GUILD_MESSAGES.bits();
    let fth = GatewayIntents::MESSAGE_CONTENT.bits();
    match GatewayIntents::from_bits(fst | snd | trd | fth) {
        Some(intents) => intents,
        None => panic!("Invalid intents"),
    }
};

/// Shown as the bot's activity.
pub(crate) const BOT_VERSION: &str = const_str::concat!("Pidroid v", env!("CARGO_PKG_VERSION"));

/// How often the role-change queue drainer runs per guild sweep.
pub(crate) const QUEUE_DRAIN_PERIOD: Duration = Duration::from_secs(30);

/// How often reward state is re-asserted across guilds.
pub(crate) const REWARD_SYNC_PERIOD: Duration = Duration::from_secs(120);

/// Page size of the leaderboard command.
pub(crate) const LEADERBOARD_PAGE_SIZE: i64 = 10;

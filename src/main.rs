use anyhow::Context as _;
use serenity::client::Client;
use serenity::framework::StandardFramework;
use sqlx::PgPool;

use crate::app_state::type_map_keys::ShardManagerKey;
use crate::bots::{CfgExt, MainBot};
use crate::commands::{LEVELS_GROUP, MY_HELP, OWNER_GROUP, REWARDS_GROUP};
use crate::immut_data::consts::DISCORD_INTENTS;

mod app_state;
mod bots;
mod commands;
mod db;
mod error;
mod immut_data;
mod rewards;
mod role_queue;
mod util;

#[shuttle_runtime::main]
async fn serenity(
    #[shuttle_shared_db::Postgres] pool: PgPool,
    #[shuttle_secrets::Secrets] secret_store: shuttle_secrets::SecretStore,
) -> shuttle_serenity::ShuttleSerenity {
    let bot = MainBot::new(pool, &secret_store).await;

    let prefix = bot.discord_prefix().to_owned();
    let owners = bot.owners().clone();
    let framework = StandardFramework::new()
        .configure(|c| c.prefix(prefix).owners(owners))
        .help(&MY_HELP)
        .group(&LEVELS_GROUP)
        .group(&REWARDS_GROUP)
        .group(&OWNER_GROUP);

    let token = bot.discord_token().to_owned();
    let client = Client::builder(token, DISCORD_INTENTS)
        .framework(framework)
        .event_handler(bot)
        .await
        .context("Err creating client")?;

    {
        let mut wlock = client.data.write().await;
        wlock.insert::<ShardManagerKey>(client.shard_manager.clone());
    }

    Ok(client.into())
}

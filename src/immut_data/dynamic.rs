use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serenity::model::prelude::UserId;
use shuttle_secrets::SecretStore;

/// Splitter for list-valued secrets such as `OWNER_IDS`.
pub(crate) static LIST_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,\s]+").unwrap());

/// Run-time configuration of the bot, read from the secret store.
#[derive(Clone)]
pub(crate) struct BotCfg {
    pub(crate) discord_token: String,
    pub(crate) discord_prefix: String,
    pub(crate) owners: HashSet<UserId>,
}

impl BotCfg {
    pub(crate) fn new(secret_store: &SecretStore) -> Self {
        let discord_token = secret_store
            .get("DISCORD_TOKEN")
            .expect("The DISCORD_TOKEN secret is required");
        let discord_prefix = secret_store
            .get("DISCORD_PREFIX")
            .unwrap_or_else(|| String::from("P"));
        let owners: HashSet<UserId> = secret_store
            .get("OWNER_IDS")
            .map(|raw| {
                LIST_SEPARATOR
                    .split(&raw)
                    .filter(|chunk| !chunk.is_empty())
                    .map(|chunk| {
                        let id: u64 = chunk.parse().unwrap_or_else(|e| {
                            panic!("OWNER_IDS must be a list of Discord user ids: {e}")
                        });
                        UserId(id)
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            discord_token,
            discord_prefix,
            owners,
        }
    }
}

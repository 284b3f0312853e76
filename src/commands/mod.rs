use std::collections::HashSet;

use serenity::{
    framework::standard::{
        help_commands,
        macros::{group, help},
        Args, CommandGroup, CommandResult, HelpOptions,
    },
    model::prelude::{Message, UserId},
    prelude::Context,
};

mod levels;
mod owner;
mod rewards;

use levels::*;
use owner::*;
use rewards::*;

#[group]
#[commands(rank, leaderboard, settheme)]
struct Levels;

#[group]
#[commands(rewards, addreward, removereward, togglexp, togglestacking)]
struct Rewards;

#[group]
#[owners_only]
#[commands(quit)]
struct Owner;

#[help]
#[individual_command_tip = "Hello! If you want more information about a specific command, \
just pass the command as argument."]
#[command_not_found_text = "Could not find: `{}`."]
#[max_levenshtein_distance(3)]
#[lacking_permissions = "Hide"]
#[lacking_role = "Hide"]
#[wrong_channel = "Strike"]
async fn my_help(
    context: &Context,
    msg: &Message,
    args: Args,
    help_options: &'static HelpOptions,
    groups: &[&'static CommandGroup],
    owners: HashSet<UserId>,
) -> CommandResult {
    let _ = help_commands::with_embeds(context, msg, args, help_options, groups, owners).await;
    Ok(())
}

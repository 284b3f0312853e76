use std::collections::HashSet;

use serenity::model::prelude::UserId;

/// Read access to the bot configuration, independent of the concrete
/// bot structure carrying it.
pub(crate) trait CfgExt {
    fn discord_token(&self) -> &str;
    fn discord_prefix(&self) -> &str;
    fn owners(&self) -> &HashSet<UserId>;
}

macro_rules! impl_cfg_ext {
    ($t:ty) => {
        impl crate::bots::CfgExt for $t {
            fn discord_token(&self) -> &str {
                &self.cfg.discord_token
            }

            fn discord_prefix(&self) -> &str {
                &self.cfg.discord_prefix
            }

            fn owners(&self) -> &::std::collections::HashSet<serenity::model::prelude::UserId> {
                &self.cfg.owners
            }
        }
    };
}

pub(super) use impl_cfg_ext;

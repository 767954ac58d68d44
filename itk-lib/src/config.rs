use color_eyre::eyre::{Result, WrapErr};
use poise::serenity_prelude::{ChannelId, UserId};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Deserialize, Debug, PartialEq)]
pub struct Config {
    /// The prefix for text commands, like `!ab start`.
    ///
    /// Only read at startup, changing it needs a restart.
    #[serde(default = "get_default_prefix")]
    pub prefix: String,
    /// Who gets pinged when a command fails.
    pub owner_id: Option<UserId>,
    /// Where command failures are reported.
    pub log_channel_id: Option<ChannelId>,
    /// Who can `purge` other people's messages.
    #[serde(default)]
    pub moderators: Vec<UserId>,
    /// The help text for the bot. `!help`
    pub help_text: Option<Arc<String>>,
    /// One reaction per poll option, in order. The length caps the number of options.
    #[serde(default = "get_default_poll_reactions")]
    pub poll_reactions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            prefix: get_default_prefix(),
            owner_id: None,
            log_channel_id: None,
            moderators: vec![],
            help_text: None,
            poll_reactions: get_default_poll_reactions(),
        }
    }
}

impl Config {
    /// Fetches the config from the config file in the root directory.
    pub fn create_from_file(config_path: impl AsRef<Path>) -> Result<Config> {
        let file = std::fs::read_to_string(config_path).wrap_err("Could not read config file")?;

        toml::from_str(&file).wrap_err("Could not parse config file")
    }

    /// Reloads the config file and updates the configuration.
    ///
    /// A broken file leaves the current configuration in place.
    pub fn reload(&mut self, config_path: impl AsRef<Path>) {
        match Config::create_from_file(config_path) {
            Ok(config) => *self = config,
            Err(e) => tracing::error!("Keeping the old config: {:?}", e),
        }
    }
}

fn get_default_prefix() -> String {
    "!".to_owned()
}

fn get_default_poll_reactions() -> Vec<String> {
    [
        "1️⃣", "2️⃣", "3️⃣", "4️⃣", "5️⃣", "6️⃣", "7️⃣", "8️⃣", "9️⃣", "🔟", "🇦", "🇧", "🇨", "🇩", "🇪",
        "🇫", "🇬", "🇭", "🇮", "🇯",
    ]
    .map(str::to_owned)
    .to_vec()
}

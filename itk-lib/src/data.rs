use crate::{ab_game::AbGames, config::Config};
use color_eyre::eyre::{Error, Result, WrapErr};
use parking_lot::Mutex;
use std::{path::Path, sync::Arc};
use tokio::sync::RwLock;

/// The global state of the bot
pub type State = Arc<RawAppState>;

pub struct RawAppState {
    pub config: Arc<RwLock<Config>>,
    /// Config file watcher that refreshes the config if it changes
    ///
    /// Attached to the state to keep the watcher alive
    _watcher: notify::RecommendedWatcher,
    /// Running A/B games. Never hold the lock across an `.await`.
    pub ab_games: Mutex<AbGames>,
}

impl RawAppState {
    pub fn new(config: Config, config_path: String) -> Result<State> {
        let config = Arc::new(RwLock::new(config));

        use notify::{
            Event, EventKind, RecursiveMode, Watcher,
            event::{AccessKind, AccessMode},
        };

        let config_clone = Arc::clone(&config);
        let reload_config_path = config_path.clone();

        let mut watcher = notify::recommended_watcher(move |res| match res {
            Ok(Event {
                kind: EventKind::Access(AccessKind::Close(AccessMode::Write)),
                ..
            }) => {
                tracing::info!("config changed, reloading...");

                config_clone.blocking_write().reload(&*reload_config_path);
            }
            Err(e) => tracing::error!("watch error: {:?}", e),
            _ => {}
        })
        .wrap_err("Failed to create file watcher")?;

        watcher
            .watch(Path::new(&config_path), RecursiveMode::NonRecursive)
            .wrap_err("Failed to watch config file")?;

        Ok(Arc::new(RawAppState {
            config,
            _watcher: watcher,
            ab_games: Mutex::new(AbGames::new()),
        }))
    }
}

pub type PoiseContext<'a> = poise::Context<'a, State, Error>;

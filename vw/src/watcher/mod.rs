//! Version watcher: poll a deployed version marker, prompt on change

mod config;
mod core;

pub use config::WatcherConfig;
pub use core::{VersionWatcher, WatchExit, WatchPhase, WatcherHandle};

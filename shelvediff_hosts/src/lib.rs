mod config;
mod dispatcher;
mod launcher;
mod memory;

pub use config::{AppConfig, ConfigStore, HostProfile, TomlToolStore};
pub use dispatcher::{InlineDispatcher, ThreadDispatcher};
pub use launcher::{split_arguments, SystemLauncher, SystemProcess};
pub use memory::{MemoryBackend, MemoryToolStore};

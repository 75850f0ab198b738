//! Host collaborators: backends, tool stores, launchers and dispatchers.

pub use shelvediff_host_api::{
    CompareRequest, CompareViewer, Dispatcher, HostError, HostResult, ProcessLauncher,
    ShelvesetBackend, ToolConfigStore, ToolProcess,
};
pub use shelvediff_hosts::{
    split_arguments, AppConfig, ConfigStore, HostProfile, InlineDispatcher, MemoryBackend,
    MemoryToolStore, SystemLauncher, SystemProcess, ThreadDispatcher, TomlToolStore,
};

//! Real implementations of the supervisor's dependency traits

pub mod channels;
pub mod launcher;
pub mod probe;
pub mod store;

pub use channels::JsonChannelProvider;
pub use launcher::FfmpegLauncher;
pub use probe::SysinfoProbe;
pub use store::JsonlSessionStore;

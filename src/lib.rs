// Cartridge Loader - steppable asset loading for fantasy-console cartridges
//
// This is the library crate: file routing, parsers, the load queue and its
// background orchestrator, plus the image export flows.
// The binary crate (main.rs) provides the `cartload` command line entry point.

pub mod codec;
pub mod config;
pub mod engine;
pub mod export;
pub mod io;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod parsers;
pub mod routing;
pub mod task;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use engine::{EngineTarget, MemoryEngine};
pub use export::{ImageExporter, ScreenshotService};
pub use io::{FileProvider, MemoryFileSystem, MountedFileSystem, Workspace};
pub use loader::{LoadError, LoadEvent, LoadOutcome, LoadProgress, LoadQueue, LoadService};
pub use metrics::Metrics;
pub use models::{Category, FileFlags, LoaderSettings};
pub use parsers::{ParseContext, ParserKind};
pub use routing::{FileRouter, RoutePlan, RuleSet};
pub use task::{SteppableTask, TaskState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

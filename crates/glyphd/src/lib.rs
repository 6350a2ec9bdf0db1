pub mod config;
pub mod display;
pub mod ha;
pub mod monitor;
pub mod router;
pub mod settings;
pub mod sprite;

pub use config::Config;
pub use config::LogLevel;
pub use display::DisplayDriver;
pub use ha::HaClient;
pub use ha::StateClient;
pub use monitor::Monitor;
pub use monitor::MonitorHandle;
pub use monitor::MonitorOptions;
pub use router::EventRouter;
pub use settings::Settings;
pub use settings::SettingsStore;

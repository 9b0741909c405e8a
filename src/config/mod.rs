mod settings;

pub use settings::{
    DispatchConfig, LogConfig, LogFormat, PlatformConfig, QueueFullPolicy, Settings, StatsConfig,
};

use std::path::PathBuf;

const CONFIG_PATH: &str = "TOPIC_MONITOR_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "./topic-monitor.json";

pub fn get_default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

/// Config path from the command line, else the environment, else the default.
pub fn get_config_path(from_args: Option<PathBuf>) -> PathBuf {
    from_args
        .or_else(|| std::env::var_os(CONFIG_PATH).map(PathBuf::from))
        .unwrap_or_else(get_default_config_path)
}

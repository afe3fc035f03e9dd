use serde::Deserialize;

/// Server configuration. Every field has a default, so the inspector runs
/// with no config file at all.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Port to bind on the loopback interface. The inspector never listens
    /// on a non-loopback address.
    #[serde(default = "Config::default_port")]
    pub port: u16,
    /// Polling schedule handed to clients whose calls pause.
    ///
    /// ```toml
    /// [poll]
    /// interval-ms = 200
    /// timeout-ms = 30000
    /// ```
    #[serde(default)]
    pub poll: PollSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: Self::default_port(),
            poll: PollSettings::default(),
        }
    }
}

impl Config {
    const fn default_port() -> u16 {
        5000
    }
}

#[derive(Deserialize, Copy, Clone, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct PollSettings {
    /// Milliseconds a client waits between successive polls of a paused
    /// call. Also bounds how long one poll request is held open on the
    /// server.
    #[serde(default = "PollSettings::default_interval_ms")]
    pub interval_ms: u64,
    /// Total milliseconds a paused call waits for an operator decision
    /// before the client gives up on it.
    #[serde(default = "PollSettings::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: Self::default_interval_ms(),
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

impl PollSettings {
    const fn default_interval_ms() -> u64 {
        200
    }

    const fn default_timeout_ms() -> u64 {
        30_000
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn empty_config_gets_all_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.poll.interval_ms, 200);
        assert_eq!(config.poll.timeout_ms, 30_000);
    }

    #[test]
    fn partial_poll_table_keeps_remaining_defaults() {
        let config: Config = toml::from_str("port = 6001\n\n[poll]\ninterval-ms = 50\n").unwrap();
        assert_eq!(config.port, 6001);
        assert_eq!(config.poll.interval_ms, 50);
        assert_eq!(config.poll.timeout_ms, 30_000);
    }
}

// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use serde::Deserialize;
use std::path::Path;

use crate::constants;
use crate::error::Error;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub network: Network,

    #[serde(default)]
    pub log: Log,
}

impl Config {
    /// Load config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Network {
    /// Local address both the datagram ingress and the stream listener
    /// bind to.
    #[serde(default = "Network::default_bind_ip")]
    pub bind_ip: String,

    /// Capacity of broker/session command channels.
    #[serde(default = "Network::default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Network {
    fn default_bind_ip() -> String {
        "0.0.0.0".to_string()
    }

    const fn default_channel_capacity() -> usize {
        constants::CHANNEL_CAPACITY
    }
}

impl Default for Network {
    fn default() -> Self {
        Self {
            bind_ip: Self::default_bind_ip(),
            channel_capacity: Self::default_channel_capacity(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Log {
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    #[must_use]
    pub const fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

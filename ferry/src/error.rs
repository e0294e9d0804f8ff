// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::fmt::{self, Display};
use std::io;
use std::net::AddrParseError;
use tokio::sync::mpsc;

use crate::commands::{BrokerToSessionCmd, SessionToBrokerCmd};

/// Represent the types of errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Error occurred while performing I/O.
    IoError,

    /// Frame encode error.
    EncodeError,

    /// Frame decode error.
    DecodeError,

    /// Socket stream error.
    SocketError,

    /// mpsc channel error.
    ChannelError,

    /// Invalid config file.
    ConfigError,

    /// Invalid command line parameter.
    ParameterError,
}

#[derive(Clone, Debug)]
pub struct Error {
    /// Type of current error.
    kind: ErrorKind,

    /// Detail message about this error.
    message: String,
}

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind, message: &str) -> Self {
        Self {
            kind,
            message: message.to_owned(),
        }
    }

    #[must_use]
    pub fn from_string(kind: ErrorKind, message: String) -> Self {
        Self { kind, message }
    }

    #[must_use]
    pub const fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::from_string(ErrorKind::IoError, format!("IoError {err}"))
    }
}

impl From<codec::EncodeError> for Error {
    fn from(err: codec::EncodeError) -> Self {
        Self::from_string(ErrorKind::EncodeError, format!("{err:?}"))
    }
}

impl From<codec::DecodeError> for Error {
    fn from(err: codec::DecodeError) -> Self {
        Self::from_string(ErrorKind::DecodeError, format!("{err:?}"))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::from_string(ErrorKind::ConfigError, format!("Invalid config: {err}"))
    }
}

impl From<AddrParseError> for Error {
    fn from(err: AddrParseError) -> Self {
        Self::from_string(ErrorKind::ParameterError, format!("Invalid address: {err}"))
    }
}

macro_rules! convert_send_error {
    ($cmd_type: ident) => {
        impl From<mpsc::error::SendError<$cmd_type>> for Error {
            fn from(err: mpsc::error::SendError<$cmd_type>) -> Self {
                Self::from_string(
                    ErrorKind::ChannelError,
                    format!("$cmd_type channel error: {err}"),
                )
            }
        }
    };
}

convert_send_error!(SessionToBrokerCmd);
convert_send_error!(BrokerToSessionCmd);

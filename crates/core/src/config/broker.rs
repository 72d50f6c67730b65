// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker connection descriptor.

use super::ConfigError;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// Which transport backs a broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BrokerKind {
    /// Topic pub/sub broker (NATS)
    #[serde(rename = "nats", alias = "topic")]
    Topic,
    /// Queue broker (AMQP / RabbitMQ)
    #[serde(rename = "rabbitmq", alias = "queue")]
    Queue,
    /// Key/value store broker (Redis)
    #[serde(rename = "redis", alias = "store")]
    Store,
}

crate::simple_display! {
    BrokerKind {
        Topic => "nats",
        Queue => "rabbitmq",
        Store => "redis",
    }
}

/// Credential scheme for the topic broker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    #[default]
    None,
    Token,
    UserPassword,
    UserPasswordBcrypt,
}

fn default_key() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerConnectionConfig {
    #[serde(default)]
    pub name: String,
    /// Registry key the connection is stored under
    #[serde(default = "default_key")]
    pub key: String,
    #[serde(rename = "type")]
    pub kind: BrokerKind,
    #[serde(default)]
    pub host: String,
    #[serde(default, deserialize_with = "number_or_string")]
    pub port: u16,
    #[serde(default)]
    pub auth_type: AuthType,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default, deserialize_with = "optional_number_or_string")]
    pub db: Option<i64>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
    #[serde(default)]
    pub cert_file: Option<PathBuf>,
    #[serde(default)]
    pub key_file: Option<PathBuf>,
}

impl BrokerConnectionConfig {
    pub fn new(kind: BrokerKind, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: String::new(),
            key: default_key(),
            kind,
            host: host.into(),
            port,
            auth_type: AuthType::None,
            user: None,
            password: None,
            token: None,
            exchange: None,
            db: None,
            secure: false,
            ca_file: None,
            cert_file: None,
            key_file: None,
        }
    }

    crate::setters! {
        into { key: String }
        set {
            auth_type: AuthType,
            user: Option<String>,
            password: Option<String>,
            token: Option<String>,
            db: Option<i64>,
            secure: bool,
            ca_file: Option<PathBuf>,
        }
    }

    /// Reject descriptors that can never connect.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "host", context: "broker_connection" });
        }
        if self.port == 0 {
            return Err(ConfigError::MissingField { field: "port", context: "broker_connection" });
        }
        match self.kind {
            BrokerKind::Store => {
                if self.password.is_none() {
                    return Err(ConfigError::MissingField {
                        field: "password",
                        context: "redis broker_connection",
                    });
                }
                if self.db.is_none() {
                    return Err(ConfigError::MissingField {
                        field: "db",
                        context: "redis broker_connection",
                    });
                }
            }
            BrokerKind::Topic => match self.auth_type {
                AuthType::Token if blank(&self.token) => {
                    return Err(ConfigError::MissingField {
                        field: "token",
                        context: "token auth",
                    });
                }
                AuthType::UserPassword | AuthType::UserPasswordBcrypt
                    if blank(&self.user) || blank(&self.password) =>
                {
                    return Err(ConfigError::MissingField {
                        field: "user/password",
                        context: "user_password auth",
                    });
                }
                _ => {}
            },
            BrokerKind::Queue => {}
        }
        if self.secure && self.ca_file.is_none() {
            return Err(ConfigError::MissingCaFile);
        }
        Ok(())
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.is_empty())
}

/// Ports and db indexes arrive as strings after `${VAR}` substitution.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(i64),
    String(String),
}

impl NumberOrString {
    fn into_i64<E: serde::de::Error>(self) -> Result<i64, E> {
        match self {
            Self::Number(n) => Ok(n),
            Self::String(s) => s.trim().parse().map_err(E::custom),
        }
    }
}

fn number_or_string<'de, D: Deserializer<'de>>(de: D) -> Result<u16, D::Error> {
    let n = NumberOrString::deserialize(de)?.into_i64::<D::Error>()?;
    u16::try_from(n).map_err(serde::de::Error::custom)
}

fn optional_number_or_string<'de, D: Deserializer<'de>>(de: D) -> Result<Option<i64>, D::Error> {
    match Option::<NumberOrString>::deserialize(de)? {
        Some(NumberOrString::String(s)) if s.trim().is_empty() => Ok(None),
        Some(v) => v.into_i64::<D::Error>().map(Some),
        None => Ok(None),
    }
}

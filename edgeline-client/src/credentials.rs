//! Credentials file handling routines
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ClientError, Error, ErrorKind};

/// TLS Client Security Mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsSecurity {
    /// Allow any certificate for the TLS connection
    Insecure,
    /// Verify the certificate against the trusted chain but allow any host
    /// name
    ///
    /// This is useful for localhost and for credentials files that pin the
    /// specific server certificate, where the host name used to reach the
    /// server carries no information.
    NoHostVerification,
    /// Normal TLS certificate check (trusted chain and hostname)
    Strict,
    /// `NoHostVerification` if a specific certificate is pinned, otherwise
    /// `Strict`
    Default,
}

/// Contents of a credentials file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_ca: Option<String>,
    #[serde(default = "TlsSecurity::default_mode")]
    pub tls_security: TlsSecurity,
}

fn default_port() -> u16 {
    5656
}

impl TlsSecurity {
    fn default_mode() -> TlsSecurity {
        TlsSecurity::Default
    }
    pub fn as_str(&self) -> &'static str {
        use TlsSecurity::*;

        match self {
            Default => "default",
            Insecure => "insecure",
            NoHostVerification => "no_host_verification",
            Strict => "strict",
        }
    }
}

impl FromStr for TlsSecurity {
    type Err = Error;
    fn from_str(val: &str) -> Result<Self, Error> {
        match val {
            "default" => Ok(TlsSecurity::Default),
            "insecure" => Ok(TlsSecurity::Insecure),
            "no_host_verification" => Ok(TlsSecurity::NoHostVerification),
            "strict" => Ok(TlsSecurity::Strict),
            val => Err(ClientError::with_message(format!(
                "Invalid value {:?}. \
                 Options: default, insecure, no_host_verification, strict.",
                val,
            ))),
        }
    }
}

impl fmt::Display for TlsSecurity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl Default for Credentials {
    fn default() -> Credentials {
        Credentials {
            host: None,
            port: 5656,
            user: "edgedb".into(),
            password: None,
            database: None,
            branch: None,
            tls_ca: None,
            tls_security: TlsSecurity::Default,
        }
    }
}

impl Credentials {
    pub fn parse(data: &[u8]) -> Result<Credentials, Error> {
        let creds: Credentials =
            serde_json::from_slice(data).map_err(ClientError::with_source)?;
        if creds.database.is_some()
            && creds.branch.is_some()
            && creds.database != creds.branch
        {
            return Err(ClientError::with_message(
                "`database` and `branch` are mutually exclusive in a credentials file",
            ));
        }
        Ok(creds)
    }
}

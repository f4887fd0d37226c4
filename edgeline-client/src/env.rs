use std::collections::HashMap;

use crate::errors::{ClientError, Error, ErrorKind};

/// Access to process environment variables, injectable for tests
pub(crate) trait EnvVars {
    fn get(&self, name: &str) -> Result<Option<String>, Error>;
}

pub(crate) struct SystemEnv;

impl EnvVars for SystemEnv {
    fn get(&self, name: &str) -> Result<Option<String>, Error> {
        match std::env::var(name) {
            Ok(v) if v.is_empty() => Ok(None),
            Ok(v) => Ok(Some(v)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(ClientError::with_source(e)
                .context(format!("Cannot decode environment variable {:?}", name))),
        }
    }
}

impl EnvVars for HashMap<&'static str, &'static str> {
    fn get(&self, name: &str) -> Result<Option<String>, Error> {
        Ok(HashMap::get(self, name)
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string()))
    }
}

/// `EDGEDB_PORT` may be injected by docker as `tcp://host:port`; such a
/// value is ignored rather than rejected
pub(crate) fn get_port(env: &impl EnvVars) -> Result<Option<u16>, Error> {
    let port = match env.get("EDGEDB_PORT")? {
        Some(port) => port,
        None => return Ok(None),
    };
    if port.starts_with("tcp") {
        log::warn!(
            "Environment variable `EDGEDB_PORT` contains a \
             docker-link-like definition. Ignoring..."
        );
        return Ok(None);
    }
    port.parse()
        .map(Some)
        .map_err(|e| ClientError::with_source(e).context("cannot parse env var EDGEDB_PORT"))
}

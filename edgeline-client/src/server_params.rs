use std::collections::HashMap;

use bytes::Bytes;

/// Raw `parameter_status` entries received while waiting for the first
/// `ready_for_command`
///
/// The payloads are not interpreted; they are kept verbatim so a future
/// version can expose individual settings without a protocol change.
#[derive(Debug, Default)]
pub struct ServerParams {
    entries: HashMap<String, Bytes>,
}

impl ServerParams {
    pub(crate) fn insert(&mut self, name: String, value: Bytes) {
        self.entries.insert(name, value);
    }
    pub fn get_raw(&self, name: &str) -> Option<&Bytes> {
        self.entries.get(name)
    }
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| &k[..])
    }
}

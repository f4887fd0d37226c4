//! Process-wide caches shared by all connections of a driver instance.
//!
//! The codec cache lives in the protocol crate (it is keyed by wire-level
//! type ids); the query cache below memoises fully prepared statements so
//! repeated queries can take the optimistic-execute fast path.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use edgeline_protocol::client_message::{Cardinality, IoFormat};
use edgeline_protocol::codec::Codec;

pub use edgeline_protocol::codec::CodecRegistry;

/// A statement the server has compiled, along with its codec pair
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    /// Result cardinality as reported by the server
    pub cardinality: Cardinality,
    pub input_typedesc_id: Uuid,
    pub output_typedesc_id: Uuid,
    pub input_codec: Arc<dyn Codec>,
    pub output_codec: Arc<dyn Codec>,
}

#[derive(Debug, Hash, PartialEq, Eq)]
struct QueryKey {
    statement: String,
    cardinality: Cardinality,
    io_format: IoFormat,
}

/// Memoised `(statement, expected cardinality, output format)` →
/// [`PreparedQuery`] mapping
///
/// Entries are immutable once inserted; concurrent inserts of the same key
/// are last-writer-wins, which is sound because codecs are canonicalised by
/// type id.
#[derive(Debug, Default)]
pub struct QueryCache {
    queries: Mutex<HashMap<QueryKey, Arc<PreparedQuery>>>,
}

impl QueryCache {
    pub fn new() -> QueryCache {
        QueryCache::default()
    }
    pub fn get(
        &self,
        statement: &str,
        cardinality: Cardinality,
        io_format: IoFormat,
    ) -> Option<Arc<PreparedQuery>> {
        self.lock()
            .get(&QueryKey {
                statement: statement.into(),
                cardinality,
                io_format,
            })
            .cloned()
    }
    pub fn add(
        &self,
        statement: &str,
        cardinality: Cardinality,
        io_format: IoFormat,
        query: Arc<PreparedQuery>,
    ) {
        self.lock().insert(
            QueryKey {
                statement: statement.into(),
                cardinality,
                io_format,
            },
            query,
        );
    }
    pub fn clear(&self, statement: &str, cardinality: Cardinality, io_format: IoFormat) {
        self.lock().remove(&QueryKey {
            statement: statement.into(),
            cardinality,
            io_format,
        });
    }
    pub fn len(&self) -> usize {
        self.lock().len()
    }
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<QueryKey, Arc<PreparedQuery>>> {
        self.queries.lock().expect("query cache mutex is not poisoned")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use edgeline_protocol::codec::{scalar_codec, STD_FLOAT32, STD_INT32};

    fn prepared() -> Arc<PreparedQuery> {
        Arc::new(PreparedQuery {
            cardinality: Cardinality::One,
            input_typedesc_id: Uuid::from_u128(0xFF),
            output_typedesc_id: STD_FLOAT32,
            input_codec: scalar_codec(&STD_INT32).unwrap(),
            output_codec: scalar_codec(&STD_FLOAT32).unwrap(),
        })
    }

    #[test]
    fn keyed_by_statement_cardinality_and_format() {
        let cache = QueryCache::new();
        cache.add("SELECT 1", Cardinality::Many, IoFormat::Binary, prepared());
        assert!(cache
            .get("SELECT 1", Cardinality::Many, IoFormat::Binary)
            .is_some());
        assert!(cache
            .get("SELECT 1", Cardinality::One, IoFormat::Binary)
            .is_none());
        assert!(cache
            .get("SELECT 1", Cardinality::Many, IoFormat::Json)
            .is_none());
        assert!(cache
            .get("SELECT 2", Cardinality::Many, IoFormat::Binary)
            .is_none());
    }

    #[test]
    fn clear_removes_one_entry() {
        let cache = QueryCache::new();
        cache.add("SELECT 1", Cardinality::Many, IoFormat::Binary, prepared());
        cache.add("SELECT 1", Cardinality::Many, IoFormat::Json, prepared());
        cache.clear("SELECT 1", Cardinality::Many, IoFormat::Binary);
        assert!(cache
            .get("SELECT 1", Cardinality::Many, IoFormat::Binary)
            .is_none());
        assert_eq!(cache.len(), 1);
    }
}

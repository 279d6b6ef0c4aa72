//! # redb-backed Edge Storage
//!
//! A disk-backed [`EdgeStore`] using the redb embedded database.
//!
//! Provides:
//! - ACID transactions (one write transaction per `make`/`remove` batch)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//! - Zero configuration
//!
//! Edge and edge-type records are postcard-encoded; monotonic counters
//! (next edge id, creation tick) live in a metadata table and are cached
//! on the handle between transactions.

use crate::store::{sort_edges, validate_new_edge, EdgeFilter, EdgeStore, SortOrder};
use crate::types::{Edge, EdgeId, EdgeType, NewEdge, Tick, TrellisError};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

/// Table for edges: EdgeId(u64) -> serialized Edge bytes.
const EDGES: TableDefinition<u64, &[u8]> = TableDefinition::new("edges");

/// Table for edge types: EdgeTypeId(u64) -> serialized EdgeType bytes.
const EDGE_TYPES: TableDefinition<u64, &[u8]> = TableDefinition::new("edge_types");

/// Table for metadata counters: key string -> value u64.
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

fn io_err(error: impl std::fmt::Display) -> TrellisError {
    TrellisError::IoError(error.to_string())
}

/// A disk-backed edge store using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
    /// Next available edge id, cached from metadata.
    next_edge_id: u64,
    /// Monotonic creation stamp, cached from metadata.
    tick: Tick,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("next_edge_id", &self.next_edge_id)
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create an edge database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TrellisError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist.
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(EDGES).map_err(io_err)?;
            let _ = write_txn.open_table(EDGE_TYPES).map_err(io_err)?;
            let _ = write_txn.open_table(METADATA).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        // Load counters.
        let read_txn = db.begin_read().map_err(io_err)?;
        let (next_edge_id, tick) = {
            let table = read_txn.open_table(METADATA).map_err(io_err)?;
            let next_edge_id = table
                .get("next_edge_id")
                .map_err(io_err)?
                .map(|v| v.value())
                .unwrap_or(0);
            let tick = table
                .get("tick")
                .map_err(io_err)?
                .map(|v| v.value())
                .unwrap_or(0);
            (next_edge_id, Tick(tick))
        };

        Ok(Self {
            db,
            next_edge_id,
            tick,
        })
    }

    /// Compact the database (optional optimization).
    pub fn compact(&mut self) -> Result<(), TrellisError> {
        self.db.compact().map_err(io_err)?;
        Ok(())
    }

    fn scan(&self, filter: &EdgeFilter) -> Result<Vec<Edge>, TrellisError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(EDGES).map_err(io_err)?;

        let mut selected = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (_, value) = entry.map_err(io_err)?;
            let edge: Edge = postcard::from_bytes(value.value())
                .map_err(|e| TrellisError::DeserializationError(e.to_string()))?;
            if filter.matches(&edge) {
                selected.push(edge);
            }
        }
        Ok(selected)
    }
}

impl EdgeStore for RedbStore {
    fn insert_edge(&mut self, edge: NewEdge) -> Result<Edge, TrellisError> {
        let mut created = self.insert_edges(vec![edge])?;
        created
            .pop()
            .ok_or_else(|| TrellisError::IoError("batch insert returned no record".to_string()))
    }

    fn insert_edges(&mut self, edges: Vec<NewEdge>) -> Result<Vec<Edge>, TrellisError> {
        if edges.is_empty() {
            return Ok(Vec::new());
        }
        // Validate the whole batch before the transaction opens; the
        // batch is rejected atomically.
        for edge in &edges {
            validate_new_edge(edge)?;
        }

        let mut current_id = self.next_edge_id;
        let mut current_tick = self.tick;
        let mut records = Vec::with_capacity(edges.len());

        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut edges_table = write_txn.open_table(EDGES).map_err(io_err)?;
            let mut meta_table = write_txn.open_table(METADATA).map_err(io_err)?;

            for edge in edges {
                let id = EdgeId(current_id);
                current_id = current_id.saturating_add(1);
                current_tick = current_tick.next();

                let record = Edge {
                    id,
                    kind: edge.kind,
                    node_a: edge.node_a,
                    node_b: edge.node_b,
                    edge_type: edge.edge_type,
                    variant: edge.variant,
                    created: current_tick,
                };
                let bytes = postcard::to_allocvec(&record)
                    .map_err(|e| TrellisError::SerializationError(e.to_string()))?;
                edges_table.insert(id.0, bytes.as_slice()).map_err(io_err)?;
                records.push(record);
            }

            meta_table
                .insert("next_edge_id", current_id)
                .map_err(io_err)?;
            meta_table.insert("tick", current_tick.0).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;

        self.next_edge_id = current_id;
        self.tick = current_tick;
        Ok(records)
    }

    fn delete_edge(&mut self, id: EdgeId) -> Result<(), TrellisError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        let existed = {
            let mut table = write_txn.open_table(EDGES).map_err(io_err)?;
            table.remove(id.0).map_err(io_err)?.is_some()
        };
        if !existed {
            // Dropping the transaction aborts it; nothing was changed.
            return Err(TrellisError::EdgeNotFound(id));
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    fn edge_by_id(&self, id: EdgeId) -> Result<Option<Edge>, TrellisError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(EDGES).map_err(io_err)?;
        match table.get(id.0).map_err(io_err)? {
            Some(value) => {
                let edge: Edge = postcard::from_bytes(value.value())
                    .map_err(|e| TrellisError::DeserializationError(e.to_string()))?;
                Ok(Some(edge))
            }
            None => Ok(None),
        }
    }

    fn select(&self, filter: &EdgeFilter, order: SortOrder) -> Result<Vec<Edge>, TrellisError> {
        let mut selected = self.scan(filter)?;
        sort_edges(&mut selected, order);
        Ok(selected)
    }

    fn count(&self, filter: &EdgeFilter) -> Result<usize, TrellisError> {
        Ok(self.scan(filter)?.len())
    }

    fn put_edge_type(&mut self, edge_type: EdgeType) -> Result<(), TrellisError> {
        let bytes = postcard::to_allocvec(&edge_type)
            .map_err(|e| TrellisError::SerializationError(e.to_string()))?;

        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(EDGE_TYPES).map_err(io_err)?;
            table
                .insert(edge_type.id.0, bytes.as_slice())
                .map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    fn load_edge_types(&self) -> Result<Vec<EdgeType>, TrellisError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(EDGE_TYPES).map_err(io_err)?;

        let mut types = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (_, value) = entry.map_err(io_err)?;
            let edge_type: EdgeType = postcard::from_bytes(value.value())
                .map_err(|e| TrellisError::DeserializationError(e.to_string()))?;
            types.push(edge_type);
        }
        Ok(types)
    }
}

// =============================================================================
// TESTS
// =============================================================================

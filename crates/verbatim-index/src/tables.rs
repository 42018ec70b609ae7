//! Redb table definitions for the persistent index.

use redb::TableDefinition;

// Key: (kind discriminant, hash), Value: bincode-encoded record envelope
pub const ENTRIES: TableDefinition<(u8, u64), &[u8]> = TableDefinition::new("entries");

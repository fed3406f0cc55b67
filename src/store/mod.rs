//! Durable session state.
//!
//! Everything the engine needs to survive a restart lives in named buckets
//! backed by sqlite. The engine only ever sees typed get/set/clear per
//! bucket; what backs them is this module's business. Persistence is
//! best-effort for callers: the engine logs failed saves and keeps going in
//! memory.

mod schema;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::{Annotation, CollectionItem, DocumentNode, NodeId};

/// Bucket names. One bucket holds one logical piece of session state;
/// clearing a bucket is atomic.
pub mod bucket {
    pub const TREE_NODES: &str = "tree-nodes";
    pub const TREE_ROOT_ID: &str = "tree-root-id";
    pub const TREE_CURRENT_ID: &str = "tree-current-id";
    pub const TREE_NODE_COUNTER: &str = "tree-node-counter";
    pub const COLLECTIONS: &str = "collections";
    pub const CONSOLIDATED_TEXT: &str = "consolidated-text";
    pub const CONSOLIDATED_SIGNATURE: &str = "consolidated-signature";
    pub const SESSION_CONTENT: &str = "session-content";
    pub const SESSION_AUTO_SUBMIT: &str = "session-auto-submit-flag";
    pub const SESSION_SELECTION_COUNTER: &str = "session-selection-counter";
    pub const ANNOTATIONS: &str = "annotations";
}

pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Store path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "marginalia")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("marginalia.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("store lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Raw bucket access
    // ============================================================

    fn get_raw(&self, name: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().expect("store lock poisoned");
        let mut stmt = conn.prepare("SELECT value FROM buckets WHERE name = ?")?;
        let mut rows = stmt.query([name])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    fn set_raw(&self, name: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().expect("store lock poisoned");
        conn.execute(
            "INSERT INTO buckets (name, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            (name, value, Utc::now().to_rfc3339()),
        )?;
        Ok(())
    }

    fn clear_raw(&self, name: &str) -> Result<()> {
        let conn = self.conn.lock().expect("store lock poisoned");
        conn.execute("DELETE FROM buckets WHERE name = ?", [name])?;
        Ok(())
    }

    /// Clear several buckets in one statement so related state (the tree's
    /// four buckets, the consolidation pair) vanishes together.
    fn clear_many(&self, names: &[&str]) -> Result<()> {
        let conn = self.conn.lock().expect("store lock poisoned");
        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!("DELETE FROM buckets WHERE name IN ({placeholders})");
        conn.execute(&sql, rusqlite::params_from_iter(names.iter().copied()))?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.get_raw(name)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        self.set_raw(name, &serde_json::to_string(value)?)
    }

    fn get_u64(&self, name: &str) -> Result<Option<u64>> {
        Ok(self.get_raw(name)?.map(|raw| raw.parse()).transpose()?)
    }

    // ============================================================
    // Version tree
    // ============================================================

    pub fn get_tree_nodes(&self) -> Result<Option<BTreeMap<NodeId, DocumentNode>>> {
        self.get_json(bucket::TREE_NODES)
    }

    pub fn set_tree_nodes(&self, nodes: &BTreeMap<NodeId, DocumentNode>) -> Result<()> {
        self.set_json(bucket::TREE_NODES, nodes)
    }

    pub fn get_tree_root_id(&self) -> Result<Option<NodeId>> {
        self.get_u64(bucket::TREE_ROOT_ID)
    }

    pub fn set_tree_root_id(&self, id: NodeId) -> Result<()> {
        self.set_raw(bucket::TREE_ROOT_ID, &id.to_string())
    }

    pub fn get_tree_current_id(&self) -> Result<Option<NodeId>> {
        self.get_u64(bucket::TREE_CURRENT_ID)
    }

    pub fn set_tree_current_id(&self, id: NodeId) -> Result<()> {
        self.set_raw(bucket::TREE_CURRENT_ID, &id.to_string())
    }

    pub fn get_tree_counter(&self) -> Result<Option<u64>> {
        self.get_u64(bucket::TREE_NODE_COUNTER)
    }

    pub fn set_tree_counter(&self, counter: u64) -> Result<()> {
        self.set_raw(bucket::TREE_NODE_COUNTER, &counter.to_string())
    }

    pub fn clear_tree(&self) -> Result<()> {
        self.clear_many(&[
            bucket::TREE_NODES,
            bucket::TREE_ROOT_ID,
            bucket::TREE_CURRENT_ID,
            bucket::TREE_NODE_COUNTER,
        ])
    }

    // ============================================================
    // Collection
    // ============================================================

    pub fn get_collections(&self) -> Result<Option<Vec<CollectionItem>>> {
        self.get_json(bucket::COLLECTIONS)
    }

    pub fn set_collections(&self, items: &[CollectionItem]) -> Result<()> {
        self.set_json(bucket::COLLECTIONS, &items)
    }

    pub fn clear_collections(&self) -> Result<()> {
        self.clear_raw(bucket::COLLECTIONS)
    }

    // ============================================================
    // Consolidated view
    // ============================================================

    pub fn get_consolidated_text(&self) -> Result<Option<String>> {
        self.get_raw(bucket::CONSOLIDATED_TEXT)
    }

    pub fn set_consolidated_text(&self, text: &str) -> Result<()> {
        self.set_raw(bucket::CONSOLIDATED_TEXT, text)
    }

    pub fn get_consolidated_signature(&self) -> Result<Option<String>> {
        self.get_raw(bucket::CONSOLIDATED_SIGNATURE)
    }

    pub fn set_consolidated_signature(&self, signature: &str) -> Result<()> {
        self.set_raw(bucket::CONSOLIDATED_SIGNATURE, signature)
    }

    pub fn clear_consolidated(&self) -> Result<()> {
        self.clear_many(&[bucket::CONSOLIDATED_TEXT, bucket::CONSOLIDATED_SIGNATURE])
    }

    // ============================================================
    // Session
    // ============================================================

    pub fn set_session_content(&self, content: &str) -> Result<()> {
        self.set_raw(bucket::SESSION_CONTENT, content)
    }

    pub fn get_auto_submit(&self) -> Result<Option<bool>> {
        Ok(self
            .get_raw(bucket::SESSION_AUTO_SUBMIT)?
            .map(|raw| raw == "true"))
    }

    pub fn set_auto_submit(&self, enabled: bool) -> Result<()> {
        self.set_raw(bucket::SESSION_AUTO_SUBMIT, if enabled { "true" } else { "false" })
    }

    pub fn get_selection_counter(&self) -> Result<Option<u64>> {
        self.get_u64(bucket::SESSION_SELECTION_COUNTER)
    }

    pub fn set_selection_counter(&self, counter: u64) -> Result<()> {
        self.set_raw(bucket::SESSION_SELECTION_COUNTER, &counter.to_string())
    }

    pub fn clear_session(&self) -> Result<()> {
        self.clear_many(&[bucket::SESSION_CONTENT, bucket::SESSION_SELECTION_COUNTER])
    }

    // ============================================================
    // Annotations
    // ============================================================

    pub fn get_annotations(&self) -> Result<Option<Vec<Annotation>>> {
        self.get_json(bucket::ANNOTATIONS)
    }

    pub fn set_annotations(&self, annotations: &[Annotation]) -> Result<()> {
        self.set_json(bucket::ANNOTATIONS, &annotations)
    }

    pub fn clear_annotations(&self) -> Result<()> {
        self.clear_raw(bucket::ANNOTATIONS)
    }
}

impl Clone for Store {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

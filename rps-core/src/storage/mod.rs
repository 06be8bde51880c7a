pub mod session_store;

pub use session_store::{SessionRecord, SessionStore};

use crate::error::Result;
use rusqlite::Connection;
use std::path::Path;
use tokio::sync::Mutex;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let conn = Connection::open(db_path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                game TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                metadata TEXT NOT NULL,
                result TEXT
            )",
            [],
        )?;

        // Finalized events, one row per ledger slot
        conn.execute(
            "CREATE TABLE IF NOT EXISTS events (
                session_id TEXT NOT NULL,
                idx INTEGER NOT NULL,
                tag INTEGER NOT NULL,
                sender TEXT NOT NULL,
                value INTEGER NOT NULL,
                tick INTEGER NOT NULL,
                payload TEXT NOT NULL,
                transfers TEXT NOT NULL,
                escrow INTEGER NOT NULL,
                FOREIGN KEY (session_id) REFERENCES sessions(id),
                PRIMARY KEY (session_id, idx)
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}

use crate::error::{CoreError, Result};
use crate::ledger::FinalizedEvent;
use crate::storage::Storage;
use crate::types::{Amount, PartyId, Tick, Transfer};
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub game: String,
    pub created_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
    pub result: Option<String>,
}

pub struct SessionStore<'a> {
    storage: &'a Storage,
}

impl<'a> SessionStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn save_session(&self, record: &SessionRecord) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT OR REPLACE INTO sessions (id, game, created_at, metadata, result)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id,
                record.game,
                record.created_at.timestamp(),
                serde_json::to_string(&record.metadata)?,
                record.result,
            ],
        )?;

        Ok(())
    }

    pub async fn load_session(&self, session_id: &str) -> Result<SessionRecord> {
        let conn = self.storage.get_connection().await;

        let result = conn.query_row(
            "SELECT id, game, created_at, metadata, result FROM sessions WHERE id = ?1",
            params![session_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            },
        );

        match result {
            Ok(row) => session_from_row(row),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(CoreError::SessionNotFound {
                id: session_id.to_string(),
            }),
            Err(e) => Err(CoreError::Storage(e)),
        }
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionRecord>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT id, game, created_at, metadata, result
             FROM sessions ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(session_from_row(row?)?);
        }

        Ok(sessions)
    }

    /// Persist finalized events. Slots already stored are left untouched.
    pub async fn append_events<T: Serialize>(
        &self,
        session_id: &str,
        events: &[FinalizedEvent<T>],
    ) -> Result<()> {
        let conn = self.storage.get_connection().await;

        for event in events {
            conn.execute(
                "INSERT OR IGNORE INTO events
                 (session_id, idx, tag, sender, value, tick, payload, transfers, escrow)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    session_id,
                    event.index as i64,
                    event.tag,
                    event.from.as_str(),
                    event.value.to_units() as i64,
                    event.tick.value() as i64,
                    serde_json::to_string(&event.payload)?,
                    serde_json::to_string(&event.transfers)?,
                    event.escrow.to_units() as i64,
                ],
            )?;
        }

        tracing::debug!("Stored {} events for session {}", events.len(), session_id);
        Ok(())
    }

    /// Load a session's log in ledger order.
    pub async fn load_events<T: DeserializeOwned>(
        &self,
        session_id: &str,
    ) -> Result<Vec<FinalizedEvent<T>>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT idx, tag, sender, value, tick, payload, transfers, escrow
             FROM events WHERE session_id = ?1 ORDER BY idx ASC",
        )?;

        let rows = stmt.query_map(params![session_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, u8>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, i64>(7)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (index, tag, sender, value, tick, payload, transfers, escrow) = row?;
            let transfers: Vec<Transfer> = serde_json::from_str(&transfers)?;
            events.push(FinalizedEvent {
                index: index as u64,
                tag,
                from: PartyId::new(sender),
                value: Amount::from_units(value as u64),
                payload: serde_json::from_str(&payload)?,
                tick: Tick::new(tick as u64),
                transfers,
                escrow: Amount::from_units(escrow as u64),
            });
        }

        Ok(events)
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let conn = self.storage.get_connection().await;

        // Delete in order due to foreign key constraints
        conn.execute(
            "DELETE FROM events WHERE session_id = ?1",
            params![session_id],
        )?;
        conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;

        Ok(())
    }
}

fn session_from_row(
    (id, game, created_at, metadata, result): (String, String, i64, String, Option<String>),
) -> Result<SessionRecord> {
    Ok(SessionRecord {
        id,
        game,
        created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
        metadata: serde_json::from_str(&metadata)?,
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn event(index: u64, payload: &str) -> FinalizedEvent<String> {
        FinalizedEvent {
            index,
            tag: index as u8 + 1,
            from: PartyId::new("alice"),
            value: Amount::from_units(7),
            payload: payload.to_string(),
            tick: Tick::new(index * 3),
            transfers: vec![Transfer::new(PartyId::new("bob"), Amount::from_units(2))],
            escrow: Amount::from_units(5),
        }
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(&temp_dir.path().join("rps.db")).await.unwrap();
        let store = SessionStore::new(&storage);

        let record = SessionRecord {
            id: "s-1".to_string(),
            game: "rock-paper-scissors".to_string(),
            created_at: Utc::now(),
            metadata: serde_json::json!({ "wager": 10 }),
            result: None,
        };
        store.save_session(&record).await.unwrap();
        store
            .append_events("s-1", &[event(0, "propose"), event(1, "accept")])
            .await
            .unwrap();
        // re-appending an overlapping prefix is a no-op
        store
            .append_events("s-1", &[event(1, "accept"), event(2, "commit")])
            .await
            .unwrap();

        let events: Vec<FinalizedEvent<String>> = store.load_events("s-1").await.unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1], event(1, "accept"));
        assert_eq!(events[2].payload, "commit");

        let loaded = store.load_session("s-1").await.unwrap();
        assert_eq!(loaded.metadata["wager"], 10);
        assert_eq!(store.list_sessions().await.unwrap().len(), 1);

        store.delete_session("s-1").await.unwrap();
        assert!(matches!(
            store.load_session("s-1").await,
            Err(CoreError::SessionNotFound { .. })
        ));
    }
}

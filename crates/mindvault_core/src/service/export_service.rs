//! Export, import, integrity and wipe operations.
//!
//! # Responsibility
//! - Serialize the full store to a structured document, optionally sealed
//!   with authenticated encryption keyed by the key manager.
//! - Restore a store from an export, reproducing row sets exactly.
//! - Validate structural invariants and perform the full privacy wipe.
//!
//! # Invariants
//! - Requesting encryption without an available key fails closed.
//! - Import replaces all rows inside one transaction or not at all.
//! - After `wipe_all` every table is empty, the old key is destroyed, and the
//!   store stays open and writable under a freshly rotated key.

use crate::db::txn::run_in_transaction;
use crate::db::{migrations, open::now_unix_ms};
use crate::keys::{hex_key, EncryptionKey, KeyManager};
use crate::model::core::{AggregateCoreRecord, CoreTransitionEvent};
use crate::model::journal::JournalRecord;
use crate::repo::core_repo::{CoreRepository, SqliteCoreRepository};
use crate::repo::journal_repo::{JournalRepository, SqliteJournalRepository};
use crate::repo::{StoreError, StoreResult};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::{info, warn};
use rand::rngs::OsRng;
use rand::RngCore;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;

const REQUIRED_TABLES: [&str; 3] = [
    "journal_entries",
    "aggregate_cores",
    "core_transition_history",
];

/// Full-store export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    /// Unix epoch milliseconds at export time.
    pub exported_at: i64,
    /// Schema version the rows were exported under.
    pub version: u32,
    pub journal_entries: Vec<JournalRecord>,
    pub aggregate_cores: Vec<AggregateCoreRecord>,
    pub transition_history: Vec<CoreTransitionEvent>,
}

/// Wrapper emitted for encrypted exports.
#[derive(Debug, Serialize, Deserialize)]
struct EncryptedEnvelope {
    encrypted: bool,
    nonce: String,
    data: String,
    signature: String,
}

/// Export/integrity service over a migrated store connection.
pub struct ExportService {
    key_manager: KeyManager,
}

impl ExportService {
    pub fn new(key_manager: KeyManager) -> Self {
        Self { key_manager }
    }

    /// Checks that all required tables exist and no row violates a basic
    /// structural invariant.
    pub fn validate_integrity(&self, conn: &Connection) -> StoreResult<bool> {
        for table in REQUIRED_TABLES {
            if !table_exists(conn, table)? {
                warn!("event=integrity_check module=export status=failed missing_table={table}");
                return Ok(false);
            }
        }

        let bad_journal_rows: i64 = conn.query_row(
            "SELECT COUNT(*)
             FROM journal_entries
             WHERE TRIM(id) = '' OR TRIM(content) = '' OR TRIM(entry_date) = '';",
            [],
            |row| row.get(0),
        )?;
        if bad_journal_rows > 0 {
            warn!(
                "event=integrity_check module=export status=failed bad_journal_rows={bad_journal_rows}"
            );
            return Ok(false);
        }

        let bad_core_rows: i64 = conn.query_row(
            "SELECT COUNT(*)
             FROM aggregate_cores
             WHERE current_level < 0.0 OR current_level > 1.0
                OR previous_level < 0.0 OR previous_level > 1.0;",
            [],
            |row| row.get(0),
        )?;
        if bad_core_rows > 0 {
            warn!(
                "event=integrity_check module=export status=failed bad_core_rows={bad_core_rows}"
            );
            return Ok(false);
        }

        Ok(true)
    }

    /// Serializes every table into the export document.
    ///
    /// With `encrypted` the document is sealed with AES-256-GCM under the
    /// managed key and carries a keyed SHA-256 signature; a missing or
    /// unavailable key is a `Security` error, never a plaintext fallback.
    pub fn export_all(&self, conn: &mut Connection, encrypted: bool) -> StoreResult<Vec<u8>> {
        let document = self.collect_document(conn)?;
        let plaintext = serde_json::to_vec(&document)
            .map_err(|err| StoreError::InvalidData(format!("export serialization: {err}")))?;

        if !encrypted {
            info!(
                "event=export module=export status=ok encrypted=false entries={}",
                document.journal_entries.len()
            );
            return Ok(plaintext);
        }

        let key = self.key_manager.get_or_create_key()?;
        let envelope = seal(&key, &plaintext)?;
        let bytes = serde_json::to_vec(&envelope)
            .map_err(|err| StoreError::InvalidData(format!("export serialization: {err}")))?;
        info!(
            "event=export module=export status=ok encrypted=true entries={}",
            document.journal_entries.len()
        );
        Ok(bytes)
    }

    /// Restores the store from an export produced by [`Self::export_all`].
    ///
    /// Detects the encrypted envelope, verifies its signature, decrypts, and
    /// replaces every table's rows in one transaction. Row values (ids and
    /// timestamps included) are restored verbatim.
    pub fn import_all(&self, conn: &mut Connection, bytes: &[u8]) -> StoreResult<()> {
        let document = self.decode_document(bytes)?;

        run_in_transaction(conn, |tx| {
            tx.execute("DELETE FROM core_transition_history;", [])?;
            tx.execute("DELETE FROM journal_entries;", [])?;
            tx.execute("DELETE FROM aggregate_cores;", [])?;

            for core in &document.aggregate_cores {
                tx.execute(
                    "INSERT INTO aggregate_cores (
                        id, name, description, current_level, previous_level,
                        last_updated, last_transition_date, entries_at_current_depth,
                        trend, color, icon_path, insight, related_cores,
                        transition_signals, supporting_evidence, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17);",
                    params![
                        core.id.as_str(),
                        core.name,
                        core.description,
                        core.current_level,
                        core.previous_level,
                        core.last_updated,
                        core.last_transition_date,
                        core.entries_at_current_depth,
                        core.trend.as_str(),
                        core.color,
                        core.icon_path,
                        core.insight,
                        serde_json::to_string(
                            &core.related_cores.iter().map(|c| c.as_str()).collect::<Vec<_>>()
                        )
                        .unwrap_or_else(|_| "[]".to_string()),
                        core.transition_signals,
                        core.supporting_evidence,
                        core.created_at,
                        core.updated_at,
                    ],
                )?;
            }

            for entry in &document.journal_entries {
                tx.execute(
                    "INSERT INTO journal_entries (
                        id, user_id, entry_date, content, moods, day_of_week,
                        created_at, updated_at, is_synced, metadata, draft_content, status
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
                    params![
                        entry.id.to_string(),
                        entry.user_id,
                        entry.entry_date,
                        entry.content,
                        serde_json::to_string(
                            &entry.moods.iter().map(|m| m.as_str()).collect::<Vec<_>>()
                        )
                        .unwrap_or_else(|_| "[]".to_string()),
                        entry.day_of_week,
                        entry.created_at,
                        entry.updated_at,
                        entry.is_synced as i64,
                        serde_json::to_string(&entry.metadata)
                            .unwrap_or_else(|_| "{}".to_string()),
                        entry.draft_content.as_deref(),
                        entry.status.as_str(),
                    ],
                )?;
            }

            for event in &document.transition_history {
                tx.execute(
                    "INSERT INTO core_transition_history (
                        id, core_id, from_depth, to_depth, transition_date,
                        contributing_entry_id, transition_reason
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                    params![
                        event.id,
                        event.core_id.as_str(),
                        event.from_depth,
                        event.to_depth,
                        event.transition_date,
                        event.contributing_entry_id.map(|id| id.to_string()),
                        event.transition_reason,
                    ],
                )?;
            }

            Ok(())
        })?;

        info!(
            "event=import module=export status=ok entries={}",
            document.journal_entries.len()
        );
        Ok(())
    }

    /// Deletes all rows from every table, resets auto-increment state and
    /// rotates the encryption key.
    ///
    /// The pre-wipe key is destroyed, so exports sealed with it become
    /// undecryptable. The store file is rekeyed to the fresh key and stays
    /// open and writable.
    pub fn wipe_all(&self, conn: &mut Connection) -> StoreResult<()> {
        run_in_transaction(conn, |tx| {
            tx.execute("DELETE FROM core_transition_history;", [])?;
            tx.execute("DELETE FROM journal_entries;", [])?;
            tx.execute("DELETE FROM aggregate_cores;", [])?;
            // sqlite_sequence only exists once an AUTOINCREMENT row was ever
            // written.
            let has_sequence: i64 = tx.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM sqlite_master
                    WHERE type = 'table' AND name = 'sqlite_sequence'
                );",
                [],
                |row| row.get(0),
            )?;
            if has_sequence == 1 {
                tx.execute("DELETE FROM sqlite_sequence;", [])?;
            }
            Ok(())
        })?;

        // The key lives outside the database transaction; rotate it last so a
        // failed wipe never leaves data without its key.
        self.key_manager.delete_key()?;
        match self.key_manager.get_or_create_key() {
            Ok(new_key) => {
                // Encrypted store files must follow the rotation or the next
                // open cannot read them. Rekey is a no-op concern for memory
                // and plaintext stores.
                if let Err(err) =
                    conn.execute_batch(&format!("PRAGMA rekey = \"x'{}'\";", hex_key(&new_key)))
                {
                    warn!("event=wipe module=export status=degraded detail=rekey_failed error={err}");
                }
            }
            Err(err) => {
                warn!(
                    "event=wipe module=export status=degraded detail=key_rotation_failed error={err}"
                );
            }
        }
        info!("event=wipe module=export status=ok");
        Ok(())
    }

    fn collect_document(&self, conn: &mut Connection) -> StoreResult<ExportDocument> {
        let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
        let aggregate_cores = SqliteCoreRepository::new(conn).list_all()?;
        let transition_history = SqliteCoreRepository::new(conn).transition_history_all()?;
        let journal_entries = SqliteJournalRepository::new(conn).get_all()?;

        debug_assert!(version <= migrations::latest_version());
        Ok(ExportDocument {
            exported_at: now_unix_ms(),
            version,
            journal_entries,
            aggregate_cores,
            transition_history,
        })
    }

    fn decode_document(&self, bytes: &[u8]) -> StoreResult<ExportDocument> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|err| StoreError::InvalidData(format!("malformed export: {err}")))?;

        let plaintext = if value.get("encrypted").and_then(|v| v.as_bool()) == Some(true) {
            let envelope: EncryptedEnvelope = serde_json::from_value(value)
                .map_err(|err| StoreError::InvalidData(format!("malformed envelope: {err}")))?;
            let key = self.key_manager.get_or_create_key()?;
            unseal(&key, &envelope)?
        } else {
            bytes.to_vec()
        };

        serde_json::from_slice(&plaintext)
            .map_err(|err| StoreError::InvalidData(format!("malformed export document: {err}")))
    }
}

fn seal(key: &EncryptionKey, plaintext: &[u8]) -> StoreResult<EncryptedEnvelope> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| StoreError::InvalidData("cipher setup failed".to_string()))?;
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| StoreError::InvalidData("export encryption failed".to_string()))?;

    Ok(EncryptedEnvelope {
        encrypted: true,
        nonce: BASE64.encode(nonce_bytes),
        signature: BASE64.encode(sign(key, &nonce_bytes, &ciphertext)),
        data: BASE64.encode(ciphertext),
    })
}

fn unseal(key: &EncryptionKey, envelope: &EncryptedEnvelope) -> StoreResult<Vec<u8>> {
    let nonce_bytes = BASE64
        .decode(envelope.nonce.as_bytes())
        .map_err(|_| StoreError::InvalidData("malformed export nonce".to_string()))?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(StoreError::InvalidData(
            "malformed export nonce".to_string(),
        ));
    }
    let ciphertext = BASE64
        .decode(envelope.data.as_bytes())
        .map_err(|_| StoreError::InvalidData("malformed export payload".to_string()))?;
    let signature = BASE64
        .decode(envelope.signature.as_bytes())
        .map_err(|_| StoreError::InvalidData("malformed export signature".to_string()))?;

    if signature != sign(key, &nonce_bytes, &ciphertext) {
        return Err(StoreError::InvalidData(
            "export signature mismatch".to_string(),
        ));
    }

    let nonce = Nonce::from_slice(&nonce_bytes);
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| StoreError::InvalidData("cipher setup failed".to_string()))?;
    cipher
        .decrypt(nonce, ciphertext.as_ref())
        .map_err(|_| StoreError::InvalidData("export decryption failed".to_string()))
}

/// Keyed integrity signature over the sealed payload.
fn sign(key: &EncryptionKey, nonce: &[u8], ciphertext: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(key);
    hasher.update(nonce);
    hasher.update(ciphertext);
    hasher.finalize().to_vec()
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON document reads and upserts.

use rusqlite::{OptionalExtension, params};
use threadlink_core::BridgeError;

use crate::database::{Database, storage_err};

/// Fetch the raw JSON body stored under `namespace`.
pub async fn get_document(db: &Database, namespace: &str) -> Result<Option<String>, BridgeError> {
    let namespace = namespace.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
            conn.query_row(
                "SELECT body FROM documents WHERE namespace = ?1",
                params![namespace],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(storage_err)
}

/// Insert or replace the document stored under `namespace`.
pub async fn put_document(db: &Database, namespace: &str, body: String) -> Result<(), BridgeError> {
    let namespace = namespace.to_string();
    let updated_at = chrono::Utc::now().to_rfc3339();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO documents (namespace, body, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(namespace) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
                params![namespace, body, updated_at],
            )?;
            Ok(())
        })
        .await
        .map_err(storage_err)
}

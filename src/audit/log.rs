use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::AppError;
use crate::models::AuditLogEntry;

pub fn append_audit(
  conn: &Connection,
  action: &str,
  entity_type: &str,
  entity_id: Option<String>,
  payload_json: String,
) -> Result<(), AppError> {
  let ts = Utc::now().to_rfc3339();
  conn.execute(
    "INSERT INTO audit_log (ts, action, entity_type, entity_id, payload_json) VALUES (?1, ?2, ?3, ?4, ?5)",
    params![ts, action, entity_type, entity_id, payload_json],
  )?;
  Ok(())
}

pub fn list_audit(conn: &Connection, limit: usize) -> Result<Vec<AuditLogEntry>, AppError> {
  let mut stmt = conn.prepare(
    "SELECT id, ts, action, entity_type, entity_id, payload_json FROM audit_log ORDER BY id DESC LIMIT ?1",
  )?;
  let rows = stmt.query_map(params![limit as i64], |row| {
    Ok(AuditLogEntry {
      id: row.get(0)?,
      ts: row.get(1)?,
      action: row.get(2)?,
      entity_type: row.get(3)?,
      entity_id: row.get(4)?,
      payload_json: row.get(5)?,
    })
  })?;

  let mut entries = Vec::new();
  for row in rows {
    entries.push(row?);
  }
  Ok(entries)
}

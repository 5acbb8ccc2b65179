use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::AppError;
use crate::files::photos;
use crate::settings::Settings;

pub struct Db {
  pub conn: Mutex<Connection>,
  pub db_path: PathBuf,
}

pub fn resolve_app_dir(settings: &Settings) -> Result<PathBuf, AppError> {
  if let Some(dir) = &settings.data_dir {
    fs::create_dir_all(dir)?;
    return Ok(dir.clone());
  }
  if let Some(portable) = resolve_portable_dir(settings.portable)? {
    return Ok(portable);
  }

  let base = dirs_next::data_local_dir()
    .ok_or_else(|| AppError::Storage("no local data directory available".to_string()))?;
  Ok(base.join("MealRecordStore"))
}

pub fn init_db(app_dir: &Path) -> Result<(Db, PathBuf), AppError> {
  fs::create_dir_all(app_dir)?;
  let db_path = app_dir.join("meal_records.sqlite");
  let mut conn = open_connection(&db_path)?;

  run_migrations(&mut conn)?;

  let photo_base = photos::ensure_photo_base(app_dir)?;
  tracing::info!(path = %db_path.display(), "database ready");

  Ok((
    Db {
      conn: Mutex::new(conn),
      db_path,
    },
    photo_base,
  ))
}

pub fn with_conn<T>(db: &Db, f: impl FnOnce(&mut Connection) -> Result<T, AppError>) -> Result<T, AppError> {
  let mut guard = db.conn.lock()?;
  f(&mut guard)
}

pub fn checkpoint(conn: &Connection) -> Result<(), AppError> {
  conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
  Ok(())
}

fn open_connection(db_path: &Path) -> Result<Connection, AppError> {
  let conn = Connection::open(db_path)?;
  conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
  conn.busy_timeout(Duration::from_secs(5))?;
  Ok(conn)
}

fn run_migrations(conn: &mut Connection) -> Result<(), AppError> {
  conn.execute_batch(
    "CREATE TABLE IF NOT EXISTS schema_migrations (version TEXT PRIMARY KEY, applied_at TEXT NOT NULL)",
  )?;

  apply_migration(conn, "001_init", include_str!("../migrations/001_init.sql"))?;
  Ok(())
}

fn apply_migration(conn: &mut Connection, version: &str, sql: &str) -> Result<(), AppError> {
  let exists: i64 = conn.query_row(
    "SELECT COUNT(*) FROM schema_migrations WHERE version = ?1",
    params![version],
    |row| row.get(0),
  )?;
  if exists > 0 {
    return Ok(());
  }

  let tx = conn.transaction()?;
  tx.execute_batch(sql)?;
  tx.execute(
    "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
    params![version, Utc::now().to_rfc3339()],
  )?;
  tx.commit()?;
  tracing::info!(version, "applied migration");
  Ok(())
}

fn resolve_portable_dir(env_enabled: bool) -> Result<Option<PathBuf>, AppError> {
  let exe_dir = std::env::current_exe()
    .ok()
    .and_then(|path| path.parent().map(|parent| parent.to_path_buf()));

  if let Some(exe_dir) = exe_dir {
    let flag = exe_dir.join("portable.flag");
    let data_dir = exe_dir.join("data");
    if env_enabled || flag.exists() || data_dir.exists() {
      fs::create_dir_all(&data_dir)?;
      return Ok(Some(data_dir));
    }
  }

  Ok(None)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn init_creates_schema_and_photo_dir() {
    let dir = tempfile::tempdir().unwrap();
    let (db, photo_base) = init_db(dir.path()).unwrap();
    assert!(db.db_path.exists());
    assert!(photo_base.is_dir());

    let tables: i64 = with_conn(&db, |conn| {
      Ok(conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('records', 'audit_log')",
        [],
        |row| row.get(0),
      )?)
    })
    .unwrap();
    assert_eq!(tables, 2);
  }

  #[test]
  fn migrations_apply_once() {
    let dir = tempfile::tempdir().unwrap();
    drop(init_db(dir.path()).unwrap());
    let (db, _) = init_db(dir.path()).unwrap();
    let applied: i64 = with_conn(&db, |conn| {
      Ok(conn.query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))?)
    })
    .unwrap();
    assert_eq!(applied, 1);
  }

  #[test]
  fn explicit_data_dir_wins() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("nested");
    let settings = Settings {
      data_dir: Some(target.clone()),
      ..Settings::default()
    };
    assert_eq!(resolve_app_dir(&settings).unwrap(), target);
    assert!(target.is_dir());
  }
}

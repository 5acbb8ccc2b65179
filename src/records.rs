use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::audit::log::append_audit;
use crate::catalog::Catalog;
use crate::domain::validation;
use crate::error::AppError;
use crate::models::{NewRecordInput, Record, RecordView};

const DATE_FORMAT: &str = "%Y-%m-%d";
const RECORD_COLUMNS: &str = "id, catalog_item_id, date, memo, photo_ref, created_at";

struct RecordRow {
  id: i64,
  catalog_item_id: i64,
  date: String,
  memo: Option<String>,
  photo_ref: Option<String>,
  created_at: String,
}

impl RecordRow {
  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id: row.get(0)?,
      catalog_item_id: row.get(1)?,
      date: row.get(2)?,
      memo: row.get(3)?,
      photo_ref: row.get(4)?,
      created_at: row.get(5)?,
    })
  }

  fn into_record(self) -> Result<Record, AppError> {
    let date = NaiveDate::parse_from_str(&self.date, DATE_FORMAT)
      .map_err(|err| AppError::Storage(format!("record {} has a corrupt date: {err}", self.id)))?;
    let created_at = DateTime::parse_from_rfc3339(&self.created_at)
      .map(|value| value.with_timezone(&Utc))
      .map_err(|err| AppError::Storage(format!("record {} has a corrupt timestamp: {err}", self.id)))?;
    let catalog_item_id = u32::try_from(self.catalog_item_id)
      .map_err(|_| AppError::Storage(format!("record {} has a corrupt catalog id", self.id)))?;
    Ok(Record {
      id: self.id,
      catalog_item_id,
      date,
      memo: self.memo,
      photo_ref: self.photo_ref,
      created_at,
    })
  }
}

pub fn create(conn: &mut Connection, catalog: &Catalog, input: NewRecordInput) -> Result<Record, AppError> {
  create_at(conn, catalog, input, Utc::now())
}

pub(crate) fn create_at(
  conn: &mut Connection,
  catalog: &Catalog,
  input: NewRecordInput,
  now: DateTime<Utc>,
) -> Result<Record, AppError> {
  if !catalog.contains(input.catalog_item_id) {
    return Err(AppError::InvalidReference(input.catalog_item_id.to_string()));
  }
  let date = validation::parse_date(&input.date)?;
  let memo = validation::normalize_optional(input.memo);
  let photo_ref = validation::normalize_optional(input.photo_ref);
  // Stored with microsecond precision, so keep the returned value identical to what a read yields.
  let created_at = now.trunc_subsecs(6);

  let tx = conn.transaction()?;
  tx.execute(
    "INSERT INTO records (catalog_item_id, date, memo, photo_ref, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
    params![
      input.catalog_item_id,
      date.format(DATE_FORMAT).to_string(),
      memo,
      photo_ref,
      created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
    ],
  )?;
  let id = tx.last_insert_rowid();

  let record = Record {
    id,
    catalog_item_id: input.catalog_item_id,
    date,
    memo,
    photo_ref,
    created_at,
  };
  let payload_json = serde_json::to_string(&record).unwrap_or_else(|_| "{}".to_string());
  append_audit(&tx, "CREATE_RECORD", "RECORD", Some(id.to_string()), payload_json)?;

  tx.commit()?;
  Ok(record)
}

pub fn get(conn: &Connection, id: i64) -> Result<Record, AppError> {
  let row = conn
    .query_row(
      &format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1"),
      params![id],
      RecordRow::from_row,
    )
    .optional()?;
  match row {
    Some(row) => row.into_record(),
    None => Err(AppError::NotFound(format!("record {id}"))),
  }
}

pub fn delete(conn: &mut Connection, id: i64) -> Result<(), AppError> {
  let tx = conn.transaction()?;
  let removed = tx.execute("DELETE FROM records WHERE id = ?1", params![id])?;
  if removed == 0 {
    return Err(AppError::NotFound(format!("record {id}")));
  }

  let payload_json = serde_json::json!({ "id": id }).to_string();
  append_audit(&tx, "DELETE_RECORD", "RECORD", Some(id.to_string()), payload_json)?;

  tx.commit()?;
  Ok(())
}

pub fn list(conn: &Connection) -> Result<Vec<Record>, AppError> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {RECORD_COLUMNS} FROM records ORDER BY date DESC, created_at DESC, id DESC"
  ))?;
  let rows = stmt.query_map([], RecordRow::from_row)?;

  let mut records = Vec::new();
  for row in rows {
    records.push(row?.into_record()?);
  }
  Ok(records)
}

pub fn count(conn: &Connection) -> Result<i64, AppError> {
  Ok(conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?)
}

pub fn to_view(record: Record, catalog: &Catalog) -> Result<RecordView, AppError> {
  let item = catalog.get(record.catalog_item_id).map_err(|_| {
    AppError::Storage(format!(
      "record {} references unknown catalog item {}",
      record.id, record.catalog_item_id
    ))
  })?;
  Ok(RecordView {
    menu_name: item.name.clone(),
    price: item.price,
    category: item.category,
    record,
  })
}

pub fn list_views(conn: &Connection, catalog: &Catalog) -> Result<Vec<RecordView>, AppError> {
  list(conn)?
    .into_iter()
    .map(|record| to_view(record, catalog))
    .collect()
}

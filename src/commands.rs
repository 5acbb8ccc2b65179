use std::fs;

use crate::audit::log;
use crate::db;
use crate::domain::validation;
use crate::error::AppError;
use crate::export::{csv, excel};
use crate::files::{backup, photos};
use crate::models::*;
use crate::records;
use crate::reports;
use crate::AppState;

const DEFAULT_AUDIT_LIMIT: usize = 100;

pub fn list_catalog(state: &AppState, category: Option<&str>) -> Result<Vec<CatalogItem>, AppError> {
  let filter = validation::parse_category_filter(category)?;
  Ok(state.catalog.list_by_category(filter).into_iter().cloned().collect())
}

pub fn get_catalog_item(state: &AppState, id: u32) -> Result<CatalogItem, AppError> {
  state.catalog.get(id).cloned()
}

pub fn list_categories(state: &AppState) -> Vec<CategoryInfo> {
  state.catalog.categories()
}

pub fn create_record(state: &AppState, input: NewRecordInput) -> Result<Record, AppError> {
  let record = db::with_conn(&state.db, |conn| records::create(conn, &state.catalog, input))?;
  tracing::info!(
    record_id = record.id,
    catalog_item_id = record.catalog_item_id,
    date = %record.date,
    "record created"
  );
  Ok(record)
}

pub fn get_record(state: &AppState, id: i64) -> Result<RecordView, AppError> {
  db::with_conn(&state.db, |conn| {
    let record = records::get(conn, id)?;
    records::to_view(record, &state.catalog)
  })
}

pub fn list_records(state: &AppState) -> Result<Vec<RecordView>, AppError> {
  db::with_conn(&state.db, |conn| records::list_views(conn, &state.catalog))
}

pub fn delete_record(state: &AppState, id: i64) -> Result<(), AppError> {
  db::with_conn(&state.db, |conn| records::delete(conn, id))?;
  tracing::info!(record_id = id, "record deleted");
  Ok(())
}

pub fn get_stats(state: &AppState) -> Result<Stats, AppError> {
  db::with_conn(&state.db, |conn| reports::compute_stats(conn, &state.catalog))
}

pub fn get_ranking(state: &AppState, limit: Option<&str>, category: Option<&str>) -> Result<Vec<RankingEntry>, AppError> {
  let filter = validation::parse_category_filter(category)?;
  let limit = validation::parse_limit(limit);
  db::with_conn(&state.db, |conn| reports::get_ranking(conn, &state.catalog, limit, filter))
}

pub fn upload_photo(state: &AppState, request: UploadRequest) -> Result<UploadResponse, AppError> {
  let bytes = photos::decode_base64_payload(&request.data_base64)?;
  let photo_ref = photos::store_photo(
    &state.photo_base,
    request.file_name.as_deref(),
    &request.content_type,
    &bytes,
    state.settings.photo_max_bytes,
  )?;
  tracing::info!(photo_ref = %photo_ref, size = bytes.len(), "photo stored");
  Ok(UploadResponse {
    photo_ref,
    message: "Image uploaded successfully".to_string(),
  })
}

pub fn read_photo(state: &AppState, name: &str) -> Result<(Vec<u8>, &'static str), AppError> {
  let path = photos::resolve_photo(&state.photo_base, name)?;
  let bytes = fs::read(&path)?;
  Ok((bytes, photos::content_type_for(&path)))
}

pub fn export_csv(state: &AppState) -> Result<Vec<u8>, AppError> {
  let views = list_records(state)?;
  csv::history_csv_bytes(&views)
}

pub fn export_excel(state: &AppState) -> Result<Vec<u8>, AppError> {
  let (views, stats) = db::with_conn(&state.db, |conn| {
    Ok((
      records::list_views(conn, &state.catalog)?,
      reports::compute_stats(conn, &state.catalog)?,
    ))
  })?;
  excel::history_workbook_bytes(&views, &stats)
}

pub fn create_backup(state: &AppState) -> Result<BackupResponse, AppError> {
  let path = backup::create_backup(&state.app_dir, &state.db, &state.photo_base)?;
  Ok(BackupResponse {
    path: path.to_string_lossy().to_string(),
  })
}

pub fn list_audit_log(state: &AppState, limit: Option<&str>) -> Result<Vec<AuditLogEntry>, AppError> {
  let limit = limit
    .and_then(|raw| raw.trim().parse::<usize>().ok())
    .filter(|limit| *limit > 0)
    .unwrap_or(DEFAULT_AUDIT_LIMIT);
  db::with_conn(&state.db, |conn| log::list_audit(conn, limit))
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;
  use crate::catalog::Catalog;
  use crate::settings::Settings;

  fn setup() -> (TempDir, AppState) {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::open_at(dir.path(), Settings::default(), Catalog::builtin()).unwrap();
    (dir, state)
  }

  fn input(catalog_item_id: u32, date: &str) -> NewRecordInput {
    NewRecordInput {
      catalog_item_id,
      date: date.into(),
      memo: None,
      photo_ref: None,
    }
  }

  #[test]
  fn catalog_filter_rejects_unknown_category() {
    let (_dir, state) = setup();
    assert_eq!(list_catalog(&state, Some("all")).unwrap().len(), 12);
    assert_eq!(list_catalog(&state, Some("breakfast")).unwrap().len(), 2);
    assert!(matches!(list_catalog(&state, Some("pasta")), Err(AppError::InvalidCategory(_))));
  }

  #[test]
  fn uploaded_photo_reference_is_stored_on_record() {
    let (_dir, state) = setup();
    let upload = upload_photo(
      &state,
      UploadRequest {
        file_name: Some("meal.jpg".into()),
        content_type: "image/jpeg".into(),
        data_base64: "data:image/jpeg;base64,/9j/4AAQ".into(),
      },
    )
    .unwrap();

    let record = create_record(
      &state,
      NewRecordInput {
        photo_ref: Some(upload.photo_ref.clone()),
        ..input(3, "2025-05-05")
      },
    )
    .unwrap();
    let view = get_record(&state, record.id).unwrap();
    assert_eq!(view.record.photo_ref.as_deref(), Some(upload.photo_ref.as_str()));

    let (bytes, content_type) = read_photo(&state, &upload.photo_ref).unwrap();
    assert_eq!(content_type, "image/jpeg");
    assert_eq!(bytes, vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10]);
  }

  #[test]
  fn audit_log_tracks_mutations_newest_first() {
    let (_dir, state) = setup();
    let record = create_record(&state, input(1, "2025-01-01")).unwrap();
    delete_record(&state, record.id).unwrap();

    let entries = list_audit_log(&state, None).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, "DELETE_RECORD");
    assert_eq!(entries[1].entity_id.as_deref(), Some(record.id.to_string().as_str()));
  }

  #[test]
  fn csv_export_lists_history() {
    let (_dir, state) = setup();
    create_record(&state, input(10, "2025-06-01")).unwrap();
    let text = String::from_utf8(export_csv(&state).unwrap()).unwrap();
    assert_eq!(text.lines().count(), 2);
    assert!(text.contains("納豆定食"));
  }

  #[test]
  fn backup_lands_in_backups_dir() {
    let (dir, state) = setup();
    create_record(&state, input(1, "2025-01-01")).unwrap();
    let response = create_backup(&state).unwrap();
    assert!(response.path.starts_with(&*dir.path().join("Backups").to_string_lossy()));
  }
}

use std::io::Write;

use crate::error::AppError;
use crate::models::RecordView;

pub fn write_history_csv(out: &mut impl Write, views: &[RecordView]) -> Result<(), AppError> {
  writeln!(out, "id,date,catalog_item_id,menu_name,category,price,memo,photo_ref,created_at")?;

  for view in views {
    let record = &view.record;
    writeln!(
      out,
      "{},{},{},{},{},{},{},{},{}",
      record.id,
      record.date,
      record.catalog_item_id,
      escape_csv(&view.menu_name),
      view.category.as_str(),
      view.price,
      escape_csv(record.memo.as_deref().unwrap_or("")),
      escape_csv(record.photo_ref.as_deref().unwrap_or("")),
      record.created_at.to_rfc3339()
    )?;
  }

  Ok(())
}

pub fn history_csv_bytes(views: &[RecordView]) -> Result<Vec<u8>, AppError> {
  let mut buffer = Vec::new();
  write_history_csv(&mut buffer, views)?;
  Ok(buffer)
}

fn escape_csv(value: &str) -> String {
  if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
    format!("\"{}\"", value.replace('"', "\"\""))
  } else {
    value.to_string()
  }
}

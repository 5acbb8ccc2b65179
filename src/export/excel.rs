use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, Worksheet};

use crate::error::AppError;
use crate::models::{RecordView, Stats};

pub fn history_workbook_bytes(views: &[RecordView], stats: &Stats) -> Result<Vec<u8>, AppError> {
  let mut workbook = Workbook::new();
  write_history_sheet(workbook.add_worksheet(), views)?;
  write_summary_sheet(workbook.add_worksheet(), stats)?;
  Ok(workbook.save_to_buffer()?)
}

fn write_history_sheet(sheet: &mut Worksheet, views: &[RecordView]) -> Result<(), AppError> {
  sheet.set_name("History")?;

  let header = Format::new()
    .set_bold()
    .set_background_color(Color::RGB(0xFEF3C7))
    .set_align(FormatAlign::Center);
  let money = Format::new().set_num_format("[$¥] #,##0");

  let headers = ["ID", "Date", "Menu", "Category", "Price", "Memo", "Photo"];
  for (idx, label) in headers.iter().enumerate() {
    sheet.write_string_with_format(0, idx as u16, *label, &header)?;
  }

  let mut row = 1;
  for view in views {
    let record = &view.record;
    sheet.write_number(row, 0, record.id as f64)?;
    sheet.write_string(row, 1, record.date.format("%Y-%m-%d").to_string())?;
    sheet.write_string(row, 2, &view.menu_name)?;
    sheet.write_string(row, 3, view.category.display_name())?;
    sheet.write_number_with_format(row, 4, view.price as f64, &money)?;
    sheet.write_string(row, 5, record.memo.as_deref().unwrap_or(""))?;
    sheet.write_string(row, 6, record.photo_ref.as_deref().unwrap_or(""))?;
    row += 1;
  }

  sheet.set_column_width(1, 12)?;
  sheet.set_column_width(2, 24)?;
  sheet.set_column_width(5, 40)?;
  Ok(())
}

fn write_summary_sheet(sheet: &mut Worksheet, stats: &Stats) -> Result<(), AppError> {
  sheet.set_name("Summary")?;

  let label = Format::new().set_bold();
  let money = Format::new().set_num_format("[$¥] #,##0");

  let rows = [
    ("Visits", stats.total_visits as f64, None),
    ("Total spent", stats.total_amount as f64, Some(&money)),
    ("Items tried", stats.completed_items as f64, None),
    ("Menu size", stats.total_items as f64, None),
    ("Completion %", f64::from(stats.completion_rate), None),
  ];

  for (row, (label_text, value, format)) in rows.into_iter().enumerate() {
    let row = row as u32;
    sheet.write_string_with_format(row, 0, label_text, &label)?;
    match format {
      Some(format) => sheet.write_number_with_format(row, 1, value, format)?,
      None => sheet.write_number(row, 1, value)?,
    };
  }

  sheet.set_column_width(0, 18)?;
  sheet.set_column_width(1, 14)?;
  Ok(())
}

use chrono::{Datelike, NaiveDate};

use crate::error::AppError;
use crate::models::{Category, CategoryFilter};

pub const DEFAULT_RANKING_LIMIT: usize = 10;

pub fn parse_date(date: &str) -> Result<NaiveDate, AppError> {
  let parsed = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
    .map_err(|_| AppError::InvalidDate(format!("'{date}' must be a real date in YYYY-MM-DD form")))?;
  // Stored dates sort as text, which only holds for four-digit years.
  if !(1..=9999).contains(&parsed.year()) {
    return Err(AppError::InvalidDate(format!("'{date}' is out of range")));
  }
  Ok(parsed)
}

pub fn parse_category_filter(value: Option<&str>) -> Result<CategoryFilter, AppError> {
  match value.map(str::trim) {
    None | Some("") | Some("all") => Ok(CategoryFilter::All),
    Some(raw) => raw.parse::<Category>().map(CategoryFilter::Only),
  }
}

pub fn normalize_optional(value: Option<String>) -> Option<String> {
  value.and_then(|text| {
    let trimmed = text.trim();
    if trimmed.is_empty() {
      None
    } else {
      Some(trimmed.to_string())
    }
  })
}

pub fn parse_limit(value: Option<&str>) -> usize {
  value
    .and_then(|raw| raw.trim().parse::<i64>().ok())
    .filter(|limit| *limit > 0)
    .map(|limit| limit as usize)
    .unwrap_or(DEFAULT_RANKING_LIMIT)
}

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
  Gyumeshi,
  Curry,
  Teishoku,
  Don,
  Breakfast,
}

impl Category {
  pub const ALL: [Category; 5] = [
    Category::Gyumeshi,
    Category::Curry,
    Category::Teishoku,
    Category::Don,
    Category::Breakfast,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Category::Gyumeshi => "gyumeshi",
      Category::Curry => "curry",
      Category::Teishoku => "teishoku",
      Category::Don => "don",
      Category::Breakfast => "breakfast",
    }
  }

  pub fn display_name(&self) -> &'static str {
    match self {
      Category::Gyumeshi => "牛めし",
      Category::Curry => "カレー",
      Category::Teishoku => "定食",
      Category::Don => "丼",
      Category::Breakfast => "朝食",
    }
  }
}

impl FromStr for Category {
  type Err = AppError;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    Category::ALL
      .into_iter()
      .find(|category| category.as_str() == value)
      .ok_or_else(|| AppError::InvalidCategory(value.to_string()))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryFilter {
  All,
  Only(Category),
}

impl CategoryFilter {
  pub fn matches(&self, category: Category) -> bool {
    match self {
      CategoryFilter::All => true,
      CategoryFilter::Only(wanted) => *wanted == category,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
  pub id: u32,
  pub name: String,
  pub price: i64,
  pub category: Category,
  pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInfo {
  pub id: Category,
  pub name: String,
  pub item_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
  pub id: i64,
  pub catalog_item_id: u32,
  pub date: NaiveDate,
  pub memo: Option<String>,
  pub photo_ref: Option<String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordView {
  #[serde(flatten)]
  pub record: Record,
  pub menu_name: String,
  pub price: i64,
  pub category: Category,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecordInput {
  pub catalog_item_id: u32,
  pub date: String,
  pub memo: Option<String>,
  pub photo_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
  pub total_visits: i64,
  pub total_amount: i64,
  pub completed_items: i64,
  pub total_items: i64,
  pub completion_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
  pub catalog_item_id: u32,
  pub name: String,
  pub category: Category,
  pub price: i64,
  pub record_count: i64,
  pub last_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
  pub id: i64,
  pub ts: String,
  pub action: String,
  pub entity_type: String,
  pub entity_id: Option<String>,
  pub payload_json: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
  pub file_name: Option<String>,
  pub content_type: String,
  pub data_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
  pub photo_ref: String,
  pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupResponse {
  pub path: String,
}

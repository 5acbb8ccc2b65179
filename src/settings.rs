use std::path::PathBuf;

use crate::error::AppError;

const KEY_PORT: &str = "MEAL_RECORD_PORT";
const KEY_BIND: &str = "MEAL_RECORD_BIND";
const KEY_DATA_DIR: &str = "MEAL_RECORD_DATA_DIR";
const KEY_PORTABLE: &str = "MEAL_RECORD_PORTABLE";
const KEY_ALLOWED_ORIGIN: &str = "MEAL_RECORD_ALLOWED_ORIGIN";
const KEY_PHOTO_MAX_BYTES: &str = "MEAL_RECORD_PHOTO_MAX_BYTES";
const KEY_LOG_JSON: &str = "MEAL_RECORD_LOG_JSON";

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_PHOTO_MAX_BYTES: usize = 5 << 20;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
  pub bind: String,
  pub port: u16,
  pub data_dir: Option<PathBuf>,
  pub portable: bool,
  pub allowed_origin: String,
  pub photo_max_bytes: usize,
  pub log_json: bool,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      bind: "0.0.0.0".to_string(),
      port: DEFAULT_PORT,
      data_dir: None,
      portable: false,
      allowed_origin: "http://localhost:3000".to_string(),
      photo_max_bytes: DEFAULT_PHOTO_MAX_BYTES,
      log_json: false,
    }
  }
}

impl Settings {
  pub fn from_env() -> Result<Self, AppError> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
    let mut settings = Settings::default();

    if let Some(value) = non_empty(lookup(KEY_PORT)) {
      settings.port = value
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("{KEY_PORT} must be a port number, got '{value}'")))?;
    }
    if let Some(value) = non_empty(lookup(KEY_BIND)) {
      settings.bind = value;
    }
    settings.data_dir = non_empty(lookup(KEY_DATA_DIR)).map(PathBuf::from);
    settings.portable = lookup(KEY_PORTABLE).map(|value| is_truthy(&value)).unwrap_or(false);
    if let Some(value) = non_empty(lookup(KEY_ALLOWED_ORIGIN)) {
      settings.allowed_origin = value;
    }
    if let Some(value) = non_empty(lookup(KEY_PHOTO_MAX_BYTES)) {
      settings.photo_max_bytes = value
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("{KEY_PHOTO_MAX_BYTES} must be a byte count, got '{value}'")))?;
    }
    settings.log_json = lookup(KEY_LOG_JSON).map(|value| is_truthy(&value)).unwrap_or(false);

    Ok(settings)
  }
}

fn non_empty(value: Option<String>) -> Option<String> {
  value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn is_truthy(value: &str) -> bool {
  let value = value.trim().to_ascii_lowercase();
  value == "1" || value == "true" || value == "yes"
}

use rust_xlsxwriter::XlsxError;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("unknown catalog item: {0}")]
  InvalidReference(String),
  #[error("invalid date: {0}")]
  InvalidDate(String),
  #[error("unknown category: {0}")]
  InvalidCategory(String),
  #[error("invalid photo: {0}")]
  InvalidPhoto(String),
  #[error("invalid input: {0}")]
  InvalidInput(String),
  #[error("request body too large: {0}")]
  PayloadTooLarge(String),
  #[error("not found: {0}")]
  NotFound(String),
  #[error("storage failure: {0}")]
  Storage(String),
  #[error("export failed: {0}")]
  Export(String),
}

impl AppError {
  pub fn code(&self) -> &'static str {
    match self {
      AppError::InvalidReference(_) => "INVALID_REFERENCE",
      AppError::InvalidDate(_) => "INVALID_DATE",
      AppError::InvalidCategory(_) => "INVALID_CATEGORY",
      AppError::InvalidPhoto(_) => "INVALID_PHOTO",
      AppError::InvalidInput(_) => "INVALID_INPUT",
      AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
      AppError::NotFound(_) => "NOT_FOUND",
      AppError::Storage(_) => "STORAGE_FAILURE",
      AppError::Export(_) => "EXPORT",
    }
  }

  pub fn is_retryable(&self) -> bool {
    matches!(self, AppError::Storage(_))
  }

  pub fn status_code(&self) -> u16 {
    match self {
      AppError::InvalidReference(_)
      | AppError::InvalidDate(_)
      | AppError::InvalidCategory(_)
      | AppError::InvalidPhoto(_)
      | AppError::InvalidInput(_) => 400,
      AppError::PayloadTooLarge(_) => 413,
      AppError::NotFound(_) => 404,
      AppError::Storage(_) => 503,
      AppError::Export(_) => 500,
    }
  }
}

impl Serialize for AppError {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut state = serializer.serialize_struct("AppError", 3)?;
    state.serialize_field("code", self.code())?;
    state.serialize_field("message", &self.to_string())?;
    state.serialize_field("retryable", &self.is_retryable())?;
    state.end()
  }
}

impl From<rusqlite::Error> for AppError {
  fn from(err: rusqlite::Error) -> Self {
    AppError::Storage(err.to_string())
  }
}

impl From<std::io::Error> for AppError {
  fn from(err: std::io::Error) -> Self {
    AppError::Storage(err.to_string())
  }
}

impl From<zip::result::ZipError> for AppError {
  fn from(err: zip::result::ZipError) -> Self {
    AppError::Storage(err.to_string())
  }
}

impl From<XlsxError> for AppError {
  fn from(err: XlsxError) -> Self {
    AppError::Export(err.to_string())
  }
}

impl<T> From<std::sync::PoisonError<T>> for AppError {
  fn from(_: std::sync::PoisonError<T>) -> Self {
    AppError::Storage("database lock poisoned".to_string())
  }
}

pub mod audit;
pub mod catalog;
pub mod commands;
pub mod db;
pub mod domain;
pub mod error;
pub mod export;
pub mod files;
pub mod http;
pub mod models;
pub mod records;
pub mod reports;
pub mod settings;

use std::path::{Path, PathBuf};

use catalog::Catalog;
use db::Db;
use error::AppError;
use settings::Settings;

pub struct AppState {
  pub db: Db,
  pub catalog: Catalog,
  pub app_dir: PathBuf,
  pub photo_base: PathBuf,
  pub settings: Settings,
}

impl AppState {
  pub fn open(settings: Settings) -> Result<Self, AppError> {
    let app_dir = db::resolve_app_dir(&settings)?;
    Self::open_at(&app_dir, settings, Catalog::builtin())
  }

  pub fn open_at(app_dir: &Path, settings: Settings, catalog: Catalog) -> Result<Self, AppError> {
    let (db, photo_base) = db::init_db(app_dir)?;
    Ok(Self {
      db,
      catalog,
      app_dir: app_dir.to_path_buf(),
      photo_base,
      settings,
    })
  }
}

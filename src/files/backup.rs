use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::db::{self, Db};
use crate::error::AppError;

pub fn create_backup(app_dir: &Path, db: &Db, photo_base: &Path) -> Result<PathBuf, AppError> {
  let backup_dir = app_dir.join("Backups");
  fs::create_dir_all(&backup_dir)?;

  let stamp = Utc::now().format("%Y%m%d_%H%M%S");
  let mut filename = backup_dir.join(format!("backup_{stamp}.zip"));
  let mut counter = 1;
  while filename.exists() {
    filename = backup_dir.join(format!("backup_{stamp}_{counter}.zip"));
    counter += 1;
  }

  let file = File::create(&filename)?;
  let mut zip = ZipWriter::new(file);
  let options = FileOptions::<()>::default().compression_method(zip::CompressionMethod::Deflated);

  // Hold the lock so no write lands between the checkpoint and the copy.
  db::with_conn(db, |conn| {
    db::checkpoint(conn)?;
    zip.start_file("db.sqlite", options)?;
    let mut db_file = File::open(&db.db_path)?;
    let mut buffer = Vec::new();
    db_file.read_to_end(&mut buffer)?;
    zip.write_all(&buffer)?;
    Ok(())
  })?;

  if photo_base.exists() {
    for entry in WalkDir::new(photo_base).into_iter().filter_map(Result::ok) {
      if entry.file_type().is_file() {
        let path = entry.path();
        let rel = path.strip_prefix(photo_base).unwrap_or(path);
        let archive_name = Path::new("photos").join(rel).to_string_lossy().replace('\\', "/");
        zip.start_file(archive_name, options)?;
        let mut data = Vec::new();
        File::open(path)?.read_to_end(&mut data)?;
        zip.write_all(&data)?;
      }
    }
  }

  zip.finish()?;
  tracing::info!(path = %filename.display(), "backup written");
  Ok(filename)
}

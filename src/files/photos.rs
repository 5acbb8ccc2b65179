use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};

use crate::error::AppError;

pub const PHOTO_REF_PREFIX: &str = "/photos/";
const PHOTO_DIR: &str = "photos";
const NAME_TOKEN_LEN: usize = 8;

pub fn ensure_photo_base(app_dir: &Path) -> Result<PathBuf, AppError> {
  let photo_dir = app_dir.join(PHOTO_DIR);
  fs::create_dir_all(&photo_dir)?;
  Ok(photo_dir)
}

pub fn decode_base64_payload(data: &str) -> Result<Vec<u8>, AppError> {
  let payload = match data.split_once(";base64,") {
    Some((prefix, rest)) if prefix.starts_with("data:") => rest,
    _ => data,
  };
  base64::engine::general_purpose::STANDARD
    .decode(payload.trim())
    .map_err(|err| AppError::InvalidPhoto(format!("image data is not valid base64: {err}")))
}

pub fn store_photo(
  photo_base: &Path,
  file_name: Option<&str>,
  content_type: &str,
  bytes: &[u8],
  max_bytes: usize,
) -> Result<String, AppError> {
  let ext = extension_for(content_type)
    .ok_or_else(|| AppError::InvalidPhoto("only JPEG and PNG images are allowed".to_string()))?;
  if bytes.is_empty() {
    return Err(AppError::InvalidPhoto("image is empty".to_string()));
  }
  if bytes.len() > max_bytes {
    return Err(AppError::InvalidPhoto(format!(
      "image is {} bytes, limit is {max_bytes}",
      bytes.len()
    )));
  }

  fs::create_dir_all(photo_base)?;
  let stem = file_name
    .and_then(|name| Path::new(name).file_stem())
    .and_then(|stem| stem.to_str())
    .map(sanitize_stem)
    .filter(|stem| !stem.is_empty());
  let token: String = rand::thread_rng()
    .sample_iter(&Alphanumeric)
    .take(NAME_TOKEN_LEN)
    .map(char::from)
    .collect();
  let name = match stem {
    Some(stem) => format!("{}_{token}_{stem}.{ext}", Utc::now().timestamp()),
    None => format!("{}_{token}.{ext}", Utc::now().timestamp()),
  };

  fs::write(photo_base.join(&name), bytes)?;
  Ok(format!("{PHOTO_REF_PREFIX}{name}"))
}

pub fn resolve_photo(photo_base: &Path, reference: &str) -> Result<PathBuf, AppError> {
  let name = reference.strip_prefix(PHOTO_REF_PREFIX).unwrap_or(reference);
  let valid = !name.is_empty()
    && !name.starts_with('.')
    && name
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
  if !valid {
    return Err(AppError::NotFound(format!("photo {reference}")));
  }
  let path = photo_base.join(name);
  if !path.is_file() {
    return Err(AppError::NotFound(format!("photo {reference}")));
  }
  Ok(path)
}

pub fn content_type_for(path: &Path) -> &'static str {
  match path.extension().and_then(|ext| ext.to_str()) {
    Some("png") => "image/png",
    Some("jpg") | Some("jpeg") => "image/jpeg",
    _ => "application/octet-stream",
  }
}

fn extension_for(content_type: &str) -> Option<&'static str> {
  match content_type.trim().to_ascii_lowercase().as_str() {
    "image/jpeg" | "image/jpg" => Some("jpg"),
    "image/png" => Some("png"),
    _ => None,
  }
}

fn sanitize_stem(stem: &str) -> String {
  stem
    .chars()
    .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
    .take(40)
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stores_and_resolves_png() {
    let dir = tempfile::tempdir().unwrap();
    let base = ensure_photo_base(dir.path()).unwrap();
    let reference = store_photo(&base, Some("lunch.png"), "image/png", b"\x89PNG-bytes", 1024).unwrap();
    assert!(reference.starts_with(PHOTO_REF_PREFIX));
    assert!(reference.ends_with("_lunch.png"));

    let path = resolve_photo(&base, &reference).unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"\x89PNG-bytes");
    assert_eq!(content_type_for(&path), "image/png");
  }

  #[test]
  fn rejects_other_types_and_oversized_images() {
    let dir = tempfile::tempdir().unwrap();
    let gif = store_photo(dir.path(), None, "image/gif", b"GIF89a", 1024);
    assert!(matches!(gif, Err(AppError::InvalidPhoto(_))));

    let big = store_photo(dir.path(), None, "image/jpeg", &[0u8; 16], 8);
    assert!(matches!(big, Err(AppError::InvalidPhoto(_))));
  }

  #[test]
  fn traversal_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let base = ensure_photo_base(dir.path()).unwrap();
    fs::write(dir.path().join("secret.txt"), b"x").unwrap();
    assert!(matches!(resolve_photo(&base, "/photos/../secret.txt"), Err(AppError::NotFound(_))));
    assert!(matches!(resolve_photo(&base, "missing.jpg"), Err(AppError::NotFound(_))));
  }

  #[test]
  fn decodes_data_urls() {
    assert_eq!(decode_base64_payload("data:image/png;base64,aGVsbG8=").unwrap(), b"hello");
    assert_eq!(decode_base64_payload("aGVsbG8=").unwrap(), b"hello");
    assert!(matches!(decode_base64_payload("***"), Err(AppError::InvalidPhoto(_))));
  }
}

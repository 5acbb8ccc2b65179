use std::io::{Cursor, Read};
use std::time::Instant;

use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use crate::commands;
use crate::error::AppError;
use crate::models::{NewRecordInput, UploadRequest};
use crate::AppState;

const API_PREFIX: &str = "/api/v1";
const JSON: &str = "application/json";
const BODY_OVERHEAD_BYTES: usize = 64 << 10;

#[derive(Debug)]
pub struct ApiResponse {
  pub status: u16,
  pub headers: Vec<(&'static str, String)>,
  pub body: Vec<u8>,
}

impl ApiResponse {
  pub fn json<T: Serialize>(status: u16, payload: &T) -> Self {
    let body = serde_json::to_vec(payload).unwrap_or_else(|_| b"{}".to_vec());
    Self::bytes(status, JSON, body)
  }

  pub fn bytes(status: u16, content_type: &str, body: Vec<u8>) -> Self {
    Self {
      status,
      headers: vec![("Content-Type", content_type.to_string())],
      body,
    }
  }

  pub fn empty(status: u16) -> Self {
    Self {
      status,
      headers: Vec::new(),
      body: Vec::new(),
    }
  }

  pub fn error(err: &AppError) -> Self {
    let mut response = Self::json(err.status_code(), err);
    if err.is_retryable() {
      response.headers.push(("Retry-After", "1".to_string()));
    }
    response
  }

  fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
    self.headers.push((name, value.into()));
    self
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(key, _)| key.eq_ignore_ascii_case(name))
      .map(|(_, value)| value.as_str())
  }
}

pub fn bind(state: &AppState) -> Result<Server, AppError> {
  let settings = &state.settings;
  Server::http((settings.bind.as_str(), settings.port))
    .map_err(|err| AppError::Storage(format!("cannot listen on {}:{}: {err}", settings.bind, settings.port)))
}

pub fn serve(server: &Server, state: &AppState) {
  for request in server.incoming_requests() {
    handle_request(request, state);
  }
}

pub fn local_ip_string() -> String {
  local_ip_address::local_ip()
    .map(|ip| ip.to_string())
    .unwrap_or_else(|_| "0.0.0.0".to_string())
}

fn handle_request(mut request: Request, state: &AppState) {
  let started = Instant::now();
  let method = request.method().clone();
  let url = request.url().to_string();

  let cap = max_body_bytes(state.settings.photo_max_bytes);
  let declared = request.body_length();
  let response = match read_body(request.as_reader(), declared, cap) {
    Ok(body) => route(state, &method, &url, &body),
    Err(err) => ApiResponse::error(&err),
  };

  let status = response.status;
  let response = into_tiny_response(response, &state.settings.allowed_origin);
  if let Err(err) = request.respond(response) {
    tracing::warn!(error = %err, "failed to write response");
  }
  tracing::info!(
    method = %method,
    url = %url,
    status,
    elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
    "request"
  );
}

/// Largest accepted request body: a base64-encoded photo at the configured cap plus JSON framing.
pub fn max_body_bytes(photo_max_bytes: usize) -> usize {
  photo_max_bytes.div_ceil(3) * 4 + BODY_OVERHEAD_BYTES
}

pub fn read_body(reader: impl Read, declared: Option<usize>, cap: usize) -> Result<Vec<u8>, AppError> {
  if let Some(length) = declared.filter(|length| *length > cap) {
    return Err(AppError::PayloadTooLarge(format!("{length} bytes exceeds the {cap} byte limit")));
  }
  let mut body = Vec::new();
  reader
    .take(cap as u64 + 1)
    .read_to_end(&mut body)
    .map_err(|err| AppError::InvalidInput(format!("request body could not be read: {err}")))?;
  if body.len() > cap {
    return Err(AppError::PayloadTooLarge(format!("body exceeds the {cap} byte limit")));
  }
  Ok(body)
}

pub fn route(state: &AppState, method: &Method, url: &str, body: &[u8]) -> ApiResponse {
  let (path, query) = match url.split_once('?') {
    Some((path, query)) => (path, query),
    None => (url, ""),
  };

  if *method == Method::Options {
    return ApiResponse::empty(204);
  }
  if path == "/health" {
    return match method {
      Method::Get => ApiResponse::bytes(200, "text/plain; charset=utf-8", b"OK".to_vec()),
      _ => method_not_allowed(),
    };
  }

  let Some(rest) = path.strip_prefix(API_PREFIX) else {
    return route_not_found();
  };
  let segments: Vec<&str> = rest.split('/').filter(|segment| !segment.is_empty()).collect();

  let result = match (method, segments.as_slice()) {
    (Method::Get, ["catalog"]) => {
      commands::list_catalog(state, query_param(query, "category").as_deref()).map(|items| ApiResponse::json(200, &items))
    }
    (Method::Get, ["catalog", id]) => parse_id::<u32>(id)
      .and_then(|id| commands::get_catalog_item(state, id))
      .map(|item| ApiResponse::json(200, &item)),
    (Method::Get, ["categories"]) => Ok(ApiResponse::json(200, &commands::list_categories(state))),
    (Method::Get, ["records"]) => commands::list_records(state).map(|views| ApiResponse::json(200, &views)),
    (Method::Post, ["records"]) => parse_body::<NewRecordInput>(body)
      .and_then(|input| commands::create_record(state, input))
      .map(|record| ApiResponse::json(201, &record)),
    (Method::Get, ["records", id]) => parse_id::<i64>(id)
      .and_then(|id| commands::get_record(state, id))
      .map(|view| ApiResponse::json(200, &view)),
    (Method::Delete, ["records", id]) => parse_id::<i64>(id)
      .and_then(|id| commands::delete_record(state, id))
      .map(|_| ApiResponse::empty(204)),
    (Method::Get, ["stats"]) => commands::get_stats(state).map(|stats| ApiResponse::json(200, &stats)),
    (Method::Get, ["stats", "ranking"]) => commands::get_ranking(
      state,
      query_param(query, "limit").as_deref(),
      query_param(query, "category").as_deref(),
    )
    .map(|ranking| ApiResponse::json(200, &ranking)),
    (Method::Post, ["upload"]) => parse_body::<UploadRequest>(body)
      .and_then(|request| commands::upload_photo(state, request))
      .map(|upload| ApiResponse::json(201, &upload)),
    (Method::Get, ["photos", name]) => commands::read_photo(state, name)
      .map(|(bytes, content_type)| ApiResponse::bytes(200, content_type, bytes)),
    (Method::Get, ["export", "records.csv"]) => commands::export_csv(state).map(|bytes| {
      ApiResponse::bytes(200, "text/csv; charset=utf-8", bytes)
        .with_header("Content-Disposition", "attachment; filename=\"records.csv\"")
    }),
    (Method::Get, ["export", "records.xlsx"]) => commands::export_excel(state).map(|bytes| {
      ApiResponse::bytes(200, "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet", bytes)
        .with_header("Content-Disposition", "attachment; filename=\"records.xlsx\"")
    }),
    (Method::Post, ["backup"]) => commands::create_backup(state).map(|backup| ApiResponse::json(201, &backup)),
    (Method::Get, ["audit"]) => {
      commands::list_audit_log(state, query_param(query, "limit").as_deref()).map(|entries| ApiResponse::json(200, &entries))
    }
    (_, ["catalog"] | ["catalog", _] | ["categories"] | ["records"] | ["records", _] | ["stats"])
    | (_, ["stats", "ranking"] | ["upload"] | ["photos", _] | ["export", "records.csv" | "records.xlsx"] | ["backup"] | ["audit"]) => {
      return method_not_allowed();
    }
    _ => return route_not_found(),
  };

  match result {
    Ok(response) => response,
    Err(err) => {
      if err.is_retryable() {
        tracing::warn!(error = %err, "storage failure");
      }
      ApiResponse::error(&err)
    }
  }
}

fn parse_id<T: std::str::FromStr>(raw: &str) -> Result<T, AppError> {
  raw
    .parse::<T>()
    .map_err(|_| AppError::InvalidInput(format!("'{raw}' is not a valid id")))
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
  serde_json::from_slice(body).map_err(|err| AppError::InvalidInput(format!("request body is not valid: {err}")))
}

fn query_param(query: &str, name: &str) -> Option<String> {
  query
    .split('&')
    .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
    .find(|(key, _)| *key == name)
    .map(|(_, value)| percent_decode_str(&value.replace('+', " ")).decode_utf8_lossy().to_string())
}

fn route_not_found() -> ApiResponse {
  ApiResponse::json(
    404,
    &serde_json::json!({
      "code": "ROUTE_NOT_FOUND",
      "message": "route not found",
      "retryable": false,
    }),
  )
}

fn method_not_allowed() -> ApiResponse {
  ApiResponse::json(
    405,
    &serde_json::json!({
      "code": "METHOD_NOT_ALLOWED",
      "message": "method not allowed for this route",
      "retryable": false,
    }),
  )
}

fn into_tiny_response(response: ApiResponse, allowed_origin: &str) -> Response<Cursor<Vec<u8>>> {
  let mut tiny = Response::from_data(response.body).with_status_code(StatusCode(response.status));
  let cors = [
    ("Access-Control-Allow-Origin", allowed_origin),
    ("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type, Authorization"),
    ("Access-Control-Allow-Credentials", "true"),
  ];
  let headers = response
    .headers
    .iter()
    .map(|(name, value)| (*name, value.as_str()))
    .chain(cors);
  for (name, value) in headers {
    match Header::from_bytes(name, value) {
      Ok(header) => tiny.add_header(header),
      Err(()) => tracing::warn!(header = name, "skipping invalid header value"),
    }
  }
  tiny
}

#[cfg(test)]
mod tests {
  use serde_json::Value;
  use tempfile::TempDir;

  use super::*;
  use crate::catalog::Catalog;
  use crate::settings::Settings;

  fn setup() -> (TempDir, AppState) {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::open_at(dir.path(), Settings::default(), Catalog::builtin()).unwrap();
    (dir, state)
  }

  fn json(response: &ApiResponse) -> Value {
    serde_json::from_slice(&response.body).unwrap()
  }

  fn post_record(state: &AppState, body: &str) -> ApiResponse {
    route(state, &Method::Post, "/api/v1/records", body.as_bytes())
  }

  #[test]
  fn oversized_body_is_rejected_before_reading() {
    let cap = max_body_bytes(1024);
    let err = read_body(Cursor::new(Vec::new()), Some(cap + 1), cap).unwrap_err();
    assert!(matches!(err, AppError::PayloadTooLarge(_)));
    assert_eq!(ApiResponse::error(&err).status, 413);
  }

  #[test]
  fn undeclared_body_is_cut_off_at_the_cap() {
    let cap = max_body_bytes(1024);
    let err = read_body(Cursor::new(vec![b'x'; cap + 10]), None, cap).unwrap_err();
    assert!(matches!(err, AppError::PayloadTooLarge(_)));

    let body = read_body(Cursor::new(vec![b'x'; cap]), Some(cap), cap).unwrap();
    assert_eq!(body.len(), cap);
  }

  #[test]
  fn body_cap_fits_an_encoded_photo_at_the_limit() {
    let photo_max = 5 << 20;
    assert!(max_body_bytes(photo_max) > photo_max / 3 * 4 + 1024);
  }

  #[test]
  fn health_is_plain_ok() {
    let (_dir, state) = setup();
    let response = route(&state, &Method::Get, "/health", b"");
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"OK");
  }

  #[test]
  fn catalog_supports_category_query() {
    let (_dir, state) = setup();
    let all = route(&state, &Method::Get, "/api/v1/catalog?category=all", b"");
    assert_eq!(json(&all).as_array().unwrap().len(), 12);

    let curry = route(&state, &Method::Get, "/api/v1/catalog?category=curry", b"");
    let names: Vec<String> = json(&curry)
      .as_array()
      .unwrap()
      .iter()
      .map(|item| item["name"].as_str().unwrap().to_string())
      .collect();
    assert_eq!(names, vec!["ビーフカレー", "オリジナルカレー"]);

    let bad = route(&state, &Method::Get, "/api/v1/catalog?category=pizza", b"");
    assert_eq!(bad.status, 400);
    assert_eq!(json(&bad)["code"], "INVALID_CATEGORY");
  }

  #[test]
  fn catalog_item_lookup() {
    let (_dir, state) = setup();
    let found = route(&state, &Method::Get, "/api/v1/catalog/7", b"");
    assert_eq!(found.status, 200);
    assert_eq!(json(&found)["price"], 790);
    assert_eq!(route(&state, &Method::Get, "/api/v1/catalog/77", b"").status, 404);
    assert_eq!(route(&state, &Method::Get, "/api/v1/catalog/abc", b"").status, 400);
  }

  #[test]
  fn create_list_and_delete_over_http() {
    let (_dir, state) = setup();
    let created = post_record(&state, r#"{"catalogItemId":1,"date":"2025-01-10","memo":"うまい"}"#);
    assert_eq!(created.status, 201);
    let body = json(&created);
    assert_eq!(body["catalogItemId"], 1);
    assert_eq!(body["date"], "2025-01-10");
    let id = body["id"].as_i64().unwrap();

    let listed = route(&state, &Method::Get, "/api/v1/records", b"");
    let first = &json(&listed)[0];
    assert_eq!(first["menuName"], "牛めし（並）");
    assert_eq!(first["price"], 380);

    let url = format!("/api/v1/records/{id}");
    assert_eq!(route(&state, &Method::Get, &url, b"").status, 200);
    assert_eq!(route(&state, &Method::Delete, &url, b"").status, 204);
    assert_eq!(route(&state, &Method::Delete, &url, b"").status, 404);
    assert_eq!(route(&state, &Method::Get, &url, b"").status, 404);
  }

  #[test]
  fn invalid_create_requests_are_400() {
    let (_dir, state) = setup();
    let unknown = post_record(&state, r#"{"catalogItemId":999,"date":"2025-01-10"}"#);
    assert_eq!(unknown.status, 400);
    assert_eq!(json(&unknown)["code"], "INVALID_REFERENCE");

    let bad_date = post_record(&state, r#"{"catalogItemId":1,"date":"yesterday"}"#);
    assert_eq!(bad_date.status, 400);
    assert_eq!(json(&bad_date)["code"], "INVALID_DATE");

    let garbage = post_record(&state, "not json");
    assert_eq!(garbage.status, 400);
    assert_eq!(json(&garbage)["code"], "INVALID_INPUT");

    let listed = route(&state, &Method::Get, "/api/v1/records", b"");
    assert!(json(&listed).as_array().unwrap().is_empty());
  }

  #[test]
  fn stats_and_ranking_reflect_records() {
    let (_dir, state) = setup();
    post_record(&state, r#"{"catalogItemId":1,"date":"2025-01-10"}"#);
    post_record(&state, r#"{"catalogItemId":1,"date":"2025-01-15"}"#);
    post_record(&state, r#"{"catalogItemId":4,"date":"2025-01-16"}"#);

    let stats = json(&route(&state, &Method::Get, "/api/v1/stats", b""));
    assert_eq!(stats["totalVisits"], 3);
    assert_eq!(stats["totalAmount"], 380 + 380 + 590);
    assert_eq!(stats["completedItems"], 2);
    assert_eq!(stats["completionRate"], 17);

    let ranking = json(&route(&state, &Method::Get, "/api/v1/stats/ranking?limit=1", b""));
    let ranking = ranking.as_array().unwrap();
    assert_eq!(ranking.len(), 1);
    assert_eq!(ranking[0]["catalogItemId"], 1);
    assert_eq!(ranking[0]["recordCount"], 2);
  }

  #[test]
  fn updates_are_not_supported() {
    let (_dir, state) = setup();
    let response = route(&state, &Method::Put, "/api/v1/records/1", b"{}");
    assert_eq!(response.status, 405);
  }

  #[test]
  fn unknown_routes_are_404_and_preflight_is_204() {
    let (_dir, state) = setup();
    assert_eq!(route(&state, &Method::Get, "/api/v1/menus", b"").status, 404);
    assert_eq!(route(&state, &Method::Get, "/records", b"").status, 404);
    assert_eq!(route(&state, &Method::Options, "/api/v1/records", b"").status, 204);
  }

  #[test]
  fn upload_then_fetch_photo() {
    let (_dir, state) = setup();
    let upload = route(
      &state,
      &Method::Post,
      "/api/v1/upload",
      br#"{"fileName":"a.png","contentType":"image/png","dataBase64":"iVBORw0KGgo="}"#,
    );
    assert_eq!(upload.status, 201);
    let photo_ref = json(&upload)["photoRef"].as_str().unwrap().to_string();

    let fetched = route(&state, &Method::Get, &format!("/api/v1{photo_ref}"), b"");
    assert_eq!(fetched.status, 200);
    assert_eq!(fetched.header("content-type"), Some("image/png"));
    assert_eq!(fetched.body, b"\x89PNG\r\n\x1a\n");

    let rejected = route(
      &state,
      &Method::Post,
      "/api/v1/upload",
      br#"{"contentType":"image/gif","dataBase64":"R0lGODlh"}"#,
    );
    assert_eq!(rejected.status, 400);
    assert_eq!(json(&rejected)["code"], "INVALID_PHOTO");
  }

  #[test]
  fn csv_export_is_an_attachment() {
    let (_dir, state) = setup();
    let response = route(&state, &Method::Get, "/api/v1/export/records.csv", b"");
    assert_eq!(response.status, 200);
    assert!(response.header("Content-Disposition").unwrap().contains("records.csv"));
  }

  #[test]
  fn storage_errors_carry_retry_after() {
    let response = ApiResponse::error(&AppError::Storage("disk full".into()));
    assert_eq!(response.status, 503);
    assert_eq!(response.header("Retry-After"), Some("1"));
    assert_eq!(json(&response)["retryable"], true);
  }

  #[test]
  fn query_params_are_decoded() {
    assert_eq!(query_param("category=curry&limit=3", "limit").as_deref(), Some("3"));
    assert_eq!(query_param("q=a%20b+c", "q").as_deref(), Some("a b c"));
    assert_eq!(query_param("flag", "flag").as_deref(), Some(""));
    assert_eq!(query_param("", "limit"), None);
  }
}

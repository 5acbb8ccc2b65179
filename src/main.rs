use std::process::ExitCode;

use meal_record_store::settings::Settings;
use meal_record_store::{http, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(log_json: bool) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  if log_json {
    tracing_subscriber::registry()
      .with(filter)
      .with(tracing_subscriber::fmt::layer().json())
      .init();
  } else {
    tracing_subscriber::registry()
      .with(filter)
      .with(tracing_subscriber::fmt::layer())
      .init();
  }
}

fn main() -> ExitCode {
  let settings = match Settings::from_env() {
    Ok(settings) => settings,
    Err(err) => {
      eprintln!("invalid configuration: {err}");
      return ExitCode::FAILURE;
    }
  };
  init_tracing(settings.log_json);

  let state = match AppState::open(settings) {
    Ok(state) => state,
    Err(err) => {
      tracing::error!(error = %err, "failed to open data directory");
      return ExitCode::FAILURE;
    }
  };

  let server = match http::bind(&state) {
    Ok(server) => server,
    Err(err) => {
      tracing::error!(error = %err, "failed to start http server");
      return ExitCode::FAILURE;
    }
  };

  let url = format!("http://{}:{}", http::local_ip_string(), state.settings.port);
  tracing::info!(
    data_dir = %state.app_dir.display(),
    catalog_items = state.catalog.len(),
    url = %url,
    "meal record store listening"
  );
  http::serve(&server, &state);
  ExitCode::SUCCESS
}

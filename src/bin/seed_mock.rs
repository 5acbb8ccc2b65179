use std::path::PathBuf;

use chrono::{Duration, NaiveDate, Utc};
use rand::Rng;

use meal_record_store::catalog::Catalog;
use meal_record_store::db;
use meal_record_store::error::AppError;
use meal_record_store::models::NewRecordInput;
use meal_record_store::records;
use meal_record_store::settings::Settings;

const SAMPLE_HISTORY: &[(u32, &str, &str)] = &[
  (6, "2025-07-03", "お腹いっぱいになりました"),
  (4, "2025-07-05", "スパイシーで美味しい"),
  (10, "2025-07-07", "朝食にぴったり"),
  (6, "2025-07-09", "ボリューム満点で満足"),
  (3, "2025-07-11", "お肉が柔らかくて最高でした！"),
  (1, "2025-07-13", "いつも通り美味しかった。紅生姜を多めに追加。"),
];

const RANDOM_MEMOS: &[&str] = &["", "普通", "また来たい", "紅生姜多め", "味噌汁がおいしい", "混んでいた"];

fn main() -> Result<(), Box<dyn std::error::Error>> {
  let extra = std::env::args()
    .nth(1)
    .and_then(|value| value.parse::<usize>().ok())
    .unwrap_or(0);

  let app_dir = if let Ok(path) = std::env::var("MEAL_RECORD_SEED_DIR") {
    PathBuf::from(path)
  } else {
    db::resolve_app_dir(&Settings::from_env()?)?
  };

  let (db, _) = db::init_db(&app_dir)?;
  let catalog = Catalog::builtin();

  let created = db::with_conn(&db, |conn| {
    let mut created = 0;
    for (catalog_item_id, date, memo) in SAMPLE_HISTORY {
      records::create(conn, &catalog, sample(*catalog_item_id, date.to_string(), memo))?;
      created += 1;
    }

    let mut rng = rand::thread_rng();
    let today = Utc::now().date_naive();
    for _ in 0..extra {
      let item = &catalog.list()[rng.gen_range(0..catalog.len())];
      let date = random_date(&mut rng, today);
      let memo = RANDOM_MEMOS[rng.gen_range(0..RANDOM_MEMOS.len())];
      records::create(conn, &catalog, sample(item.id, date.format("%Y-%m-%d").to_string(), memo))?;
      created += 1;
    }
    Ok::<usize, AppError>(created)
  })?;

  println!("Seeded {} meal records in {}", created, app_dir.display());
  Ok(())
}

fn sample(catalog_item_id: u32, date: String, memo: &str) -> NewRecordInput {
  NewRecordInput {
    catalog_item_id,
    date,
    memo: Some(memo.to_string()),
    photo_ref: None,
  }
}

fn random_date(rng: &mut impl Rng, today: NaiveDate) -> NaiveDate {
  today - Duration::days(rng.gen_range(0..365))
}

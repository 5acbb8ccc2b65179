use chrono::NaiveDate;
use rusqlite::Connection;

use crate::catalog::Catalog;
use crate::error::AppError;
use crate::models::{CatalogItem, CategoryFilter, RankingEntry, Stats};

pub struct ItemTally {
  pub catalog_item_id: u32,
  pub record_count: i64,
  pub last_date: NaiveDate,
}

pub fn get_item_tallies(conn: &Connection) -> Result<Vec<ItemTally>, AppError> {
  let mut stmt = conn.prepare(
    "SELECT catalog_item_id, COUNT(*), MAX(date) FROM records GROUP BY catalog_item_id ORDER BY catalog_item_id",
  )?;
  let rows = stmt.query_map([], |row| {
    Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?))
  })?;

  let mut tallies = Vec::new();
  for row in rows {
    let (catalog_item_id, record_count, last_date) = row?;
    let last_date = NaiveDate::parse_from_str(&last_date, "%Y-%m-%d")
      .map_err(|err| AppError::Storage(format!("corrupt record date '{last_date}': {err}")))?;
    let catalog_item_id = u32::try_from(catalog_item_id)
      .map_err(|_| AppError::Storage(format!("corrupt catalog id {catalog_item_id}")))?;
    tallies.push(ItemTally {
      catalog_item_id,
      record_count,
      last_date,
    });
  }
  Ok(tallies)
}

pub fn compute_stats(conn: &Connection, catalog: &Catalog) -> Result<Stats, AppError> {
  let tallies = get_item_tallies(conn)?;

  let mut total_visits = 0_i64;
  let mut total_amount = 0_i64;
  let mut completed_items = 0_i64;
  for tally in &tallies {
    let item = tallied_item(catalog, tally)?;
    total_visits += tally.record_count;
    total_amount += item.price * tally.record_count;
    completed_items += 1;
  }

  let total_items = catalog.len() as i64;
  Ok(Stats {
    total_visits,
    total_amount,
    completed_items,
    total_items,
    completion_rate: completion_rate(completed_items, total_items),
  })
}

pub fn completion_rate(completed: i64, total: i64) -> u32 {
  if total <= 0 || completed <= 0 {
    return 0;
  }
  let rate = (completed * 100 + total / 2) / total;
  rate.clamp(0, 100) as u32
}

pub fn get_ranking(
  conn: &Connection,
  catalog: &Catalog,
  limit: usize,
  filter: CategoryFilter,
) -> Result<Vec<RankingEntry>, AppError> {
  let mut entries = Vec::new();
  for tally in get_item_tallies(conn)? {
    let item = tallied_item(catalog, &tally)?;
    if !filter.matches(item.category) {
      continue;
    }
    entries.push(RankingEntry {
      catalog_item_id: item.id,
      name: item.name.clone(),
      category: item.category,
      price: item.price,
      record_count: tally.record_count,
      last_date: tally.last_date,
    });
  }

  entries.sort_by(|a, b| {
    b.record_count
      .cmp(&a.record_count)
      .then(b.last_date.cmp(&a.last_date))
      .then(a.catalog_item_id.cmp(&b.catalog_item_id))
  });
  entries.truncate(limit);
  Ok(entries)
}

fn tallied_item<'a>(catalog: &'a Catalog, tally: &ItemTally) -> Result<&'a CatalogItem, AppError> {
  catalog.get(tally.catalog_item_id).map_err(|_| {
    AppError::Storage(format!(
      "{} records reference unknown catalog item {}",
      tally.record_count, tally.catalog_item_id
    ))
  })
}

use std::collections::HashSet;

use crate::error::AppError;
use crate::models::{CatalogItem, Category, CategoryFilter, CategoryInfo};

#[derive(Debug, Clone)]
pub struct Catalog {
  items: Vec<CatalogItem>,
}

impl Catalog {
  pub fn new(mut items: Vec<CatalogItem>) -> Result<Self, AppError> {
    let mut seen = HashSet::new();
    for item in &items {
      if !seen.insert(item.id) {
        return Err(AppError::InvalidInput(format!("duplicate catalog id {}", item.id)));
      }
      if item.price <= 0 {
        return Err(AppError::InvalidInput(format!("catalog item {} has no positive price", item.id)));
      }
    }
    items.sort_by_key(|item| item.id);
    Ok(Self { items })
  }

  pub fn builtin() -> Self {
    let defaults = vec![
      (1, "牛めし（並）", 380, Category::Gyumeshi, Some("定番の牛めし")),
      (2, "牛めし（大）", 480, Category::Gyumeshi, Some("定番の牛めし（大盛）")),
      (3, "プレミアム牛めし", 490, Category::Gyumeshi, None),
      (4, "ビーフカレー", 590, Category::Curry, None),
      (5, "オリジナルカレー", 490, Category::Curry, None),
      (6, "豚バラ焼肉定食", 690, Category::Teishoku, None),
      (7, "チキン南蛮定食", 790, Category::Teishoku, None),
      (8, "牛焼肉丼", 590, Category::Don, None),
      (9, "ソーセージエッグ定食", 390, Category::Breakfast, None),
      (10, "納豆定食", 290, Category::Breakfast, None),
      (11, "牛めし（特）", 580, Category::Gyumeshi, None),
      (12, "キムカル丼", 590, Category::Don, None),
    ];

    let items = defaults
      .into_iter()
      .map(|(id, name, price, category, description)| CatalogItem {
        id,
        name: name.to_string(),
        price,
        category,
        description: description.map(str::to_string),
      })
      .collect();
    Self { items }
  }

  pub fn list(&self) -> &[CatalogItem] {
    &self.items
  }

  pub fn list_by_category(&self, filter: CategoryFilter) -> Vec<&CatalogItem> {
    self.items.iter().filter(|item| filter.matches(item.category)).collect()
  }

  pub fn get(&self, id: u32) -> Result<&CatalogItem, AppError> {
    self
      .items
      .iter()
      .find(|item| item.id == id)
      .ok_or_else(|| AppError::NotFound(format!("catalog item {id}")))
  }

  pub fn contains(&self, id: u32) -> bool {
    self.items.iter().any(|item| item.id == id)
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn categories(&self) -> Vec<CategoryInfo> {
    Category::ALL
      .into_iter()
      .map(|category| CategoryInfo {
        id: category,
        name: category.display_name().to_string(),
        item_count: self.items.iter().filter(|item| item.category == category).count(),
      })
      .collect()
  }
}

//! Stock catalog: candidate source material per category.
//!
//! A CSV file with a header row. The `category` column is required; a `used`
//! column marks material that has already been turned into a post.

use postcrew_core::{Category, Error, Result};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StockItem {
    pub category: Category,
    pub used: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stock {
    pub items: Vec<StockItem>,
}

impl Stock {
    /// Missing file means empty stock.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no stock catalog at {}", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let Some(header) = lines.next() else {
            return Ok(Self::default());
        };
        let columns: Vec<String> = split_row(header)
            .into_iter()
            .map(|c| c.trim().to_ascii_lowercase())
            .collect();
        let category_col = columns
            .iter()
            .position(|c| c == "category")
            .ok_or_else(|| Error::Config("stock catalog has no `category` column".into()))?;
        let used_col = columns.iter().position(|c| c == "used");

        let mut items = Vec::new();
        for (n, line) in lines.enumerate() {
            let fields = split_row(line);
            let raw = fields.get(category_col).map(String::as_str).unwrap_or("");
            let category = match raw.parse::<Category>() {
                Ok(c) => c,
                Err(e) => {
                    warn!("stock row {}: {} — skipped", n + 2, e);
                    continue;
                }
            };
            let used = used_col
                .and_then(|i| fields.get(i))
                .is_some_and(|v| is_truthy(v));
            items.push(StockItem { category, used });
        }
        Ok(Self { items })
    }

    /// Count of unused material per category. Every category is present.
    pub fn unused_counts(&self) -> BTreeMap<Category, usize> {
        let mut counts: BTreeMap<Category, usize> =
            Category::ALL.into_iter().map(|c| (c, 0)).collect();
        for item in self.items.iter().filter(|i| !i.used) {
            *counts.entry(item.category).or_insert(0) += 1;
        }
        counts
    }

    pub fn unused_total(&self) -> usize {
        self.items.iter().filter(|i| !i.used).count()
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y"
    )
}

/// Split one CSV row. Double quotes group a field; `""` inside quotes is a
/// literal quote.
fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

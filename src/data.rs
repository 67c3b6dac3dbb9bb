//! Transaction loading, basket building and tabular conversion using Polars

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;

use polars::prelude::*;

use crate::error::BundleError;
use crate::features::{BundleCandidate, EXPORT_FEATURES};

/// Distinct items per transaction, keyed by transaction id
pub type Baskets = BTreeMap<String, BTreeSet<String>>;

/// Load a CSV file with a header row into a DataFrame
pub fn load_csv(file_path: &Path) -> crate::Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Write a DataFrame to CSV with a header row
pub fn write_csv(df: &mut DataFrame, file_path: &Path) -> crate::Result<()> {
    let mut file = File::create(file_path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

/// Group transaction rows into one set of distinct items per transaction
///
/// Rows with a null transaction id or item id are skipped. Id columns of any
/// dtype are read as strings.
pub fn build_baskets(df: &DataFrame, tx_column: &str, item_column: &str) -> crate::Result<Baskets> {
    let tx_ids = string_column(df, tx_column)?;
    let items = string_column(df, item_column)?;

    let mut baskets = Baskets::new();
    for (tx_id, item) in tx_ids.into_iter().zip(items) {
        if let (Some(tx_id), Some(item)) = (tx_id, item) {
            baskets.entry(tx_id).or_default().insert(item);
        }
    }

    tracing::debug!(baskets = baskets.len(), rows = df.height(), "built baskets");
    Ok(baskets)
}

/// Mean price per item over the non-null prices seen for it
pub fn item_price_map(
    df: &DataFrame,
    item_column: &str,
    price_column: &str,
) -> crate::Result<BTreeMap<String, f64>> {
    let items = string_column(df, item_column)?;
    let prices = float_column(df, price_column)?;

    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for (item, price) in items.into_iter().zip(prices) {
        if let (Some(item), Some(price)) = (item, price) {
            let entry = sums.entry(item).or_insert((0.0, 0));
            entry.0 += price;
            entry.1 += 1;
        }
    }

    Ok(sums
        .into_iter()
        .map(|(item, (sum, count))| (item, sum / count as f64))
        .collect())
}

/// First non-null category seen per item, in row order
pub fn item_category_map(
    df: &DataFrame,
    item_column: &str,
    category_column: &str,
) -> crate::Result<BTreeMap<String, String>> {
    let items = string_column(df, item_column)?;
    let categories = string_column(df, category_column)?;

    let mut map = BTreeMap::new();
    for (item, category) in items.into_iter().zip(categories) {
        if let (Some(item), Some(category)) = (item, category) {
            map.entry(item).or_insert(category);
        }
    }
    Ok(map)
}

/// Whether the frame carries a column with this name
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

/// Read a column as optional strings, casting from any dtype
pub fn string_column(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<String>>> {
    let series = df
        .column(name)
        .map_err(|_| BundleError::missing_column(name))?;
    let casted = series.cast(&DataType::String)?;
    let values = casted
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_owned))
        .collect();
    Ok(values)
}

/// Read a column as optional floats, casting from any numeric or boolean dtype
pub fn float_column(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<f64>>> {
    let series = df
        .column(name)
        .map_err(|_| BundleError::missing_column(name))?;
    let casted = series.cast(&DataType::Float64)?;
    let values = casted.f64()?.into_iter().collect();
    Ok(values)
}

/// Convert candidates into a feature table suitable for labelling
///
/// Optional features are emitted only when the candidates carry them.
pub fn candidates_to_frame(candidates: &[BundleCandidate]) -> crate::Result<DataFrame> {
    let items_a: Vec<&str> = candidates.iter().map(|c| c.stats.item_a.as_str()).collect();
    let items_b: Vec<&str> = candidates.iter().map(|c| c.stats.item_b.as_str()).collect();

    let mut columns = vec![
        Series::new("item_a", items_a),
        Series::new("item_b", items_b),
    ];

    for &name in EXPORT_FEATURES {
        let values: Vec<Option<f64>> = candidates.iter().map(|c| c.feature(name)).collect();
        if values.iter().all(Option::is_none) && !candidates.is_empty() {
            continue;
        }
        columns.push(Series::new(name, values));
    }

    let has_categories = candidates.iter().any(|c| c.category.is_some());
    if has_categories {
        let category_a: Vec<Option<&str>> = candidates
            .iter()
            .map(|c| c.category.as_ref().map(|cat| cat.category_a.as_str()))
            .collect();
        let category_b: Vec<Option<&str>> = candidates
            .iter()
            .map(|c| c.category.as_ref().map(|cat| cat.category_b.as_str()))
            .collect();
        columns.push(Series::new("category_a", category_a));
        columns.push(Series::new("category_b", category_b));
    }

    Ok(DataFrame::new(columns)?)
}

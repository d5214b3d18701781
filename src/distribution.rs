use crate::catalog::SurveyCatalog;
use crate::error::Result;
use crate::models::{AnalysisRow, DistributionRow};
use crate::stats::{count_occurrences, percentage};

/// Frequency and percentage of every option of one dimension.
///
/// Empty input yields no rows at all. Otherwise every option in the domain is
/// emitted, zero counts included.
pub fn calculate_distribution(
    catalog: &SurveyCatalog,
    rows: &[AnalysisRow],
    dimension_code: &str,
) -> Result<Vec<DistributionRow>> {
    let dimension = catalog.dimension(dimension_code)?;
    let base_n = rows.len() as i64;
    if base_n == 0 {
        return Ok(Vec::new());
    }

    let counts = count_occurrences(rows.iter().filter_map(|row| dimension.option_index(row)));

    Ok(dimension
        .options
        .iter()
        .enumerate()
        .map(|(index, option)| {
            let n = counts.get(&index).copied().unwrap_or(0);
            DistributionRow {
                dimension_code: dimension.code.clone(),
                option_code: option.clone(),
                n,
                base_n,
                pct: percentage(n, base_n),
            }
        })
        .collect())
}

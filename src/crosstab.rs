use crate::catalog::SurveyCatalog;
use crate::error::{Result, SurveyError};
use crate::models::{AnalysisRow, CrossRow};
use crate::stats::percentage;

/// Two-dimension frequency matrix with row, column and grand-total percentages.
///
/// Empty input yields no rows. Totals come from the matrix itself, so a row
/// that matches no option in either dimension contributes to nothing.
pub fn calculate_cross_analysis(
    catalog: &SurveyCatalog,
    rows: &[AnalysisRow],
    dim1: &str,
    dim2: &str,
) -> Result<Vec<CrossRow>> {
    if dim1 == dim2 {
        return Err(SurveyError::InvalidDimensionPair(
            dim1.to_string(),
            dim2.to_string(),
        ));
    }
    let first = catalog.dimension(dim1)?;
    let second = catalog.dimension(dim2)?;

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut matrix = vec![vec![0i64; second.options.len()]; first.options.len()];
    for row in rows {
        if let (Some(i), Some(j)) = (first.option_index(row), second.option_index(row)) {
            matrix[i][j] += 1;
        }
    }

    let row_totals: Vec<i64> = matrix.iter().map(|cells| cells.iter().sum()).collect();
    let col_totals: Vec<i64> = (0..second.options.len())
        .map(|j| matrix.iter().map(|cells| cells[j]).sum())
        .collect();
    let grand_total: i64 = row_totals.iter().sum();

    let mut output = Vec::with_capacity(first.options.len() * second.options.len());
    for (i, opt1) in first.options.iter().enumerate() {
        for (j, opt2) in second.options.iter().enumerate() {
            let n = matrix[i][j];
            output.push(CrossRow {
                dim1: first.code.clone(),
                opt1: opt1.clone(),
                dim2: second.code.clone(),
                opt2: opt2.clone(),
                n,
                row_pct: percentage(n, row_totals[i]),
                row_base_n: row_totals[i],
                col_pct: percentage(n, col_totals[j]),
                col_base_n: col_totals[j],
                total_pct: percentage(n, grand_total),
                total_base_n: grand_total,
            });
        }
    }

    Ok(output)
}

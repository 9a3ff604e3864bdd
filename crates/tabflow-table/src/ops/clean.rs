//! Missing-value filling, outlier removal, and normalization.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use tabflow_common::{AppError, Cell};

use crate::table::Table;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "strategy", content = "value")]
pub enum FillStrategy {
    Forward,
    Backward,
    Mean,
    Median,
    Mode,
    Constant(Cell),
}

/// Replace nulls in the given columns (all columns when `None`).
///
/// Forward fill carries the last seen value down; backward fill carries the
/// next value up; mean/median apply to numeric cells; mode picks the most
/// frequent non-null value (first-seen wins ties). Cells with no donor stay
/// null.
pub fn fill_missing(
    table: &Table,
    columns: Option<&[String]>,
    strategy: &FillStrategy,
) -> Result<Table, AppError> {
    let indices: Vec<usize> = match columns {
        Some(names) => names
            .iter()
            .map(|c| table.column_index(c))
            .collect::<Result<_, _>>()?,
        None => (0..table.column_count()).collect(),
    };

    let mut rows = table.rows().to_vec();

    for &col in &indices {
        match strategy {
            FillStrategy::Forward => {
                let mut last: Option<Cell> = None;
                for row in rows.iter_mut() {
                    if row[col].is_null() {
                        if let Some(v) = &last {
                            row[col] = v.clone();
                        }
                    } else {
                        last = Some(row[col].clone());
                    }
                }
            }
            FillStrategy::Backward => {
                let mut next: Option<Cell> = None;
                for row in rows.iter_mut().rev() {
                    if row[col].is_null() {
                        if let Some(v) = &next {
                            row[col] = v.clone();
                        }
                    } else {
                        next = Some(row[col].clone());
                    }
                }
            }
            FillStrategy::Mean => {
                let numbers = numeric_column(&rows, col);
                if let Some(mean) = mean(&numbers) {
                    fill_nulls(&mut rows, col, Cell::Number(mean));
                }
            }
            FillStrategy::Median => {
                let mut numbers = numeric_column(&rows, col);
                if let Some(median) = median(&mut numbers) {
                    fill_nulls(&mut rows, col, Cell::Number(median));
                }
            }
            FillStrategy::Mode => {
                let mut counts: FxHashMap<&Cell, usize> = FxHashMap::default();
                let mut order: Vec<&Cell> = Vec::new();
                for row in table.rows() {
                    let cell = &row[col];
                    if cell.is_null() {
                        continue;
                    }
                    let entry = counts.entry(cell).or_insert(0);
                    if *entry == 0 {
                        order.push(cell);
                    }
                    *entry += 1;
                }
                let mode = order
                    .iter()
                    .max_by_key(|c| counts[**c])
                    .map(|c| (*c).clone());
                if let Some(mode) = mode {
                    fill_nulls(&mut rows, col, mode);
                }
            }
            FillStrategy::Constant(value) => fill_nulls(&mut rows, col, value.clone()),
        }
    }

    Ok(table.derive_rows(rows))
}

fn fill_nulls(rows: &mut [Vec<Cell>], col: usize, value: Cell) {
    for row in rows.iter_mut() {
        if row[col].is_null() {
            row[col] = value.clone();
        }
    }
}

fn numeric_column(rows: &[Vec<Cell>], col: usize) -> Vec<f64> {
    rows.iter().filter_map(|r| r[col].as_number()).collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

/// Quartiles via linear interpolation on the sorted sample.
pub(crate) fn quartiles(sorted: &[f64]) -> Option<(f64, f64)> {
    if sorted.is_empty() {
        return None;
    }
    let q = |p: f64| -> f64 {
        let rank = p * (sorted.len() - 1) as f64;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        if lo == hi {
            sorted[lo]
        } else {
            sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo])
        }
    };
    Some((q(0.25), q(0.75)))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "method")]
pub enum OutlierMethod {
    /// Keep values within `[q1 - factor*iqr, q3 + factor*iqr]`.
    Iqr {
        #[serde(default = "default_iqr_factor")]
        factor: f64,
    },
    /// Keep values with `|x - mean| / std_dev <= threshold`.
    #[serde(rename = "zscore", alias = "z-score")]
    ZScore {
        #[serde(default = "default_z_threshold")]
        threshold: f64,
    },
}

fn default_iqr_factor() -> f64 {
    1.5
}
fn default_z_threshold() -> f64 {
    3.0
}

/// Drop rows whose value in `column` is a statistical outlier. Rows without
/// a numeric value in the column are kept; row order is preserved.
pub fn remove_outliers(
    table: &Table,
    column: &str,
    method: OutlierMethod,
) -> Result<Table, AppError> {
    let col = table.column_index(column)?;
    let numbers = numeric_column(table.rows(), col);

    let keep: Box<dyn Fn(f64) -> bool> = match method {
        OutlierMethod::Iqr { factor } => {
            let mut sorted = numbers.clone();
            sorted.sort_by(f64::total_cmp);
            match quartiles(&sorted) {
                Some((q1, q3)) => {
                    let iqr = q3 - q1;
                    let lo = q1 - factor * iqr;
                    let hi = q3 + factor * iqr;
                    Box::new(move |x| x >= lo && x <= hi)
                }
                None => Box::new(|_| true),
            }
        }
        OutlierMethod::ZScore { threshold } => match (mean(&numbers), std_dev(&numbers)) {
            (Some(mu), Some(sigma)) if sigma > 0.0 => {
                Box::new(move |x| ((x - mu) / sigma).abs() <= threshold)
            }
            _ => Box::new(|_| true),
        },
    };

    let rows = table
        .rows()
        .iter()
        .filter(|row| row[col].as_number().map(&keep).unwrap_or(true))
        .cloned()
        .collect();
    Ok(table.derive_rows(rows))
}

pub(crate) fn std_dev(values: &[f64]) -> Option<f64> {
    let mu = mean(values)?;
    if values.len() < 2 {
        return Some(0.0);
    }
    let var = values.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizeMethod {
    #[serde(rename = "minmax", alias = "min-max")]
    MinMax,
    #[serde(rename = "zscore", alias = "z-score")]
    ZScore,
    Robust,
}

/// Rescale numeric cells in the given columns. Non-numeric and null cells
/// are left untouched. Degenerate spread (zero range, zero deviation, zero
/// IQR) maps every value to 0.
pub fn normalize(
    table: &Table,
    columns: &[String],
    method: NormalizeMethod,
) -> Result<Table, AppError> {
    let indices: Vec<usize> = columns
        .iter()
        .map(|c| table.column_index(c))
        .collect::<Result<_, _>>()?;

    let mut rows = table.rows().to_vec();

    for &col in &indices {
        let numbers = numeric_column(&rows, col);
        if numbers.is_empty() {
            continue;
        }

        let transform: Box<dyn Fn(f64) -> f64> = match method {
            NormalizeMethod::MinMax => {
                let lo = numbers.iter().cloned().fold(f64::INFINITY, f64::min);
                let hi = numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let range = hi - lo;
                if range == 0.0 {
                    Box::new(|_| 0.0)
                } else {
                    Box::new(move |x| (x - lo) / range)
                }
            }
            NormalizeMethod::ZScore => {
                let mu = mean(&numbers).unwrap();
                let sigma = std_dev(&numbers).unwrap();
                if sigma == 0.0 {
                    Box::new(|_| 0.0)
                } else {
                    Box::new(move |x| (x - mu) / sigma)
                }
            }
            NormalizeMethod::Robust => {
                let mut sorted = numbers.clone();
                sorted.sort_by(f64::total_cmp);
                let med = median(&mut sorted.clone()).unwrap();
                let (q1, q3) = quartiles(&sorted).unwrap();
                let iqr = q3 - q1;
                if iqr == 0.0 {
                    Box::new(|_| 0.0)
                } else {
                    Box::new(move |x| (x - med) / iqr)
                }
            }
        };

        for row in rows.iter_mut() {
            if let Some(n) = row[col].as_number() {
                row[col] = Cell::Number(transform(n));
            }
        }
    }

    Ok(table.derive_rows(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[Option<f64>]) -> Table {
        Table::new(
            vec!["v".into()],
            values
                .iter()
                .map(|v| vec![v.map(Cell::Number).unwrap_or(Cell::Null)])
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn forward_fill_carries_down() {
        let t = series(&[None, Some(1.0), None, None, Some(4.0)]);
        let out = fill_missing(&t, None, &FillStrategy::Forward).unwrap();
        let vals: Vec<Cell> = out.rows().iter().map(|r| r[0].clone()).collect();
        assert_eq!(
            vals,
            vec![Cell::Null, 1.into(), 1.into(), 1.into(), 4.into()]
        );
    }

    #[test]
    fn backward_fill_carries_up() {
        let t = series(&[None, Some(1.0), None, Some(4.0)]);
        let out = fill_missing(&t, None, &FillStrategy::Backward).unwrap();
        let vals: Vec<Cell> = out.rows().iter().map(|r| r[0].clone()).collect();
        assert_eq!(vals, vec![1.into(), 1.into(), 4.into(), 4.into()]);
    }

    #[test]
    fn mean_median_mode_constant() {
        let t = series(&[Some(1.0), Some(2.0), Some(3.0), None]);
        let out = fill_missing(&t, None, &FillStrategy::Mean).unwrap();
        assert_eq!(out.rows()[3][0], 2.into());

        let out = fill_missing(&t, None, &FillStrategy::Median).unwrap();
        assert_eq!(out.rows()[3][0], 2.into());

        let t2 = Table::new(
            vec!["v".into()],
            vec![
                vec!["x".into()],
                vec!["y".into()],
                vec!["x".into()],
                vec![Cell::Null],
            ],
        )
        .unwrap();
        let out = fill_missing(&t2, None, &FillStrategy::Mode).unwrap();
        assert_eq!(out.rows()[3][0], "x".into());

        let out = fill_missing(&t, None, &FillStrategy::Constant(0.into())).unwrap();
        assert_eq!(out.rows()[3][0], 0.into());
    }

    #[test]
    fn iqr_removes_extreme_row() {
        let t = series(&[
            Some(10.0),
            Some(12.0),
            Some(11.0),
            Some(13.0),
            Some(500.0),
        ]);
        let out = remove_outliers(&t, "v", OutlierMethod::Iqr { factor: 1.5 }).unwrap();
        assert_eq!(out.row_count(), 4);
        assert!(out.rows().iter().all(|r| r[0] != 500.into()));
    }

    #[test]
    fn zscore_keeps_all_when_degenerate() {
        let t = series(&[Some(5.0), Some(5.0), Some(5.0)]);
        let out = remove_outliers(&t, "v", OutlierMethod::ZScore { threshold: 3.0 }).unwrap();
        assert_eq!(out.row_count(), 3);
    }

    #[test]
    fn non_numeric_rows_survive_outlier_removal() {
        let t = Table::new(
            vec!["v".into()],
            vec![vec![1.into()], vec!["n/a".into()], vec![2.into()]],
        )
        .unwrap();
        let out = remove_outliers(&t, "v", OutlierMethod::Iqr { factor: 1.5 }).unwrap();
        assert_eq!(out.row_count(), 3);
    }

    #[test]
    fn min_max_normalization() {
        let t = series(&[Some(0.0), Some(5.0), Some(10.0), None]);
        let out = normalize(&t, &["v".into()], NormalizeMethod::MinMax).unwrap();
        assert_eq!(out.rows()[1][0], Cell::Number(0.5));
        assert_eq!(out.rows()[3][0], Cell::Null);
    }

    #[test]
    fn zscore_normalization_centers() {
        let t = series(&[Some(1.0), Some(2.0), Some(3.0)]);
        let out = normalize(&t, &["v".into()], NormalizeMethod::ZScore).unwrap();
        let mid = out.rows()[1][0].as_number().unwrap();
        assert!(mid.abs() < 1e-12);
    }

    #[test]
    fn degenerate_spread_maps_to_zero() {
        let t = series(&[Some(7.0), Some(7.0)]);
        for method in [
            NormalizeMethod::MinMax,
            NormalizeMethod::ZScore,
            NormalizeMethod::Robust,
        ] {
            let out = normalize(&t, &["v".into()], method).unwrap();
            assert_eq!(out.rows()[0][0], Cell::Number(0.0));
        }
    }
}

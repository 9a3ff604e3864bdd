//! Dataset profiling: overview, per-column statistics, quality scoring,
//! correlations, and threshold-driven recommendations.

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tabflow_common::Cell;

use crate::infer::{TypeInference, infer_column};
use crate::ops::clean::{quartiles, std_dev};
use crate::table::{ColumnType, Table};

const TOP_VALUES: usize = 5;
const NULL_ISSUE_THRESHOLD: f64 = 20.0;
const CORRELATION_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetOverview {
    pub row_count: usize,
    pub column_count: usize,
    pub estimated_bytes: usize,
    /// Percentage of cells that are null.
    pub sparsity_pct: f64,
    pub duplicate_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStats {
    pub min_length: usize,
    pub max_length: usize,
    pub mean_length: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnProfile {
    pub name: String,
    pub inference: TypeInference,
    pub null_pct: f64,
    pub unique_pct: f64,
    /// Most frequent values with their counts, descending.
    pub top_values: Vec<(Cell, usize)>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub numeric: Option<NumericStats>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text: Option<TextStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityDimension {
    /// 0–100, higher is better.
    pub score: f64,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub completeness: QualityDimension,
    pub consistency: QualityDimension,
    pub accuracy: QualityDimension,
    pub uniqueness: QualityDimension,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correlation {
    pub left: String,
    pub right: String,
    pub coefficient: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataProfile {
    pub overview: DatasetOverview,
    pub columns: Vec<ColumnProfile>,
    pub quality: QualityReport,
    /// Pairs with |r| above 0.5, strongest first.
    pub correlations: Vec<Correlation>,
    pub recommendations: Vec<String>,
}

/// Profile a table.
pub fn profile(table: &Table) -> DataProfile {
    let overview = overview(table);
    let columns: Vec<ColumnProfile> = table
        .columns()
        .iter()
        .enumerate()
        .map(|(i, name)| profile_column(table, i, name))
        .collect();
    let quality = quality(table, &columns, &overview);
    let correlations = correlations(table);
    let recommendations = recommend(&overview, &columns, &quality, &correlations);

    DataProfile {
        overview,
        columns,
        quality,
        correlations,
        recommendations,
    }
}

fn overview(table: &Table) -> DatasetOverview {
    let cells = table.row_count() * table.column_count();
    let nulls: usize = table
        .rows()
        .iter()
        .flat_map(|r| r.iter())
        .filter(|c| c.is_null())
        .count();

    DatasetOverview {
        row_count: table.row_count(),
        column_count: table.column_count(),
        estimated_bytes: table.estimated_bytes(),
        sparsity_pct: if cells == 0 {
            0.0
        } else {
            100.0 * nulls as f64 / cells as f64
        },
        duplicate_rows: duplicate_rows(table),
    }
}

/// Rows equal (deep cell equality, column order) to an earlier row.
fn duplicate_rows(table: &Table) -> usize {
    let mut seen: FxHashMap<u64, Vec<usize>> = FxHashMap::default();
    let mut duplicates = 0;
    for (i, row) in table.rows().iter().enumerate() {
        let mut hasher = DefaultHasher::new();
        row.hash(&mut hasher);
        let key = hasher.finish();
        let bucket = seen.entry(key).or_default();
        if bucket.iter().any(|&j| table.rows()[j] == *row) {
            duplicates += 1;
        } else {
            bucket.push(i);
        }
    }
    duplicates
}

fn profile_column(table: &Table, index: usize, name: &str) -> ColumnProfile {
    let cells: Vec<&Cell> = table.column_cells(index).collect();
    let n = cells.len();
    let nulls = cells.iter().filter(|c| c.is_null()).count();

    let mut counts: FxHashMap<&Cell, usize> = FxHashMap::default();
    for cell in cells.iter().filter(|c| !c.is_null()) {
        *counts.entry(*cell).or_insert(0) += 1;
    }
    let unique = counts.len();

    let mut top: Vec<(&Cell, usize)> = counts.into_iter().collect();
    top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.to_text().cmp(&b.0.to_text())));
    top.truncate(TOP_VALUES);

    let inference = infer_column(&cells);

    let numbers: Vec<f64> = cells.iter().filter_map(|c| c.as_number()).collect();
    let numeric = if inference.ty == ColumnType::Number && !numbers.is_empty() {
        let mut sorted = numbers.clone();
        sorted.sort_by(f64::total_cmp);
        let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };
        Some(NumericStats {
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean,
            median,
            std_dev: std_dev(&numbers).unwrap_or(0.0),
        })
    } else {
        None
    };

    let lengths: Vec<usize> = cells
        .iter()
        .filter_map(|c| match c {
            Cell::Text(s) => Some(s.chars().count()),
            _ => None,
        })
        .collect();
    let text = if inference.ty == ColumnType::Text && !lengths.is_empty() {
        Some(TextStats {
            min_length: *lengths.iter().min().unwrap(),
            max_length: *lengths.iter().max().unwrap(),
            mean_length: lengths.iter().sum::<usize>() as f64 / lengths.len() as f64,
        })
    } else {
        None
    };

    ColumnProfile {
        name: name.to_string(),
        inference,
        null_pct: if n == 0 { 0.0 } else { 100.0 * nulls as f64 / n as f64 },
        unique_pct: if n == nulls {
            0.0
        } else {
            100.0 * unique as f64 / (n - nulls) as f64
        },
        top_values: top.into_iter().map(|(c, k)| (c.clone(), k)).collect(),
        numeric,
        text,
    }
}

fn quality(table: &Table, columns: &[ColumnProfile], overview: &DatasetOverview) -> QualityReport {
    // Completeness: share of non-null cells.
    let completeness_score = 100.0 - overview.sparsity_pct;
    let completeness_issues: Vec<String> = columns
        .iter()
        .filter(|c| c.null_pct > NULL_ISSUE_THRESHOLD)
        .map(|c| format!("Column '{}' is {:.1}% null", c.name, c.null_pct))
        .collect();

    // Consistency: share of non-null cells conforming to the column's
    // inferred type.
    let mut conforming = 0usize;
    let mut observed = 0usize;
    let mut consistency_issues = Vec::new();
    for (i, profile) in columns.iter().enumerate() {
        let ty = profile.inference.ty;
        let mut column_conforming = 0usize;
        let mut column_observed = 0usize;
        for cell in table.column_cells(i).filter(|c| !c.is_null()) {
            column_observed += 1;
            if conforms(cell, ty) {
                column_conforming += 1;
            }
        }
        observed += column_observed;
        conforming += column_conforming;
        if column_observed > 0 && column_conforming < column_observed {
            consistency_issues.push(format!(
                "Column '{}' has {} value(s) not matching its {} type",
                profile.name,
                column_observed - column_conforming,
                type_name(ty)
            ));
        }
    }
    let consistency_score = if observed == 0 {
        100.0
    } else {
        100.0 * conforming as f64 / observed as f64
    };

    // Accuracy: IQR outlier share across numeric columns.
    let mut outliers = 0usize;
    let mut numeric_cells = 0usize;
    let mut accuracy_issues = Vec::new();
    for (i, profile) in columns.iter().enumerate() {
        if profile.inference.ty != ColumnType::Number {
            continue;
        }
        let numbers: Vec<f64> = table.column_cells(i).filter_map(|c| c.as_number()).collect();
        if numbers.len() < 4 {
            numeric_cells += numbers.len();
            continue;
        }
        let mut sorted = numbers.clone();
        sorted.sort_by(f64::total_cmp);
        let (q1, q3) = quartiles(&sorted).unwrap();
        let iqr = q3 - q1;
        let lo = q1 - 1.5 * iqr;
        let hi = q3 + 1.5 * iqr;
        let column_outliers = numbers.iter().filter(|&&x| x < lo || x > hi).count();
        if column_outliers > 0 {
            accuracy_issues.push(format!(
                "Column '{}' has {} outlier(s) outside [{:.2}, {:.2}]",
                profile.name, column_outliers, lo, hi
            ));
        }
        outliers += column_outliers;
        numeric_cells += numbers.len();
    }
    let accuracy_score = if numeric_cells == 0 {
        100.0
    } else {
        100.0 * (1.0 - outliers as f64 / numeric_cells as f64)
    };

    // Uniqueness: share of non-duplicate rows.
    let uniqueness_score = if overview.row_count == 0 {
        100.0
    } else {
        100.0 * (1.0 - overview.duplicate_rows as f64 / overview.row_count as f64)
    };
    let uniqueness_issues = if overview.duplicate_rows > 0 {
        vec![format!("{} duplicate row(s)", overview.duplicate_rows)]
    } else {
        Vec::new()
    };

    QualityReport {
        completeness: QualityDimension {
            score: completeness_score,
            issues: completeness_issues,
        },
        consistency: QualityDimension {
            score: consistency_score,
            issues: consistency_issues,
        },
        accuracy: QualityDimension {
            score: accuracy_score,
            issues: accuracy_issues,
        },
        uniqueness: QualityDimension {
            score: uniqueness_score,
            issues: uniqueness_issues,
        },
    }
}

fn conforms(cell: &Cell, ty: ColumnType) -> bool {
    match ty {
        ColumnType::Number => cell.coerce_number().is_some(),
        ColumnType::Boolean => cell.coerce_bool().is_some(),
        ColumnType::Timestamp => cell.coerce_timestamp().is_some(),
        _ => true,
    }
}

fn type_name(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::Number => "number",
        ColumnType::Text => "text",
        ColumnType::Boolean => "boolean",
        ColumnType::Timestamp => "timestamp",
        ColumnType::Mixed => "mixed",
        ColumnType::Unknown => "unknown",
    }
}

/// Pairwise Pearson correlation over numeric columns, reported when
/// |r| exceeds 0.5. Pairs are scanned on the rayon pool; only rows where
/// both cells are numeric contribute.
fn correlations(table: &Table) -> Vec<Correlation> {
    let numeric: Vec<(usize, &String)> = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, name)| table.column_type(name) == Some(ColumnType::Number))
        .map(|(i, name)| (i, name))
        .collect();

    let mut pairs = Vec::new();
    for a in 0..numeric.len() {
        for b in (a + 1)..numeric.len() {
            pairs.push((numeric[a], numeric[b]));
        }
    }

    let mut out: Vec<Correlation> = pairs
        .par_iter()
        .filter_map(|&((ai, an), (bi, bn))| {
            let mut xs = Vec::new();
            let mut ys = Vec::new();
            for row in table.rows() {
                if let (Some(x), Some(y)) = (row[ai].as_number(), row[bi].as_number()) {
                    xs.push(x);
                    ys.push(y);
                }
            }
            let r = pearson(&xs, &ys)?;
            (r.abs() > CORRELATION_THRESHOLD).then(|| Correlation {
                left: an.clone(),
                right: bn.clone(),
                coefficient: r,
            })
        })
        .collect();

    out.sort_by(|a, b| {
        b.coefficient
            .abs()
            .partial_cmp(&a.coefficient.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    out
}

fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len();
    if n < 2 {
        return None;
    }
    let mx = xs.iter().sum::<f64>() / n as f64;
    let my = ys.iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for i in 0..n {
        let dx = xs[i] - mx;
        let dy = ys[i] - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    if vx == 0.0 || vy == 0.0 {
        return None;
    }
    Some(cov / (vx.sqrt() * vy.sqrt()))
}

fn recommend(
    overview: &DatasetOverview,
    columns: &[ColumnProfile],
    quality: &QualityReport,
    correlations: &[Correlation],
) -> Vec<String> {
    let mut out = Vec::new();

    for column in columns {
        if column.null_pct > 50.0 {
            out.push(format!(
                "Column '{}' is mostly empty ({:.0}% null); consider dropping it",
                column.name, column.null_pct
            ));
        } else if column.null_pct > NULL_ISSUE_THRESHOLD {
            out.push(format!(
                "Column '{}' has {:.0}% nulls; consider a fill-missing step",
                column.name, column.null_pct
            ));
        }
    }
    if overview.duplicate_rows > 0 {
        out.push(format!(
            "{} duplicate row(s) found; consider de-duplicating",
            overview.duplicate_rows
        ));
    }
    if quality.accuracy.score < 95.0 {
        out.push("Numeric outliers detected; review or apply outlier removal".to_string());
    }
    for corr in correlations.iter().take(3) {
        out.push(format!(
            "Columns '{}' and '{}' are strongly correlated (r = {:.2}); one may be redundant",
            corr.left, corr.right, corr.coefficient
        ));
    }
    out
}

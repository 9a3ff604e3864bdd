//! Evaluator for the script expression language.

use std::time::Instant;

use tabflow_common::{AppError, Cell, codes};
use tabflow_table::Table;

use crate::cancel::CancelToken;

use super::parser::{BinaryOp, Expr, UnaryOp};

/// Cooperative limits threaded through evaluation. The deadline and cancel
/// token are checked at call granularity.
#[derive(Debug, Clone, Default)]
pub struct EvalLimits {
    pub deadline: Option<Instant>,
    pub cancel: CancelToken,
}

impl EvalLimits {
    fn check(&self) -> Result<(), AppError> {
        if self.cancel.is_cancelled() {
            return Err(AppError::aborted());
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(
                    AppError::execution("Expression evaluation timeout exceeded")
                        .with_code(codes::TIMEOUT),
                );
            }
        }
        Ok(())
    }
}

pub struct Evaluator<'a> {
    table: &'a Table,
    limits: EvalLimits,
}

impl<'a> Evaluator<'a> {
    pub fn new(table: &'a Table, limits: EvalLimits) -> Self {
        Self { table, limits }
    }

    /// Evaluate against one row; bare identifiers resolve to that row's
    /// cells.
    pub fn eval_row(&self, expr: &Expr, row: usize) -> Result<Cell, AppError> {
        self.limits.check()?;
        self.eval(expr, Some(row))
    }

    /// Evaluate against the whole table; bare identifiers are invalid here,
    /// aggregates remain available.
    pub fn eval_scalar(&self, expr: &Expr) -> Result<Cell, AppError> {
        self.limits.check()?;
        self.eval(expr, None)
    }

    fn eval(&self, expr: &Expr, row: Option<usize>) -> Result<Cell, AppError> {
        match expr {
            Expr::Literal(cell) => Ok(cell.clone()),
            Expr::Column(name) => self.column_value(name, row),
            Expr::Unary { op, expr } => {
                let value = self.eval(expr, row)?;
                Ok(match op {
                    UnaryOp::Neg => match value.coerce_number() {
                        Some(n) => Cell::Number(-n),
                        None => Cell::Null,
                    },
                    UnaryOp::Not => Cell::Bool(!value.is_truthy()),
                })
            }
            Expr::Binary { op, left, right } => {
                // short-circuit logic before evaluating the right side
                match op {
                    BinaryOp::And => {
                        let l = self.eval(left, row)?;
                        if !l.is_truthy() {
                            return Ok(Cell::Bool(false));
                        }
                        let r = self.eval(right, row)?;
                        return Ok(Cell::Bool(r.is_truthy()));
                    }
                    BinaryOp::Or => {
                        let l = self.eval(left, row)?;
                        if l.is_truthy() {
                            return Ok(Cell::Bool(true));
                        }
                        let r = self.eval(right, row)?;
                        return Ok(Cell::Bool(r.is_truthy()));
                    }
                    _ => {}
                }
                let l = self.eval(left, row)?;
                let r = self.eval(right, row)?;
                self.binary(*op, l, r)
            }
            Expr::Call { name, args } => self.call(name, args, row),
        }
    }

    fn column_value(&self, name: &str, row: Option<usize>) -> Result<Cell, AppError> {
        let Some(row) = row else {
            return Err(AppError::data(format!(
                "Column reference '{name}' needs a row context; use an aggregate in scalar mode"
            )));
        };
        let index = self.table.column_index(name)?;
        Ok(self.table.rows()[row][index].clone())
    }

    fn binary(&self, op: BinaryOp, l: Cell, r: Cell) -> Result<Cell, AppError> {
        use BinaryOp::*;
        match op {
            Add => {
                if let (Some(x), Some(y)) = (l.coerce_number(), r.coerce_number()) {
                    return Ok(Cell::Number(x + y));
                }
                if l.is_null() || r.is_null() {
                    return Ok(Cell::Null);
                }
                Ok(Cell::Text(format!("{}{}", l.to_text(), r.to_text())))
            }
            Sub | Mul | Div | Rem => {
                let (Some(x), Some(y)) = (l.coerce_number(), r.coerce_number()) else {
                    return Ok(Cell::Null);
                };
                let result = match op {
                    Sub => x - y,
                    Mul => x * y,
                    Div => {
                        if y == 0.0 {
                            return Err(AppError::execution("Division by zero"));
                        }
                        x / y
                    }
                    Rem => {
                        if y == 0.0 {
                            return Err(AppError::execution("Division by zero"));
                        }
                        x % y
                    }
                    _ => unreachable!(),
                };
                Ok(Cell::Number(result))
            }
            Eq => Ok(Cell::Bool(cells_equal(&l, &r))),
            Ne => Ok(Cell::Bool(!cells_equal(&l, &r))),
            Lt | Le | Gt | Ge => {
                if l.is_null() || r.is_null() {
                    return Ok(Cell::Bool(false));
                }
                let ordering = if let (Some(x), Some(y)) = (l.coerce_number(), r.coerce_number())
                {
                    x.partial_cmp(&y)
                } else {
                    Some(l.to_text().to_lowercase().cmp(&r.to_text().to_lowercase()))
                };
                let Some(ordering) = ordering else {
                    return Ok(Cell::Bool(false));
                };
                Ok(Cell::Bool(match op {
                    Lt => ordering.is_lt(),
                    Le => ordering.is_le(),
                    Gt => ordering.is_gt(),
                    Ge => ordering.is_ge(),
                    _ => unreachable!(),
                }))
            }
            And | Or => unreachable!("handled before operand evaluation"),
        }
    }

    fn call(&self, name: &str, args: &[Expr], row: Option<usize>) -> Result<Cell, AppError> {
        self.limits.check()?;
        match name {
            // aggregates over a named column
            "sum" | "avg" | "min" | "max" | "count" => {
                let column = self.aggregate_column(name, args, row)?;
                self.aggregate(name, &column)
            }
            "col" => {
                let target = self.text_arg(name, args, 0, row)?;
                self.column_value(&target, row)
            }
            "abs" => self.numeric_fn(args, row, f64::abs),
            "floor" => self.numeric_fn(args, row, f64::floor),
            "ceil" => self.numeric_fn(args, row, f64::ceil),
            "sqrt" => self.numeric_fn(args, row, f64::sqrt),
            "round" => {
                expect_args(name, args, 1..=2)?;
                let value = self.eval(&args[0], row)?;
                let digits = if args.len() == 2 {
                    self.eval(&args[1], row)?.coerce_number().unwrap_or(0.0) as i32
                } else {
                    0
                };
                Ok(match value.coerce_number() {
                    Some(n) => {
                        let factor = 10f64.powi(digits);
                        Cell::Number((n * factor).round() / factor)
                    }
                    None => Cell::Null,
                })
            }
            "len" => {
                expect_args(name, args, 1..=1)?;
                let value = self.eval(&args[0], row)?;
                Ok(match value {
                    Cell::Null => Cell::Null,
                    other => Cell::Number(other.to_text().chars().count() as f64),
                })
            }
            "upper" => self.text_fn(args, row, |s| s.to_uppercase()),
            "lower" => self.text_fn(args, row, |s| s.to_lowercase()),
            "trim" => self.text_fn(args, row, |s| s.trim().to_string()),
            "concat" => {
                let mut out = String::new();
                for arg in args {
                    let value = self.eval(arg, row)?;
                    out.push_str(&value.to_text());
                }
                Ok(Cell::Text(out))
            }
            "if" => {
                expect_args(name, args, 3..=3)?;
                let condition = self.eval(&args[0], row)?;
                if condition.is_truthy() {
                    self.eval(&args[1], row)
                } else {
                    self.eval(&args[2], row)
                }
            }
            "coalesce" => {
                for arg in args {
                    let value = self.eval(arg, row)?;
                    if !value.is_null() {
                        return Ok(value);
                    }
                }
                Ok(Cell::Null)
            }
            other => Err(AppError::data(format!("Unknown function '{other}'"))),
        }
    }

    /// Aggregate arguments name a column, either as a string literal or a
    /// bare identifier: `sum("salary")` or `sum(salary)`.
    fn aggregate_column(
        &self,
        name: &str,
        args: &[Expr],
        _row: Option<usize>,
    ) -> Result<String, AppError> {
        expect_args(name, args, 1..=1)?;
        match &args[0] {
            Expr::Literal(Cell::Text(column)) => Ok(column.clone()),
            Expr::Column(column) => Ok(column.clone()),
            _ => Err(AppError::data(format!(
                "{name}() takes a column name"
            ))),
        }
    }

    fn aggregate(&self, name: &str, column: &str) -> Result<Cell, AppError> {
        let index = self.table.column_index(column)?;
        let mut sum = 0.0;
        let mut count = 0usize;
        let mut non_null = 0usize;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for (i, row) in self.table.rows().iter().enumerate() {
            if i % 1024 == 0 {
                self.limits.check()?;
            }
            let cell = &row[index];
            if !cell.is_null() {
                non_null += 1;
            }
            if let Some(n) = cell.as_number() {
                sum += n;
                count += 1;
                min = min.min(n);
                max = max.max(n);
            }
        }

        Ok(match name {
            "count" => Cell::Number(non_null as f64),
            "sum" if count > 0 => Cell::Number(sum),
            "avg" if count > 0 => Cell::Number(sum / count as f64),
            "min" if count > 0 => Cell::Number(min),
            "max" if count > 0 => Cell::Number(max),
            _ => Cell::Null,
        })
    }

    fn numeric_fn(
        &self,
        args: &[Expr],
        row: Option<usize>,
        f: fn(f64) -> f64,
    ) -> Result<Cell, AppError> {
        expect_args("numeric function", args, 1..=1)?;
        let value = self.eval(&args[0], row)?;
        Ok(match value.coerce_number() {
            Some(n) => Cell::Number(f(n)),
            None => Cell::Null,
        })
    }

    fn text_fn(
        &self,
        args: &[Expr],
        row: Option<usize>,
        f: impl Fn(&str) -> String,
    ) -> Result<Cell, AppError> {
        expect_args("text function", args, 1..=1)?;
        let value = self.eval(&args[0], row)?;
        Ok(match value {
            Cell::Null => Cell::Null,
            other => Cell::Text(f(&other.to_text())),
        })
    }

    fn text_arg(
        &self,
        name: &str,
        args: &[Expr],
        index: usize,
        row: Option<usize>,
    ) -> Result<String, AppError> {
        let arg = args.get(index).ok_or_else(|| {
            AppError::data(format!("{name}() is missing argument {}", index + 1))
        })?;
        Ok(self.eval(arg, row)?.to_text())
    }
}

fn expect_args(
    name: &str,
    args: &[Expr],
    range: std::ops::RangeInclusive<usize>,
) -> Result<(), AppError> {
    if range.contains(&args.len()) {
        Ok(())
    } else {
        Err(AppError::data(format!(
            "{name}() expects {} to {} argument(s), got {}",
            range.start(),
            range.end(),
            args.len()
        )))
    }
}

fn cells_equal(a: &Cell, b: &Cell) -> bool {
    if a.is_null() && b.is_null() {
        return true;
    }
    if let (Some(x), Some(y)) = (a.coerce_number(), b.coerce_number()) {
        return x == y;
    }
    a.to_text().to_lowercase() == b.to_text().to_lowercase()
}

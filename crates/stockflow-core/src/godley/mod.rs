//! Godley tables.
//!
//! A Godley table is a double-entry ledger over the flow/stock graph. Columns are
//! stocks, rows are flows, and every cell holds the signed flow terms the row
//! contributes to the column's stock:
//!
//! ```text
//!   Flows V / Stock Vars →   Reserves   Loans       Deposits         Banks_Equity
//!   Initial Conditions       100        500         550              50
//!   Lending                             Lending     Lending
//!   Repayment                           -Repayment  -Repayment
//! ```
//!
//! Each row must satisfy `assets - liabilities - equity = 0`. The table itself does
//! no integration: [`install`] wires each column into an integral of the model graph.

mod balance;
mod install;

pub use balance::BalanceReport;
pub use install::install;

use crate::errors::{SimError, SimResult};
use crate::flow_coef::{format_terms, parse_terms, FlowCoef};
use crate::variable::normalise_name;
use crate::FloatValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label of cell (0, 0).
pub const HEADER_LABEL: &str = "Flows V / Stock Vars →";
/// Label of cell (1, 0).
pub const INITIAL_CONDITIONS_LABEL: &str = "Initial Conditions";

/// Row holding the initial stock values.
pub const INITIAL_CONDITIONS_ROW: usize = 1;
/// First row holding flows.
pub const FIRST_FLOW_ROW: usize = 2;

/// Balance-sheet side of a stock column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssetClass {
    /// Not part of the balance sheet, e.g. the label column.
    #[default]
    NoAssetClass,
    Asset,
    Liability,
    Equity,
}

impl AssetClass {
    /// Weight of the class in `assets - liabilities - equity`.
    pub fn weight(&self) -> FloatValue {
        match self {
            AssetClass::NoAssetClass => 0.0,
            AssetClass::Asset => 1.0,
            AssetClass::Liability | AssetClass::Equity => -1.0,
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetClass::NoAssetClass => write!(f, "noAssetClass"),
            AssetClass::Asset => write!(f, "asset"),
            AssetClass::Liability => write!(f, "liability"),
            AssetClass::Equity => write!(f, "equity"),
        }
    }
}

/// A double-entry table of flows against stocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GodleyTable {
    name: String,
    /// Row-major cell text. Every row has one entry per column.
    cells: Vec<Vec<String>>,
    /// Asset class per column. Column 0 is always `NoAssetClass`.
    classes: Vec<AssetClass>,
    /// Equity column whose contents are the balancing residual.
    derived_equity: Option<usize>,
}

impl GodleyTable {
    /// An empty table with the header and initial-condition rows.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cells: vec![
                vec![HEADER_LABEL.to_string()],
                vec![INITIAL_CONDITIONS_LABEL.to_string()],
            ],
            classes: vec![AssetClass::NoAssetClass],
            derived_equity: None,
        }
    }

    /// Append a stock column with its initial value (a number or an
    /// initial-condition expression).
    pub fn with_stock(mut self, stock: &str, class: AssetClass, initial: impl ToString) -> Self {
        self.push_column(stock, class, initial.to_string());
        self
    }

    /// Append an equity column filled in as the balancing residual.
    pub fn with_derived_equity(mut self, stock: &str) -> Self {
        let column = self.push_column(stock, AssetClass::Equity, String::new());
        self.derived_equity = Some(column);
        self
    }

    /// Append a flow row. Stocks not mentioned in `entries` get an empty cell.
    pub fn with_flow(mut self, label: &str, entries: &[(&str, &str)]) -> Self {
        let mut row = vec![String::new(); self.cols()];
        row[0] = label.to_string();
        for (stock, text) in entries {
            match self.column(stock) {
                Some(column) => row[column] = text.to_string(),
                None => {
                    let column = self.push_column(stock, AssetClass::NoAssetClass, String::new());
                    row.push(String::new());
                    row[column] = text.to_string();
                }
            }
        }
        self.cells.push(row);
        self
    }

    fn push_column(&mut self, stock: &str, class: AssetClass, initial: String) -> usize {
        let column = self.cols();
        for (r, row) in self.cells.iter_mut().enumerate() {
            row.push(match r {
                0 => stock.to_string(),
                INITIAL_CONDITIONS_ROW => initial.clone(),
                _ => String::new(),
            });
        }
        self.classes.push(class);
        column
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    pub fn cols(&self) -> usize {
        self.classes.len()
    }

    /// Cell text. Out-of-range cells read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.cells
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn set_cell(&mut self, row: usize, col: usize, text: &str) -> SimResult<()> {
        let cell = self
            .cells
            .get_mut(row)
            .and_then(|r| r.get_mut(col))
            .ok_or_else(|| {
                SimError::NotFound(format!("cell ({}, {}) of table '{}'", row, col, self.name))
            })?;
        *cell = text.to_string();
        Ok(())
    }

    /// Stock names of columns 1.., unqualified as written in the header.
    pub fn stock_names(&self) -> Vec<&str> {
        self.cells[0][1..].iter().map(String::as_str).collect()
    }

    /// Qualified name of the stock in `col`, if the column has one.
    pub fn stock_at(&self, col: usize) -> Option<String> {
        let name = self.cell(0, col).trim();
        (col > 0 && !name.is_empty()).then(|| normalise_name(name))
    }

    /// Column of `stock`, accepting qualified or unqualified names.
    pub fn column(&self, stock: &str) -> Option<usize> {
        let stock = normalise_name(stock);
        (1..self.cols()).find(|c| self.stock_at(*c).as_deref() == Some(stock.as_str()))
    }

    pub fn asset_class(&self, col: usize) -> AssetClass {
        self.classes.get(col).copied().unwrap_or_default()
    }

    pub fn set_asset_class(&mut self, col: usize, class: AssetClass) {
        if let Some(c) = self.classes.get_mut(col) {
            *c = class;
        }
    }

    /// Initial-condition text of `col`.
    pub fn initial_value(&self, col: usize) -> &str {
        self.cell(INITIAL_CONDITIONS_ROW, col)
    }

    pub fn row_label(&self, row: usize) -> &str {
        self.cell(row, 0)
    }

    pub fn derived_equity_column(&self) -> Option<usize> {
        self.derived_equity
    }

    /// Parsed terms of a cell.
    pub fn cell_terms(&self, row: usize, col: usize) -> SimResult<Vec<FlowCoef>> {
        parse_terms(self.cell(row, col))
    }

    /// Net flow terms of a column, summed over every flow row.
    ///
    /// Terms naming the same flow are merged and cancelled terms dropped. Order
    /// follows first appearance.
    pub fn column_terms(&self, col: usize) -> SimResult<Vec<FlowCoef>> {
        let mut terms = Vec::new();
        for row in FIRST_FLOW_ROW..self.rows() {
            terms.extend(self.cell_terms(row, col)?);
        }
        Ok(merge_terms(terms))
    }

    /// Whether `col` changes its stock by the same net flows as column `other_col`
    /// of `other`, within `tolerance`.
    pub fn column_matches(
        &self,
        col: usize,
        other: &GodleyTable,
        other_col: usize,
        tolerance: FloatValue,
    ) -> SimResult<bool> {
        let mut difference = self.column_terms(col)?;
        difference.extend(
            other
                .column_terms(other_col)?
                .into_iter()
                .map(|t| FlowCoef::new(-t.coef, t.name)),
        );
        Ok(merge_terms(difference)
            .iter()
            .all(|t| t.coef.abs() <= tolerance))
    }

    /// Fill the derived equity column with the residual of every other column.
    pub fn derive_equity(&mut self) -> SimResult<()> {
        let Some(equity) = self.derived_equity else {
            return Ok(());
        };
        for row in INITIAL_CONDITIONS_ROW..self.rows() {
            let mut residual = Vec::new();
            for col in (1..self.cols()).filter(|c| *c != equity) {
                let weight = self.asset_class(col).weight();
                if weight == 0.0 {
                    continue;
                }
                residual.extend(
                    self.cell_terms(row, col)?
                        .into_iter()
                        .map(|t| FlowCoef::new(weight * t.coef, t.name)),
                );
            }
            let text = format_terms(&merge_terms(residual));
            let text = if text.is_empty() && row == INITIAL_CONDITIONS_ROW {
                "0".to_string()
            } else {
                text
            };
            self.cells[row][equity] = text;
        }
        Ok(())
    }

    /// Check that every flow row balances symbolically.
    ///
    /// For each flow named in a row, the class-weighted coefficients across the
    /// balance-sheet columns must sum to zero within `tolerance`.
    pub fn validate_rows(&self, tolerance: FloatValue) -> SimResult<()> {
        for row in FIRST_FLOW_ROW..self.rows() {
            let mut net = Vec::new();
            for col in 1..self.cols() {
                let weight = self.asset_class(col).weight();
                if weight == 0.0 {
                    continue;
                }
                net.extend(
                    self.cell_terms(row, col)?
                        .into_iter()
                        .map(|t| FlowCoef::new(weight * t.coef, t.name)),
                );
            }
            let mut totals: Vec<FlowCoef> = Vec::new();
            for term in net {
                match totals.iter_mut().find(|t| t.name == term.name) {
                    Some(existing) => existing.coef += term.coef,
                    None => totals.push(term),
                }
            }
            if let Some(unbalanced) = totals.iter().find(|t| t.coef.abs() > tolerance) {
                return Err(SimError::UnbalancedFlowRow {
                    table: self.name.clone(),
                    row,
                    label: self.row_label(row).to_string(),
                    flow: if unbalanced.is_literal() {
                        "constant".to_string()
                    } else {
                        unbalanced.name.clone()
                    },
                    net: unbalanced.coef,
                });
            }
        }
        Ok(())
    }
}

/// Sum terms naming the same variable, dropping those that cancel.
fn merge_terms(terms: Vec<FlowCoef>) -> Vec<FlowCoef> {
    let mut merged: Vec<FlowCoef> = Vec::new();
    for term in terms {
        let name = if term.is_literal() {
            String::new()
        } else {
            normalise_name(&term.name)
        };
        match merged.iter_mut().find(|t| {
            let existing = if t.is_literal() {
                String::new()
            } else {
                normalise_name(&t.name)
            };
            existing == name
        }) {
            Some(existing) => existing.coef += term.coef,
            None => merged.push(term),
        }
    }
    merged.retain(|t| t.coef != 0.0);
    merged
}

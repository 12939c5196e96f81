use super::GodleyTable;
use crate::errors::{SimError, SimResult};
use crate::store::VariableStore;
use crate::{FloatValue, Time};
use serde::{Deserialize, Serialize};

/// Balance sheet totals of one Godley table at an instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub table: String,
    pub assets: FloatValue,
    pub liabilities: FloatValue,
    pub equity: FloatValue,
}

impl BalanceReport {
    /// Totals of `table` using `values`, indexed by the slots of `store`.
    pub fn from_values(
        table: &GodleyTable,
        store: &VariableStore,
        values: &[FloatValue],
    ) -> SimResult<Self> {
        let mut report = Self {
            table: table.name().to_string(),
            assets: 0.0,
            liabilities: 0.0,
            equity: 0.0,
        };
        for col in 1..table.cols() {
            let Some(stock) = table.stock_at(col) else {
                continue;
            };
            let value = values[store.slot(&stock)?];
            match table.asset_class(col) {
                super::AssetClass::Asset => report.assets += value,
                super::AssetClass::Liability => report.liabilities += value,
                super::AssetClass::Equity => report.equity += value,
                super::AssetClass::NoAssetClass => {}
            }
        }
        Ok(report)
    }

    /// Totals using the current store values.
    pub fn from_store(table: &GodleyTable, store: &VariableStore) -> SimResult<Self> {
        Self::from_values(table, store, &store.snapshot())
    }

    pub fn liabilities_and_equity(&self) -> FloatValue {
        self.liabilities + self.equity
    }

    /// `assets - (liabilities + equity)`.
    pub fn residual(&self) -> FloatValue {
        self.assets - self.liabilities_and_equity()
    }

    pub fn is_balanced(&self, tolerance: FloatValue) -> bool {
        self.residual().abs() <= tolerance
    }

    /// Error if the table did not balance at load.
    pub fn check_initial(&self, tolerance: FloatValue) -> SimResult<()> {
        if self.is_balanced(tolerance) {
            return Ok(());
        }
        Err(SimError::UnbalancedInitialConditions {
            table: self.table.clone(),
            assets: self.assets,
            liabilities_and_equity: self.liabilities_and_equity(),
            residual: self.residual(),
        })
    }

    /// Error if the table drifted out of balance at `t`.
    pub fn check_drift(&self, t: Time, tolerance: FloatValue) -> SimResult<()> {
        if self.is_balanced(tolerance) {
            return Ok(());
        }
        Err(SimError::AccountingDrift {
            table: self.table.clone(),
            t,
            residual: self.residual(),
            tolerance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::godley::AssetClass;
    use crate::variable::Variable;
    use is_close::is_close;

    fn setup(equity: FloatValue) -> (GodleyTable, VariableStore) {
        let table = GodleyTable::new("Banks")
            .with_stock("Reserves", AssetClass::Asset, 100.0)
            .with_stock("Loans", AssetClass::Asset, 500.0)
            .with_stock("Deposits", AssetClass::Liability, 550.0)
            .with_stock("Banks_Equity", AssetClass::Equity, equity);
        let mut store = VariableStore::new();
        store.register(Variable::stock("Reserves", 100.0)).unwrap();
        store.register(Variable::stock("Loans", 500.0)).unwrap();
        store.register(Variable::stock("Deposits", 550.0)).unwrap();
        store.register(Variable::stock("Banks_Equity", equity)).unwrap();
        (table, store)
    }

    #[test]
    fn balanced_sheet() {
        let (table, store) = setup(50.0);
        let report = BalanceReport::from_store(&table, &store).unwrap();
        assert!(is_close!(report.assets, 600.0));
        assert!(is_close!(report.liabilities_and_equity(), 600.0));
        assert_eq!(report.residual(), 0.0);
        assert!(report.check_initial(1e-10).is_ok());
    }

    #[test]
    fn unbalanced_sheet() {
        let (table, store) = setup(40.0);
        let report = BalanceReport::from_store(&table, &store).unwrap();
        assert_eq!(
            report.check_initial(1e-10),
            Err(SimError::UnbalancedInitialConditions {
                table: "Banks".to_string(),
                assets: 600.0,
                liabilities_and_equity: 590.0,
                residual: 10.0
            })
        );
        assert!(matches!(
            report.check_drift(1.0, 1e-8),
            Err(SimError::AccountingDrift { t, .. }) if t == 1.0
        ));
    }

    #[test]
    fn missing_stock_is_not_found() {
        let (table, _) = setup(50.0);
        assert!(matches!(
            BalanceReport::from_store(&table, &VariableStore::new()),
            Err(SimError::NotFound(_))
        ));
    }
}

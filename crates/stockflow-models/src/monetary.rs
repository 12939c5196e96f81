//! Monetary model with a single bank
//!
//! The bank's balance sheet is a Godley table with reserves and loans as assets,
//! deposits as a liability and equity derived as the balancing column:
//!
//! | Flows          | Reserves | Loans      | Deposits         | Banks_Equity |
//! |----------------|----------|------------|------------------|--------------|
//! | Initial        | 100      | 500        | 550              | 50           |
//! | Lending        |          | Lending    | Lending          |              |
//! | Repayment      |          | -Repayment | -Repayment       |              |
//! | Interest       |          |            | -Interest        | Interest     |
//! | Deposit int.   |          |            | DepositInterest  | -DepositInterest |
//! | Bank spending  |          |            | BankSpending     | -BankSpending |
//!
//! Bank spending is a fixed fraction of equity, and exceeds interest income at the
//! default parameters, so equity declines towards its equilibrium.

use serde::{Deserialize, Serialize};
use stockflow_core::errors::SimResult;
use stockflow_core::godley::{AssetClass, GodleyTable};
use stockflow_core::model::{Model, ModelBuilder};
use stockflow_core::operation::OperationType;
use stockflow_core::variable::Variable;
use stockflow_core::FloatValue;

use crate::define_binary;

/// Parameters for the monetary model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonetaryParameters {
    pub reserves: FloatValue,
    pub loans: FloatValue,
    pub deposits: FloatValue,
    /// New lending as a fraction of outstanding loans
    /// unit: 1 / yr
    pub lending_rate: FloatValue,
    /// Average time to repay a loan
    /// unit: yr
    pub repayment_time: FloatValue,
    /// unit: 1 / yr
    pub loan_rate: FloatValue,
    /// unit: 1 / yr
    pub deposit_rate: FloatValue,
    /// Time over which the bank spends its equity
    /// unit: yr
    pub spending_time: FloatValue,
}

impl Default for MonetaryParameters {
    fn default() -> Self {
        Self {
            reserves: 100.0,
            loans: 500.0,
            deposits: 550.0,
            lending_rate: 0.1,
            repayment_time: 10.0,
            loan_rate: 0.05,
            deposit_rate: 0.02,
            spending_time: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonetaryModel {
    pub parameters: MonetaryParameters,
}

impl MonetaryModel {
    pub fn from_parameters(parameters: MonetaryParameters) -> Self {
        Self { parameters }
    }

    pub fn table(&self) -> GodleyTable {
        let p = &self.parameters;
        GodleyTable::new("Banks")
            .with_stock("Reserves", AssetClass::Asset, p.reserves)
            .with_stock("Loans", AssetClass::Asset, p.loans)
            .with_stock("Deposits", AssetClass::Liability, p.deposits)
            .with_derived_equity("Banks_Equity")
            .with_flow("Lending", &[("Loans", "Lending"), ("Deposits", "Lending")])
            .with_flow(
                "Repayment",
                &[("Loans", "-Repayment"), ("Deposits", "-Repayment")],
            )
            .with_flow("Interest", &[("Deposits", "-Interest")])
            .with_flow("Deposit interest", &[("Deposits", "DepositInterest")])
            .with_flow("Bank spending", &[("Deposits", "BankSpending")])
    }

    pub fn build(&self) -> SimResult<Model> {
        let p = &self.parameters;
        let mut builder = ModelBuilder::new();
        builder
            .with_variables([
                Variable::flow("Lending"),
                Variable::flow("Repayment"),
                Variable::flow("Interest"),
                Variable::flow("DepositInterest"),
                Variable::flow("BankSpending"),
                Variable::parameter("lending_rate", p.lending_rate),
                Variable::parameter("repayment_time", p.repayment_time),
                Variable::parameter("loan_rate", p.loan_rate),
                Variable::parameter("deposit_rate", p.deposit_rate),
                Variable::parameter("spending_time", p.spending_time),
            ])
            .with_godley_table(self.table());

        define_binary(&mut builder, "Lending", OperationType::Multiply, "lending_rate", "Loans");
        define_binary(&mut builder, "Repayment", OperationType::Divide, "Loans", "repayment_time");
        define_binary(&mut builder, "Interest", OperationType::Multiply, "loan_rate", "Loans");
        define_binary(
            &mut builder,
            "DepositInterest",
            OperationType::Multiply,
            "deposit_rate",
            "Deposits",
        );
        define_binary(
            &mut builder,
            "BankSpending",
            OperationType::Divide,
            "Banks_Equity",
            "spending_time",
        );
        builder.build()
    }
}

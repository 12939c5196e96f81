//! Endogenous money with banks and firms
//!
//! Lending creates loans and firm deposits together. Firms pay wages out of their
//! deposits into worker deposits, workers spend theirs back on consumption, and the bank
//! earns interest on loans which it spends back into the economy.
//!
//! Two Godley tables view the same stocks from either side. Firm deposits and loans are
//! shared between the bank's table (where deposits are a liability) and the firms' table
//! (where they are an asset). Each table derives its own equity.

use serde::{Deserialize, Serialize};
use stockflow_core::errors::SimResult;
use stockflow_core::godley::{AssetClass, GodleyTable};
use stockflow_core::model::{Model, ModelBuilder};
use stockflow_core::operation::OperationType;
use stockflow_core::variable::Variable;
use stockflow_core::FloatValue;

use crate::define_binary;

/// Parameters for the endogenous money model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndogenousMoneyParameters {
    pub reserves: FloatValue,
    pub loans: FloatValue,
    pub firm_deposits: FloatValue,
    pub worker_deposits: FloatValue,
    /// unit: 1 / yr
    pub lending_rate: FloatValue,
    /// unit: yr
    pub repayment_time: FloatValue,
    /// unit: 1 / yr
    pub loan_rate: FloatValue,
    /// Annual turnover of firm deposits
    /// unit: 1 / yr
    pub turnover: FloatValue,
    /// Share of output paid out as wages
    pub wage_share: FloatValue,
    /// Time workers take to spend their deposits
    /// unit: yr
    pub worker_spending_time: FloatValue,
    /// Time the bank takes to spend its equity
    /// unit: yr
    pub bank_spending_time: FloatValue,
}

impl Default for EndogenousMoneyParameters {
    fn default() -> Self {
        Self {
            reserves: 200.0,
            loans: 1000.0,
            firm_deposits: 800.0,
            worker_deposits: 300.0,
            lending_rate: 0.12,
            repayment_time: 10.0,
            loan_rate: 0.05,
            turnover: 2.0,
            wage_share: 0.7,
            worker_spending_time: 0.25,
            bank_spending_time: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndogenousMoneyModel {
    pub parameters: EndogenousMoneyParameters,
}

impl EndogenousMoneyModel {
    pub fn from_parameters(parameters: EndogenousMoneyParameters) -> Self {
        Self { parameters }
    }

    pub fn banks(&self) -> GodleyTable {
        let p = &self.parameters;
        GodleyTable::new("Banks")
            .with_stock("Reserves", AssetClass::Asset, p.reserves)
            .with_stock("Loans", AssetClass::Asset, p.loans)
            .with_stock("FirmDeposits", AssetClass::Liability, p.firm_deposits)
            .with_stock("WorkerDeposits", AssetClass::Liability, p.worker_deposits)
            .with_derived_equity("Banks_Equity")
            .with_flow(
                "Lending",
                &[("Loans", "Lending"), ("FirmDeposits", "Lending")],
            )
            .with_flow(
                "Repayment",
                &[("Loans", "-Repayment"), ("FirmDeposits", "-Repayment")],
            )
            .with_flow("Interest", &[("FirmDeposits", "-Interest")])
            .with_flow(
                "Wages",
                &[("FirmDeposits", "-Wages"), ("WorkerDeposits", "Wages")],
            )
            .with_flow(
                "Consumption",
                &[
                    ("FirmDeposits", "Consumption"),
                    ("WorkerDeposits", "-Consumption"),
                ],
            )
            .with_flow("Bank spending", &[("FirmDeposits", "BankSpending")])
    }

    pub fn firms(&self) -> GodleyTable {
        let p = &self.parameters;
        GodleyTable::new("Firms")
            .with_stock("FirmDeposits", AssetClass::Asset, p.firm_deposits)
            .with_stock("Loans", AssetClass::Liability, p.loans)
            .with_derived_equity("Firms_Equity")
            .with_flow(
                "Lending",
                &[("FirmDeposits", "Lending"), ("Loans", "Lending")],
            )
            .with_flow(
                "Repayment",
                &[("FirmDeposits", "-Repayment"), ("Loans", "-Repayment")],
            )
            .with_flow("Interest", &[("FirmDeposits", "-Interest")])
            .with_flow("Wages", &[("FirmDeposits", "-Wages")])
            .with_flow("Consumption", &[("FirmDeposits", "Consumption")])
            .with_flow("Bank spending", &[("FirmDeposits", "BankSpending")])
    }

    pub fn build(&self) -> SimResult<Model> {
        let p = &self.parameters;
        let mut builder = ModelBuilder::new();
        builder
            .with_variables([
                Variable::flow("Lending"),
                Variable::flow("Repayment"),
                Variable::flow("Interest"),
                Variable::flow("Wages"),
                Variable::flow("Consumption"),
                Variable::flow("BankSpending"),
                Variable::flow("GDP"),
                Variable::flow("Money"),
                Variable::parameter("lending_rate", p.lending_rate),
                Variable::parameter("repayment_time", p.repayment_time),
                Variable::parameter("loan_rate", p.loan_rate),
                Variable::parameter("turnover", p.turnover),
                Variable::parameter("wage_share", p.wage_share),
                Variable::parameter("worker_spending_time", p.worker_spending_time),
                Variable::parameter("bank_spending_time", p.bank_spending_time),
            ])
            .with_godley_table(self.banks())
            .with_godley_table(self.firms());

        define_binary(&mut builder, "Lending", OperationType::Multiply, "lending_rate", "Loans");
        define_binary(&mut builder, "Repayment", OperationType::Divide, "Loans", "repayment_time");
        define_binary(&mut builder, "Interest", OperationType::Multiply, "loan_rate", "Loans");
        define_binary(&mut builder, "GDP", OperationType::Multiply, "turnover", "FirmDeposits");
        define_binary(&mut builder, "Wages", OperationType::Multiply, "wage_share", "GDP");
        define_binary(
            &mut builder,
            "Consumption",
            OperationType::Divide,
            "WorkerDeposits",
            "worker_spending_time",
        );
        define_binary(
            &mut builder,
            "BankSpending",
            OperationType::Divide,
            "Banks_Equity",
            "bank_spending_time",
        );
        define_binary(&mut builder, "Money", OperationType::Add, "FirmDeposits", "WorkerDeposits");
        builder.build()
    }
}

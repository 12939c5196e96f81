//! Godley tables installed through the builder.

use crate::errors::SimError;
use crate::godley::{AssetClass, BalanceReport, GodleyTable};
use crate::graph::NodeKind;
use crate::model::{Model, ModelBuilder};
use crate::operation::OperationType;
use crate::variable::Variable;
use approx::assert_relative_eq;

fn banks_table() -> GodleyTable {
    GodleyTable::new("Banks")
        .with_stock("Reserves", AssetClass::Asset, 100.0)
        .with_stock("Loans", AssetClass::Asset, 500.0)
        .with_stock("Deposits", AssetClass::Liability, 550.0)
        .with_derived_equity("Banks_Equity")
        .with_flow("Lending", &[("Loans", "Lending"), ("Deposits", "Lending")])
        .with_flow(
            "Interest",
            &[("Reserves", "Interest"), ("Deposits", "")],
        )
}

fn banks_model() -> Model {
    let mut builder = ModelBuilder::new();
    builder
        .with_variable(Variable::flow("Lending"))
        .with_variable(Variable::flow("Interest"))
        .with_godley_table(banks_table());

    let loans = builder.variable("Loans");
    let lending_rate = builder.constant(0.1);
    let lending = builder.operation(OperationType::Multiply, &[loans, lending_rate]);
    builder.define("Lending", lending);

    let interest = builder.constant(2.0);
    builder.define("Interest", interest);
    builder.build().unwrap()
}

#[test]
fn build_installs_tables() {
    let model = banks_model();
    let table = model.godley_table(0).unwrap();

    assert_eq!(table.cell(1, 4), "50");
    assert_eq!(table.cell(3, 4), "Interest");
    for stock in ["Reserves", "Loans", "Deposits", "Banks_Equity"] {
        assert!(model.graph().integral_for(stock).is_some(), "{}", stock);
        assert!(model.variables().contains(stock));
    }

    let icons: Vec<_> = model
        .items()
        .into_iter()
        .filter(|item| item.is_godley_backed())
        .collect();
    assert_eq!(icons.len(), 1);
    assert!(matches!(icons[0].kind(), NodeKind::GodleyIcon { table: 0 }));
    let table = icons[0].godley_icon_cast().unwrap();
    assert_eq!(table.rows(), 4);
    assert_eq!(table.cols(), 5);
}

#[test]
fn initial_values_come_from_the_table() {
    let mut model = banks_model();
    model.variables_mut().resolve_initial_values().unwrap();
    let report = BalanceReport::from_store(&model.godley_tables()[0], model.variables()).unwrap();
    assert_relative_eq!(report.assets, 600.0);
    assert_relative_eq!(report.liabilities, 550.0);
    assert_relative_eq!(report.equity, 50.0);
    assert_eq!(report.residual(), 0.0);
}

#[test]
fn unbalanced_row_fails_to_build() {
    let mut builder = ModelBuilder::new();
    builder
        .with_variable(Variable::flow("Wages"))
        .with_godley_table(
            GodleyTable::new("Firms")
                .with_stock("Deposits", AssetClass::Asset, 10.0)
                .with_stock("Loans", AssetClass::Liability, 10.0)
                .with_flow("Wages", &[("Deposits", "-Wages")]),
        );
    assert!(matches!(
        builder.build(),
        Err(SimError::UnbalancedFlowRow { row: 2, .. })
    ));
}

#[test]
fn unknown_flow_fails_to_build() {
    let mut builder = ModelBuilder::new();
    builder.with_godley_table(banks_table());
    assert_eq!(
        builder.build().unwrap_err(),
        SimError::NotFound("Interest".to_string())
    );
}

#[test]
fn invalid_cell_fails_to_build() {
    let mut builder = ModelBuilder::new();
    builder.with_variable(Variable::flow("Lending")).with_godley_table(
        GodleyTable::new("Banks")
            .with_stock("Loans", AssetClass::Asset, 0.0)
            .with_stock("Deposits", AssetClass::Liability, 0.0)
            .with_flow("Lending", &[("Loans", "Lending*"), ("Deposits", "Lending")]),
    );
    assert!(matches!(
        builder.build(),
        Err(SimError::InvalidFlowCoefficient(_))
    ));
}

#[test]
fn shared_stock_must_carry_the_same_flows() {
    let mut builder = ModelBuilder::new();
    builder
        .with_variable(Variable::flow("Lending"))
        .with_variable(Variable::flow("Interest"))
        .with_variable(Variable::flow("Wages"))
        .with_godley_table(banks_table())
        .with_godley_table(
            GodleyTable::new("Firms")
                .with_stock("Deposits", AssetClass::Asset, 550.0)
                .with_stock("Loans", AssetClass::Liability, 500.0)
                .with_derived_equity("Firms_Equity")
                .with_flow("Lending", &[("Deposits", "Lending"), ("Loans", "Lending")])
                .with_flow("Wages", &[("Deposits", "-Wages")]),
        );
    let lending = builder.constant(1.0);
    builder.define("Lending", lending);
    let interest = builder.constant(1.0);
    builder.define("Interest", interest);
    let wages = builder.constant(1.0);
    builder.define("Wages", wages);
    assert!(matches!(
        builder.build(),
        Err(SimError::InconsistentGodleyColumn { ref stock, .. }) if stock == ":Deposits"
    ));
}


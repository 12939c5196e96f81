//! Whole-model properties: time keeping, balance sheets, determinism and enumeration.

use approx::assert_relative_eq;
use is_close::is_close;
use stockflow_core::config::SimulationConfig;
use stockflow_core::errors::SimError;
use stockflow_core::model::ModelBuilder;
use stockflow_core::operation::OperationType;
use stockflow_core::simulation::Session;
use stockflow_models::{GoodwinModel, MonetaryModel};

const STEP_SIZE: f64 = 0.05;

fn session() -> Session {
    Session::new(SimulationConfig::default().with_step_size(STEP_SIZE)).unwrap()
}

#[test]
fn time_is_step_count_times_step_size() {
    let mut session = session();
    session.load(GoodwinModel::default().build().unwrap()).unwrap();
    assert_eq!(session.t(), 0.0);

    let mut previous = session.t();
    for n in 1..=200 {
        let t = session.step().unwrap();
        assert!(t > previous);
        assert!(is_close!(t, n as f64 * STEP_SIZE));
        previous = t;
    }
}

#[test]
fn monetary_balance_sheet_identity() {
    let mut session = session();
    session.load(MonetaryModel::default().build().unwrap()).unwrap();

    let value = |session: &Session, name: &str| session.value(name).unwrap();
    assert_eq!(value(&session, "Reserves"), 100.0);
    assert_eq!(value(&session, "Loans"), 500.0);
    assert_eq!(value(&session, "Deposits"), 550.0);
    assert_eq!(value(&session, "Banks_Equity"), 50.0);
    assert_eq!(
        value(&session, "Reserves") + value(&session, "Loans"),
        value(&session, "Deposits") + value(&session, "Banks_Equity")
    );

    for _ in 0..100 {
        session.step().unwrap();
        let assets = value(&session, "Reserves") + value(&session, "Loans");
        let claims = value(&session, "Deposits") + value(&session, "Banks_Equity");
        assert!((assets - claims).abs() < 1e-8);
    }
    assert_relative_eq!(session.t(), 100.0 * STEP_SIZE, epsilon = 1e-12);
}

#[test]
fn identical_runs_are_identical() {
    let run = || {
        let mut session = session();
        session.load(GoodwinModel::default().build().unwrap()).unwrap();
        (0..100)
            .map(|_| {
                session.step().unwrap();
                session.variables().unwrap().snapshot()
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn every_variable_is_enumerated_and_found() {
    let mut session = session();
    session.load(MonetaryModel::default().build().unwrap()).unwrap();

    let variables = session.variables().unwrap();
    assert!(!variables.is_empty());
    for variable in variables.iter() {
        assert!(variable.name.contains(':'));
        assert_eq!(session.value(&variable.name).unwrap(), variable.value);
    }

    let items = session.items().unwrap();
    let tables: Vec<_> = items
        .iter()
        .filter_map(|item| item.godley_icon_cast())
        .collect();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].rows(), 7);
    assert_eq!(tables[0].cols(), 5);
    assert_eq!(tables[0].cell(0, 2), "Loans");
}

#[test]
fn dynamic_variables_do_not_stall() {
    let mut session = session();
    session.load(GoodwinModel::default().build().unwrap()).unwrap();
    let initial = session.variables().unwrap().clone();
    for _ in 0..100 {
        session.step().unwrap();
    }

    for (before, after) in initial.iter().zip(session.variables().unwrap().iter()) {
        if before.kind.is_dynamic() {
            assert_ne!(before.value, after.value, "{}", before.name);
        } else {
            assert_eq!(before.value, after.value, "{}", before.name);
        }
    }
}

#[test]
fn operation_cycle_without_integral_is_rejected() {
    let mut builder = ModelBuilder::new();
    let a = builder.operation(OperationType::Add, &[]);
    let b = builder.operation(OperationType::Multiply, &[a]);
    let c = builder.operation(OperationType::Subtract, &[b]);
    builder.connect(c, a, 0);
    assert!(matches!(
        builder.build(),
        Err(SimError::CycleWithoutIntegration { .. })
    ));
}

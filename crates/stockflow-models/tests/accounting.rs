//! Balance sheets of the reference models stay consistent while the models run.

use approx::assert_relative_eq;
use is_close::is_close;
use stockflow_core::config::{DriftPolicy, IntegrationMethod, SimulationConfig};
use stockflow_core::model::Model;
use stockflow_core::simulation::Session;
use stockflow_models::{
    EndogenousMoneyModel, EndogenousMoneyParameters, GrowthModel, GrowthParameters, MonetaryModel,
};

const LOAD_TOLERANCE: f64 = 1e-10;
const STEP_TOLERANCE: f64 = 1e-8;

fn session(model: Model, method: IntegrationMethod) -> Session {
    let mut session = Session::new(
        SimulationConfig::default()
            .with_step_size(0.01)
            .with_method(method)
            .with_drift_policy(DriftPolicy::Fail),
    )
    .unwrap();
    session.load(model).unwrap();
    session
}

fn assert_balanced(session: &Session, tolerance: f64) {
    for report in session.check_accounting().unwrap() {
        assert!(
            report.residual().abs() < tolerance,
            "{}: {}",
            report.table,
            report.residual()
        );
    }
}

#[test]
fn monetary_model_balances() {
    for method in [
        IntegrationMethod::Euler,
        IntegrationMethod::RungeKutta4,
        IntegrationMethod::Adaptive,
    ] {
        let mut session = session(MonetaryModel::default().build().unwrap(), method);
        assert_balanced(&session, LOAD_TOLERANCE);
        assert_eq!(session.value("Banks_Equity").unwrap(), 50.0);

        let mut previous = session.value("Banks_Equity").unwrap();
        for _ in 0..100 {
            session.step().unwrap();
            assert_balanced(&session, STEP_TOLERANCE);

            let equity = session.value("Banks_Equity").unwrap();
            assert!(equity < previous, "{:?}", method);
            previous = equity;
        }
        assert!(is_close!(session.t(), 1.0));
    }
}

#[test]
fn endogenous_money_balances() {
    let mut session = session(
        EndogenousMoneyModel::default().build().unwrap(),
        IntegrationMethod::RungeKutta4,
    );
    assert_balanced(&session, LOAD_TOLERANCE);
    assert_eq!(session.last_drift().len(), 2);

    let initial = session.variables().unwrap().snapshot();
    for _ in 0..100 {
        session.step().unwrap();
        assert_balanced(&session, STEP_TOLERANCE);
        assert!(session.value("Money").unwrap() > session.value("Loans").unwrap());
        assert!(session.value("GDP").unwrap() > 0.0);
    }
    assert_ne!(session.variables().unwrap().snapshot(), initial);
    assert!(session.value("Banks_Equity").unwrap() < 100.0);
}

#[test]
fn reserves_are_untouched() {
    let mut session = session(
        EndogenousMoneyModel::from_parameters(EndogenousMoneyParameters {
            reserves: 50.0,
            firm_deposits: 650.0,
            ..Default::default()
        })
        .build()
        .unwrap(),
        IntegrationMethod::Euler,
    );
    for _ in 0..10 {
        session.step().unwrap();
    }
    assert_eq!(session.value("Reserves").unwrap(), 50.0);
}

#[test]
fn growth_matches_analytic_solution() {
    let model = GrowthModel::from_parameters(GrowthParameters {
        initial: 10.0,
        rate: 0.1,
    })
    .build()
    .unwrap();
    let mut session = session(model, IntegrationMethod::RungeKutta4);
    for _ in 0..100 {
        session.step().unwrap();
    }
    assert_relative_eq!(
        session.value("K").unwrap(),
        10.0 * (0.1f64).exp(),
        max_relative = 1e-10
    );
}

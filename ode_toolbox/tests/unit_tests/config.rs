use ode_toolbox::config::{DEFAULT_ABS_TOL, DEFAULT_MAX_STEPS, DEFAULT_REL_TOL};
use ode_toolbox::{create_solver, OdeError, SolverConfig, Tolerance};

use crate::utils::Oscillator;

#[test]
fn parse_full_config() {
    let json = r#"{
        "solverName": "RKF45",
        "absTol": 1e-12,
        "relTol": [1e-6, 1e-8],
        "maxSteps": 500,
        "safeScale": 0.85,
        "minScale": 0.1,
        "maxScale": 4.0
    }"#;
    let config: SolverConfig = serde_json::from_str(json).unwrap();

    assert_eq!(config.solver_name, "RKF45");
    assert_eq!(config.abs_tol, Tolerance::Scalar(1e-12));
    assert_eq!(config.rel_tol, Tolerance::Vector(vec![1e-6, 1e-8]));
    assert_eq!(config.max_steps, 500);
    assert_eq!(config.safe_scale(), 0.85);
    assert_eq!(config.min_scale(), 0.1);
    assert_eq!(config.max_scale(), 4.0);

    let system = Oscillator { omega: 1.0 };
    let solver = create_solver(&system, &config).unwrap();
    assert_eq!(solver.abs_tol().as_slice(), &[1e-12, 1e-12]);
    assert_eq!(solver.rel_tol().as_slice(), &[1e-6, 1e-8]);
    assert_eq!(solver.max_steps(), 500);
}

#[test]
fn missing_keys_take_defaults() {
    let config: SolverConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, SolverConfig::default());
    assert_eq!(config.abs_tol, Tolerance::Scalar(DEFAULT_ABS_TOL));
    assert_eq!(config.rel_tol, Tolerance::Scalar(DEFAULT_REL_TOL));
    assert_eq!(config.max_steps, DEFAULT_MAX_STEPS);
}

#[test]
fn short_tolerance_sequences_are_padded() {
    let config: SolverConfig = serde_json::from_str(r#"{ "absTol": [1e-9] }"#).unwrap();
    let system = Oscillator { omega: 1.0 };
    let solver = create_solver(&system, &config).unwrap();
    assert_eq!(solver.abs_tol().as_slice(), &[1e-9, DEFAULT_ABS_TOL]);
}

#[test]
fn unknown_keys_are_rejected() {
    let result = serde_json::from_str::<SolverConfig>(r#"{ "solverName": "RKF45", "tolerance": 1e-6 }"#);
    assert!(result.is_err());
}

#[test]
fn invalid_configurations_are_reported_on_creation() {
    let system = Oscillator { omega: 1.0 };

    let config = SolverConfig::default().set_rel_tol([1e-4, -1e-4]);
    assert!(matches!(
        create_solver(&system, &config),
        Err(OdeError::InvalidTolerance { index: 1, .. })
    ));

    let config = SolverConfig::default().set_abs_tol(0.0).set_rel_tol(0.0);
    assert!(matches!(
        create_solver(&system, &config),
        Err(OdeError::InvalidTolerance { index: 0, .. })
    ));

    let config = SolverConfig::default().set_max_steps(0);
    assert!(matches!(
        create_solver(&system, &config),
        Err(OdeError::InvalidConfiguration(_))
    ));
}

#[test]
fn unknown_solver_lists_valid_names() {
    let system = Oscillator { omega: 1.0 };
    let config = SolverConfig::new("RKF78");
    match create_solver(&system, &config) {
        Err(OdeError::UnknownSolverType { name, valid }) => {
            assert_eq!(name, "RKF78");
            assert!(valid.contains(&"RKF45".to_string()));
        }
        Err(err) => panic!("unexpected error {}", err),
        Ok(solver) => panic!("unexpectedly created solver {}", solver.name()),
    }

    let message = create_solver(&system, &config).err().unwrap().to_string();
    assert!(message.contains("RKF78"));
    assert!(message.contains("RKF45"));
}

use super::poisson_forms;
use galerkin::assembly::Assembler;
use galerkin::mesh::procedural::create_unit_square;
use galerkin::optimize::newton::{ConvergenceCriterion, NewtonSettings};
use galerkin::{CellType, Context, ContextConfig, ElementDescription, Error, FunctionSpace};
use std::sync::Arc;

#[test]
fn context_config_round_trip() {
    let config = ContextConfig {
        num_threads: Some(4),
        parallel_assembly: true,
        chunk_size: 64,
    };
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(serde_json::from_str::<ContextConfig>(&json).unwrap(), config);

    // Missing fields take their defaults
    let partial: ContextConfig = serde_json::from_str(r#"{ "parallel_assembly": true }"#).unwrap();
    assert_eq!(partial, ContextConfig::parallel());
}

#[test]
fn newton_settings_round_trip() {
    let settings = NewtonSettings {
        max_iterations: 12,
        rtol: 1e-8,
        atol: 1e-12,
        divergence_factor: 100.0,
        convergence_criterion: ConvergenceCriterion::Incremental,
        relaxation: 0.5,
    };
    let json = serde_json::to_string_pretty(&settings).unwrap();
    let restored: NewtonSettings<f64> = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, settings);
}

#[test]
fn invalid_context_configuration_is_rejected() {
    let zero_chunks = ContextConfig {
        chunk_size: 0,
        ..ContextConfig::default()
    };
    assert!(matches!(Context::new(zero_chunks), Err(Error::InvalidConfiguration(_))));

    let zero_threads = ContextConfig {
        num_threads: Some(0),
        ..ContextConfig::default()
    };
    assert!(matches!(Context::new(zero_threads), Err(Error::InvalidConfiguration(_))));
}

#[test]
fn assembly_records_timings() {
    let context = Context::default();
    let mesh = Arc::new(create_unit_square(2, 2, CellType::Triangle).unwrap());
    let space = FunctionSpace::build(mesh, ElementDescription::lagrange(CellType::Triangle, 1)).unwrap();
    let (a, l) = poisson_forms(&space, |_| 1.0);
    let assembler = Assembler::new(context.clone());
    assembler.assemble_system(&a, &[], &l, &[], &[]).unwrap();
    assembler.assemble_vector(&l, &[]).unwrap();

    assert_eq!(context.timing("Assemble vector").unwrap().count, 2);
    assert_eq!(context.timing("Assemble matrix").unwrap().count, 1);
    assert!(context.list_timings().contains("Build sparsity pattern"));

    context.clear_timings();
    assert!(context.timings().is_empty());
}

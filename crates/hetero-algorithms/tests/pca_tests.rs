//! PCA through the batch front end on CPU and device targets

mod common;

use common::*;
use hetero_algorithms::archive;
use hetero_algorithms::pca::{
    BaseParameter, CorrelationParameter, DataForTransformKey, PcaCorrelation, PcaInput, PcaResult,
    PcaSvd, ResultCollectionId, ResultId, ResultsToCompute, SvdParameter,
};
use hetero_algorithms::{Batch, ContainerState};
use hetero_core::{Error, ErrorClass, Precision, Target};

fn correlation(input: PcaInput, base: BaseParameter, env: &hetero_algorithms::Environment) -> Batch<PcaCorrelation> {
    Batch::<PcaCorrelation>::new::<f64>(env, input, CorrelationParameter::new(base)).unwrap()
}

#[test]
fn test_eigenvalues_sum_to_feature_count() {
    let mut pca = correlation(
        PcaInput::new(correlated_data::<f64>(50, 4, 11)),
        BaseParameter::default(),
        &cpu_env(),
    );
    assert!(pca.compute().is_ok());
    assert_eq!(pca.state(), ContainerState::Computed);

    let eigenvalues = pca.result().values(ResultId::Eigenvalues).unwrap();
    assert_eq!(eigenvalues.len(), 4);
    assert_relative_eq!(eigenvalues.iter().sum::<f64>(), 4.0, epsilon = 1e-9);
    assert!(eigenvalues.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn test_known_correlation_matrix() {
    let matrix = table::<f64>(2, 2, &[1.0, 0.6, 0.6, 1.0]);
    let mut pca = correlation(
        PcaInput::correlation(matrix),
        BaseParameter::default().deterministic(true),
        &cpu_env(),
    );
    assert!(pca.compute().is_ok());

    let eigenvalues = pca.result().values(ResultId::Eigenvalues).unwrap();
    assert_relative_eq!(eigenvalues[0], 1.6, epsilon = 1e-12);
    assert_relative_eq!(eigenvalues[1], 0.4, epsilon = 1e-12);

    let eigenvectors = pca.result().values(ResultId::Eigenvectors).unwrap();
    let h = 0.5f64.sqrt();
    assert_relative_eq!(eigenvectors[0], h, epsilon = 1e-12);
    assert_relative_eq!(eigenvectors[1], h, epsilon = 1e-12);
}

#[test]
fn test_cpu_and_device_correlation_agree() {
    let base = BaseParameter::default()
        .with_results(ResultsToCompute::MEAN | ResultsToCompute::VARIANCE)
        .deterministic(true);
    let data = correlated_data::<f64>(40, 5, 3);

    let mut cpu = correlation(PcaInput::new(data.clone()), base.clone(), &cpu_env());
    let device_env = device_env();
    let mut device = correlation(PcaInput::new(data), base, &device_env);
    assert!(device.tag().target.is_device());
    assert_eq!(device.kernel_name(), "pca_correlation_device");

    assert!(cpu.compute().is_ok());
    assert!(device.compute().is_ok());
    for id in [ResultId::Eigenvalues, ResultId::Eigenvectors, ResultId::Means, ResultId::Variances] {
        let expected = cpu.result().values(id).unwrap();
        let actual = device.result().values(id).unwrap();
        assert_eq!(expected.len(), actual.len());
        for (e, a) in expected.iter().zip(&actual) {
            assert_relative_eq!(e, a, epsilon = 1e-9);
        }
    }
    assert_eq!(device_env.context().compile_count(), 1);
}

#[test]
fn test_svd_matches_correlation_method() {
    let data = correlated_data::<f64>(30, 3, 21);
    let base = BaseParameter::default().deterministic(true);

    let env = cpu_env();
    let mut by_correlation = correlation(PcaInput::new(data.clone()), base.clone(), &env);
    let mut by_svd =
        Batch::<PcaSvd>::new::<f64>(&env, PcaInput::new(data), SvdParameter::new(base)).unwrap();
    assert!(by_correlation.compute().is_ok());
    assert!(by_svd.compute().is_ok());
    assert_eq!(by_svd.kernel_name(), "pca_svd");

    for id in [ResultId::Eigenvalues, ResultId::Eigenvectors] {
        let expected = by_correlation.result().values(id).unwrap();
        let actual = by_svd.result().values(id).unwrap();
        for (e, a) in expected.iter().zip(&actual) {
            assert_relative_eq!(e, a, epsilon = 1e-8);
        }
    }
}

#[test]
fn test_means_and_variances() {
    let data = table::<f64>(4, 2, &[1.0, 10.0, 2.0, 20.0, 3.0, 30.0, 4.0, 40.0]);
    let base = BaseParameter::default().with_results(ResultsToCompute::MEAN | ResultsToCompute::VARIANCE);
    let mut pca = correlation(PcaInput::new(data), base, &cpu_env());
    assert!(pca.compute().is_ok());

    assert_eq!(pca.result().values(ResultId::Means).unwrap(), vec![2.5, 25.0]);
    let variances = pca.result().values(ResultId::Variances).unwrap();
    assert_relative_eq!(variances[0], 5.0 / 3.0, epsilon = 1e-12);
    assert_relative_eq!(variances[1], 500.0 / 3.0, epsilon = 1e-9);
}

#[test]
fn test_unrequested_outputs_stay_absent() {
    let base = BaseParameter::default()
        .with_results(ResultsToCompute::VARIANCE | ResultsToCompute::EIGENVALUE)
        .with_n_components(2);
    let mut pca = correlation(PcaInput::new(correlated_data::<f64>(20, 3, 5)), base, &cpu_env());
    assert!(pca.compute().is_ok());

    let result = pca.result();
    assert!(result.get(ResultId::Means).is_none());
    assert!(result.get(ResultId::Variances).is_some());
    let eigenvectors = result.get(ResultId::Eigenvectors).unwrap();
    assert_eq!((eigenvectors.n_rows(), eigenvectors.n_columns()), (2, 3));

    let collection = result.get_collection(ResultCollectionId::DataForTransform);
    assert!(collection.get(DataForTransformKey::Mean).is_none());
    assert!(collection.get(DataForTransformKey::Variance).is_some());
    assert!(collection.get(DataForTransformKey::Eigenvalue).is_some());
    assert_eq!(collection.len(), 2);
}

#[test]
fn test_validation_failure_leaves_result_unallocated() {
    let base = BaseParameter::default().with_n_components(7);
    let mut pca = correlation(PcaInput::new(correlated_data::<f64>(20, 3, 5)), base, &cpu_env());

    let status = pca.compute();
    assert_eq!(status.class(), Some(ErrorClass::Validation));
    assert!(matches!(status.first(), Some(Error::InvalidParameter(_))));
    assert_eq!(pca.state(), ContainerState::Failed);
    assert!(pca.result().get(ResultId::Eigenvalues).is_none());
    assert!(pca.result().get(ResultId::Eigenvectors).is_none());

    // Fixing the parameter makes the same object usable again
    pca.parameter_mut().base.n_components = 2;
    assert!(pca.compute().is_ok());
    assert_eq!(pca.state(), ContainerState::Computed);
}

#[test]
fn test_single_precision_results() {
    let env = cpu_env();
    let mut pca = Batch::<PcaCorrelation>::new::<f32>(
        &env,
        PcaInput::new(correlated_data::<f32>(25, 3, 8)),
        CorrelationParameter::default(),
    )
    .unwrap();
    assert_eq!(pca.tag().precision, Precision::Single);
    assert!(pca.compute().is_ok());

    let eigenvalues = pca.result().get(ResultId::Eigenvalues).unwrap();
    assert_eq!(eigenvalues.precision(), Precision::Single);
    assert_relative_eq!(eigenvalues.to_f64_vec().iter().sum::<f64>(), 3.0, epsilon = 1e-4);
}

#[test]
fn test_precision_mismatch_is_reported() {
    let env = cpu_env();
    let mut pca = Batch::<PcaCorrelation>::new::<f32>(
        &env,
        PcaInput::new(correlated_data::<f64>(25, 3, 8)),
        CorrelationParameter::default(),
    )
    .unwrap();
    let status = pca.compute();
    assert!(matches!(status.first(), Some(Error::InvalidInput(_))));
    assert_eq!(pca.state(), ContainerState::Failed);
}

#[test]
fn test_archive_round_trip() {
    let base = BaseParameter::default().with_results(ResultsToCompute::all());
    let mut pca = correlation(PcaInput::new(correlated_data::<f64>(20, 3, 9)), base, &cpu_env());
    assert!(pca.compute().is_ok());

    let mut bytes = Vec::new();
    archive::save(pca.result(), &mut bytes).unwrap();
    let restored: PcaResult = archive::load(bytes.as_slice()).unwrap();

    for id in [ResultId::Eigenvalues, ResultId::Eigenvectors, ResultId::Means, ResultId::Variances] {
        let expected = pca.result().values(id).unwrap();
        let actual = restored.values(id).unwrap();
        assert_eq!(expected.len(), actual.len());
        for (e, a) in expected.iter().zip(&actual) {
            assert_relative_eq!(e, a, max_relative = 1e-15);
        }
    }
    let collection = restored.get_collection(ResultCollectionId::DataForTransform);
    assert_eq!(collection.len(), 3);
}

#[test]
fn test_supplied_result_storage_is_reused() {
    let env = cpu_env();
    let input = PcaInput::new(correlated_data::<f64>(20, 3, 2));
    let mut pca = correlation(input, BaseParameter::default(), &env);
    assert!(pca.compute().is_ok());

    let eigenvalues = pca.result().get(ResultId::Eigenvalues).unwrap().clone();
    let kept = pca.take_result();
    pca.set_result(kept);
    assert!(pca.compute().is_ok());
    let again = pca.result().get(ResultId::Eigenvalues).unwrap();
    assert!(std::sync::Arc::ptr_eq(&eigenvalues, again));
    assert_eq!(pca.tag().target, Target::Cpu(hetero_core::CpuVariant::Generic));
}

#[test]
fn test_recompute_drops_outputs_no_longer_requested() {
    let base = BaseParameter::default().with_results(ResultsToCompute::MEAN | ResultsToCompute::VARIANCE);
    let mut pca = correlation(PcaInput::new(correlated_data::<f64>(20, 3, 4)), base, &cpu_env());
    assert!(pca.compute().is_ok());
    assert!(pca.result().get(ResultId::Means).is_some());

    pca.parameter_mut().base.results_to_compute = ResultsToCompute::VARIANCE;
    assert!(pca.compute().is_ok());
    let result = pca.result();
    assert!(result.get(ResultId::Means).is_none());
    assert!(result.get(ResultId::Variances).is_some());

    let collection = result.get_collection(ResultCollectionId::DataForTransform);
    assert!(collection.get(DataForTransformKey::Mean).is_none());
    assert!(collection.get(DataForTransformKey::Variance).is_some());
    assert_eq!(collection.len(), 1);
}

#[test]
fn test_recompute_after_component_count_change() {
    let base = BaseParameter::default().with_n_components(2);
    let mut pca = correlation(PcaInput::new(correlated_data::<f64>(20, 3, 4)), base, &cpu_env());
    assert!(pca.compute().is_ok());
    assert_eq!(pca.result().values(ResultId::Eigenvalues).unwrap().len(), 2);

    pca.parameter_mut().base.n_components = 3;
    let status = pca.compute();
    assert!(status.is_ok(), "{status}");
    assert_eq!(pca.result().values(ResultId::Eigenvalues).unwrap().len(), 3);
    let eigenvectors = pca.result().get(ResultId::Eigenvectors).unwrap();
    assert_eq!((eigenvectors.n_rows(), eigenvectors.n_columns()), (3, 3));
}

#[test]
fn test_supplied_storage_with_wrong_shape_is_rejected() {
    let env = cpu_env();
    let mut pca = correlation(
        PcaInput::new(correlated_data::<f64>(20, 3, 4)),
        BaseParameter::default(),
        &env,
    );
    let mut result = PcaResult::new();
    result.set(ResultId::Eigenvalues, table::<f64>(1, 2, &[0.0, 0.0]));
    pca.set_result(result);

    let status = pca.compute();
    assert!(matches!(status.first(), Some(Error::ShapeMismatch { .. })));
    assert_eq!(pca.state(), ContainerState::Failed);
    assert_eq!(pca.result().get(ResultId::Eigenvalues).unwrap().n_columns(), 2);
}

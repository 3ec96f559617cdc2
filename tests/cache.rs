use approx::assert_abs_diff_eq;
use ndarray::prelude::*;
use surfhop::cache::InterpolationCache;
use surfhop::initialization::io::CacheConfiguration;
use surfhop::initialization::SystemData;
use surfhop::interface::{Property, PropertyRequest};

mod common;
use common::HarmonicEvaluator;

fn cache_config(input: &str) -> CacheConfiguration {
    toml::from_str(input).unwrap()
}

fn one_coord_system() -> SystemData {
    SystemData::new(array![1.0], array![0.0]).unwrap()
}

fn request_at(x: f64) -> PropertyRequest {
    PropertyRequest::new(
        array![x],
        vec![Property::Energy, Property::Gradient],
        vec![0],
    )
}

#[test]
fn write_only_appends_exactly_one_sample_per_call() {
    let config: CacheConfiguration = cache_config("mode = \"write_only\"");
    let system: SystemData = one_coord_system();
    let mut cache: InterpolationCache = InterpolationCache::new(&config, 1, &system).unwrap();
    let mut evaluator: HarmonicEvaluator = HarmonicEvaluator::single_state();

    for (index, x) in [0.0, 0.5, 1.0, 1.0].iter().enumerate() {
        cache.get(&request_at(*x), &mut evaluator).unwrap();
        assert_eq!(cache.len(), index + 1);
    }
    assert_eq!(evaluator.calls, 4);
}

#[test]
fn adaptive_first_request_always_evaluates_exactly() {
    let config: CacheConfiguration = cache_config("mode = \"adaptive\"\nmodel = \"nearest\"");
    let system: SystemData = one_coord_system();
    let mut cache: InterpolationCache = InterpolationCache::new(&config, 1, &system).unwrap();
    let mut evaluator: HarmonicEvaluator = HarmonicEvaluator::single_state();

    let (_, trust) = cache.get(&request_at(0.3), &mut evaluator).unwrap();
    assert_eq!(evaluator.calls, 1);
    assert!(!trust.is_trustworthy);
    assert_eq!(cache.len(), 1);
}

#[test]
fn adaptive_serves_repeated_queries_from_the_fit() {
    let config: CacheConfiguration = cache_config("mode = \"adaptive\"\nmodel = \"nearest\"");
    let system: SystemData = one_coord_system();
    let mut cache: InterpolationCache = InterpolationCache::new(&config, 1, &system).unwrap();
    let mut evaluator: HarmonicEvaluator = HarmonicEvaluator::single_state();

    cache.get(&request_at(0.3), &mut evaluator).unwrap();
    let (result, trust) = cache.get(&request_at(0.3), &mut evaluator).unwrap();
    // a query on a stored sample is always trustworthy and exact
    assert_eq!(evaluator.calls, 1);
    assert!(trust.is_trustworthy);
    assert_abs_diff_eq!(trust.distance_to_nearest_sample, 0.0, epsilon = 1e-14);
    assert_abs_diff_eq!(result.energies[0], 0.5 * 0.3 * 0.3, epsilon = 1e-12);
    assert_eq!(cache.len(), 1);

    // a query far outside the trust radius goes back to the evaluator
    cache.get(&request_at(5.0), &mut evaluator).unwrap();
    assert_eq!(evaluator.calls, 2);
    assert_eq!(cache.len(), 2);
}

#[test]
fn near_degeneracy_uses_the_strict_trust_radius() {
    // distances between the strict and the general radius are trusted only
    // while the adjacent-state gap stays above the threshold
    let input: &str = "mode = \"adaptive\"\nmodel = \"nearest\"\n\
                       trust_radius_general = 0.5\ntrust_radius_ci = 0.05\n\
                       energy_threshold = 0.02\n";
    let system: SystemData = one_coord_system();

    // wide gap: the general radius applies
    let mut cache: InterpolationCache =
        InterpolationCache::new(&cache_config(input), 2, &system).unwrap();
    let mut wide: HarmonicEvaluator = HarmonicEvaluator::two_states(1.0);
    cache.get(&request_at(0.0), &mut wide).unwrap();
    let (_, trust) = cache.get(&request_at(0.2), &mut wide).unwrap();
    assert!(trust.is_trustworthy);
    assert_eq!(wide.calls, 1);

    // near-degenerate gap: the same displacement is no longer trusted
    let mut cache: InterpolationCache =
        InterpolationCache::new(&cache_config(input), 2, &system).unwrap();
    let mut narrow: HarmonicEvaluator = HarmonicEvaluator::two_states(0.001);
    cache.get(&request_at(0.0), &mut narrow).unwrap();
    let (_, trust) = cache.get(&request_at(0.2), &mut narrow).unwrap();
    assert!(!trust.is_trustworthy);
    assert_eq!(narrow.calls, 2);
}

#[test]
fn fit_only_never_calls_the_evaluator() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = dir.path().join("samples.npz");
    let dataset_str: String = dataset.to_string_lossy().into_owned();
    let system: SystemData = one_coord_system();

    // bootstrap a dataset in write-only mode
    let bootstrap_input: String = format!(
        "mode = \"write_only\"\ndataset_path = \"{}\"",
        dataset_str.replace('\\', "\\\\")
    );
    let mut bootstrap: InterpolationCache =
        InterpolationCache::new(&cache_config(&bootstrap_input), 1, &system).unwrap();
    let mut evaluator: HarmonicEvaluator = HarmonicEvaluator::single_state();
    for x in [-1.0, -0.5, 0.0, 0.5, 1.0] {
        bootstrap.get(&request_at(x), &mut evaluator).unwrap();
    }
    let bootstrap_calls: usize = evaluator.calls;

    // reopen the dataset in fit-only mode
    let fit_input: String = format!(
        "mode = \"fit_only\"\nmodel = \"shepard\"\ndataset_path = \"{}\"",
        dataset_str.replace('\\', "\\\\")
    );
    let mut fitted: InterpolationCache =
        InterpolationCache::new(&cache_config(&fit_input), 1, &system).unwrap();
    assert_eq!(fitted.len(), 5);

    // served from the reopened samples, the evaluator stays untouched
    let (result, trust) = fitted.get(&request_at(0.5), &mut evaluator).unwrap();
    assert_eq!(evaluator.calls, bootstrap_calls);
    assert!(trust.is_trustworthy);
    assert_abs_diff_eq!(result.energies[0], 0.125, epsilon = 1e-12);

    // far queries are flagged untrustworthy but still answered
    let (_, trust) = fitted.get(&request_at(30.0), &mut evaluator).unwrap();
    assert_eq!(evaluator.calls, bootstrap_calls);
    assert!(!trust.is_trustworthy);
    assert_eq!(fitted.len(), 5);
}

#[test]
fn rbf_estimates_between_samples_in_adaptive_mode() {
    // the sample spacing (0.25) exceeds the trust radius, so every bootstrap
    // point is evaluated exactly
    let input: &str = "mode = \"adaptive\"\nmodel = \"rbf\"\n\
                       trust_radius_general = 0.2\nrbf_epsilon = 1.0\n";
    let system: SystemData = one_coord_system();
    let mut cache: InterpolationCache =
        InterpolationCache::new(&cache_config(input), 1, &system).unwrap();
    let mut evaluator: HarmonicEvaluator = HarmonicEvaluator::single_state();

    for x in [-1.0, -0.75, -0.5, -0.25, 0.0, 0.25, 0.5, 0.75, 1.0] {
        cache.get(&request_at(x), &mut evaluator).unwrap();
    }
    let exact_calls: usize = evaluator.calls;

    // a query between dense samples is served by the interpolant
    let (result, trust) = cache.get(&request_at(0.1), &mut evaluator).unwrap();
    assert_eq!(evaluator.calls, exact_calls);
    assert!(trust.is_trustworthy);
    assert_abs_diff_eq!(result.energies[0], 0.005, epsilon = 1e-3);
    let gradient = result.gradient_of(0).unwrap();
    assert_abs_diff_eq!(gradient[0], 0.1, epsilon = 5e-2);
}

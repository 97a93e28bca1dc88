// Tests for subgroup aggregation statistics

use super::*;

fn m(value: f64, error: f64) -> Measurement {
    Measurement::new(value, error)
}

fn close(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

#[test]
fn test_weighted_mean_equal_errors_matches_mean() {
    let values = [m(10.0, 1.0), m(12.0, 1.0), m(14.0, 1.0)];
    let moments = weighted_moments(&values).unwrap();
    assert!(moments.weighted);
    assert!(close(moments.mean, 12.0, 1e-12));
    // sem = 1/sqrt(3)
    assert!(close(moments.sem, 1.0 / 3f64.sqrt(), 1e-12));
    // chi2 = 4 + 0 + 4 = 8, mswd = 8 / 2
    assert!(close(moments.mswd.unwrap(), 4.0, 1e-12));
    assert!(close(moments.msem(), 2.0 / 3f64.sqrt(), 1e-12));
}

#[test]
fn test_weighted_mean_favors_precise_values() {
    let values = [m(10.0, 0.1), m(20.0, 10.0)];
    let moments = weighted_moments(&values).unwrap();
    assert!(moments.mean < 10.01);
}

#[test]
fn test_weighted_mean_falls_back_on_zero_error() {
    let values = [m(10.0, 0.0), m(12.0, 1.0)];
    let moments = weighted_moments(&values).unwrap();
    assert!(!moments.weighted);
    assert!(close(moments.mean, 11.0, 1e-12));
    assert!(moments.mswd.is_none());
}

#[test]
fn test_msem_never_shrinks_sem() {
    // scatter well below the stated errors: mswd < 1
    let values = [m(10.0, 5.0), m(10.1, 5.0), m(9.9, 5.0)];
    let moments = weighted_moments(&values).unwrap();
    assert!(moments.mswd.unwrap() < 1.0);
    assert_eq!(moments.msem(), moments.sem);
}

#[test]
fn test_unweighted_moments() {
    let values = [m(2.0, 0.0), m(4.0, 0.0), m(6.0, 0.0), m(8.0, 0.0)];
    let moments = unweighted_moments(&values).unwrap();
    assert!(close(moments.mean, 5.0, 1e-12));
    // sample variance = 20 / 3
    assert!(close(moments.sd, (20.0f64 / 3.0).sqrt(), 1e-12));
    assert!(close(moments.sem, moments.sd / 2.0, 1e-12));
}

#[test]
fn test_empty_input() {
    assert!(weighted_moments(&[]).is_none());
    assert!(unweighted_moments(&[]).is_none());
    assert!(kde_mode(&[]).is_none());
    assert!(aggregate(&[], AggregationKind::Mean, ErrorKind::Sd).is_none());
}

#[test]
fn test_kde_mode_finds_cluster() {
    let values = [
        m(10.0, 0.2),
        m(10.1, 0.2),
        m(9.9, 0.2),
        m(10.05, 0.2),
        m(15.0, 0.2),
    ];
    let mode = kde_mode(&values).unwrap();
    assert!(close(mode, 10.0, 0.1), "mode {mode}");
}

#[test]
fn test_kde_mode_without_errors_uses_silverman() {
    let values = [m(1.0, 0.0), m(1.2, 0.0), m(1.1, 0.0), m(3.0, 0.0)];
    let mode = kde_mode(&values).unwrap();
    assert!(mode > 0.5 && mode < 2.0, "mode {mode}");
}

#[test]
fn test_kde_mode_degenerate() {
    let values = [m(5.0, 0.0), m(5.0, 0.0)];
    assert!(kde_mode(&values).is_none());

    let agg = aggregate(&values, AggregationKind::KernelDensity, ErrorKind::Sd).unwrap();
    assert_eq!(agg.value, 5.0);
    assert!(agg.fell_back);
}

#[test]
fn test_aggregate_error_kinds() {
    let values = [m(10.0, 1.0), m(12.0, 1.0), m(14.0, 1.0)];
    let sd = aggregate(&values, AggregationKind::Mean, ErrorKind::Sd).unwrap();
    let sem = aggregate(&values, AggregationKind::Mean, ErrorKind::Sem).unwrap();
    let msem = aggregate(&values, AggregationKind::Mean, ErrorKind::Msem).unwrap();

    assert!(close(sd.error, 2.0, 1e-12));
    assert!(close(sem.error, 2.0 / 3f64.sqrt(), 1e-12));
    assert!(close(msem.error, sem.error * 2.0, 1e-12));
    assert!(!sd.fell_back);
    assert_eq!(sd.n, 3);
}

#[test]
fn test_aggregate_single_value_keeps_its_error() {
    let agg = aggregate(&[m(28.2, 0.03)], AggregationKind::WeightedMean, ErrorKind::Sd).unwrap();
    assert!(close(agg.value, 28.2, 1e-12));
    assert_eq!(agg.error, 0.03);
    assert!(!agg.fell_back);
}

#[test]
fn test_aggregate_weighted_fallback_is_flagged() {
    let values = [m(10.0, f64::NAN), m(12.0, 1.0)];
    let agg = aggregate(&values, AggregationKind::WeightedMean, ErrorKind::Sem).unwrap();
    assert!(agg.fell_back);
    assert!(close(agg.value, 11.0, 1e-12));
}

#[test]
fn test_aggregate_ignores_non_finite_values() {
    let values = [m(f64::NAN, 1.0), m(12.0, 1.0), m(14.0, 1.0)];
    let agg = aggregate(&values, AggregationKind::Mean, ErrorKind::Sd).unwrap();
    assert_eq!(agg.n, 2);
    assert!(close(agg.value, 13.0, 1e-12));
}

#[test]
fn test_kind_parsing() {
    assert_eq!("Weighted Mean".parse::<AggregationKind>(), Ok(AggregationKind::WeightedMean));
    assert_eq!("kernel_density".parse::<AggregationKind>(), Ok(AggregationKind::KernelDensity));
    assert_eq!("mean".parse::<AggregationKind>(), Ok(AggregationKind::Mean));
    assert!("Plateau".parse::<AggregationKind>().is_err());

    assert_eq!("SEM".parse::<ErrorKind>(), Ok(ErrorKind::Sem));
    assert_eq!("msem".parse::<ErrorKind>(), Ok(ErrorKind::Msem));
    assert_eq!(
        "2sigma".parse::<ErrorKind>(),
        Err(StatisticsError::UnknownErrorKind("2sigma".to_string()))
    );
}

//! Property-based tests for the series transforms and the correlation pipeline.

use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use rrsync_lib::gaps::split_on_gaps;
use rrsync_lib::resample::{resample_pair, Interpolation};
use rrsync_lib::transform::{
    filter_outliers_relative, filter_outliers_sd, interpolate_nan, shift, trim,
};
use rrsync_lib::{pearson, Series, SeriesPair};

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 8, 22)
        .and_then(|d| d.and_hms_opt(22, 5, 27))
        .expect("valid timestamp")
}

fn intervals(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(400u32..1500, len).prop_map(|v| v.into_iter().map(f64::from).collect())
}

fn series(name: &str, interval: Vec<f64>) -> Series {
    Series::from_intervals(interval, name, t0()).expect("valid series")
}

proptest! {
    #[test]
    fn trim_reaches_a_fixed_point(
        interval in intervals(5..200),
        from in 0.0f64..1.0,
        width in 0.0f64..1.0,
    ) {
        let s = series("2om2", interval);
        let total = s.last_time().unwrap();
        let start = from * total;
        let end = start + width * (total - start);
        let once = trim(&s, Some(start), Some(end));
        let twice = trim(&once, Some(start), Some(end));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn filtering_then_interpolating_leaves_no_gaps(
        interval in intervals(3..300),
        holes in prop::collection::vec(any::<bool>(), 3..300),
    ) {
        let mut values = interval.clone();
        for (v, hole) in values.iter_mut().zip(&holes) {
            if *hole {
                *v = f64::NAN;
            }
        }
        prop_assume!(values.iter().any(|v| !v.is_nan()));
        let marked = filter_outliers_relative(&filter_outliers_sd(&values, 3.0), 0.2);
        let filled = interpolate_nan(&marked);
        prop_assert_eq!(filled.len(), values.len());
        prop_assert!(filled.iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn shifts_compose(interval in intervals(5..100), m1 in -10_000i64..10_000, m2 in -10_000i64..10_000) {
        let s = series("2ok2", interval);
        let stepwise = shift(&shift(&s, m1), m2);
        let direct = shift(&s, m1 + m2);
        prop_assert_eq!(stepwise.shift_ms(), direct.shift_ms());
        for (a, b) in stepwise.time().iter().zip(direct.time()) {
            prop_assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn gap_split_is_a_partition(
        interval in intervals(5..200),
        pauses in prop::collection::vec(prop_oneof![Just(0.0), 10_000.0f64..100_000.0], 5..200),
        k_max_gap in 1.0f64..10.0,
    ) {
        let mut time = Vec::with_capacity(interval.len());
        let mut acc = 0.0;
        for (v, pause) in interval.iter().zip(pauses.iter().chain(std::iter::repeat(&0.0))) {
            acc += v + pause;
            time.push(acc);
        }
        let end = t0() + chrono::Duration::milliseconds(acc as i64 + 1);
        let s = Series::new(time, interval, "2om2", t0(), end).unwrap();
        let chunks = split_on_gaps(&s, k_max_gap).unwrap();
        prop_assert!(!chunks.is_empty());
        let time: Vec<f64> = chunks.iter().flat_map(|c| c.time().to_vec()).collect();
        let values: Vec<f64> = chunks.iter().flat_map(|c| c.interval().to_vec()).collect();
        prop_assert_eq!(time.as_slice(), s.time());
        prop_assert_eq!(values.as_slice(), s.interval());
    }

    #[test]
    fn resampled_sides_share_a_grid_inside_the_overlap(
        a in intervals(5..150),
        b in intervals(5..150),
        offset in 0i64..5_000,
        step in 50.0f64..500.0,
    ) {
        let a = series("2om2", a);
        let b = shift(&series("2ok2", b), offset);
        let lo = a.first_time().unwrap().max(b.first_time().unwrap());
        let hi = a.last_time().unwrap().min(b.last_time().unwrap());
        let out = resample_pair(&SeriesPair::new(a, b), step, Interpolation::Linear).unwrap();
        prop_assert_eq!(out.a.time(), out.b.time());
        prop_assert!(out.a.time().iter().all(|&t| t >= lo && t <= hi));
    }

    #[test]
    fn a_series_correlates_perfectly_with_itself(interval in intervals(8..200)) {
        prop_assume!(interval.iter().any(|v| *v != interval[0]));
        let a = series("2om2", interval.clone());
        let b = series("2ok2", interval);
        let out = resample_pair(&SeriesPair::new(a, b), 250.0, Interpolation::Linear).unwrap();
        let p = pearson(out.a.interval(), out.b.interval()).unwrap();
        prop_assert!((p.r - 1.0).abs() < 1e-9);
        prop_assert!(p.p_value < 1e-6);
    }
}

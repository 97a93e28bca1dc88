// Tests for catalog queries and reference lookups

use super::*;
use chrono::{DateTime, Duration, TimeZone, Utc};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
}

fn rec(id: u64, identifier: &str, kind: &str, hours: i64) -> AnalysisRecord {
    let mut r = AnalysisRecord::new(identifier, 1, t0() + Duration::hours(hours));
    r.id = id;
    r.uuid = format!("uuid-{id}");
    r.analysis_type = kind.to_string();
    r.mass_spectrometer = "Jan".to_string();
    r.extract_device = "Fusions CO2".to_string();
    r
}

fn store() -> MemoryStore {
    let mut invalid = rec(6, "bg", "blank_unknown", 3);
    invalid.tag = Some("invalid".to_string());
    MemoryStore::new(vec![
        rec(1, "66123", "unknown", 0),
        rec(2, "bu", "blank_unknown", 1),
        rec(3, "a", "air", 2),
        rec(4, "66123", "unknown", 10),
        rec(5, "bu", "blank_unknown", 11),
        invalid,
        rec(7, "66124", "unknown", 40),
    ])
}

fn ids(records: &[AnalysisRecord]) -> Vec<u64> {
    records.iter().map(|r| r.id).collect()
}

#[test]
fn test_query_excludes_invalid_by_default() {
    let s = store();
    let all = s.analyses(&AnalysisQuery::new()).unwrap();
    assert_eq!(all.len(), 6);
    assert!(!ids(&all).contains(&6));

    let with_invalid = s.analyses(&AnalysisQuery::new().include_invalid()).unwrap();
    assert_eq!(with_invalid.len(), 7);
}

#[test]
fn test_query_blank_matches_all_blank_types() {
    let s = store();
    let blanks = s
        .analyses(&AnalysisQuery::new().analysis_types(["Blank"]))
        .unwrap();
    assert_eq!(ids(&blanks), vec![2, 5]);

    let exact = s
        .analyses(&AnalysisQuery::new().analysis_types(["Blank Unknown"]))
        .unwrap();
    assert_eq!(ids(&exact), vec![2, 5]);
}

#[test]
fn test_query_date_range_and_order() {
    let s = store();
    let q = AnalysisQuery::new()
        .date_range(t0(), t0() + Duration::hours(10))
        .order(Order::Descending)
        .limit(2);
    assert_eq!(ids(&s.analyses(&q).unwrap()), vec![4, 3]);
}

#[test]
fn test_query_identifier_pattern() {
    let s = store();
    let q = AnalysisQuery::new().identifier_pattern(r"^661\d\d$").unwrap();
    assert_eq!(ids(&s.analyses(&q).unwrap()), vec![1, 4, 7]);

    assert!(matches!(
        AnalysisQuery::new().identifier_pattern("(unclosed"),
        Err(StoreError::InvalidPattern(_))
    ));
}

#[test]
fn test_query_extract_device_rules() {
    let s = store();
    // placeholder names are ignored entirely
    let q = AnalysisQuery::new().extract_devices(["Extract Device"]);
    assert_eq!(s.analyses(&q).unwrap().len(), 6);

    let q = AnalysisQuery::new().extract_devices(["diode"]);
    assert!(s.analyses(&q).unwrap().is_empty());

    // air is measured without an extraction device
    let q = AnalysisQuery::new()
        .analysis_types(["air"])
        .extract_devices(["diode"]);
    assert_eq!(ids(&s.analyses(&q).unwrap()), vec![3]);

    let q = AnalysisQuery::new().extract_devices(["fusions co2"]);
    assert_eq!(s.analyses(&q).unwrap().len(), 6);
}

#[test]
fn test_query_mass_spectrometer_case_insensitive() {
    let s = store();
    let q = AnalysisQuery::new().mass_spectrometers(["JAN"]);
    assert_eq!(s.analyses(&q).unwrap().len(), 6);
    let q = AnalysisQuery::new().mass_spectrometers(["obama"]);
    assert!(s.analyses(&q).unwrap().is_empty());
}

#[test]
fn test_query_excludes_uuids_and_ids() {
    let s = store();
    let q = AnalysisQuery::new().exclude_uuids(["uuid-1"]).exclude_ids([7]);
    assert_eq!(ids(&s.analyses(&q).unwrap()), vec![2, 3, 4, 5]);
}

#[test]
fn test_find_references_merges_windows() {
    let s = store();
    let unknown_times = [t0(), t0() + Duration::hours(1), t0() + Duration::hours(10)];
    let base = AnalysisQuery::new().analysis_types(["blank_unknown", "air"]);
    let refs = find_references(&s, &unknown_times, 2.0, &base).unwrap();
    assert_eq!(ids(&refs), vec![2, 3, 5]);
}

#[test]
fn test_find_references_deduplicates() {
    let s = store();
    // overlapping but not merged windows would return record 2 twice
    let unknown_times = [t0(), t0() + Duration::hours(2)];
    let base = AnalysisQuery::new().analysis_types(["blank"]);
    let refs = find_references(&s, &unknown_times, 0.5, &base).unwrap();
    assert!(refs.is_empty());

    let refs = find_references(&s, &unknown_times, 1.0, &base).unwrap();
    assert_eq!(ids(&refs), vec![2]);
}

#[test]
fn test_find_references_rejects_negative_hours() {
    let s = store();
    assert!(matches!(
        find_references(&s, &[t0()], -1.0, &AnalysisQuery::new()),
        Err(StoreError::InvalidHours(_))
    ));
}

#[test]
fn test_huge_hours_clamp_to_full_range() {
    let s = store();
    let refs = find_references(&s, &[t0()], 1e10, &AnalysisQuery::new()).unwrap();
    assert_eq!(ids(&refs), vec![1, 2, 3, 4, 5, 7]);

    let now = t0() + Duration::hours(12);
    let recent = last_nhours_analyses(&s, now, 1e10, &AnalysisQuery::new()).unwrap();
    assert_eq!(ids(&recent), vec![1, 2, 3, 4, 5]);

    let range = min_max_timestamp(&s, &["66123".to_string()], 1e10)
        .unwrap()
        .unwrap();
    assert_eq!(range, (DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC));
}

#[test]
fn test_last_n_analyses() {
    let s = store();
    let last = last_n_analyses(&s, 2, &AnalysisQuery::new()).unwrap();
    assert_eq!(ids(&last), vec![7, 5]);
}

#[test]
fn test_last_nhours_analyses() {
    let s = store();
    let now = t0() + Duration::hours(12);
    let recent = last_nhours_analyses(&s, now, 3.0, &AnalysisQuery::new()).unwrap();
    assert_eq!(ids(&recent), vec![4, 5]);
}

#[test]
fn test_min_max_timestamp() {
    let s = store();
    let range = min_max_timestamp(&s, &["66123".to_string()], 1.0)
        .unwrap()
        .unwrap();
    assert_eq!(range.0, t0() - Duration::hours(1));
    assert_eq!(range.1, t0() + Duration::hours(11));

    assert!(min_max_timestamp(&s, &["nope".to_string()], 1.0)
        .unwrap()
        .is_none());
}

#[test]
fn test_analysis_date_ranges() {
    let s = store();
    let idents = vec!["66123".to_string(), "66124".to_string()];
    let ranges = analysis_date_ranges(&s, &idents, 12.0).unwrap();
    assert_eq!(ranges.len(), 2);
    assert_eq!(ranges[0], (t0(), t0() + Duration::hours(10)));
    assert_eq!(ranges[1].0, t0() + Duration::hours(40));
}

#[test]
fn test_memory_store_from_json() {
    let json = r#"[
        {"identifier": "66123", "aliquot": 1, "timestamp": "2024-03-01T08:00:00Z", "uuid": "x"},
        {"identifier": "66123", "aliquot": 2, "timestamp": "2024-03-01T09:00:00Z", "uuid": "y"}
    ]"#;
    let s = MemoryStore::from_json_str(json).unwrap();
    assert_eq!(s.len(), 2);
    assert_eq!(s.records()[1].aliquot, 2);

    assert!(matches!(
        MemoryStore::from_json_str("{"),
        Err(StoreError::Parse(_))
    ));
    assert!(matches!(
        MemoryStore::from_json("/nonexistent/catalog.json"),
        Err(StoreError::Io { .. })
    ));
}

#[test]
fn test_memory_store_reads_export_timestamps() {
    let json = r#"[{"identifier": "a", "aliquot": 1, "timestamp": "2024-03-01 08:00:00"}]"#;
    let s = MemoryStore::from_json_str(json).unwrap();
    assert_eq!(s.records()[0].timestamp, t0());

    let bad = r#"[{"identifier": "a", "aliquot": 1, "timestamp": "2024-13-45"}]"#;
    match MemoryStore::from_json_str(bad) {
        Err(StoreError::Parse(e)) => assert!(e.to_string().contains("Invalid timestamp")),
        other => panic!("expected parse error, got {:?}", other.map(|s| s.len())),
    }
}

/// Summary and CSV formatting helpers
use std::time::Duration;
use vault_inventory::utils::format::{format_number, join_names};
use vault_inventory::utils::time::{duration_human, format_optional, parse_timestamp};

#[test]
fn test_format_number_groups_thousands() {
    let cases = [
        (0, "0"),
        (999, "999"),
        (1_000, "1,000"),
        (99_999, "99,999"),
        (100_000, "100,000"),
        (9_999_999, "9,999,999"),
        (1_234_567_890, "1,234,567,890"),
    ];
    for (n, expected) in cases {
        assert_eq!(format_number(n), expected, "formatting {}", n);
    }
}

#[test]
fn test_format_number_max_does_not_panic() {
    let formatted = format_number(usize::MAX);
    assert!(formatted.contains(','));
    assert_eq!(formatted.replace(',', ""), usize::MAX.to_string());
}

#[test]
fn test_policy_cell_keeps_root_suffix() {
    let policies = vec!["app".to_string(), "auditor (root)".to_string()];
    assert_eq!(join_names(&policies), "app,auditor (root)");
}

#[test]
fn test_metadata_timestamps_render_in_utc() {
    let created = parse_timestamp("2024-05-01T12:00:00.25+02:00").unwrap();
    assert_eq!(format_optional(Some(&created)), "2024-05-01T10:00:00.250+00:00");
    assert_eq!(format_optional(None), "");
}

#[test]
fn test_scan_duration() {
    assert_eq!(duration_human(Duration::from_millis(400)), "0.4 seconds");
    assert_eq!(duration_human(Duration::from_secs(600)), "10 minutes");
}

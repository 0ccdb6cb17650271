// Property-based tests for A1 addressing.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;
use gridrelay_core::*;

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

#[test]
fn column_roundtrip_single_and_double_letters() {
    for n in 0..=701usize {
        assert_eq!(parse_column(&format_column(n)), Some(n), "column {}", n);
    }
}

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn column_roundtrip_wide(n in 0usize..1_000_000) {
        prop_assert_eq!(parse_column(&format_column(n)), Some(n));
    }

    #[test]
    fn a1_row_is_suffix_minus_one(letters in "[A-Za-z]{1,3}", row in 1usize..1_000_000) {
        let text = format!("{}{}", letters, row);
        let cell = parse_a1(&text).expect("valid A1 must parse");
        prop_assert_eq!(cell.row, row - 1);
        prop_assert_eq!(Some(cell.col), parse_column(&letters));
    }

    #[test]
    fn a1_display_roundtrip(row in 0usize..100_000, col in 0usize..20_000) {
        let cell = CellAddress::new(row, col);
        prop_assert_eq!(parse_a1(&cell.to_string()), Some(cell));
    }

    #[test]
    fn digits_first_never_parse(row in 1usize..10_000, letters in "[A-Z]{1,3}") {
        let text = format!("{}{}", row, letters);
        prop_assert_eq!(parse_a1(&text), None);
    }

    #[test]
    fn range_order_independent(
        r1 in 0usize..500, c1 in 0usize..500,
        r2 in 0usize..500, c2 in 0usize..500,
    ) {
        let a = CellAddress::new(r1, c1);
        let b = CellAddress::new(r2, c2);
        let forward = parse_range(&format!("{}:{}", a, b)).unwrap();
        let backward = parse_range(&format!("{}:{}", b, a)).unwrap();
        prop_assert_eq!(forward, backward);
        prop_assert!(forward.start_row <= forward.end_row);
        prop_assert!(forward.start_col <= forward.end_col);
    }
}

use std::collections::BTreeSet;

use proptest::prelude::*;
use shelvediff_core::api::{ChangeType, ComparisonRow, PendingChange};
use shelvediff_core::{filter_rows, match_changes, normalize, RowFilter};

fn changes() -> impl Strategy<Value = Vec<PendingChange>> {
    prop::collection::vec(
        ("[a-cA-C]{1,2}(/[a-cA-C]{1,2})?\\.(cs|TXT)", 0i64..5)
            .prop_map(|(path, version)| PendingChange::new(path, version, ChangeType::Edit)),
        0..12,
    )
}

fn keys_of(changes: &[PendingChange]) -> BTreeSet<String> {
    changes
        .iter()
        .map(|change| normalize(&change.server_path).into_string())
        .collect()
}

fn row_keys(rows: Vec<ComparisonRow>) -> Vec<String> {
    rows.into_iter().map(|row| row.key).collect()
}

proptest! {
    #[test]
    fn prop_matching_is_deterministic(left in changes(), right in changes()) {
        prop_assert_eq!(match_changes(&left, &right), match_changes(&left, &right));
    }

    #[test]
    fn prop_every_key_yields_exactly_one_row(left in changes(), right in changes()) {
        let rows = match_changes(&left, &right);
        let row_keys: Vec<String> = rows.iter().map(|row| row.key.clone()).collect();

        let mut expected: BTreeSet<String> = keys_of(&left);
        expected.extend(keys_of(&right));
        prop_assert_eq!(row_keys, expected.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn prop_no_row_is_empty_on_both_sides(left in changes(), right in changes()) {
        for row in match_changes(&left, &right) {
            prop_assert!(row.left.is_some() || row.right.is_some());
        }
    }

    #[test]
    fn prop_sides_come_from_their_own_input(left in changes(), right in changes()) {
        for row in match_changes(&left, &right) {
            if let Some(change) = &row.left {
                prop_assert!(left.contains(change));
                let key = normalize(&change.server_path);
                prop_assert_eq!(key.as_str(), row.key.as_str());
            }
            if let Some(change) = &row.right {
                prop_assert!(right.contains(change));
                let key = normalize(&change.server_path);
                prop_assert_eq!(key.as_str(), row.key.as_str());
            }
        }
    }

    #[test]
    fn prop_key_order_ignores_input_order(left in changes(), right in changes()) {
        let mut reversed_left = left.clone();
        reversed_left.reverse();
        let mut reversed_right = right.clone();
        reversed_right.reverse();

        prop_assert_eq!(
            row_keys(match_changes(&left, &right)),
            row_keys(match_changes(&reversed_left, &reversed_right))
        );
    }

    #[test]
    fn prop_case_variants_pair_up(left in changes()) {
        let upper: Vec<PendingChange> = left
            .iter()
            .map(|change| {
                PendingChange::new(change.server_path.to_uppercase(), 9, ChangeType::Edit)
            })
            .collect();
        for row in match_changes(&left, &upper) {
            prop_assert!(row.left.is_some() && row.right.is_some());
        }
    }

    #[test]
    fn prop_filter_is_idempotent(
        left in changes(),
        right in changes(),
        query in "[a-cA-C/.]{0,3}",
    ) {
        let rows = match_changes(&left, &right);
        let once: Vec<_> = filter_rows(&rows, &query).into_iter().cloned().collect();
        let twice: Vec<_> = filter_rows(&once, &query).into_iter().cloned().collect();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_filter_keeps_exactly_matching_rows(
        left in changes(),
        right in changes(),
        query in "[a-cA-C/.]{0,3}",
    ) {
        let rows = match_changes(&left, &right);
        let filter = RowFilter::new(&query);
        let needle = query.to_lowercase();
        let kept: Vec<_> = filter.apply(&rows).collect();

        for row in &rows {
            let hit = row.left_path().to_lowercase().contains(&needle)
                || row.right_path().to_lowercase().contains(&needle);
            prop_assert_eq!(kept.contains(&row), hit);
        }
    }
}

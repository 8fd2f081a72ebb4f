//! Property-based tests for the incremental schedule merger
//!
//! Pages overlap, repeat and arrive with ids the collection already holds.
//! Whatever the mix, the merged collection must keep its existing order,
//! append new ids in page order and never hold the same id twice.

use proptest::prelude::*;
use repayment_lifecycle::{
    installment::{Amount, InstallmentRecord, Status, TimeStamp},
    merge::{PageInfo, SchedulePage, ScheduleView, merge},
};
use std::collections::HashSet;

fn record(id: u32, status: Status) -> InstallmentRecord {
    let due = TimeStamp::new_with(2024, 1, 1, 0, 0, 0).unwrap();
    InstallmentRecord::new(format!("inst_{id}"), "loan_prop", id, due, Amount::from_minor(1_000))
        .with_confirmed_status(status)
}

/// Strategy to generate a collection with unique ids in arbitrary order
fn existing_strategy() -> impl Strategy<Value = Vec<InstallmentRecord>> {
    prop::collection::hash_set(0u32..40, 0..15)
        .prop_map(|ids| ids.into_iter().map(|id| record(id, Status::Pending)).collect())
}

/// Strategy to generate a page that may repeat ids and disagree on status
fn incoming_strategy() -> impl Strategy<Value = Vec<InstallmentRecord>> {
    prop::collection::vec(
        (0u32..40, prop::sample::select(Status::ALL.to_vec())),
        0..20,
    )
    .prop_map(|pairs| pairs.into_iter().map(|(id, status)| record(id, status)).collect())
}

proptest! {
    /// Property: merging the same page twice equals merging it once
    #[test]
    fn prop_merge_is_idempotent(
        existing in existing_strategy(),
        incoming in incoming_strategy()
    ) {
        let once = merge(&existing, &incoming).unwrap();
        let twice = merge(&once, &incoming).unwrap();

        prop_assert_eq!(once, twice);
    }

    /// Property: existing records keep their order and copies, new ones follow in page order
    #[test]
    fn prop_merge_preserves_order(
        existing in existing_strategy(),
        incoming in incoming_strategy()
    ) {
        let merged = merge(&existing, &incoming).unwrap();

        prop_assert_eq!(&merged[..existing.len()], &existing[..]);

        let mut seen: HashSet<&str> = existing.iter().map(|r| r.id()).collect();
        let expected_tail: Vec<&InstallmentRecord> = incoming
            .iter()
            .filter(|r| seen.insert(r.id()))
            .collect();
        let tail: Vec<&InstallmentRecord> = merged[existing.len()..].iter().collect();
        prop_assert_eq!(tail, expected_tail);
    }

    /// Property: the merged collection never holds an id twice
    #[test]
    fn prop_merge_has_unique_ids(
        existing in existing_strategy(),
        incoming in incoming_strategy()
    ) {
        let merged = merge(&existing, &incoming).unwrap();
        let ids: HashSet<&str> = merged.iter().map(|r| r.id()).collect();

        prop_assert_eq!(ids.len(), merged.len());
    }

    /// Property: absorbing pages one by one matches merging them in sequence
    #[test]
    fn prop_absorb_matches_merge(
        pages in prop::collection::vec(incoming_strategy(), 1..5)
    ) {
        let total_pages = pages.len() as u32;
        let mut view = ScheduleView::new();
        let mut expected: Vec<InstallmentRecord> = vec![];

        for (i, records) in pages.into_iter().enumerate() {
            expected = merge(&expected, &records).unwrap();
            let info = PageInfo { page: i as u32 + 1, total_pages, total_entries: 0 };
            view.absorb(SchedulePage { records, info }).unwrap();
        }

        prop_assert_eq!(view.records(), &expected[..]);
        prop_assert!(!view.has_more());
    }
}

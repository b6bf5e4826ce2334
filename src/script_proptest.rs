//! Property-based tests for pagination, membership counting and identifier
//! canonicalization.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::analyzer::{is_unshared, tally};
    use crate::identifier::UserRef;
    use crate::script::Pagination;
    use proptest::prelude::*;

    /// Serves `source[offset..offset + count]` like a paged list endpoint.
    fn fetch_page(source: &[usize], offset: usize, count: usize) -> Vec<usize> {
        source.iter().skip(offset).take(count).copied().collect()
    }

    // ============================================================================
    // Pagination property tests
    // ============================================================================

    proptest! {
        /// Property: the pages cover every item exactly once, in order
        #[test]
        fn pages_concatenate_to_the_full_list(total in 0usize..20_000, page in 1usize..6_000) {
            let source: Vec<usize> = (0..total).collect();
            let pagination = Pagination::new(total, page);

            let mut fetched = Vec::new();
            for range in pagination.pages() {
                fetched.extend(fetch_page(&source, range.start, range.end - range.start));
            }

            prop_assert_eq!(fetched, source);
        }

        /// Property: the number of data pages is ceil(total / page)
        #[test]
        fn page_count_is_ceiling(total in 0usize..20_000, page in 1usize..6_000) {
            let pagination = Pagination::new(total, page);
            let expected = (total + page - 1) / page;
            prop_assert_eq!(pagination.pages().count(), expected);
            prop_assert_eq!(pagination.page_count(), expected);
        }

        /// Property: the server loop (first call at 0, then while offset < count)
        /// issues exactly `call_count` calls and collects exactly `total` items
        #[test]
        fn server_loop_matches_model(total in 0usize..20_000, page in 1usize..6_000) {
            let source: Vec<usize> = (0..total).collect();

            let mut calls = 1;
            let mut items = fetch_page(&source, 0, page);
            let mut offset = page;
            while offset < total {
                items.extend(fetch_page(&source, offset, page));
                offset += page;
                calls += 1;
            }

            prop_assert_eq!(items.len(), total);
            prop_assert_eq!(calls, Pagination::new(total, page).call_count());
        }

        /// Property: no page is empty and none exceeds the page size
        #[test]
        fn pages_are_bounded(total in 1usize..20_000, page in 1usize..6_000) {
            for range in Pagination::new(total, page).pages() {
                prop_assert!(!range.is_empty());
                prop_assert!(range.len() <= page);
            }
        }
    }

    // ============================================================================
    // Membership counting property tests
    // ============================================================================

    proptest! {
        /// Property: slicing the friend list does not change the member count
        #[test]
        fn member_count_is_slicing_invariant(
            flags in proptest::collection::vec(any::<bool>(), 0..3_000),
            slice in 1usize..=500,
        ) {
            let expected = flags.iter().filter(|&&member| member).count() as u64;

            let slices: Vec<u64> = Pagination::new(flags.len(), slice)
                .pages()
                .map(|range| flags[range].iter().filter(|&&member| member).count() as u64)
                .collect();

            prop_assert_eq!(tally(&slices), expected);
        }

        /// Property: unshared iff count <= threshold
        #[test]
        fn unshared_matches_threshold(count in 0u64..1_000, threshold in 0u32..1_000) {
            prop_assert_eq!(is_unshared(count, threshold), count <= u64::from(threshold));
        }
    }

    // ============================================================================
    // Identifier property tests
    // ============================================================================

    proptest! {
        /// Property: every numeric encoding of an id has the same canonical form
        #[test]
        fn numeric_encodings_agree(id in 1u64..u64::MAX) {
            let from_number = UserRef::from_id(id).unwrap();
            let bare = UserRef::parse(&id.to_string()).unwrap();
            let prefixed = UserRef::parse(&format!("id{}", id)).unwrap();

            prop_assert_eq!(&from_number, &bare);
            prop_assert_eq!(&from_number, &prefixed);
            prop_assert_eq!(from_number.numeric_id(), Some(id));
        }

        /// Property: accepted identifiers never contain script-breaking characters
        #[test]
        fn canonical_form_is_script_safe(input in ".{0,80}") {
            if let Ok(user) = UserRef::parse(&input) {
                prop_assert!(!user.as_str().is_empty());
                prop_assert!(user
                    .as_str()
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.'));
            }
        }

        /// Property: handle canonicalization is idempotent
        #[test]
        fn canonicalization_is_idempotent(input in "[A-Za-z0-9_.]{1,64}") {
            // "0" and "id0" name user id 0, which is rejected
            if let Ok(once) = UserRef::parse(&input) {
                let twice = UserRef::parse(once.as_str()).unwrap();
                prop_assert_eq!(once, twice);
            }
        }
    }
}

// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property tests for the content filter and the contact merge rule.

use proptest::prelude::*;

use threadlink_bridge::store::{FilterSet, is_placeholder_name, merge_contact_name};

const PHONE: &str = "4915112345678";

proptest! {
    #[test]
    fn filter_matches_any_casing_and_padding(
        prefix in "[a-z]{1,8}",
        suffix in "[a-zA-Z0-9 ]{0,12}",
        padding in " {0,3}",
    ) {
        let mut filters = FilterSet::default();
        prop_assert!(filters.insert(&prefix.to_uppercase()));
        let text = format!("{padding}{}{suffix}", prefix.to_uppercase());
        prop_assert!(filters.matches(&text));
    }

    #[test]
    fn filter_requires_leading_prefix(
        prefix in "[a-z]{2,8}",
        lead in "[0-9]{1,4}",
    ) {
        let mut filters = FilterSet::default();
        filters.insert(&prefix);
        let text = format!("{lead}{prefix}");
        prop_assert!(!filters.matches(&text));
    }

    #[test]
    fn placeholder_never_replaces_real_name(
        real in "[A-Z][a-z]{3,10}",
        digits in "[0-9]{5,12}",
    ) {
        let placeholder = format!("+{digits}");
        prop_assert_eq!(merge_contact_name(Some(&real), &placeholder, PHONE), None);
        prop_assert_eq!(merge_contact_name(Some(&real), PHONE, PHONE), None);
    }

    #[test]
    fn real_name_replaces_placeholder(
        real in "[A-Z][a-z]{3,10}",
        digits in "[0-9]{5,12}",
    ) {
        let placeholder = format!("+{digits}");
        prop_assert!(is_placeholder_name(&placeholder, PHONE));
        prop_assert_eq!(
            merge_contact_name(Some(&placeholder), &real, PHONE),
            Some(real.clone())
        );
    }

    #[test]
    fn merging_is_idempotent(
        existing in proptest::option::of("[A-Za-z+0-9 ]{0,12}"),
        incoming in "[A-Za-z+0-9 ]{0,12}",
    ) {
        let first = merge_contact_name(existing.as_deref(), &incoming, PHONE);
        let stored = first.clone().or(existing);
        prop_assert_eq!(merge_contact_name(stored.as_deref(), &incoming, PHONE), None);
    }
}

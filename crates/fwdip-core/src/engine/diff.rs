//! Per-interface address diff
//!
//! Pure set arithmetic over address strings:
//!
//! - `to_add` = desired \ live
//! - `to_remove` = (persisted ∩ live) \ desired
//!
//! An address that is live but was never recorded in the ledger is foreign
//! and is never removed, even if undesired.

/// Addresses to bind and unbind on one interface
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressDiff {
    /// Desired addresses not yet live (desired order)
    pub to_add: Vec<String>,
    /// Owned live addresses no longer desired (live order)
    pub to_remove: Vec<String>,
}

impl AddressDiff {
    /// Whether no work is needed
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Compute the add/remove sets for one interface
pub fn diff<P, D, L>(persisted: &[P], desired: &[D], live: &[L]) -> AddressDiff
where
    P: AsRef<str>,
    D: AsRef<str>,
    L: AsRef<str>,
{
    let persisted: Vec<&str> = persisted.iter().map(AsRef::as_ref).collect();
    let desired: Vec<&str> = desired.iter().map(AsRef::as_ref).collect();
    let live: Vec<&str> = live.iter().map(AsRef::as_ref).collect();

    let mut result = AddressDiff::default();

    for &ip in &desired {
        if !contains(&live, ip) && !result.to_add.iter().any(|a| a == ip) {
            result.to_add.push(ip.to_string());
        }
    }

    for &ip in &live {
        if contains(&persisted, ip)
            && !contains(&desired, ip)
            && !result.to_remove.iter().any(|r| r == ip)
        {
            result.to_remove.push(ip.to_string());
        }
    }

    result
}

fn contains(list: &[&str], ip: &str) -> bool {
    list.iter().any(|entry| *entry == ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: &[&str] = &[];

    #[test]
    fn test_replace_owned_address() {
        let d = diff(&["10.0.0.5"], &["10.0.0.6"], &["10.0.0.5"]);
        assert_eq!(d.to_add, vec!["10.0.0.6"]);
        assert_eq!(d.to_remove, vec!["10.0.0.5"]);
    }

    #[test]
    fn test_foreign_address_untouched() {
        let d = diff(NONE, NONE, &["192.168.1.9"]);
        assert!(d.is_empty());
    }

    #[test]
    fn test_already_present_is_noop() {
        let d = diff(&["10.0.0.5"], &["10.0.0.5"], &["10.0.0.5", "10.128.0.2/24"]);
        assert!(d.is_empty());
    }

    #[test]
    fn test_empty_desired_cleans_up_owned_only() {
        let d = diff(
            &["10.0.0.5", "10.0.0.7"],
            NONE,
            &["10.128.0.2/24", "10.0.0.5", "10.0.0.7", "10.0.0.99"],
        );
        assert!(d.to_add.is_empty());
        assert_eq!(d.to_remove, vec!["10.0.0.5", "10.0.0.7"]);
    }

    #[test]
    fn test_owned_but_not_live_is_not_removed() {
        let d = diff(&["10.0.0.5"], NONE, NONE);
        assert!(d.is_empty());
    }

    #[test]
    fn test_duplicates_collapse() {
        let d = diff(NONE, &["10.0.0.6", "10.0.0.6"], NONE);
        assert_eq!(d.to_add, vec!["10.0.0.6"]);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn arb_ips() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec((0u8..8).prop_map(|n| format!("10.0.0.{n}")), 0..8)
    }

    fn set(list: &[String]) -> BTreeSet<String> {
        list.iter().cloned().collect()
    }

    proptest! {
        #[test]
        fn equal_desired_and_live_needs_no_work(
            persisted in arb_ips(),
            desired in arb_ips(),
        ) {
            let d = diff(&persisted, &desired, &desired);
            prop_assert!(d.is_empty());
        }

        #[test]
        fn removals_are_owned_live_and_undesired(
            persisted in arb_ips(),
            desired in arb_ips(),
            live in arb_ips(),
        ) {
            let d = diff(&persisted, &desired, &live);
            let owned_live: BTreeSet<String> =
                set(&persisted).intersection(&set(&live)).cloned().collect();
            for ip in &d.to_remove {
                prop_assert!(owned_live.contains(ip));
                prop_assert!(!desired.contains(ip));
            }
        }

        #[test]
        fn additions_ignore_the_ledger(
            persisted in arb_ips(),
            desired in arb_ips(),
            live in arb_ips(),
        ) {
            let d = diff(&persisted, &desired, &live);
            let expected: BTreeSet<String> =
                set(&desired).difference(&set(&live)).cloned().collect();
            prop_assert_eq!(set(&d.to_add), expected);
            prop_assert_eq!(d.to_add.len(), set(&d.to_add).len());
            prop_assert_eq!(diff(&Vec::<String>::new(), &desired, &live).to_add, d.to_add);
        }

        #[test]
        fn converged_state_is_stable(
            persisted in arb_ips(),
            desired in arb_ips(),
            live in arb_ips(),
        ) {
            let d = diff(&persisted, &desired, &live);

            // Host and ledger after every operation succeeded
            let mut applied: Vec<String> = live.clone();
            applied.extend(d.to_add.iter().cloned());
            applied.retain(|ip| !d.to_remove.contains(ip));

            let again = diff(&desired, &desired, &applied);
            prop_assert!(again.is_empty(), "second pass wanted {:?}", again);
        }
    }
}

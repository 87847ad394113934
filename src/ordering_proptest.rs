//! Property-based tests for module ordering and extension chains.
//!
//! These tests use proptest to generate random dependency graphs and
//! extension sets and verify that invariants hold for all of them.

#[cfg(test)]
mod proptest_tests {
    use crate::descriptor::{parse, parse_extension, Descriptor, ExtensionDescriptor};
    use crate::error::Error;
    use crate::phases::{extensions, ordering};
    use proptest::prelude::*;
    use std::collections::HashMap;

    /// Descriptor with modules `m0..mN` listed in `layout` order, where
    /// `deps[i]` are the indices module `mi` requires.
    fn descriptor(layout: &[usize], deps: &[Vec<usize>]) -> Descriptor {
        let mut yaml = String::from("ID: prop\nmodules:\n");
        for &i in layout {
            yaml.push_str(&format!("  - name: m{}\n    type: custom\n", i));
            if !deps[i].is_empty() {
                yaml.push_str("    build-parameters:\n      requires:\n");
                for d in &deps[i] {
                    yaml.push_str(&format!("        - name: m{}\n", d));
                }
            }
        }
        parse(&yaml, "mta.yaml").unwrap()
    }

    /// Random acyclic graph: module `i` may only require modules `j < i`.
    fn dag() -> impl Strategy<Value = (Vec<usize>, Vec<Vec<usize>>)> {
        (1usize..10).prop_flat_map(|n| {
            let deps = (0..n)
                .map(|i| proptest::sample::subsequence((0..i).collect::<Vec<_>>(), 0..=i))
                .collect::<Vec<_>>();
            let layout = Just((0..n).collect::<Vec<_>>()).prop_shuffle();
            (layout, deps)
        })
    }

    // ============================================================================
    // ordering property tests
    // ============================================================================

    proptest! {
        /// Property: every dependency comes strictly before its dependent
        #[test]
        fn order_is_topological((layout, deps) in dag()) {
            let order = ordering::execute(&descriptor(&layout, &deps)).unwrap();
            let position: HashMap<&str, usize> =
                order.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
            for (i, required) in deps.iter().enumerate() {
                for d in required {
                    let dependent = format!("m{}", i);
                    let dependency = format!("m{}", d);
                    prop_assert!(
                        position[dependency.as_str()] < position[dependent.as_str()],
                        "{} must come before {} in {:?}", dependency, dependent, order
                    );
                }
            }
        }

        /// Property: the order contains every module exactly once
        #[test]
        fn order_is_complete((layout, deps) in dag()) {
            let order = ordering::execute(&descriptor(&layout, &deps)).unwrap();
            let mut sorted = order.clone();
            sorted.sort();
            sorted.dedup();
            prop_assert_eq!(sorted.len(), layout.len());
            prop_assert_eq!(order.len(), layout.len());
        }

        /// Property: modules ready at the same step keep descriptor order
        ///
        /// A module becomes ready one step after its deepest dependency, so
        /// the order is the descriptor order grouped by that depth.
        #[test]
        fn order_is_stable((layout, deps) in dag()) {
            let mut depth = vec![0usize; deps.len()];
            // Dependencies always have smaller indices, so one pass suffices.
            for i in 0..deps.len() {
                depth[i] = deps[i].iter().map(|&d| depth[d] + 1).max().unwrap_or(0);
            }
            let mut expected: Vec<(usize, usize)> = layout
                .iter()
                .enumerate()
                .map(|(slot, &i)| (depth[i], slot))
                .collect();
            expected.sort();
            let expected: Vec<String> =
                expected.into_iter().map(|(_, slot)| format!("m{}", layout[slot])).collect();

            let order = ordering::execute(&descriptor(&layout, &deps)).unwrap();
            prop_assert_eq!(order, expected);
        }

        /// Property: closing a dependency chain into a loop is always a cycle
        #[test]
        fn closed_chain_is_cycle(n in 1usize..8, layout_seed in any::<u64>()) {
            // m0 <- m1 <- ... <- m(n-1), and m0 requires m(n-1)
            let mut deps: Vec<Vec<usize>> = (0..n).map(|i| if i == 0 { vec![] } else { vec![i - 1] }).collect();
            deps[0].push(n - 1);
            let mut layout: Vec<usize> = (0..n).collect();
            layout.rotate_left((layout_seed as usize) % n);

            let err = ordering::execute(&descriptor(&layout, &deps)).unwrap_err();
            prop_assert!(
                matches!(err, Error::CycleDetected { .. }),
                "unexpected error: {}", err
            );
        }
    }

    // ============================================================================
    // extension chain property tests
    // ============================================================================

    fn chain(len: usize) -> Vec<ExtensionDescriptor> {
        (0..len)
            .map(|i| {
                let extends = if i == 0 { "prop".to_string() } else { format!("e{}", i - 1) };
                let yaml = format!(
                    "ID: e{}\nextends: {}\nmodules:\n  - name: m0\n    properties:\n      last: {}\n      p{}: set\n",
                    i, extends, i, i
                );
                parse_extension(&yaml, &format!("e{}.mtaext", i)).unwrap()
            })
            .collect()
    }

    proptest! {
        /// Property: the resolved chain does not depend on the input order
        #[test]
        fn chain_independent_of_input_order(
            shuffled in (1usize..8).prop_flat_map(|n| Just(chain(n)).prop_shuffle())
        ) {
            let n = shuffled.len();
            let mut base = descriptor(&[0], &[vec![]]);
            let ordered = extensions::resolve_chain(&base, shuffled).unwrap();
            let ids: Vec<String> = ordered.iter().map(|e| e.id.clone()).collect();
            let expected: Vec<String> = (0..n).map(|i| format!("e{}", i)).collect();
            prop_assert_eq!(ids, expected);

            extensions::apply(&mut base, &ordered);
            let properties = &base.module("m0").unwrap().properties;
            prop_assert_eq!(properties.len(), n + 1);
            let last = properties.get("last").and_then(|v| v.as_u64());
            prop_assert_eq!(last, Some((n - 1) as u64));
        }
    }
}

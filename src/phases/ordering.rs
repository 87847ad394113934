//! Phase 2: Determining Module Order
//!
//! This phase computes the order in which modules are built so that every
//! module comes after the modules whose build output it requires.
//!
//! ## Process
//!
//! 1.  **Reference Check**: Every `build-parameters.requires` entry must name a
//!     module of the descriptor; the first that does not is reported together
//!     with the module requiring it.
//!
//! 2.  **Layered Sorting**: Modules with no unsatisfied dependencies are
//!     emitted, in descriptor order, then removed from the dependency sets of
//!     the remaining modules. This repeats until every module is emitted.
//!
//! 3.  **Cycle Detection**: If modules remain but none is ready, the remaining
//!     modules contain a cycle. The error names two adjacent modules on it.
//!
//! The result is either a complete order or an error; partial orders are
//! never returned.

use std::collections::{HashMap, HashSet};

use crate::descriptor::Descriptor;
use crate::error::{Error, Result};

struct Node {
    name: String,
    dependencies: HashSet<String>,
}

/// Execute Phase 2: Compute the build order of every module
///
/// Among modules that become ready at the same step, the descriptor order is
/// kept.
pub fn execute(descriptor: &Descriptor) -> Result<Vec<String>> {
    let known: HashSet<&str> = descriptor.modules.iter().map(|m| m.name.as_str()).collect();
    let position: HashMap<&str, usize> = descriptor
        .modules
        .iter()
        .enumerate()
        .map(|(i, m)| (m.name.as_str(), i))
        .collect();

    let mut remaining = Vec::with_capacity(descriptor.modules.len());
    for module in &descriptor.modules {
        let mut dependencies = HashSet::new();
        for requirement in module.build_requires()? {
            if !known.contains(requirement.name.as_str()) {
                return Err(Error::UnresolvedReference {
                    module: module.name.clone(),
                    missing: requirement.name,
                });
            }
            dependencies.insert(requirement.name);
        }
        remaining.push(Node {
            name: module.name.clone(),
            dependencies,
        });
    }

    let mut order = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let (ready, mut blocked): (Vec<Node>, Vec<Node>) = remaining
            .into_iter()
            .partition(|node| node.dependencies.is_empty());

        if ready.is_empty() {
            return Err(cycle_error(&blocked, &position));
        }

        let ready_names: HashSet<&str> = ready.iter().map(|n| n.name.as_str()).collect();
        for node in &mut blocked {
            node.dependencies.retain(|d| !ready_names.contains(d.as_str()));
        }
        order.extend(ready.into_iter().map(|n| n.name));
        remaining = blocked;
    }

    Ok(order)
}

/// Name two adjacent modules on a cycle among `blocked`.
///
/// Every blocked node still depends on another blocked node, so following the
/// earliest dependency from any node must revisit one.
fn cycle_error(blocked: &[Node], position: &HashMap<&str, usize>) -> Error {
    let by_name: HashMap<&str, &Node> = blocked.iter().map(|n| (n.name.as_str(), n)).collect();
    let mut visited = HashSet::new();
    let mut current = match blocked.first() {
        Some(node) => node,
        None => {
            return Error::CycleDetected {
                first: String::new(),
                second: String::new(),
            }
        }
    };
    loop {
        let Some(dependency) = earliest_dependency(current, position) else {
            break;
        };
        if !visited.insert(current.name.as_str()) {
            return Error::CycleDetected {
                first: current.name.clone(),
                second: dependency.to_string(),
            };
        }
        match by_name.get(dependency) {
            Some(node) => current = node,
            None => break,
        }
    }

    Error::CycleDetected {
        first: current.name.clone(),
        second: earliest_dependency(current, position).unwrap_or(&current.name).to_string(),
    }
}

fn earliest_dependency<'n>(node: &'n Node, position: &HashMap<&str, usize>) -> Option<&'n str> {
    node.dependencies
        .iter()
        .map(String::as_str)
        .min_by_key(|d| position.get(d).copied().unwrap_or(usize::MAX))
}

/// Select modules to build, in build order
///
/// Returns `names` (and, with `with_dependencies`, all of their transitive
/// build dependencies) ordered as in [`execute`]. Unknown names are errors.
pub fn select_with_dependencies(
    descriptor: &Descriptor,
    names: &[String],
    with_dependencies: bool,
) -> Result<Vec<String>> {
    let order = execute(descriptor)?;

    let mut selected: HashSet<String> = HashSet::new();
    let mut pending: Vec<String> = Vec::new();
    for name in names {
        descriptor.require_module(name)?;
        if selected.insert(name.clone()) {
            pending.push(name.clone());
        }
    }

    if with_dependencies {
        while let Some(name) = pending.pop() {
            let module = descriptor.require_module(&name)?;
            for requirement in module.build_requires()? {
                if selected.insert(requirement.name.clone()) {
                    pending.push(requirement.name);
                }
            }
        }
    }

    Ok(order.into_iter().filter(|n| selected.contains(n)).collect())
}

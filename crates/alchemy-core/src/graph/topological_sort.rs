// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A depth-first topological ordering over an implicit dependency graph.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use thiserror::Error;

/// An error indicating that a cycle was detected in the graph.
///
/// `cycle` lists the nodes on the cycle, starting and ending with the node
/// that was reached twice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dependency cycle detected: {cycle:?}")]
pub struct CycleError<T: fmt::Debug> {
    /// The nodes forming the cycle.
    pub cycle: Vec<T>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Orders `source` so that every item comes after the items it depends on.
///
/// `dependencies` returns the direct dependencies of a node. Nodes that are
/// not part of `source` are traversed, so indirect dependencies still
/// constrain the order, but they are never emitted. Items without mutual
/// constraints keep their relative order from `source`.
///
/// # Returns
///
/// * `Ok(Vec<T>)`: The source items in dependency order.
/// * `Err(CycleError)`: If a node is reached again while it is still being
///   visited.
pub fn order_by_topology<T, F>(source: &[T], mut dependencies: F) -> Result<Vec<T>, CycleError<T>>
where
    T: Copy + Eq + Hash + fmt::Debug,
    F: FnMut(T) -> Vec<T>,
{
    let members: HashSet<T> = source.iter().copied().collect();
    let mut marks: HashMap<T, Mark> = HashMap::with_capacity(source.len());
    let mut stack: Vec<T> = Vec::new();
    let mut sorted = Vec::with_capacity(source.len());

    for &item in source {
        visit(
            item,
            &members,
            &mut dependencies,
            &mut marks,
            &mut stack,
            &mut sorted,
        )?;
    }
    Ok(sorted)
}

fn visit<T, F>(
    node: T,
    members: &HashSet<T>,
    dependencies: &mut F,
    marks: &mut HashMap<T, Mark>,
    stack: &mut Vec<T>,
    sorted: &mut Vec<T>,
) -> Result<(), CycleError<T>>
where
    T: Copy + Eq + Hash + fmt::Debug,
    F: FnMut(T) -> Vec<T>,
{
    match marks.get(&node) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::InProgress) => {
            let start = stack.iter().position(|n| *n == node).unwrap_or(0);
            let mut cycle = stack[start..].to_vec();
            cycle.push(node);
            return Err(CycleError { cycle });
        }
        None => {}
    }

    marks.insert(node, Mark::InProgress);
    stack.push(node);
    for dependency in dependencies(node) {
        visit(dependency, members, dependencies, marks, stack, sorted)?;
    }
    stack.pop();
    marks.insert(node, Mark::Done);

    if members.contains(&node) {
        sorted.push(node);
    }
    Ok(())
}

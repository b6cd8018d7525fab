//! Dependency ordering.
//!
//! An edge `a -> b` means `a` requires `b` to be enabled first. Required
//! edges are fixed: a strongly connected component among them is a cycle
//! and nothing is ordered. Optional edges are added afterwards, one at a
//! time in id order, and skipped when they would close a cycle.
//!
//! The order is a Kahn walk with an ordered ready set, so equal inputs
//! give equal orders.

use conduit_types::NamespaceId;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Dependency order of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Ordering {
    /// Dependencies before dependents.
    pub(crate) order: Vec<NamespaceId>,
    /// Optional edges left out to break cycles, as `(dependent, dependency)`.
    pub(crate) dropped: Vec<(NamespaceId, NamespaceId)>,
}

#[derive(Debug, Default)]
pub(crate) struct DependencyGraph {
    nodes: BTreeSet<NamespaceId>,
    required: BTreeMap<NamespaceId, BTreeSet<NamespaceId>>,
    optional: BTreeSet<(NamespaceId, NamespaceId)>,
}

impl DependencyGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_node(&mut self, id: NamespaceId) {
        self.nodes.insert(id);
    }

    /// Adds `from -> to`. Both ends become nodes.
    pub(crate) fn add_edge(&mut self, from: NamespaceId, to: NamespaceId, optional: bool) {
        self.nodes.insert(from.clone());
        self.nodes.insert(to.clone());
        if optional {
            self.optional.insert((from, to));
        } else {
            self.required.entry(from).or_default().insert(to);
        }
    }

    /// Orders the nodes.
    ///
    /// # Errors
    ///
    /// Every cycle among required edges, members sorted.
    pub(crate) fn resolve(self) -> Result<Ordering, Vec<Vec<NamespaceId>>> {
        let cycles = Tarjan::run(&self.nodes, &self.required);
        if !cycles.is_empty() {
            return Err(cycles);
        }

        let mut edges = self.required;
        let mut dropped = Vec::new();
        for (from, to) in self.optional {
            let already = edges.get(&from).is_some_and(|deps| deps.contains(&to));
            if already {
                continue;
            }
            if from == to || reaches(&edges, &to, &from) {
                warn!(dependent = %from, dependency = %to, "dropping optional dependency to break a cycle");
                dropped.push((from, to));
            } else {
                edges.entry(from).or_default().insert(to);
            }
        }

        Ok(Ordering {
            order: kahn(&self.nodes, &edges),
            dropped,
        })
    }
}

fn reaches(
    edges: &BTreeMap<NamespaceId, BTreeSet<NamespaceId>>,
    start: &NamespaceId,
    target: &NamespaceId,
) -> bool {
    let mut stack = vec![start];
    let mut seen = BTreeSet::new();
    while let Some(current) = stack.pop() {
        if current == target {
            return true;
        }
        if seen.insert(current) {
            if let Some(next) = edges.get(current) {
                stack.extend(next.iter());
            }
        }
    }
    false
}

fn kahn(
    nodes: &BTreeSet<NamespaceId>,
    edges: &BTreeMap<NamespaceId, BTreeSet<NamespaceId>>,
) -> Vec<NamespaceId> {
    let mut pending: BTreeMap<&NamespaceId, usize> = nodes
        .iter()
        .map(|id| (id, edges.get(id).map_or(0, BTreeSet::len)))
        .collect();
    let mut dependents: BTreeMap<&NamespaceId, Vec<&NamespaceId>> = BTreeMap::new();
    for (from, deps) in edges {
        for to in deps {
            dependents.entry(to).or_default().push(from);
        }
    }

    let mut ready: BTreeSet<&NamespaceId> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(next) = ready.pop_first() {
        order.push(next.clone());
        for dependent in dependents.get(next).into_iter().flatten() {
            if let Some(count) = pending.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }
    order
}

struct Tarjan<'a> {
    edges: &'a BTreeMap<NamespaceId, BTreeSet<NamespaceId>>,
    index: usize,
    indices: BTreeMap<&'a NamespaceId, usize>,
    lowlink: BTreeMap<&'a NamespaceId, usize>,
    stack: Vec<&'a NamespaceId>,
    on_stack: BTreeSet<&'a NamespaceId>,
    cycles: Vec<Vec<NamespaceId>>,
}

impl<'a> Tarjan<'a> {
    fn run(
        nodes: &'a BTreeSet<NamespaceId>,
        edges: &'a BTreeMap<NamespaceId, BTreeSet<NamespaceId>>,
    ) -> Vec<Vec<NamespaceId>> {
        let mut tarjan = Self {
            edges,
            index: 0,
            indices: BTreeMap::new(),
            lowlink: BTreeMap::new(),
            stack: Vec::new(),
            on_stack: BTreeSet::new(),
            cycles: Vec::new(),
        };
        for node in nodes {
            if !tarjan.indices.contains_key(node) {
                tarjan.connect(node);
            }
        }
        tarjan.cycles.sort();
        tarjan.cycles
    }

    fn connect(&mut self, node: &'a NamespaceId) {
        self.indices.insert(node, self.index);
        self.lowlink.insert(node, self.index);
        self.index += 1;
        self.stack.push(node);
        self.on_stack.insert(node);

        let edges = self.edges;
        if let Some(deps) = edges.get(node) {
            for dep in deps {
                if !self.indices.contains_key(dep) {
                    self.connect(dep);
                    let low = self.lowlink[node].min(self.lowlink[dep]);
                    self.lowlink.insert(node, low);
                } else if self.on_stack.contains(dep) {
                    let low = self.lowlink[node].min(self.indices[dep]);
                    self.lowlink.insert(node, low);
                }
            }
        }

        if self.lowlink[node] == self.indices[node] {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack.remove(member);
                component.push(member.clone());
                if member == node {
                    break;
                }
            }
            let self_loop = self.edges.get(node).is_some_and(|deps| deps.contains(node));
            if component.len() > 1 || self_loop {
                component.sort();
                self.cycles.push(component);
            }
        }
    }
}

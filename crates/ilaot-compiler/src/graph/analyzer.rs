//! Work-list mark-and-sweep over static, conditional and dynamic edges.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use tracing::{debug, trace};

/// Questions the analyzer asks about nodes.
///
/// Every method except [`apply_event`](Self::apply_event) is asked about a
/// node exactly once, right after it is marked, with the exception of
/// [`search_dynamic_dependencies`](Self::search_dynamic_dependencies), which
/// is asked once per dynamic pass.
pub trait DependencyContext {
    type Node: Copy + Eq + Hash + fmt::Debug;
    type Event;
    type Error;

    /// Side effects of marking `node`, expressed as events.
    ///
    /// The analyzer applies them before it asks the node for dependencies.
    fn on_marked(&self, node: Self::Node, events: &mut Vec<Self::Event>) {
        let _ = (node, events);
    }

    fn apply_event(&mut self, event: Self::Event) {
        let _ = event;
    }

    fn static_dependencies(&mut self, node: Self::Node) -> Result<Vec<Self::Node>, Self::Error>;

    /// `(target, condition)` pairs: `target` is marked once `condition` is.
    fn conditional_dependencies(
        &mut self,
        node: Self::Node,
    ) -> Result<Vec<(Self::Node, Self::Node)>, Self::Error> {
        let _ = node;
        Ok(Vec::new())
    }

    fn has_dynamic_dependencies(&self, node: Self::Node) -> bool {
        let _ = node;
        false
    }

    /// Extra dependencies given everything marked so far.
    fn search_dynamic_dependencies(
        &mut self,
        node: Self::Node,
        marked: &[Self::Node],
    ) -> Result<Vec<Self::Node>, Self::Error> {
        let _ = (node, marked);
        Ok(Vec::new())
    }
}

/// Why a node was marked. Only the first reason is kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkReason<N> {
    Root(&'static str),
    Static(N),
    Conditional { owner: N, condition: N },
    Dynamic(N),
}

impl<N: fmt::Debug> fmt::Display for MarkReason<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root(reason) => write!(f, "root: {reason}"),
            Self::Static(by) => write!(f, "static from {by:?}"),
            Self::Conditional { owner, condition } => {
                write!(f, "conditional from {owner:?} on {condition:?}")
            }
            Self::Dynamic(by) => write!(f, "dynamic from {by:?}"),
        }
    }
}

/// Mark state and work list for one dependency graph.
#[derive(Debug)]
pub struct DependencyAnalyzer<N> {
    marked: Vec<N>,
    reasons: HashMap<N, MarkReason<N>>,
    worklist: Vec<(N, MarkReason<N>)>,
    /// Conditional edges whose owner is marked but whose condition is not.
    waiting: HashMap<N, Vec<(N, N)>>,
    dynamic: Vec<N>,
}

impl<N> Default for DependencyAnalyzer<N> {
    fn default() -> Self {
        Self {
            marked: Vec::new(),
            reasons: HashMap::new(),
            worklist: Vec::new(),
            waiting: HashMap::new(),
            dynamic: Vec::new(),
        }
    }
}

impl<N: Copy + Eq + Hash + fmt::Debug> DependencyAnalyzer<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a root. Takes effect on the next [`compute`](Self::compute).
    pub fn add_root(&mut self, node: N, reason: &'static str) {
        self.push(node, MarkReason::Root(reason));
    }

    pub fn is_marked(&self, node: N) -> bool {
        self.reasons.contains_key(&node)
    }

    /// Marked nodes in marking order. Order depends on the work list and is
    /// not meant for output.
    pub fn marked_nodes(&self) -> &[N] {
        &self.marked
    }

    pub fn mark_reason(&self, node: N) -> Option<MarkReason<N>> {
        self.reasons.get(&node).copied()
    }

    /// Run to the fixed point. Can be called again after adding roots;
    /// nodes marked earlier are not revisited.
    pub fn compute<C>(&mut self, ctx: &mut C) -> Result<&[N], C::Error>
    where
        C: DependencyContext<Node = N>,
    {
        let before = self.marked.len();
        let mut passes = 0usize;
        loop {
            self.drain(ctx)?;
            passes += 1;
            if !self.search_dynamic(ctx)? {
                break;
            }
        }
        debug!(
            newly_marked = self.marked.len() - before,
            total = self.marked.len(),
            passes,
            "dependency analysis reached fixed point"
        );
        Ok(&self.marked)
    }

    fn push(&mut self, node: N, reason: MarkReason<N>) {
        if !self.is_marked(node) {
            self.worklist.push((node, reason));
        }
    }

    fn drain<C>(&mut self, ctx: &mut C) -> Result<(), C::Error>
    where
        C: DependencyContext<Node = N>,
    {
        let mut events = Vec::new();
        while let Some((node, reason)) = self.worklist.pop() {
            if self.is_marked(node) {
                continue;
            }
            self.reasons.insert(node, reason);
            self.marked.push(node);
            trace!(?node, %reason, "marked");

            ctx.on_marked(node, &mut events);
            for event in events.drain(..) {
                ctx.apply_event(event);
            }

            if let Some(waiters) = self.waiting.remove(&node) {
                for (owner, target) in waiters {
                    self.push(
                        target,
                        MarkReason::Conditional {
                            owner,
                            condition: node,
                        },
                    );
                }
            }

            for dep in ctx.static_dependencies(node)? {
                self.push(dep, MarkReason::Static(node));
            }

            for (target, condition) in ctx.conditional_dependencies(node)? {
                if self.is_marked(condition) {
                    self.push(
                        target,
                        MarkReason::Conditional {
                            owner: node,
                            condition,
                        },
                    );
                } else {
                    self.waiting
                        .entry(condition)
                        .or_default()
                        .push((node, target));
                }
            }

            if ctx.has_dynamic_dependencies(node) {
                self.dynamic.push(node);
            }
        }
        Ok(())
    }

    /// One pass over every dynamic node. Returns whether anything new was
    /// proposed.
    fn search_dynamic<C>(&mut self, ctx: &mut C) -> Result<bool, C::Error>
    where
        C: DependencyContext<Node = N>,
    {
        let mut proposed = 0usize;
        for i in 0..self.dynamic.len() {
            let node = self.dynamic[i];
            let deps = ctx.search_dynamic_dependencies(node, &self.marked)?;
            for dep in deps {
                if !self.is_marked(dep) {
                    self.push(dep, MarkReason::Dynamic(node));
                    proposed += 1;
                }
            }
        }
        if !self.dynamic.is_empty() {
            debug!(
                dynamic_nodes = self.dynamic.len(),
                proposed, "dynamic dependency pass"
            );
        }
        Ok(proposed > 0)
    }
}

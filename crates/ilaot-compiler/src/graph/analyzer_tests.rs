use std::collections::HashMap;

use super::{DependencyAnalyzer, DependencyContext, MarkReason};

/// Scripted graph over `u32` nodes.
#[derive(Default)]
struct Script {
    statics: HashMap<u32, Vec<u32>>,
    conditionals: HashMap<u32, Vec<(u32, u32)>>,
    /// Dynamic node -> (trigger, proposal): propose once `trigger` is marked.
    dynamic: HashMap<u32, Vec<(u32, u32)>>,
    fail_on: Option<u32>,
    static_queries: HashMap<u32, usize>,
    applied: Vec<u32>,
}

impl Script {
    fn edge(mut self, from: u32, to: u32) -> Self {
        self.statics.entry(from).or_default().push(to);
        self
    }

    fn conditional(mut self, from: u32, target: u32, condition: u32) -> Self {
        self.conditionals
            .entry(from)
            .or_default()
            .push((target, condition));
        self
    }

    fn dynamic(mut self, node: u32, trigger: u32, proposal: u32) -> Self {
        self.dynamic
            .entry(node)
            .or_default()
            .push((trigger, proposal));
        self
    }
}

impl DependencyContext for Script {
    type Node = u32;
    type Event = u32;
    type Error = String;

    fn on_marked(&self, node: u32, events: &mut Vec<u32>) {
        events.push(node);
    }

    fn apply_event(&mut self, event: u32) {
        self.applied.push(event);
    }

    fn static_dependencies(&mut self, node: u32) -> Result<Vec<u32>, String> {
        assert_eq!(self.applied.last(), Some(&node), "event applied first");
        *self.static_queries.entry(node).or_default() += 1;
        if self.fail_on == Some(node) {
            return Err(format!("node {node} failed"));
        }
        Ok(self.statics.get(&node).cloned().unwrap_or_default())
    }

    fn conditional_dependencies(&mut self, node: u32) -> Result<Vec<(u32, u32)>, String> {
        Ok(self.conditionals.get(&node).cloned().unwrap_or_default())
    }

    fn has_dynamic_dependencies(&self, node: u32) -> bool {
        self.dynamic.contains_key(&node)
    }

    fn search_dynamic_dependencies(&mut self, node: u32, marked: &[u32]) -> Result<Vec<u32>, String> {
        Ok(self.dynamic[&node]
            .iter()
            .filter(|(trigger, _)| marked.contains(trigger))
            .map(|&(_, proposal)| proposal)
            .collect())
    }
}

fn sorted(nodes: &[u32]) -> Vec<u32> {
    let mut nodes = nodes.to_vec();
    nodes.sort_unstable();
    nodes
}

#[test]
fn marks_static_closure_only() {
    let mut script = Script::default().edge(1, 2).edge(2, 3).edge(4, 5);
    let mut analyzer = DependencyAnalyzer::new();
    analyzer.add_root(1, "entry");

    let marked = analyzer.compute(&mut script).unwrap();

    assert_eq!(sorted(marked), vec![1, 2, 3]);
    assert!(!analyzer.is_marked(4));
    assert_eq!(analyzer.mark_reason(1), Some(MarkReason::Root("entry")));
    assert_eq!(analyzer.mark_reason(3), Some(MarkReason::Static(2)));
}

#[test]
fn each_node_is_visited_once() {
    // Diamond with a back edge.
    let mut script = Script::default()
        .edge(1, 2)
        .edge(1, 3)
        .edge(2, 4)
        .edge(3, 4)
        .edge(4, 1);
    let mut analyzer = DependencyAnalyzer::new();
    analyzer.add_root(1, "a");
    analyzer.add_root(1, "b");

    analyzer.compute(&mut script).unwrap();
    analyzer.add_root(4, "again");
    analyzer.compute(&mut script).unwrap();

    assert_eq!(sorted(analyzer.marked_nodes()), vec![1, 2, 3, 4]);
    assert!(script.static_queries.values().all(|&n| n == 1));
    assert_eq!(script.applied.len(), 4);
}

#[test]
fn conditional_edge_fires_when_condition_marked_later() {
    // 1 -> C(3 if 2); 2 only becomes reachable in the second round.
    let mut script = Script::default().conditional(1, 3, 2).edge(10, 2);
    let mut analyzer = DependencyAnalyzer::new();
    analyzer.add_root(1, "first");

    analyzer.compute(&mut script).unwrap();
    assert!(!analyzer.is_marked(3));

    analyzer.add_root(10, "second");
    analyzer.compute(&mut script).unwrap();

    assert!(analyzer.is_marked(3));
    assert_eq!(
        analyzer.mark_reason(3),
        Some(MarkReason::Conditional {
            owner: 1,
            condition: 2
        })
    );
}

#[test]
fn conditional_edge_fires_when_condition_marked_first() {
    let mut script = Script::default().conditional(1, 3, 2);
    let mut analyzer = DependencyAnalyzer::new();
    analyzer.add_root(2, "condition");
    analyzer.compute(&mut script).unwrap();
    analyzer.add_root(1, "owner");
    analyzer.compute(&mut script).unwrap();

    assert!(analyzer.is_marked(3));
}

#[test]
fn conditional_edge_without_condition_stays_dormant() {
    let mut script = Script::default().conditional(1, 3, 2);
    let mut analyzer = DependencyAnalyzer::new();
    analyzer.add_root(1, "owner");

    let marked = analyzer.compute(&mut script).unwrap();
    assert_eq!(sorted(marked), vec![1]);
}

#[test]
fn dynamic_passes_repeat_until_nothing_new() {
    // 100 proposes 7 once 1 is marked, then 8 once 7's closure (9) is marked.
    let mut script = Script::default()
        .dynamic(100, 1, 7)
        .dynamic(100, 9, 8)
        .edge(7, 9);
    let mut analyzer = DependencyAnalyzer::new();
    analyzer.add_root(100, "dictionary");
    analyzer.add_root(1, "entry");

    let marked = analyzer.compute(&mut script).unwrap();

    assert_eq!(sorted(marked), vec![1, 7, 8, 9, 100]);
    assert_eq!(analyzer.mark_reason(8), Some(MarkReason::Dynamic(100)));
}

#[test]
fn error_aborts_computation() {
    let mut script = Script {
        fail_on: Some(2),
        ..Script::default()
    }
    .edge(1, 2)
    .edge(2, 3);
    let mut analyzer = DependencyAnalyzer::new();
    analyzer.add_root(1, "entry");

    let err = analyzer.compute(&mut script).unwrap_err();
    assert_eq!(err, "node 2 failed");
    assert!(!analyzer.is_marked(3));
}

#[test]
fn marked_set_is_independent_of_root_order() {
    let build = || {
        Script::default()
            .edge(1, 2)
            .edge(3, 4)
            .conditional(2, 5, 4)
            .conditional(4, 6, 2)
            .dynamic(7, 5, 8)
    };

    let mut forward = DependencyAnalyzer::new();
    for root in [1, 3, 7] {
        forward.add_root(root, "root");
    }
    let mut script = build();
    let a = sorted(forward.compute(&mut script).unwrap());

    let mut backward = DependencyAnalyzer::new();
    for root in [7, 3, 1] {
        backward.add_root(root, "root");
    }
    let mut script = build();
    let b = sorted(backward.compute(&mut script).unwrap());

    assert_eq!(a, b);
    assert_eq!(a, vec![1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn reasons_render_for_diagnostics() {
    let reason: MarkReason<u32> = MarkReason::Conditional {
        owner: 1,
        condition: 2,
    };
    assert_eq!(reason.to_string(), "conditional from 1 on 2");
    assert_eq!(MarkReason::<u32>::Root("main").to_string(), "root: main");
}

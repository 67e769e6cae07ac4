//! Parent/child forest built from the flat PPID table of a snapshot.

use std::collections::HashMap;

use crate::snapshot::Snapshot;
use crate::types::{ProcessRecord, ProcessTreeNode};

/// Build the process forest and return its roots ordered by PID.
///
/// A record is a root when its PPID is itself or names no record in the
/// snapshot. Records stuck in a parent cycle (PID reuse can produce one) are
/// promoted to roots so each record appears exactly once.
pub fn build_tree(snapshot: &Snapshot) -> Vec<ProcessTreeNode> {
    let records = snapshot.records();
    let index: HashMap<_, _> = records.iter().enumerate().map(|(i, r)| (r.pid, i)).collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
    let mut roots = Vec::new();
    for (i, record) in records.iter().enumerate() {
        match index.get(&record.ppid) {
            Some(&parent) if record.ppid != record.pid => children[parent].push(i),
            _ => roots.push(i),
        }
    }
    for kids in &mut children {
        kids.sort_by_key(|&i| records[i].pid);
    }

    let mut arena = Arena {
        records,
        children: &children,
        visited: vec![false; records.len()],
    };

    let mut forest: Vec<ProcessTreeNode> = roots.into_iter().map(|i| arena.grow(i, 0)).collect();

    let mut stranded: Vec<usize> = (0..records.len()).filter(|&i| !arena.visited[i]).collect();
    stranded.sort_by_key(|&i| records[i].pid);
    for i in stranded {
        if !arena.visited[i] {
            forest.push(arena.grow(i, 0));
        }
    }

    forest.sort_by_key(|node| node.process.pid);
    forest
}

struct Arena<'a> {
    records: &'a [ProcessRecord],
    children: &'a [Vec<usize>],
    visited: Vec<bool>,
}

impl Arena<'_> {
    fn grow(&mut self, i: usize, level: usize) -> ProcessTreeNode {
        self.visited[i] = true;
        let table = self.children;
        let mut children = Vec::with_capacity(table[i].len());
        for &c in &table[i] {
            // Already claimed when a cycle leads back into this subtree.
            if !self.visited[c] {
                children.push(self.grow(c, level + 1));
            }
        }
        ProcessTreeNode {
            process: self.records[i].clone(),
            level,
            children,
        }
    }
}

/// Total number of nodes reachable from `roots`.
pub fn count_nodes(roots: &[ProcessTreeNode]) -> usize {
    roots.iter().map(|n| 1 + count_nodes(&n.children)).sum()
}

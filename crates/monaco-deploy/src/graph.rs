//! The per-environment dependency graph
//!
//! One vertex per configuration; an edge `A -> B` exists iff B declares a
//! parameter reference to A's coordinate. The graph must be acyclic (a cycle
//! is reported with its member coordinates, never silently broken) and is
//! partitioned into weakly connected components, which are independent units
//! of execution. Vertex order inside a component is topological with the
//! coordinate's lexicographic order as tie-breaker, keeping logs
//! deterministic.

use monaco_types::{Config, Coordinate};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

/// Errors raised while building or validating the graph
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("duplicate coordinate {0} in deployment set")]
    DuplicateCoordinate(Coordinate),

    #[error("dependency cycle between {0:?}")]
    Cycle(Vec<Coordinate>),
}

/// Immutable dependency graph over one environment's configurations
#[derive(Debug)]
pub struct ConfigGraph {
    configs: Vec<Config>,
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
}

impl ConfigGraph {
    /// Build the graph. References to coordinates outside the set are ignored
    /// here; validation reports them before execution starts.
    pub fn build(configs: Vec<Config>) -> Result<Self, GraphError> {
        let mut index: HashMap<Coordinate, usize> = HashMap::with_capacity(configs.len());
        for (i, config) in configs.iter().enumerate() {
            if index.insert(config.coordinate.clone(), i).is_some() {
                return Err(GraphError::DuplicateCoordinate(config.coordinate.clone()));
            }
        }

        let mut successors = vec![Vec::new(); configs.len()];
        let mut predecessors = vec![Vec::new(); configs.len()];

        for (dependent, config) in configs.iter().enumerate() {
            let mut seen = BTreeSet::new();
            for reference in config.cross_config_references() {
                let Some(&dependency) = index.get(&reference.config) else {
                    continue;
                };
                if seen.insert(dependency) {
                    successors[dependency].push(dependent);
                    predecessors[dependent].push(dependency);
                }
            }
        }

        Ok(Self {
            configs,
            successors,
            predecessors,
        })
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn config(&self, vertex: usize) -> &Config {
        &self.configs[vertex]
    }

    pub fn successors(&self, vertex: usize) -> &[usize] {
        &self.successors[vertex]
    }

    pub fn predecessors(&self, vertex: usize) -> &[usize] {
        &self.predecessors[vertex]
    }

    /// Refuse cyclic graphs, naming the vertices of one cycle.
    pub fn validate_acyclic(&self) -> Result<(), GraphError> {
        match self.find_cycle() {
            None => Ok(()),
            Some(cycle) => Err(GraphError::Cycle(
                cycle
                    .into_iter()
                    .map(|v| self.configs[v].coordinate.clone())
                    .collect(),
            )),
        }
    }

    /// Weakly connected components, each in topological order with
    /// lexicographic coordinate tie-break. Components themselves are ordered
    /// by their smallest coordinate.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut roots = UnionFind::new(self.configs.len());
        for (from, successors) in self.successors.iter().enumerate() {
            for &to in successors {
                roots.union(from, to);
            }
        }

        let mut grouped: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        // group by root, visiting vertices in coordinate order so every
        // component (and the component list itself) is deterministic
        let mut by_coordinate: Vec<usize> = (0..self.configs.len()).collect();
        by_coordinate.sort_by(|&a, &b| self.configs[a].coordinate.cmp(&self.configs[b].coordinate));

        let mut component_order: Vec<usize> = Vec::new();
        for vertex in by_coordinate {
            let root = roots.find(vertex);
            if !grouped.contains_key(&root) {
                component_order.push(root);
            }
            grouped.entry(root).or_default().push(vertex);
        }

        component_order
            .into_iter()
            .map(|root| self.topological_order(&grouped[&root]))
            .collect()
    }

    fn topological_order(&self, vertices: &[usize]) -> Vec<usize> {
        let members: BTreeSet<usize> = vertices.iter().copied().collect();
        let mut in_degree: HashMap<usize, usize> = members
            .iter()
            .map(|&v| {
                let degree = self.predecessors[v]
                    .iter()
                    .filter(|&&p| members.contains(&p))
                    .count();
                (v, degree)
            })
            .collect();

        // ready vertices keyed by coordinate for the deterministic tie-break
        let mut ready: BTreeSet<(&Coordinate, usize)> = members
            .iter()
            .copied()
            .filter(|v| in_degree[v] == 0)
            .map(|v| (&self.configs[v].coordinate, v))
            .collect();

        let mut order = Vec::with_capacity(vertices.len());
        while let Some(&(coordinate, vertex)) = ready.iter().next() {
            ready.remove(&(coordinate, vertex));
            order.push(vertex);
            for &succ in &self.successors[vertex] {
                if let Some(degree) = in_degree.get_mut(&succ) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert((&self.configs[succ].coordinate, succ));
                    }
                }
            }
        }
        order
    }

    fn find_cycle(&self) -> Option<Vec<usize>> {
        const WHITE: u8 = 0;
        const GRAY: u8 = 1;
        const BLACK: u8 = 2;

        let mut state = vec![WHITE; self.configs.len()];

        for start in 0..self.configs.len() {
            if state[start] != WHITE {
                continue;
            }
            // iterative DFS keeping the gray path for cycle reconstruction
            let mut path: Vec<(usize, usize)> = vec![(start, 0)];
            state[start] = GRAY;

            while let Some(&(vertex, next)) = path.last() {
                if next < self.successors[vertex].len() {
                    if let Some(frame) = path.last_mut() {
                        frame.1 += 1;
                    }
                    let succ = self.successors[vertex][next];
                    match state[succ] {
                        WHITE => {
                            state[succ] = GRAY;
                            path.push((succ, 0));
                        }
                        GRAY => {
                            let mut cycle: Vec<usize> =
                                path.iter().map(|&(v, _)| v).collect();
                            if let Some(pos) = cycle.iter().position(|&v| v == succ) {
                                cycle.drain(..pos);
                            }
                            return Some(cycle);
                        }
                        _ => {}
                    }
                } else {
                    state[vertex] = BLACK;
                    path.pop();
                }
            }
        }
        None
    }
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, v: usize) -> usize {
        if self.parent[v] != v {
            let root = self.find(self.parent[v]);
            self.parent[v] = root;
        }
        self.parent[v]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

//! Producer registry and dependency graph
//!
//! Producers live in an arena keyed by name, owned by one compilation run.
//! Scopes hold ordered name sequences; `global` is logically prefixed to
//! every scope. Execution order comes from a petgraph `DiGraph` whose
//! node indices follow list position:
//! - edge A → B when B requires a quantity A emits
//! - Kahn's algorithm, smallest list position first, so registration order
//!   breaks ties
//! - DFS with a visiting/visited colour set to report the cycle path

use super::producer::{InputSchema, Producer};
use crate::config::context::{GLOBAL_SCOPE, NOMINAL};
use crate::errors::{CompileError, Result};
use indexmap::{IndexMap, IndexSet};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use tracing::debug;

/// Name-keyed arena of producer declarations
#[derive(Debug, Clone, Default)]
pub struct ProducerRegistry {
    producers: IndexMap<String, Producer>,
    /// Leaf member name -> owning group
    members: HashMap<String, String>,
}

impl ProducerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declaration
    ///
    /// Re-registering an identical declaration is a no-op; a different
    /// declaration under a used name is rejected. Leaf names share one
    /// namespace with group members, so a flattened list never holds the
    /// same name twice.
    pub fn register(&mut self, producer: &Producer) -> Result<()> {
        producer.validate()?;
        match self.producers.get(&producer.name) {
            Some(existing) if existing == producer => return Ok(()),
            Some(_) => {
                return Err(CompileError::config(format!(
                    "producer '{}' registered twice with different declarations",
                    producer.name
                )))
            }
            None => {}
        }

        if let Some(group) = self.members.get(&producer.name) {
            return Err(CompileError::config(format!(
                "producer '{}' is already a member of group '{}'",
                producer.name, group
            )));
        }

        let mut leaves: Vec<String> = Vec::new();
        if producer.is_group() {
            for leaf in producer.unit_names() {
                let taken = leaf == producer.name
                    || leaves.contains(&leaf)
                    || self.producers.contains_key(&leaf)
                    || self.members.contains_key(&leaf);
                if taken {
                    return Err(CompileError::config(format!(
                        "group '{}' member '{}' collides with another producer name",
                        producer.name, leaf
                    )));
                }
                leaves.push(leaf);
            }
        }

        for leaf in leaves {
            self.members.insert(leaf, producer.name.clone());
        }
        self.producers
            .insert(producer.name.clone(), producer.clone());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Producer> {
        self.producers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.producers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }

    /// Expand unit names to leaf producer names (groups inline their members)
    pub fn flatten(&self, names: &[String]) -> Vec<String> {
        names
            .iter()
            .flat_map(|name| match self.get(name) {
                Some(p) => p.unit_names(),
                None => vec![name.clone()],
            })
            .collect()
    }
}

/// Per-scope producer sequences over a shared registry
#[derive(Debug, Clone, Default)]
pub struct ProducerGraph {
    registry: ProducerRegistry,
    sequences: IndexMap<String, Vec<String>>,
    /// Names a scope may reference: registered or introduced by rules/shifts
    known: IndexMap<String, IndexSet<String>>,
}

impl ProducerGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append producers to a scope's sequence
    pub fn add(&mut self, scope: &str, producers: &[Producer]) -> Result<()> {
        for producer in producers {
            self.registry.register(producer)?;
            let sequence = self.sequences.entry(scope.to_string()).or_default();
            if sequence.contains(&producer.name) {
                debug!(
                    "producer '{}' already in scope '{}', keeping first registration",
                    producer.name, scope
                );
                continue;
            }
            sequence.push(producer.name.clone());
            self.mark_known(scope, &producer.name);
        }
        Ok(())
    }

    /// Register a producer introduced by a rule or shift for a scope
    pub fn introduce(&mut self, scope: &str, producer: &Producer) -> Result<()> {
        self.registry.register(producer)?;
        self.mark_known(scope, &producer.name);
        Ok(())
    }

    fn mark_known(&mut self, scope: &str, name: &str) {
        self.known
            .entry(scope.to_string())
            .or_default()
            .insert(name.to_string());
    }

    /// Whether `scope` (or global) registered or introduced `name`
    pub fn knows(&self, scope: &str, name: &str) -> bool {
        [GLOBAL_SCOPE, scope].iter().any(|s| {
            self.known
                .get(*s)
                .map_or(false, |names| names.contains(name))
        })
    }

    /// Registration-ordered sequence of a scope, global producers first
    pub fn sequence(&self, scope: &str) -> Vec<String> {
        let mut sequence: Vec<String> = Vec::new();
        let keys = if scope == GLOBAL_SCOPE {
            vec![GLOBAL_SCOPE]
        } else {
            vec![GLOBAL_SCOPE, scope]
        };
        for key in keys {
            if let Some(names) = self.sequences.get(key) {
                for name in names {
                    if !sequence.contains(name) {
                        sequence.push(name.clone());
                    }
                }
            }
        }
        sequence
    }

    /// Topological execution order of a scope's registered sequence
    ///
    /// Fails on the first integrity violation of the sequence (dangling
    /// input, duplicate output or cycle), or on their aggregate.
    pub fn topologically_order(&self, scope: &str, schema: &InputSchema) -> Result<Vec<String>> {
        let sequence = self.sequence(scope);
        let renames = BTreeMap::new();
        let graph = DependencyGraph::build(&sequence, &self.registry, schema, &renames)?;
        if let Some(err) = CompileError::from_violations(graph.violations(scope, NOMINAL)) {
            return Err(err);
        }
        graph.ordered(scope, NOMINAL)
    }

    pub fn registry(&self) -> &ProducerRegistry {
        &self.registry
    }
}

/// Dependency graph over one finalized producer list
pub struct DependencyGraph<'a> {
    graph: DiGraph<&'a Producer, ()>,
    unsatisfied: Vec<(String, String)>,
    duplicates: Vec<(String, String, String)>,
}

impl<'a> DependencyGraph<'a> {
    /// Build from unit names
    ///
    /// `renames` maps a required quantity to the quantity actually read.
    pub fn build(
        names: &[String],
        registry: &'a ProducerRegistry,
        schema: &InputSchema,
        renames: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut emitters: HashMap<&'a str, NodeIndex> = HashMap::new();
        let mut duplicates = Vec::new();

        for name in names {
            let producer = registry.get(name).ok_or_else(|| {
                CompileError::config(format!("producer '{}' has no declaration", name))
            })?;
            let idx = graph.add_node(producer);
            for quantity in &producer.emits {
                if let Some(&first) = emitters.get(quantity.as_str()) {
                    let first: &Producer = graph[first];
                    duplicates.push((quantity.clone(), first.name.clone(), producer.name.clone()));
                } else {
                    emitters.insert(quantity.as_str(), idx);
                }
            }
        }

        let mut unsatisfied = Vec::new();
        for idx in graph.node_indices().collect::<Vec<_>>() {
            let producer: &Producer = graph[idx];
            for required in &producer.requires {
                let quantity = renames.get(required).unwrap_or(required);
                match emitters.get(quantity.as_str()) {
                    Some(&emitter) if emitter != idx => {
                        graph.update_edge(emitter, idx, ());
                    }
                    // only emitted by the requiring producer itself
                    Some(_) | None if schema.contains(quantity) => {}
                    Some(_) | None => unsatisfied.push((producer.name.clone(), quantity.clone())),
                }
            }
        }

        Ok(Self {
            graph,
            unsatisfied,
            duplicates,
        })
    }

    /// Execution order, or the names along one dependency cycle
    pub fn order(&self) -> std::result::Result<Vec<String>, Vec<String>> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| self.graph.neighbors_directed(idx, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &degree)| degree == 0)
            .map(|(pos, _)| Reverse(pos))
            .collect();

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(Reverse(pos)) = ready.pop() {
            let idx = NodeIndex::new(pos);
            order.push(self.graph[idx].name.clone());
            for next in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                in_degree[next.index()] -= 1;
                if in_degree[next.index()] == 0 {
                    ready.push(Reverse(next.index()));
                }
            }
        }

        if order.len() == self.graph.node_count() {
            Ok(order)
        } else {
            Err(self.find_cycle())
        }
    }

    /// Execution order with a cycle mapped to `CyclicDependency`
    pub fn ordered(&self, scope: &str, variant: &str) -> Result<Vec<String>> {
        self.order().map_err(|cycle| CompileError::CyclicDependency {
            scope: scope.to_string(),
            variant: variant.to_string(),
            cycle,
        })
    }

    fn find_cycle(&self) -> Vec<String> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        fn visit(
            graph: &DiGraph<&Producer, ()>,
            idx: NodeIndex,
            colors: &mut [Color],
            path: &mut Vec<NodeIndex>,
        ) -> Option<Vec<NodeIndex>> {
            colors[idx.index()] = Color::Gray;
            path.push(idx);
            for next in graph.neighbors_directed(idx, Direction::Outgoing) {
                match colors[next.index()] {
                    Color::Gray => {
                        let start = path.iter().position(|&n| n == next).unwrap_or(0);
                        let mut cycle = path[start..].to_vec();
                        cycle.push(next);
                        return Some(cycle);
                    }
                    Color::White => {
                        if let Some(cycle) = visit(graph, next, colors, path) {
                            return Some(cycle);
                        }
                    }
                    Color::Black => {}
                }
            }
            path.pop();
            colors[idx.index()] = Color::Black;
            None
        }

        let mut colors = vec![Color::White; self.graph.node_count()];
        for idx in self.graph.node_indices() {
            if colors[idx.index()] == Color::White {
                let mut path = Vec::new();
                if let Some(cycle) = visit(&self.graph, idx, &mut colors, &mut path) {
                    return cycle
                        .into_iter()
                        .map(|n| self.graph[n].name.clone())
                        .collect();
                }
            }
        }
        Vec::new()
    }

    /// Every integrity violation of the list
    pub fn violations(&self, scope: &str, variant: &str) -> Vec<CompileError> {
        let mut violations: Vec<CompileError> = self
            .unsatisfied
            .iter()
            .map(|(producer, quantity)| CompileError::UnsatisfiedInput {
                scope: scope.to_string(),
                variant: variant.to_string(),
                producer: producer.clone(),
                quantity: quantity.clone(),
            })
            .collect();

        violations.extend(self.duplicates.iter().map(|(quantity, first, second)| {
            CompileError::DuplicateOutput {
                scope: scope.to_string(),
                variant: variant.to_string(),
                quantity: quantity.clone(),
                first: first.clone(),
                second: second.clone(),
            }
        }));

        if let Err(err) = self.ordered(scope, variant) {
            violations.push(err);
        }
        violations
    }

    /// Whether some producer in the list emits `quantity`
    pub fn emits(&self, quantity: &str) -> bool {
        self.graph
            .node_weights()
            .any(|p| p.emits.iter().any(|q| q == quantity))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

use std::collections::{BTreeMap, HashMap, HashSet};

use smallvec::SmallVec;

use crate::{
    color::Rgb,
    error::{NetreelError, NetreelResult},
};

/// Declared type of a GEXF attribute. `long` collapses into `Integer`,
/// `float` into `Double`; anything unrecognized is kept as a string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrType {
    String,
    Integer,
    Double,
    Boolean,
}

impl AttrType {
    pub fn from_gexf(raw: &str) -> Self {
        match raw {
            "integer" | "long" => Self::Integer,
            "double" | "float" => Self::Double,
            "boolean" => Self::Boolean,
            _ => Self::String,
        }
    }
}

/// A typed attribute value.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
}

impl AttrValue {
    pub fn parse(ty: AttrType, raw: &str) -> NetreelResult<Self> {
        match ty {
            AttrType::String => Ok(Self::String(raw.to_string())),
            AttrType::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Self::Integer)
                .map_err(|e| NetreelError::schema(format!("bad integer '{raw}': {e}"))),
            AttrType::Double => raw
                .trim()
                .parse::<f64>()
                .map(Self::Double)
                .map_err(|e| NetreelError::schema(format!("bad double '{raw}': {e}"))),
            AttrType::Boolean => match raw.trim() {
                "true" | "1" => Ok(Self::Boolean(true)),
                "false" | "0" => Ok(Self::Boolean(false)),
                other => Err(NetreelError::schema(format!("bad boolean '{other}'"))),
            },
        }
    }
}

/// One period of activity attached to a node or edge.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Spell {
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub timestamp: Option<f64>,
}

/// The time data an element carries: its own bounds or timestamp, plus any
/// `<spell>` refinements. An element with none of these is never active.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Presence {
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub timestamp: Option<f64>,
    pub spells: Vec<Spell>,
}

impl Presence {
    pub fn is_empty(&self) -> bool {
        self.start.is_none()
            && self.end.is_none()
            && self.timestamp.is_none()
            && self.spells.is_empty()
    }
}

/// An attribute value scoped to an optional validity interval. Static
/// attributes are stored as a single unbounded entry.
#[derive(Clone, Debug, PartialEq)]
pub struct TimedValue {
    pub value: AttrValue,
    pub start: Option<f64>,
    pub end: Option<f64>,
}

pub type AttributeBag = BTreeMap<String, Vec<TimedValue>>;

#[derive(Clone, Debug)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub color: Option<Rgb>,
    pub presence: Presence,
    pub attrs: AttributeBag,
}

impl GraphNode {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            color: None,
            presence: Presence::default(),
            attrs: AttributeBag::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GraphEdge {
    pub source: usize,
    pub target: usize,
    pub directed: bool,
    pub weight: f64,
    pub presence: Presence,
    pub attrs: AttributeBag,
}

#[derive(Clone, Debug)]
pub struct EdgeData {
    pub directed: bool,
    pub weight: f64,
    pub presence: Presence,
    pub attrs: AttributeBag,
}

impl Default for EdgeData {
    fn default() -> Self {
        Self {
            directed: false,
            weight: 1.0,
            presence: Presence::default(),
            attrs: AttributeBag::new(),
        }
    }
}

/// Insertion-ordered mixed multigraph. Node ids are unique strings;
/// parallel edges are allowed, self-loops are not.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    index: HashMap<String, usize>,
    incidence: Vec<SmallVec<[u32; 4]>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: GraphNode) -> NetreelResult<usize> {
        if self.index.contains_key(&node.id) {
            return Err(NetreelError::schema(format!("duplicate node id '{}'", node.id)));
        }
        let idx = self.nodes.len();
        self.index.insert(node.id.clone(), idx);
        self.nodes.push(node);
        self.incidence.push(SmallVec::new());
        Ok(idx)
    }

    pub fn add_edge(&mut self, source: &str, target: &str, data: EdgeData) -> NetreelResult<usize> {
        let s = self
            .node_index(source)
            .ok_or_else(|| NetreelError::schema(format!("edge references unknown node '{source}'")))?;
        let t = self
            .node_index(target)
            .ok_or_else(|| NetreelError::schema(format!("edge references unknown node '{target}'")))?;
        if s == t {
            return Err(NetreelError::schema(format!("self-loop on node '{source}'")));
        }

        let idx = self.edges.len();
        self.edges.push(GraphEdge {
            source: s,
            target: t,
            directed: data.directed,
            weight: data.weight,
            presence: data.presence,
            attrs: data.attrs,
        });
        self.incidence[s].push(idx as u32);
        self.incidence[t].push(idx as u32);
        Ok(idx)
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn node(&self, idx: usize) -> &GraphNode {
        &self.nodes[idx]
    }

    pub fn edge(&self, idx: usize) -> &GraphEdge {
        &self.edges[idx]
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter()
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter()
    }

    /// Node count.
    pub fn order(&self) -> usize {
        self.nodes.len()
    }

    /// Edge count.
    pub fn size(&self) -> usize {
        self.edges.len()
    }

    /// Incoming directed edges plus all undirected incident edges.
    pub fn in_degree(&self, idx: usize) -> usize {
        self.incidence[idx]
            .iter()
            .filter(|&&e| {
                let edge = &self.edges[e as usize];
                !edge.directed || edge.target == idx
            })
            .count()
    }

    /// Visit each distinct neighbor of `idx` once, regardless of edge
    /// direction or multiplicity.
    pub fn for_each_neighbor(&self, idx: usize, mut f: impl FnMut(usize, &GraphNode)) {
        let mut seen = HashSet::new();
        for &e in &self.incidence[idx] {
            let edge = &self.edges[e as usize];
            let other = if edge.source == idx { edge.target } else { edge.source };
            if seen.insert(other) {
                f(other, &self.nodes[other]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_abc() -> Graph {
        let mut g = Graph::new();
        g.add_node(GraphNode::new("a")).unwrap();
        g.add_node(GraphNode::new("b")).unwrap();
        g.add_node(GraphNode::new("c")).unwrap();
        g
    }

    #[test]
    fn nodes_iterate_in_insertion_order() {
        let g = graph_abc();
        let ids: Vec<_> = g.nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(g.order(), 3);
    }

    #[test]
    fn duplicate_node_id_is_rejected() {
        let mut g = graph_abc();
        assert!(g.add_node(GraphNode::new("a")).is_err());
    }

    #[test]
    fn self_loop_and_unknown_endpoint_are_rejected() {
        let mut g = graph_abc();
        assert!(g.add_edge("a", "a", EdgeData::default()).is_err());
        assert!(g.add_edge("a", "zzz", EdgeData::default()).is_err());
        assert_eq!(g.size(), 0);
    }

    #[test]
    fn in_degree_counts_incoming_directed_and_all_undirected() {
        let mut g = graph_abc();
        g.add_edge("a", "b", EdgeData { directed: true, ..EdgeData::default() })
            .unwrap();
        g.add_edge("c", "b", EdgeData::default()).unwrap();
        g.add_edge("b", "c", EdgeData { directed: true, ..EdgeData::default() })
            .unwrap();

        assert_eq!(g.in_degree(0), 0); // a: outgoing directed only
        assert_eq!(g.in_degree(1), 2); // b: one incoming directed + one undirected
        assert_eq!(g.in_degree(2), 2); // c: one undirected + one incoming directed
    }

    #[test]
    fn parallel_edges_are_kept_but_neighbors_dedupe() {
        let mut g = graph_abc();
        g.add_edge("a", "b", EdgeData::default()).unwrap();
        g.add_edge("a", "b", EdgeData::default()).unwrap();
        assert_eq!(g.size(), 2);

        let mut neighbors = Vec::new();
        g.for_each_neighbor(0, |i, _| neighbors.push(i));
        assert_eq!(neighbors, [1]);
    }

    #[test]
    fn attr_value_parse_respects_types() {
        assert_eq!(
            AttrValue::parse(AttrType::Integer, "12").unwrap(),
            AttrValue::Integer(12)
        );
        assert_eq!(
            AttrValue::parse(AttrType::Boolean, "true").unwrap(),
            AttrValue::Boolean(true)
        );
        assert!(AttrValue::parse(AttrType::Double, "NaNope").is_err());
        assert_eq!(AttrType::from_gexf("long"), AttrType::Integer);
        assert_eq!(AttrType::from_gexf("liststring"), AttrType::String);
    }
}

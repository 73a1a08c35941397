use std::collections::{BTreeMap, HashMap};

use crate::{
    color::Rgb,
    error::{NetreelError, NetreelResult},
    graph::{AttrType, AttrValue},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrClass {
    Node,
    Edge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrMode {
    Static,
    Dynamic,
}

/// Declaration of one attribute column, as read from `<attributes>`.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AttributeDescriptor {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub attr_type: AttrType,
    pub mode: AttrMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<AttrValue>,
}

/// The intermediate document: `{ "slices": [...] }`.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct SliceSeries {
    pub slices: Vec<Snapshot>,
}

/// The projection of the graph onto one `[start, end)` window.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    pub start: f64,
    pub end: f64,
    pub nodes: Vec<SnapshotNode>,
    pub edges: Vec<SnapshotEdge>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SnapshotNode {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, AttrValue>,
}

impl SnapshotNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            x: None,
            y: None,
            size: None,
            color: None,
            attrs: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SnapshotEdge {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub directed: bool,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, AttrValue>,
}

fn default_opacity() -> f64 {
    1.0
}

impl Snapshot {
    /// Every edge endpoint must appear in the node list.
    pub fn validate(&self) -> NetreelResult<()> {
        let ids = self.node_index_map();
        for edge in &self.edges {
            if !ids.contains_key(edge.source.as_str()) || !ids.contains_key(edge.target.as_str()) {
                return Err(NetreelError::schema(format!(
                    "snapshot [{}, {}) edge '{}' -> '{}' has an endpoint outside the node list",
                    self.start, self.end, edge.source, edge.target
                )));
            }
        }
        Ok(())
    }

    /// Node id -> position in `nodes`.
    pub fn node_index_map(&self) -> HashMap<&str, usize> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect()
    }

    /// Edge endpoints resolved to node indices, aligned with `edges`.
    /// `None` marks an edge whose endpoint is missing from the node list
    /// (which `validate` rejects).
    pub fn edge_endpoints(&self) -> Vec<Option<(usize, usize)>> {
        let ids = self.node_index_map();
        self.edges
            .iter()
            .map(|e| Some((*ids.get(e.source.as_str())?, *ids.get(e.target.as_str())?)))
            .collect()
    }
}

use std::{collections::HashMap, path::Path};

use anyhow::Context as _;

use crate::{
    color::Rgb,
    error::{NetreelError, NetreelResult},
    graph::{AttrType, AttrValue, AttributeBag, EdgeData, Graph, GraphNode, Presence, Spell, TimedValue},
    model::{AttrMode, AttributeDescriptor},
    time::{TimeFormat, TimeRepresentation},
};

/// Supported GEXF version. Other versions are accepted with a warning.
pub const SUPPORTED_VERSION: &str = "1.3";

/// A parsed dynamic GEXF document: the graph plus the time semantics and
/// attribute declarations the slicer needs.
#[derive(Clone, Debug)]
pub struct GexfDocument {
    pub version: String,
    pub time_format: TimeFormat,
    pub time_representation: TimeRepresentation,
    pub node_attributes: Vec<AttributeDescriptor>,
    pub edge_attributes: Vec<AttributeDescriptor>,
    pub graph: Graph,
}

pub fn parse_file(path: &Path) -> NetreelResult<GexfDocument> {
    let xml = std::fs::read_to_string(path)
        .with_context(|| format!("read gexf '{}'", path.display()))?;
    parse_str(&xml)
}

pub fn parse_str(xml: &str) -> NetreelResult<GexfDocument> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| NetreelError::UnsupportedFormat(format!("not well-formed XML: {e}")))?;

    let root = doc.root_element();
    if root.tag_name().name() != "gexf" {
        return Err(NetreelError::UnsupportedFormat(format!(
            "root element is <{}>, expected <gexf>",
            root.tag_name().name()
        )));
    }

    let version = root.attribute("version").unwrap_or("").to_string();
    if version != SUPPORTED_VERSION {
        tracing::warn!(version = %version, "gexf version is not {SUPPORTED_VERSION}, proceeding anyway");
    }

    let graph_el = first_child(root, "graph")
        .ok_or_else(|| NetreelError::schema("document has no <graph> element"))?;

    let mode = graph_el.attribute("mode").unwrap_or("");
    if mode != "dynamic" {
        return Err(NetreelError::UnsupportedMode(mode.to_string()));
    }

    let time_format = TimeFormat::from_gexf(graph_el.attribute("timeformat").unwrap_or(""))?;
    let time_representation =
        TimeRepresentation::from_gexf(graph_el.attribute("timerepresentation").unwrap_or(""))?;
    let default_directed = graph_el.attribute("defaultedgetype") == Some("directed");

    let mut node_attributes = Vec::new();
    let mut edge_attributes = Vec::new();
    for attrs_el in elements(graph_el, "attributes") {
        let mode = match attrs_el.attribute("mode") {
            Some("dynamic") => AttrMode::Dynamic,
            _ => AttrMode::Static,
        };
        let target = match attrs_el.attribute("class") {
            Some("edge") => &mut edge_attributes,
            _ => &mut node_attributes,
        };
        for attr_el in elements(attrs_el, "attribute") {
            let id = attr_el
                .attribute("id")
                .ok_or_else(|| NetreelError::schema("<attribute> without id"))?;
            let attr_type = AttrType::from_gexf(attr_el.attribute("type").unwrap_or("string"));
            let default = first_child(attr_el, "default")
                .and_then(|d| d.text())
                .map(|raw| AttrValue::parse(attr_type, raw))
                .transpose()?;
            target.push(AttributeDescriptor {
                id: id.to_string(),
                title: attr_el.attribute("title").unwrap_or(id).to_string(),
                attr_type,
                mode,
                default,
            });
        }
    }

    let node_decls: HashMap<&str, &AttributeDescriptor> =
        node_attributes.iter().map(|d| (d.id.as_str(), d)).collect();
    let edge_decls: HashMap<&str, &AttributeDescriptor> =
        edge_attributes.iter().map(|d| (d.id.as_str(), d)).collect();

    let mut graph = Graph::new();

    if let Some(nodes_el) = first_child(graph_el, "nodes") {
        for node_el in elements(nodes_el, "node") {
            let id = node_el
                .attribute("id")
                .ok_or_else(|| NetreelError::schema("<node> without id"))?;
            let mut node = GraphNode::new(id);
            if let Some(label) = node_el.attribute("label") {
                node.label = label.to_string();
            }
            node.presence = parse_presence(node_el, time_format)?;
            node.color = parse_viz_color(node_el);
            node.attrs = parse_attvalues(node_el, &node_decls, time_format)?;
            graph.add_node(node)?;
        }
    }

    if let Some(edges_el) = first_child(graph_el, "edges") {
        for edge_el in elements(edges_el, "edge") {
            let source = edge_el
                .attribute("source")
                .ok_or_else(|| NetreelError::schema("<edge> without source"))?;
            let target = edge_el
                .attribute("target")
                .ok_or_else(|| NetreelError::schema("<edge> without target"))?;
            if source == target {
                tracing::warn!(node = %source, "skipping self-loop edge");
                continue;
            }
            let directed = match edge_el.attribute("type") {
                Some("directed") => true,
                Some("undirected") => false,
                _ => default_directed,
            };
            let weight = match edge_el.attribute("weight") {
                Some(raw) => raw
                    .parse::<f64>()
                    .map_err(|e| NetreelError::schema(format!("bad edge weight '{raw}': {e}")))?,
                None => 1.0,
            };
            let data = EdgeData {
                directed,
                weight,
                presence: parse_presence(edge_el, time_format)?,
                attrs: parse_attvalues(edge_el, &edge_decls, time_format)?,
            };
            graph.add_edge(source, target, data)?;
        }
    }

    tracing::debug!(
        order = graph.order(),
        size = graph.size(),
        ?time_format,
        ?time_representation,
        "parsed gexf document"
    );

    Ok(GexfDocument {
        version,
        time_format,
        time_representation,
        node_attributes,
        edge_attributes,
        graph,
    })
}

fn first_child<'a, 'i>(node: roxmltree::Node<'a, 'i>, name: &str) -> Option<roxmltree::Node<'a, 'i>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

fn elements<'a, 'i>(
    node: roxmltree::Node<'a, 'i>,
    name: &'a str,
) -> impl Iterator<Item = roxmltree::Node<'a, 'i>> {
    node.children()
        .filter(move |c| c.is_element() && c.tag_name().name() == name)
}

fn parse_time(raw: Option<&str>, format: TimeFormat) -> NetreelResult<Option<f64>> {
    raw.map(|r| format.parse(r)).transpose()
}

fn parse_presence(el: roxmltree::Node<'_, '_>, format: TimeFormat) -> NetreelResult<Presence> {
    let mut presence = Presence {
        start: parse_time(el.attribute("start"), format)?,
        end: parse_time(el.attribute("end"), format)?,
        timestamp: parse_time(el.attribute("timestamp"), format)?,
        spells: Vec::new(),
    };
    if let Some(spells_el) = first_child(el, "spells") {
        for spell_el in elements(spells_el, "spell") {
            presence.spells.push(Spell {
                start: parse_time(spell_el.attribute("start"), format)?,
                end: parse_time(spell_el.attribute("end"), format)?,
                timestamp: parse_time(spell_el.attribute("timestamp"), format)?,
            });
        }
    }
    Ok(presence)
}

fn parse_attvalues(
    el: roxmltree::Node<'_, '_>,
    decls: &HashMap<&str, &AttributeDescriptor>,
    format: TimeFormat,
) -> NetreelResult<AttributeBag> {
    let mut bag = AttributeBag::new();
    let Some(attvalues_el) = first_child(el, "attvalues") else {
        return Ok(bag);
    };
    for av in elements(attvalues_el, "attvalue") {
        let key = av
            .attribute("for")
            .or_else(|| av.attribute("id"))
            .ok_or_else(|| NetreelError::schema("<attvalue> without 'for'"))?;
        let raw = av
            .attribute("value")
            .ok_or_else(|| NetreelError::schema("<attvalue> without value"))?;
        // Undeclared attributes pass through as strings.
        let value = match decls.get(key) {
            Some(decl) => AttrValue::parse(decl.attr_type, raw)?,
            None => AttrValue::String(raw.to_string()),
        };
        bag.entry(key.to_string()).or_default().push(TimedValue {
            value,
            start: parse_time(av.attribute("start"), format)?,
            end: parse_time(av.attribute("end"), format)?,
        });
    }
    Ok(bag)
}

fn parse_viz_color(el: roxmltree::Node<'_, '_>) -> Option<Rgb> {
    let color = first_child(el, "color")?;
    let channel = |name| {
        color
            .attribute(name)
            .and_then(|v| v.parse::<i64>().ok())
            .map(|v| v.clamp(0, 255) as u8)
    };
    Some(Rgb([channel("r")?, channel("g")?, channel("b")?]))
}

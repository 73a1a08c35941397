use std::collections::BTreeMap;

use crate::{
    error::{NetreelError, NetreelResult},
    gexf::GexfDocument,
    graph::{AttrValue, AttributeBag, Presence},
    model::{AttrMode, AttributeDescriptor, SliceSeries, Snapshot, SnapshotEdge, SnapshotNode},
    time::TimeRepresentation,
};

/// Sliding-window parameters. `None` picks the format-dependent default:
/// a week/day (in milliseconds) for date-like formats, 1/0.1 otherwise.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SliceOptions {
    pub range: Option<f64>,
    pub step: Option<f64>,
}

const MS_PER_DAY: f64 = 24.0 * 60.0 * 60.0 * 1000.0;
const MAX_SLICES: usize = 1_000_000;

/// Project a dynamic graph onto a sequence of `[start, start + range)`
/// windows advancing by `step`, starting at the earliest node time.
///
/// The time envelope is discovered from node elements (and their spells)
/// only; edge times do not extend it, so an edge active outside every node's
/// lifetime can never appear in a window.
pub fn slice(doc: &GexfDocument, opts: &SliceOptions) -> NetreelResult<SliceSeries> {
    let (default_range, default_step) = if doc.time_format.is_date_like() {
        (7.0 * MS_PER_DAY, MS_PER_DAY)
    } else {
        (1.0, 0.1)
    };
    let range = opts.range.unwrap_or(default_range);
    let step = opts.step.unwrap_or(default_step);

    if !range.is_finite() || range < 0.0 {
        return Err(NetreelError::schema(format!("range must be finite and >= 0, got {range}")));
    }
    if !step.is_finite() || step <= 0.0 {
        return Err(NetreelError::schema(format!("step must be finite and > 0, got {step}")));
    }
    if range == 0.0 {
        return Ok(SliceSeries::default());
    }

    let Some((date_min, date_max)) = node_time_envelope(doc) else {
        tracing::warn!("no node carries time data; emitting zero slices");
        return Ok(SliceSeries::default());
    };
    tracing::info!(
        date_min = %doc.time_format.format(date_min),
        date_max = %doc.time_format.format(date_max),
        range,
        step,
        "slicing"
    );

    let span = date_max - date_min;
    if span / step > MAX_SLICES as f64 {
        return Err(NetreelError::schema(format!(
            "range/step would produce more than {MAX_SLICES} slices over a span of {span}"
        )));
    }

    let mut slices = Vec::new();
    let mut k = 0u64;
    loop {
        let start = date_min + k as f64 * step;
        if start >= date_max {
            break;
        }
        slices.push(project(doc, start, start + range));
        k += 1;
    }

    tracing::debug!(slices = slices.len(), "slicing complete");
    Ok(SliceSeries { slices })
}

/// Earliest and latest time value carried by any node or node spell.
fn node_time_envelope(doc: &GexfDocument) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut observe = |t: Option<f64>| {
        if let Some(t) = t {
            min = min.min(t);
            max = max.max(t);
        }
    };
    for node in doc.graph.nodes() {
        let p = &node.presence;
        observe(p.start);
        observe(p.end);
        observe(p.timestamp);
        for spell in &p.spells {
            observe(spell.start);
            observe(spell.end);
            observe(spell.timestamp);
        }
    }
    (min <= max).then_some((min, max))
}

fn interval_overlaps(start: Option<f64>, end: Option<f64>, w0: f64, w1: f64) -> bool {
    let s = start.unwrap_or(f64::NEG_INFINITY);
    let e = end.unwrap_or(f64::INFINITY);
    !(e < w0 || w1 < s)
}

/// Whether an element is active in the window `[w0, w1)`.
pub fn active_in(presence: &Presence, w0: f64, w1: f64, repr: TimeRepresentation) -> bool {
    match repr {
        TimeRepresentation::Interval => {
            let own = (presence.start.is_some() || presence.end.is_some())
                && interval_overlaps(presence.start, presence.end, w0, w1);
            own || presence.spells.iter().any(|s| {
                (s.start.is_some() || s.end.is_some()) && interval_overlaps(s.start, s.end, w0, w1)
            })
        }
        TimeRepresentation::Timestamp => {
            let hit = |t: Option<f64>| t.is_some_and(|t| t >= w0 && t < w1);
            hit(presence.timestamp) || presence.spells.iter().any(|s| hit(s.timestamp))
        }
    }
}

fn project(doc: &GexfDocument, start: f64, end: f64) -> Snapshot {
    let repr = doc.time_representation;
    let mut nodes = Vec::new();
    let mut active = vec![false; doc.graph.order()];

    for (idx, node) in doc.graph.nodes().enumerate() {
        if !active_in(&node.presence, start, end, repr) {
            continue;
        }
        active[idx] = true;
        let mut view = SnapshotNode::new(node.id.clone(), node.label.clone());
        view.color = node.color;
        view.attrs = project_attrs(&node.attrs, &doc.node_attributes, start);
        nodes.push(view);
    }

    let mut edges = Vec::new();
    for edge in doc.graph.edges() {
        if !active[edge.source] || !active[edge.target] {
            continue;
        }
        if !active_in(&edge.presence, start, end, repr) {
            continue;
        }
        edges.push(SnapshotEdge {
            source: doc.graph.node(edge.source).id.clone(),
            target: doc.graph.node(edge.target).id.clone(),
            directed: edge.directed,
            opacity: 1.0,
            attrs: project_attrs(&edge.attrs, &doc.edge_attributes, start),
        });
    }

    Snapshot { start, end, nodes, edges }
}

/// Project an attribute bag at the window start. Static attributes pass
/// through; a dynamic attribute takes the value whose validity interval
/// contains the window start, falling back to the declared default.
fn project_attrs(
    bag: &AttributeBag,
    decls: &[AttributeDescriptor],
    at: f64,
) -> BTreeMap<String, AttrValue> {
    let mut out = BTreeMap::new();
    for decl in decls {
        let spans = bag.get(&decl.id);
        let chosen = match (decl.mode, spans) {
            (AttrMode::Static, Some(spans)) => spans.first().map(|tv| tv.value.clone()),
            (AttrMode::Dynamic, Some(spans)) => spans
                .iter()
                .find(|tv| {
                    tv.start.unwrap_or(f64::NEG_INFINITY) <= at
                        && at < tv.end.unwrap_or(f64::INFINITY)
                })
                .map(|tv| tv.value.clone()),
            (_, None) => None,
        };
        if let Some(value) = chosen.or_else(|| decl.default.clone()) {
            out.insert(decl.id.clone(), value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gexf;

    fn doc(xml: &str) -> GexfDocument {
        gexf::parse_str(xml).unwrap()
    }

    fn interval_doc() -> GexfDocument {
        doc(r#"<gexf version="1.3">
  <graph mode="dynamic" timeformat="integer" timerepresentation="interval">
    <nodes>
      <node id="n" label="N" start="0" end="10"/>
    </nodes>
  </graph>
</gexf>"#)
    }

    fn opts(range: f64, step: f64) -> SliceOptions {
        SliceOptions { range: Some(range), step: Some(step) }
    }

    #[test]
    fn single_node_interval_yields_two_overlapping_windows() {
        let series = slice(&interval_doc(), &opts(10.0, 5.0)).unwrap();
        let bounds: Vec<_> = series.slices.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(bounds, [(0.0, 10.0), (5.0, 15.0)]);
        for s in &series.slices {
            assert_eq!(s.nodes.len(), 1);
            assert_eq!(s.nodes[0].id, "n");
        }
    }

    #[test]
    fn window_arithmetic_holds_across_slices() {
        let series = slice(&interval_doc(), &opts(4.0, 3.0)).unwrap();
        assert!(!series.slices.is_empty());
        for pair in series.slices.windows(2) {
            assert_eq!(pair[1].start, pair[0].start + 3.0);
        }
        for s in &series.slices {
            assert_eq!(s.end, s.start + 4.0);
        }
    }

    #[test]
    fn zero_range_yields_zero_slices() {
        let series = slice(&interval_doc(), &opts(0.0, 5.0)).unwrap();
        assert!(series.slices.is_empty());
    }

    #[test]
    fn oversized_step_yields_at_most_one_slice() {
        let series = slice(&interval_doc(), &opts(3.0, 100.0)).unwrap();
        assert_eq!(series.slices.len(), 1);
        assert_eq!(series.slices[0].start, 0.0);
    }

    #[test]
    fn nonpositive_step_is_rejected() {
        assert!(slice(&interval_doc(), &opts(1.0, 0.0)).is_err());
        assert!(slice(&interval_doc(), &opts(1.0, -1.0)).is_err());
    }

    #[test]
    fn timestamp_membership_is_half_open() {
        let d = doc(r#"<gexf version="1.3">
  <graph mode="dynamic" timeformat="integer" timerepresentation="timestamp">
    <nodes>
      <node id="a" timestamp="3"/>
      <node id="b" timestamp="7"/>
    </nodes>
  </graph>
</gexf>"#);
        let series = slice(&d, &opts(4.0, 2.0)).unwrap();
        let contents: Vec<Vec<&str>> = series
            .slices
            .iter()
            .map(|s| s.nodes.iter().map(|n| n.id.as_str()).collect())
            .collect();
        // windows [3,7) and [5,9): 3 only in the first, 7 only in the second
        assert_eq!(series.slices[0].start, 3.0);
        assert_eq!(contents, [vec!["a"], vec!["b"]]);
    }

    #[test]
    fn element_without_time_data_is_never_active() {
        let d = doc(r#"<gexf version="1.3">
  <graph mode="dynamic" timeformat="integer">
    <nodes>
      <node id="timed" start="0" end="10"/>
      <node id="eternal"/>
    </nodes>
  </graph>
</gexf>"#);
        let series = slice(&d, &opts(10.0, 5.0)).unwrap();
        for s in &series.slices {
            assert!(s.nodes.iter().all(|n| n.id != "eternal"));
        }
    }

    #[test]
    fn missing_interval_bounds_act_as_infinite() {
        let d = doc(r#"<gexf version="1.3">
  <graph mode="dynamic" timeformat="integer">
    <nodes>
      <node id="anchor" start="0" end="10"/>
      <node id="open_end" start="8"/>
      <node id="open_start" end="2"/>
    </nodes>
  </graph>
</gexf>"#);
        let series = slice(&d, &opts(4.0, 4.0)).unwrap();
        let first = &series.slices[0]; // [0, 4)
        let ids: Vec<_> = first.nodes.iter().map(|n| n.id.as_str()).collect();
        assert!(ids.contains(&"anchor"));
        assert!(ids.contains(&"open_start"));
        assert!(!ids.contains(&"open_end"));

        let second = &series.slices[1]; // [4, 8)
        let ids: Vec<_> = second.nodes.iter().map(|n| n.id.as_str()).collect();
        assert!(ids.contains(&"open_end")); // overlap test is inclusive at the seam
        assert!(!ids.contains(&"open_start"));
    }

    #[test]
    fn edges_require_both_endpoints_active() {
        let d = doc(r#"<gexf version="1.3">
  <graph mode="dynamic" timeformat="integer">
    <nodes>
      <node id="a" start="0" end="10"/>
      <node id="b" start="0" end="3"/>
    </nodes>
    <edges>
      <edge source="a" target="b" start="0" end="10"/>
    </edges>
  </graph>
</gexf>"#);
        let series = slice(&d, &opts(4.0, 4.0)).unwrap();
        assert_eq!(series.slices[0].edges.len(), 1);
        // b is gone in [4, 8): the edge must not survive alone
        assert!(series.slices[1].edges.is_empty());
        for s in &series.slices {
            s.validate().unwrap();
        }
    }

    #[test]
    fn spell_membership_activates_outside_own_interval() {
        let d = doc(r#"<gexf version="1.3">
  <graph mode="dynamic" timeformat="integer">
    <nodes>
      <node id="s">
        <spells><spell start="6" end="8"/></spells>
      </node>
      <node id="anchor" start="0" end="10"/>
    </nodes>
  </graph>
</gexf>"#);
        let series = slice(&d, &opts(2.0, 2.0)).unwrap();
        let has_s: Vec<bool> = series
            .slices
            .iter()
            .map(|s| s.nodes.iter().any(|n| n.id == "s"))
            .collect();
        // windows [0,2) [2,4) [4,6) [6,8) [8,10): spell [6,8] overlaps the
        // last three under the inclusive overlap test
        assert_eq!(has_s, [false, false, true, true, true]);
    }

    #[test]
    fn dynamic_attribute_takes_span_covering_window_start() {
        let d = doc(r#"<gexf version="1.3">
  <graph mode="dynamic" timeformat="integer">
    <attributes class="node" mode="dynamic">
      <attribute id="score" title="Score" type="integer">
        <default>-1</default>
      </attribute>
    </attributes>
    <nodes>
      <node id="n" start="0" end="12">
        <attvalues>
          <attvalue for="score" value="1" start="0" end="4"/>
          <attvalue for="score" value="2" start="4" end="8"/>
        </attvalues>
      </node>
    </nodes>
  </graph>
</gexf>"#);
        let series = slice(&d, &opts(4.0, 4.0)).unwrap();
        let score = |k: usize| series.slices[k].nodes[0].attrs.get("score").cloned();
        assert_eq!(score(0), Some(AttrValue::Integer(1)));
        assert_eq!(score(1), Some(AttrValue::Integer(2)));
        // no span covers t=8: the declared default applies
        assert_eq!(score(2), Some(AttrValue::Integer(-1)));
    }
}

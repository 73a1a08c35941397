use netreel::{
    FixedAdvanceBrush, LayoutSettings, RenderSettings, RenderThreading, SliceOptions, TextBrush,
};

const TWO_NODE_GEXF: &str = r#"<gexf version="1.3">
  <graph mode="dynamic" defaultedgetype="undirected" timeformat="integer" timerepresentation="interval">
    <nodes>
      <node id="a" label="Alice" start="0" end="20"/>
      <node id="b" label="Bob" start="0" end="20"/>
      <node id="c" label="Carol" start="10" end="20"/>
    </nodes>
    <edges>
      <edge source="a" target="b" start="0" end="20"/>
      <edge source="b" target="c" start="10" end="20"/>
    </edges>
  </graph>
</gexf>"#;

fn sliced(range: f64, step: f64) -> netreel::SliceSeries {
    let doc = netreel::parse_str(TWO_NODE_GEXF).unwrap();
    netreel::slice(&doc, &SliceOptions { range: Some(range), step: Some(step) }).unwrap()
}

fn quick_layout() -> LayoutSettings {
    LayoutSettings { iterations_factor: 0.05, ..LayoutSettings::default() }
}

fn quick_render() -> RenderSettings {
    RenderSettings {
        image_width_mm: 40.0,
        image_height_mm: 40.0,
        rendering_dpi: 50.0,
        output_dpi: 50.0,
        ..RenderSettings::default()
    }
}

#[test]
fn windows_advance_by_step_and_span_range() {
    let series = sliced(10.0, 5.0);
    assert!(!series.slices.is_empty());
    for snapshot in &series.slices {
        assert_eq!(snapshot.end, snapshot.start + 10.0);
        snapshot.validate().unwrap();
    }
    for pair in series.slices.windows(2) {
        assert_eq!(pair[1].start, pair[0].start + 5.0);
    }
}

#[test]
fn every_snapshot_edge_is_endpoint_closed() {
    let series = sliced(5.0, 2.5);
    for snapshot in &series.slices {
        let ids: Vec<&str> = snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
        for edge in &snapshot.edges {
            assert!(ids.contains(&edge.source.as_str()));
            assert!(ids.contains(&edge.target.as_str()));
        }
    }
}

#[test]
fn layout_gives_finite_positions_and_positive_sizes() {
    let mut series = sliced(10.0, 5.0);
    netreel::layout_series(&mut series, &quick_layout());
    for snapshot in &series.slices {
        for node in &snapshot.nodes {
            assert!(node.x.unwrap().is_finite());
            assert!(node.y.unwrap().is_finite());
            assert!(node.size.unwrap() > 0.0);
        }
    }
}

#[test]
fn persistent_node_stays_near_its_previous_position() {
    let mut series = sliced(10.0, 5.0);
    assert!(series.slices.len() >= 2);
    netreel::layout_series(&mut series, &quick_layout());

    let pos = |k: usize, id: &str| {
        let n = series.slices[k].nodes.iter().find(|n| n.id == id).unwrap();
        (n.x.unwrap(), n.y.unwrap())
    };
    for id in ["a", "b"] {
        let (x0, y0) = pos(0, id);
        let (x1, y1) = pos(1, id);
        let drift = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        let spreading = (series.slices[1].nodes.len() as f64).sqrt() * 100.0;
        assert!(drift < spreading / 2.0, "node {id} drifted {drift}");
    }
}

#[test]
fn full_layout_leaves_no_node_overlap() {
    let mut series = sliced(20.0, 20.0);
    assert_eq!(series.slices.len(), 1);
    netreel::layout_series(&mut series, &LayoutSettings::default());

    let snapshot = &series.slices[0];
    for i in 0..snapshot.nodes.len() {
        for j in (i + 1)..snapshot.nodes.len() {
            let a = &snapshot.nodes[i];
            let b = &snapshot.nodes[j];
            let d = ((a.x.unwrap() - b.x.unwrap()).powi(2)
                + (a.y.unwrap() - b.y.unwrap()).powi(2))
            .sqrt();
            let floor = (a.size.unwrap() + b.size.unwrap()) * 1.05 - 1e-6;
            assert!(d >= floor, "nodes {} and {} at distance {d} < {floor}", a.id, b.id);
        }
    }
}

#[test]
fn pipeline_render_is_deterministic() {
    let run = || {
        let mut series = sliced(10.0, 5.0);
        netreel::layout_series(&mut series, &quick_layout());
        let brush = FixedAdvanceBrush;
        let mut frames = Vec::new();
        netreel::render_series(
            &series,
            &quick_render(),
            &RenderThreading::default(),
            Some(&brush as &dyn TextBrush),
            |_, frame| {
                frames.push(frame.data);
                Ok(())
            },
        )
        .unwrap();
        frames
    };
    assert_eq!(run(), run());
}

#[test]
fn rendered_frame_has_expected_dimensions_and_opaque_background() {
    let mut series = sliced(10.0, 5.0);
    netreel::layout_series(&mut series, &quick_layout());
    let mut renderer = netreel::Renderer::new(quick_render());
    let frame = renderer.render(&series.slices[0], None).unwrap();

    let side = netreel::mm_to_px(40.0, 50.0).round() as u32;
    assert_eq!(frame.width, side);
    assert_eq!(frame.height, side);
    // the multiply composite over an opaque background stays opaque
    assert!(frame.data.chunks_exact(4).all(|px| px[3] == 255));
}

#[test]
fn intermediate_json_roundtrips_losslessly() {
    let series = sliced(10.0, 5.0);
    let json = serde_json::to_string(&series).unwrap();
    let back: netreel::SliceSeries = serde_json::from_str(&json).unwrap();

    assert_eq!(back.slices.len(), series.slices.len());
    for (a, b) in series.slices.iter().zip(&back.slices) {
        assert_eq!(a.start, b.start);
        assert_eq!(a.end, b.end);
        let ids = |s: &netreel::Snapshot| s.nodes.iter().map(|n| n.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(a), ids(b));
        assert_eq!(a.edges.len(), b.edges.len());
    }
}

#[test]
fn laid_out_json_carries_positions_and_sizes() {
    let mut series = sliced(10.0, 5.0);
    netreel::layout_series(&mut series, &quick_layout());
    let json = serde_json::to_value(&series).unwrap();
    let node = &json["slices"][0]["nodes"][0];
    assert!(node["x"].is_number());
    assert!(node["y"].is_number());
    assert!(node["size"].is_number());
}

use std::path::Path;

use anyhow::Context as _;
use rayon::prelude::*;

use crate::{
    error::{NetreelError, NetreelResult},
    gexf::{self, GexfDocument},
    layout::{self, LayoutSettings, NodePositionIndex},
    model::SliceSeries,
    render::{Frame, RenderSettings, Renderer},
    slicer::{self, SliceOptions},
    text::TextBrush,
};

/// Frame rendering concurrency. Layout stays sequential (each snapshot
/// seeds from the previous one); rendering after layout is embarrassingly
/// parallel across snapshots.
#[derive(Clone, Debug)]
pub struct RenderThreading {
    pub parallel: bool,
    pub threads: Option<usize>,
    pub chunk_size: usize,
}

impl Default for RenderThreading {
    fn default() -> Self {
        Self { parallel: false, threads: None, chunk_size: 16 }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PipelineOptions {
    pub slice: SliceOptions,
    pub layout: LayoutSettings,
    pub render: RenderSettings,
    pub threading: RenderThreading,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub snapshots: usize,
    pub frames_written: usize,
    pub frames_failed: usize,
}

/// Parse a GEXF file and slice it. Input and schema problems are fatal.
pub fn slice_file(path: &Path, opts: &SliceOptions) -> NetreelResult<(GexfDocument, SliceSeries)> {
    let doc = gexf::parse_file(path)?;
    let series = slicer::slice(&doc, opts)?;
    for snapshot in &series.slices {
        snapshot.validate()?;
    }
    Ok((doc, series))
}

/// Lay out every snapshot in order, threading positions from each snapshot
/// into the next.
pub fn layout_series(series: &mut SliceSeries, settings: &LayoutSettings) {
    let mut previous: Option<NodePositionIndex> = None;
    for (k, snapshot) in series.slices.iter_mut().enumerate() {
        tracing::debug!(snapshot = k, nodes = snapshot.nodes.len(), edges = snapshot.edges.len(), "layout");
        let index = layout::layout_snapshot(snapshot, previous.as_ref(), settings, k);
        previous = Some(index);
    }
}

/// Render every snapshot and hand each frame to `sink` in snapshot order.
/// A sink failure aborts only that snapshot; rendering continues.
pub fn render_series(
    series: &SliceSeries,
    settings: &RenderSettings,
    threading: &RenderThreading,
    brush: Option<&dyn TextBrush>,
    mut sink: impl FnMut(usize, Frame) -> NetreelResult<()>,
) -> NetreelResult<PipelineStats> {
    let mut stats = PipelineStats { snapshots: series.slices.len(), ..PipelineStats::default() };

    let mut deliver = |k: usize, frame: NetreelResult<Frame>, stats: &mut PipelineStats| {
        match frame.and_then(|f| sink(k, f)) {
            Ok(()) => stats.frames_written += 1,
            Err(e) => {
                tracing::error!(snapshot = k, error = %e, "frame failed, continuing");
                stats.frames_failed += 1;
            }
        }
    };

    if !threading.parallel {
        let mut renderer = Renderer::new(settings.clone());
        for (k, snapshot) in series.slices.iter().enumerate() {
            let frame = renderer.render(snapshot, brush);
            deliver(k, frame, &mut stats);
        }
        return Ok(stats);
    }

    let pool = build_thread_pool(threading.threads)?;
    let chunk_size = threading.chunk_size.max(1);
    for (c, chunk) in series.slices.chunks(chunk_size).enumerate() {
        let rendered: Vec<NetreelResult<Frame>> = pool.install(|| {
            chunk
                .par_iter()
                .map_init(
                    || Renderer::new(settings.clone()),
                    |renderer, snapshot| renderer.render(snapshot, brush),
                )
                .collect()
        });
        for (i, frame) in rendered.into_iter().enumerate() {
            deliver(c * chunk_size + i, frame, &mut stats);
        }
    }
    Ok(stats)
}

fn build_thread_pool(threads: Option<usize>) -> NetreelResult<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    match threads {
        Some(0) => {
            return Err(NetreelError::render("parallel rendering needs at least one worker thread"));
        }
        Some(n) => builder = builder.num_threads(n),
        None => {}
    }
    builder
        .build()
        .map_err(|e| NetreelError::render(format!("could not start the render worker pool: {e}")))
}

/// Encode one frame as PNG.
pub fn save_frame(frame: &Frame, path: &Path) -> NetreelResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        path,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))?;
    Ok(())
}

/// The whole pipeline: parse, slice, lay out, render, and write
/// `frame_00000.png, ...` under `out_dir`.
pub fn run_file(
    gexf_path: &Path,
    out_dir: &Path,
    opts: &PipelineOptions,
    brush: Option<&dyn TextBrush>,
) -> NetreelResult<PipelineStats> {
    let (_doc, mut series) = slice_file(gexf_path, &opts.slice)?;
    tracing::info!(snapshots = series.slices.len(), input = %gexf_path.display(), "pipeline start");

    layout_series(&mut series, &opts.layout);

    let stats = render_series(&series, &opts.render, &opts.threading, brush, |k, frame| {
        save_frame(&frame, &out_dir.join(format!("frame_{k:05}.png")))
    })?;

    tracing::info!(
        snapshots = stats.snapshots,
        written = stats.frames_written,
        failed = stats.frames_failed,
        "pipeline done"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_series() -> SliceSeries {
        let doc = gexf::parse_str(
            r#"<gexf version="1.3">
  <graph mode="dynamic" timeformat="integer">
    <nodes>
      <node id="a" label="A" start="0" end="10"/>
      <node id="b" label="B" start="0" end="10"/>
    </nodes>
    <edges>
      <edge source="a" target="b" start="0" end="10"/>
    </edges>
  </graph>
</gexf>"#,
        )
        .unwrap();
        slicer::slice(&doc, &SliceOptions { range: Some(10.0), step: Some(5.0) }).unwrap()
    }

    fn tiny_render() -> RenderSettings {
        RenderSettings {
            image_width_mm: 30.0,
            image_height_mm: 30.0,
            rendering_dpi: 40.0,
            output_dpi: 40.0,
            ..RenderSettings::default()
        }
    }

    #[test]
    fn layout_series_threads_positions_between_snapshots() {
        let mut series = tiny_series();
        layout_series(
            &mut series,
            &LayoutSettings { iterations_factor: 0.0, ..LayoutSettings::default() },
        );
        assert_eq!(series.slices.len(), 2);
        // with frozen passes, shared nodes keep their seeded positions
        assert_eq!(series.slices[0].nodes[0].x, series.slices[1].nodes[0].x);
        for snapshot in &series.slices {
            for node in &snapshot.nodes {
                assert!(node.x.unwrap().is_finite());
                assert!(node.size.unwrap() > 0.0);
            }
        }
    }

    #[test]
    fn render_series_delivers_frames_in_order() {
        let mut series = tiny_series();
        layout_series(
            &mut series,
            &LayoutSettings { iterations_factor: 0.0, ..LayoutSettings::default() },
        );

        let mut seen = Vec::new();
        let stats = render_series(
            &series,
            &tiny_render(),
            &RenderThreading::default(),
            None,
            |k, frame| {
                seen.push((k, frame.width));
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(stats.frames_written, 2);
        assert_eq!(stats.frames_failed, 0);
        assert_eq!(seen.iter().map(|&(k, _)| k).collect::<Vec<_>>(), [0, 1]);
    }

    #[test]
    fn sink_failure_is_localized_to_its_snapshot() {
        let mut series = tiny_series();
        layout_series(
            &mut series,
            &LayoutSettings { iterations_factor: 0.0, ..LayoutSettings::default() },
        );

        let stats = render_series(
            &series,
            &tiny_render(),
            &RenderThreading::default(),
            None,
            |k, _frame| {
                if k == 0 {
                    Err(NetreelError::render("disk full"))
                } else {
                    Ok(())
                }
            },
        )
        .unwrap();

        assert_eq!(stats.frames_written, 1);
        assert_eq!(stats.frames_failed, 1);
    }

    #[test]
    fn parallel_and_sequential_render_agree() {
        let mut series = tiny_series();
        layout_series(
            &mut series,
            &LayoutSettings { iterations_factor: 0.0, ..LayoutSettings::default() },
        );

        let mut sequential = Vec::new();
        render_series(&series, &tiny_render(), &RenderThreading::default(), None, |_, f| {
            sequential.push(f.data);
            Ok(())
        })
        .unwrap();

        let mut parallel = Vec::new();
        let threading = RenderThreading { parallel: true, threads: Some(2), chunk_size: 1 };
        render_series(&series, &tiny_render(), &threading, None, |_, f| {
            parallel.push(f.data);
            Ok(())
        })
        .unwrap();

        assert_eq!(sequential, parallel);
    }

    #[test]
    fn zero_threads_is_rejected() {
        let series = SliceSeries::default();
        let threading = RenderThreading { parallel: true, threads: Some(0), chunk_size: 1 };
        let err = render_series(&series, &tiny_render(), &threading, None, |_, _| Ok(()));
        assert!(err.is_err());
    }
}

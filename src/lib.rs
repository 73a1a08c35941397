//! Netreel turns a dynamic GEXF graph into an animation: a sequence of PNG
//! frames, one per sliding time window, each showing the subgraph active in
//! that window.
//!
//! # Pipeline overview
//!
//! 1. **Slice**: `GexfDocument + SliceOptions -> SliceSeries` (which nodes
//!    and edges are active in each `[start, start + range)` window)
//! 2. **Layout**: per snapshot, size nodes, seed positions from the previous
//!    snapshot, then run ForceAtlas2 passes and overlap-removal sweeps
//! 3. **Render**: per snapshot, build a Voronoi distance field and a density
//!    heatmap, then draw hillshade, edges, nodes, and labels into a frame
//!
//! Key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Deterministic-by-default**: every randomized step draws from RNG
//!   streams keyed on a seed and stable element ids, so re-runs are
//!   bit-identical and node order never changes the result.
//! - **Fatal vs. recoverable**: input and schema problems abort; a failing
//!   layout pass or render layer is logged and skipped, so the animation as
//!   a whole still completes.
//! - **Premultiplied RGBA8** end-to-end in the rasterizer.
#![forbid(unsafe_code)]

mod canvas;
mod color;
mod error;
mod gexf;
mod graph;
mod hash;
mod heatmap;
mod layout;
mod model;
mod pipeline;
mod render;
mod slicer;
mod text;
mod time;
mod voronoi;

/// ForceAtlas2 force simulation (lin-log attraction, strong gravity,
/// Barnes-Hut repulsion).
pub mod fa2;
/// Label collision testing and greedy selection.
pub mod labels;
/// Grid-bucketed node overlap removal.
pub mod overlap;

pub use canvas::{Canvas, PremulRgba8, multiply, over};
pub use color::{ColorRamp, Rgb, label_color, lch_to_rgb, reflectance_alpha, rgb_to_lch};
pub use error::{NetreelError, NetreelResult};
pub use gexf::{GexfDocument, parse_file, parse_str};
pub use graph::{
    AttrType, AttrValue, AttributeBag, EdgeData, Graph, GraphEdge, GraphNode, Presence, Spell,
    TimedValue,
};
pub use heatmap::{HeatField, Hillshade, HillshadeParams};
pub use layout::{LayoutSettings, NodePositionIndex, layout_snapshot};
pub use model::{
    AttrClass, AttrMode, AttributeDescriptor, SliceSeries, Snapshot, SnapshotEdge, SnapshotNode,
};
pub use pipeline::{
    PipelineOptions, PipelineStats, RenderThreading, layout_series, render_series, run_file,
    save_frame, slice_file,
};
pub use render::{
    Frame, Margins, RenderSettings, Renderer, ScaleMode, mm_to_px, pt_to_px,
};
pub use slicer::{SliceOptions, active_in, slice};
pub use text::{FixedAdvanceBrush, FontBrush, TextBrush};
pub use time::{TimeFormat, TimeRepresentation};
pub use voronoi::{FieldNode, OwnerMap, VoronoiField};

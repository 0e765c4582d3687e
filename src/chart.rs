//! Renders chart-library figure specs (`{data: [traces], layout: {...}}`) with
//! `egui_plot`.
//!
//! The engine behind the renderer is built once per process and shared by every
//! chart. Each chart keeps the parsed figure in egui's temp memory and re-parses
//! it whenever the incoming spec changes.

use eframe::egui;
use eframe::egui::{Color32, Ui};
use egui_plot::{Bar, BarChart, Legend, Line, Plot, PlotPoints, Points};
use serde_json::{Map, Value, json};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, warn};

pub const DEFAULT_HEIGHT: f32 = 400.0;
const MAX_HISTOGRAM_BINS: usize = 50;

static ENGINE_READY: AtomicBool = AtomicBool::new(false);
static ENGINE_LOADS: AtomicUsize = AtomicUsize::new(0);

lazy_static::lazy_static! {
    static ref ENGINE: ChartEngine = ChartEngine::load();
}

pub struct ChartEngine {
    pub palette: Vec<Color32>,
    pub supported: &'static [&'static str],
}

impl ChartEngine {
    fn load() -> Self {
        ENGINE_LOADS.fetch_add(1, Ordering::SeqCst);
        debug!("chart engine loaded");
        let palette = [
            "#636efa", "#EF553B", "#00cc96", "#ab63fa", "#FFA15A", "#19d3f3", "#FF6692",
            "#B6E880", "#FF97FF", "#FECB52",
        ]
        .iter()
        .filter_map(|hex| parse_color(hex))
        .collect();
        let engine = ChartEngine {
            palette,
            supported: &["bar", "scatter", "line", "histogram", "pie"],
        };
        ENGINE_READY.store(true, Ordering::SeqCst);
        engine
    }

    pub fn color(&self, idx: usize) -> Color32 {
        self.palette
            .get(idx % self.palette.len().max(1))
            .copied()
            .unwrap_or(Color32::LIGHT_BLUE)
    }
}

/// First call builds the engine; later calls reuse it.
pub fn engine() -> &'static ChartEngine {
    &ENGINE
}

pub fn engine_ready() -> bool {
    ENGINE_READY.load(Ordering::SeqCst)
}

pub fn engine_loads() -> usize {
    ENGINE_LOADS.load(Ordering::SeqCst)
}

fn parse_color(raw: &str) -> Option<Color32> {
    Color32::from_hex(raw).ok()
}

/// Fixed overrides merged over the figure's own layout.
pub fn merge_layout(layout: Option<&Value>, height: f32) -> Value {
    let mut merged = match layout {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    merged.insert("height".into(), json!(height));
    merged.insert("margin".into(), json!({"t": 50, "r": 50, "b": 50, "l": 50}));
    merged.insert("responsive".into(), json!(true));
    merged.insert("paper_bgcolor".into(), json!("rgba(0,0,0,0)"));
    merged.insert("plot_bgcolor".into(), json!("rgba(0,0,0,0)"));
    merged.insert("font".into(), json!({"color": "#e5e7eb"}));
    Value::Object(merged)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    Bar { horizontal: bool },
    Lines,
    Markers,
    LinesMarkers,
    /// Already binned on the client.
    Histogram,
    /// One bar per slice.
    Pie,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub name: Option<String>,
    pub kind: TraceKind,
    pub points: Vec<[f64; 2]>,
    /// Tick labels for categorical x values (y for horizontal bars).
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub title: Option<String>,
    pub x_title: Option<String>,
    pub y_title: Option<String>,
    pub height: f32,
    pub layout: Value,
    pub traces: Vec<Trace>,
}

impl Figure {
    pub fn is_empty(&self) -> bool {
        self.traces.iter().all(|t| t.points.is_empty())
    }
}

fn title_text(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) => Some(s.clone()),
        Value::Object(o) => o.get("text").and_then(|t| t.as_str()).map(str::to_string),
        _ => None,
    }
}

fn as_array<'a>(trace: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    trace.get(key).and_then(|v| v.as_array())
}

fn numbers(values: &[Value]) -> Option<Vec<f64>> {
    values
        .iter()
        .map(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
        .collect()
}

fn labels(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}

/// x positions: numeric when every value is numeric, otherwise categories.
fn positions(values: Option<&Vec<Value>>, len: usize) -> (Vec<f64>, Vec<String>) {
    match values {
        Some(vals) => match numbers(vals) {
            Some(nums) => (nums, Vec::new()),
            None => ((0..vals.len()).map(|i| i as f64).collect(), labels(vals)),
        },
        None => ((0..len).map(|i| i as f64).collect(), Vec::new()),
    }
}

fn histogram_bins(values: &[f64]) -> (Vec<[f64; 2]>, f64) {
    if values.is_empty() {
        return (Vec::new(), 1.0);
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let bins = ((values.len() as f64).sqrt().ceil() as usize).clamp(1, MAX_HISTOGRAM_BINS);
    let width = if max > min { (max - min) / bins as f64 } else { 1.0 };
    let mut counts = vec![0.0; bins];
    for &v in values {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1.0;
    }
    let points = counts
        .into_iter()
        .enumerate()
        .map(|(i, c)| [min + width * (i as f64 + 0.5), c])
        .collect();
    (points, width)
}

pub fn parse_trace(trace: &Value) -> Result<Option<Trace>, String> {
    let kind_name = trace.get("type").and_then(|t| t.as_str()).unwrap_or("scatter");
    let name = trace.get("name").and_then(|n| n.as_str()).map(str::to_string);

    let trace = match kind_name {
        "bar" => {
            let horizontal = trace.get("orientation").and_then(|o| o.as_str()) == Some("h");
            let (pos_key, val_key) = if horizontal { ("y", "x") } else { ("x", "y") };
            let values = as_array(trace, val_key)
                .and_then(|v| numbers(v))
                .ok_or_else(|| format!("bar trace has non-numeric '{}' values", val_key))?;
            let (pos, categories) = positions(as_array(trace, pos_key), values.len());
            Trace {
                name,
                kind: TraceKind::Bar { horizontal },
                points: pos.into_iter().zip(values).map(|(p, v)| [p, v]).collect(),
                categories,
            }
        }
        "scatter" | "scattergl" | "line" => {
            let ys = as_array(trace, "y")
                .and_then(|v| numbers(v))
                .ok_or_else(|| "scatter trace has non-numeric 'y' values".to_string())?;
            let (xs, categories) = positions(as_array(trace, "x"), ys.len());
            let mode = trace.get("mode").and_then(|m| m.as_str()).unwrap_or(
                if kind_name == "line" { "lines" } else { "lines+markers" },
            );
            let kind = match (mode.contains("lines"), mode.contains("markers")) {
                (true, true) => TraceKind::LinesMarkers,
                (false, true) => TraceKind::Markers,
                _ => TraceKind::Lines,
            };
            Trace {
                name,
                kind,
                points: xs.into_iter().zip(ys).map(|(x, y)| [x, y]).collect(),
                categories,
            }
        }
        "histogram" => {
            let xs = as_array(trace, "x")
                .and_then(|v| numbers(v))
                .ok_or_else(|| "histogram trace has non-numeric 'x' values".to_string())?;
            let (points, _) = histogram_bins(&xs);
            Trace {
                name,
                kind: TraceKind::Histogram,
                points,
                categories: Vec::new(),
            }
        }
        "pie" => {
            let values = as_array(trace, "values")
                .and_then(|v| numbers(v))
                .ok_or_else(|| "pie trace has non-numeric 'values'".to_string())?;
            let categories = as_array(trace, "labels").map(|l| labels(l)).unwrap_or_default();
            Trace {
                name,
                kind: TraceKind::Pie,
                points: values
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| [i as f64, v])
                    .collect(),
                categories,
            }
        }
        other => {
            warn!(trace_type = other, "skipping unsupported trace type");
            return Ok(None);
        }
    };
    Ok(Some(trace))
}

/// Parses a figure spec and merges the fixed layout overrides into it.
pub fn parse_figure(spec: &Value, height: f32) -> Result<Figure, String> {
    let spec_obj = spec
        .as_object()
        .ok_or_else(|| "figure spec is not an object".to_string())?;
    let layout = merge_layout(spec_obj.get("layout"), height);

    let mut traces = Vec::new();
    if let Some(data) = spec_obj.get("data") {
        let items = data
            .as_array()
            .ok_or_else(|| "figure 'data' is not a list".to_string())?;
        for item in items {
            if let Some(trace) = parse_trace(item)? {
                traces.push(trace);
            }
        }
    }

    let axis_title = |axis: &str| title_text(layout.get(axis).and_then(|a| a.get("title")));
    Ok(Figure {
        title: title_text(layout.get("title")),
        x_title: axis_title("xaxis"),
        y_title: axis_title("yaxis"),
        height,
        traces,
        layout,
    })
}

fn spec_hash(spec: &Value, height: f32) -> u64 {
    let mut hasher = DefaultHasher::new();
    spec.to_string().hash(&mut hasher);
    height.to_bits().hash(&mut hasher);
    hasher.finish()
}

#[derive(Clone, Default)]
struct ChartState {
    spec_hash: Option<u64>,
    figure: Option<Result<Figure, String>>,
    width: Option<f32>,
}

fn draw_figure(ui: &mut Ui, id: egui::Id, figure: &Figure) {
    let engine = engine();
    if let Some(title) = &figure.title {
        ui.strong(title);
    }

    let categories: Vec<String> = figure
        .traces
        .iter()
        .find(|t| !t.categories.is_empty())
        .map(|t| t.categories.clone())
        .unwrap_or_default();
    let horizontal_categories = figure
        .traces
        .iter()
        .any(|t| t.kind == TraceKind::Bar { horizontal: true } && !t.categories.is_empty());

    let mut plot = Plot::new(id)
        .height(figure.height)
        .legend(Legend::default())
        .allow_scroll(false);
    if let Some(x) = &figure.x_title {
        plot = plot.x_axis_label(x.clone());
    }
    if let Some(y) = &figure.y_title {
        plot = plot.y_axis_label(y.clone());
    }
    if !categories.is_empty() {
        let cats = categories.clone();
        let label = move |value: f64| -> String {
            let idx = value.round();
            if (value - idx).abs() > 1e-6 || idx < 0.0 {
                return String::new();
            }
            cats.get(idx as usize).cloned().unwrap_or_default()
        };
        if horizontal_categories {
            plot = plot.y_axis_formatter(move |y, _| label(y.value));
        } else {
            plot = plot.x_axis_formatter(move |x, _| label(x.value));
        }
    }

    plot.show(ui, |plot_ui| {
        for (i, trace) in figure.traces.iter().enumerate() {
            let color = engine.color(i);
            let name = trace.name.clone().unwrap_or_else(|| format!("trace {}", i));
            match trace.kind {
                TraceKind::Bar { horizontal } => {
                    let bars: Vec<Bar> = trace
                        .points
                        .iter()
                        .map(|p| Bar::new(p[0], p[1]).width(0.7))
                        .collect();
                    let mut chart = BarChart::new(bars).name(name).color(color);
                    if horizontal {
                        chart = chart.horizontal();
                    }
                    plot_ui.bar_chart(chart);
                }
                TraceKind::Pie => {
                    let bars: Vec<Bar> = trace
                        .points
                        .iter()
                        .enumerate()
                        .map(|(j, p)| {
                            let label = trace.categories.get(j).cloned().unwrap_or_default();
                            Bar::new(p[0], p[1])
                                .width(0.7)
                                .name(label)
                                .fill(engine.color(j))
                        })
                        .collect();
                    plot_ui.bar_chart(BarChart::new(bars).name(name));
                }
                TraceKind::Histogram => {
                    let width = if trace.points.len() > 1 {
                        trace.points[1][0] - trace.points[0][0]
                    } else {
                        1.0
                    };
                    let bars: Vec<Bar> = trace
                        .points
                        .iter()
                        .map(|p| Bar::new(p[0], p[1]).width(width))
                        .collect();
                    plot_ui.bar_chart(BarChart::new(bars).name(name).color(color));
                }
                TraceKind::Lines => {
                    plot_ui.line(
                        Line::new(PlotPoints::from(trace.points.clone()))
                            .name(name)
                            .color(color),
                    );
                }
                TraceKind::Markers => {
                    plot_ui.points(
                        Points::new(PlotPoints::from(trace.points.clone()))
                            .name(name)
                            .color(color)
                            .radius(3.0),
                    );
                }
                TraceKind::LinesMarkers => {
                    plot_ui.line(
                        Line::new(PlotPoints::from(trace.points.clone()))
                            .name(name.clone())
                            .color(color),
                    );
                    plot_ui.points(
                        Points::new(PlotPoints::from(trace.points.clone()))
                            .name(name)
                            .color(color)
                            .radius(3.0),
                    );
                }
            }
        }
    });
}

/// Draws `spec` with distinct loading, error and empty placeholders.
pub fn chart(ui: &mut Ui, id_salt: impl Hash, spec: Option<&Value>, height: f32) {
    let id = ui.make_persistent_id(id_salt);

    if !engine_ready() {
        ui.horizontal(|ui| {
            ui.spinner();
            ui.label("Loading chart...");
        });
        lazy_static::initialize(&ENGINE);
        ui.ctx().request_repaint();
        return;
    }

    let Some(spec) = spec.filter(|s| !s.is_null()) else {
        ui.label("No chart data available");
        return;
    };

    let hash = spec_hash(spec, height);
    let mut state: ChartState = ui.ctx().data_mut(|d| d.get_temp::<ChartState>(id).unwrap_or_default());

    if state.spec_hash != Some(hash) {
        state.figure = Some(parse_figure(spec, height));
        state.spec_hash = Some(hash);
        if let Some(Err(e)) = &state.figure {
            warn!(error = %e, "failed to parse chart spec");
        }
    }

    let width = ui.available_width();
    if state.width.is_some_and(|w| (w - width).abs() > 0.5) {
        debug!(width, "chart container resized");
    }
    state.width = Some(width);

    match &state.figure {
        Some(Ok(figure)) if figure.is_empty() => {
            ui.label("No chart data available");
        }
        Some(Ok(figure)) => draw_figure(ui, id.with("plot"), figure),
        Some(Err(e)) => {
            ui.colored_label(Color32::RED, format!("Failed to render chart: {}", e));
        }
        None => {}
    }

    ui.ctx().data_mut(|d| d.insert_temp(id, state));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_is_loaded_once() {
        let a = engine() as *const ChartEngine;
        let b = engine() as *const ChartEngine;
        assert_eq!(a, b);
        assert!(engine_ready());
        assert_eq!(engine_loads(), 1);
        assert_eq!(engine().palette.len(), 10);
    }

    #[test]
    fn explicit_initialization_reuses_the_engine() {
        lazy_static::initialize(&ENGINE);
        let before = engine() as *const ChartEngine;
        lazy_static::initialize(&ENGINE);
        assert!(engine_ready());
        assert_eq!(engine_loads(), 1);
        assert_eq!(engine() as *const ChartEngine, before);
    }

    #[test]
    fn overrides_win_over_figure_layout() {
        let layout = json!({"title": {"text": "Sales"}, "height": 900, "margin": {"t": 0}});
        let merged = merge_layout(Some(&layout), 400.0);
        assert_eq!(merged["height"], json!(400.0));
        assert_eq!(merged["margin"], json!({"t": 50, "r": 50, "b": 50, "l": 50}));
        assert_eq!(merged["paper_bgcolor"], json!("rgba(0,0,0,0)"));
        assert_eq!(merged["title"]["text"], json!("Sales"));
    }

    #[test]
    fn categorical_bar_chart() {
        let spec = json!({
            "data": [{"type": "bar", "x": ["North", "South"], "y": [10, 20], "name": "units"}],
            "layout": {"title": "Units by region", "xaxis": {"title": {"text": "Region"}}}
        });
        let fig = parse_figure(&spec, DEFAULT_HEIGHT).unwrap();
        assert_eq!(fig.title.as_deref(), Some("Units by region"));
        assert_eq!(fig.x_title.as_deref(), Some("Region"));
        assert_eq!(fig.traces.len(), 1);
        let t = &fig.traces[0];
        assert_eq!(t.kind, TraceKind::Bar { horizontal: false });
        assert_eq!(t.points, vec![[0.0, 10.0], [1.0, 20.0]]);
        assert_eq!(t.categories, vec!["North", "South"]);
    }

    #[test]
    fn horizontal_bars_swap_axes() {
        let spec = json!({"data": [{"type": "bar", "orientation": "h", "y": ["a", "b"], "x": [3, 4]}]});
        let fig = parse_figure(&spec, 300.0).unwrap();
        assert_eq!(fig.traces[0].kind, TraceKind::Bar { horizontal: true });
        assert_eq!(fig.traces[0].points, vec![[0.0, 3.0], [1.0, 4.0]]);
        assert_eq!(fig.height, 300.0);
    }

    #[test]
    fn scatter_modes() {
        let spec = json!({"data": [
            {"type": "scatter", "mode": "markers", "x": [1, 2], "y": [3, 4]},
            {"type": "scatter", "x": [1, 2], "y": [5, 6]},
            {"type": "scatter", "mode": "lines", "y": [1, 2, 3]}
        ]});
        let fig = parse_figure(&spec, DEFAULT_HEIGHT).unwrap();
        assert_eq!(fig.traces[0].kind, TraceKind::Markers);
        assert_eq!(fig.traces[1].kind, TraceKind::LinesMarkers);
        assert_eq!(fig.traces[2].kind, TraceKind::Lines);
        assert_eq!(fig.traces[2].points, vec![[0.0, 1.0], [1.0, 2.0], [2.0, 3.0]]);
    }

    #[test]
    fn histogram_bins_every_value() {
        let spec = json!({"data": [{"type": "histogram", "x": [1, 2, 2, 3, 4, 5, 5, 5, 9]}]});
        let fig = parse_figure(&spec, DEFAULT_HEIGHT).unwrap();
        let total: f64 = fig.traces[0].points.iter().map(|p| p[1]).sum();
        assert_eq!(total, 9.0);
        assert_eq!(fig.traces[0].points.len(), 3);
    }

    #[test]
    fn pie_becomes_bars() {
        let spec = json!({"data": [{"type": "pie", "labels": ["x", "y"], "values": [30, 70]}]});
        let fig = parse_figure(&spec, DEFAULT_HEIGHT).unwrap();
        assert_eq!(fig.traces[0].kind, TraceKind::Pie);
        assert_eq!(fig.traces[0].categories, vec!["x", "y"]);
    }

    #[test]
    fn unsupported_traces_are_skipped_and_empty_is_detected() {
        let spec = json!({"data": [{"type": "sankey", "node": {}}]});
        let fig = parse_figure(&spec, DEFAULT_HEIGHT).unwrap();
        assert!(fig.traces.is_empty());
        assert!(fig.is_empty());
        assert!(parse_figure(&json!({}), DEFAULT_HEIGHT).unwrap().is_empty());
    }

    #[test]
    fn malformed_specs_are_errors() {
        assert!(parse_figure(&json!([1, 2]), DEFAULT_HEIGHT).is_err());
        assert!(parse_figure(&json!({"data": 5}), DEFAULT_HEIGHT).is_err());
        let bad = json!({"data": [{"type": "bar", "x": ["a"], "y": ["many"]}]});
        assert!(parse_figure(&bad, DEFAULT_HEIGHT).is_err());
    }
}

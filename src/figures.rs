//! Declarative chart descriptions built from the loaded tables.
//!
//! A [`Figure`] is plain data (traces plus layout) that serializes to a
//! plotly-compatible JSON document. The terminal shell draws the same
//! description with ratatui widgets.

use serde::Serialize;

use crate::assets::{DashboardContext, RinkImage};
use crate::tables::{EventKind, Season, ShotFilter};

pub const RINK_X_RANGE: [f64; 2] = [-100.0, 100.0];
pub const RINK_Y_RANGE: [f64; 2] = [-45.0, 45.0];
pub const HEATMAP_X_BINS: usize = 80;
pub const HEATMAP_Y_BINS: usize = 40;

const TRANSPARENT: &str = "rgba(0, 0, 0, 0)";
const SCORED_COLOR: &str = "#0f3e66";
const CONCEDED_COLOR: &str = "#b53312";
const MARKER_OUTLINE: &str = "DarkSlateGrey";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: FigureLayout,
}

impl Figure {
    /// A titled figure without traces; used for empty selections and failures.
    pub fn blank(title: impl Into<String>) -> Self {
        Self {
            data: Vec::new(),
            layout: FigureLayout::new(title),
        }
    }

    pub fn point_count(&self) -> usize {
        self.data
            .iter()
            .map(|trace| match trace {
                Trace::Scatter(s) => s.x.len(),
                Trace::Histogram2d(h) => h.total() as usize,
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.point_count() == 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trace {
    Scatter(ScatterTrace),
    Histogram2d(DensityTrace),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceMode {
    Lines,
    Markers,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterTrace {
    pub name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub mode: TraceMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<LineStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<MarkerStyle>,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineStyle {
    pub color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkerSymbol {
    Circle,
    X,
    TriangleUp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerStyle {
    pub symbol: MarkerSymbol,
    pub color: String,
    pub size: f64,
    pub line: MarkerOutline,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerOutline {
    pub width: f64,
    pub color: String,
}

/// Evenly spaced bins over `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BinSpec {
    pub start: f64,
    pub end: f64,
    pub size: f64,
}

impl BinSpec {
    pub fn over(range: [f64; 2], count: usize) -> Self {
        let count = count.max(1);
        Self {
            start: range[0],
            end: range[1],
            size: (range[1] - range[0]) / count as f64,
        }
    }

    pub fn count(&self) -> usize {
        ((self.end - self.start) / self.size).round() as usize
    }

    /// Bin holding `value`; the upper edge belongs to the last bin.
    pub fn index_of(&self, value: f64) -> Option<usize> {
        if !value.is_finite() || value < self.start || value > self.end {
            return None;
        }
        let idx = ((value - self.start) / self.size).floor() as usize;
        Some(idx.min(self.count() - 1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DensityTrace {
    pub xbins: BinSpec,
    pub ybins: BinSpec,
    /// Row-major counts, `z[y_bin][x_bin]`.
    pub z: Vec<Vec<u32>>,
    pub colorscale: String,
    pub opacity: f64,
}

impl DensityTrace {
    pub fn total(&self) -> u32 {
        self.z.iter().flatten().sum()
    }

    pub fn max(&self) -> u32 {
        self.z.iter().flatten().copied().max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickangle: Option<f64>,
}

impl Default for Axis {
    fn default() -> Self {
        Self {
            title: None,
            range: None,
            visible: true,
            tickangle: None,
        }
    }
}

impl Axis {
    fn hidden(range: [f64; 2]) -> Self {
        Self {
            range: Some(range),
            visible: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutImage {
    pub source: String,
    pub xref: String,
    pub yref: String,
    pub x: f64,
    pub y: f64,
    pub sizex: f64,
    pub sizey: f64,
    pub sizing: String,
    pub opacity: f64,
    pub layer: String,
}

impl LayoutImage {
    fn rink(rink: &RinkImage, opacity: f64) -> Self {
        Self {
            source: rink.data_uri.clone(),
            xref: "x".to_string(),
            yref: "y".to_string(),
            x: -100.0,
            y: 42.5,
            sizex: 200.0,
            sizey: 85.0,
            sizing: "stretch".to_string(),
            opacity,
            layer: "below".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FigureLayout {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub xaxis: Axis,
    pub yaxis: Axis,
    pub images: Vec<LayoutImage>,
    pub showlegend: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hovermode: Option<String>,
    pub template: String,
    pub plot_bgcolor: String,
    pub paper_bgcolor: String,
}

impl FigureLayout {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            xaxis: Axis::default(),
            yaxis: Axis::default(),
            images: Vec::new(),
            showlegend: true,
            hovermode: None,
            template: "simple_white".to_string(),
            plot_bgcolor: TRANSPARENT.to_string(),
            paper_bgcolor: TRANSPARENT.to_string(),
        }
    }
}

/// Goals scored and conceded by `team_id` across seasons.
pub fn team_goals_trend(ctx: &DashboardContext, team_id: u32) -> Figure {
    let tables = &ctx.tables;

    let mut scored: Vec<(f64, f64)> = tables
        .season_goals
        .iter()
        .filter(|row| row.team_id == team_id)
        .map(|row| (f64::from(row.season.year()), f64::from(row.number_of_goals)))
        .collect();
    let mut conceded: Vec<(f64, f64)> = tables
        .conceded_goals
        .iter()
        .filter(|row| row.team_id == team_id)
        .map(|row| (f64::from(row.season.year()), f64::from(row.goals_conceded)))
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    conceded.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut layout = FigureLayout::new(format!(
        "Goals - {}",
        tables.teams.display_name(team_id)
    ));
    layout.xaxis = Axis {
        title: Some("Season".to_string()),
        tickangle: Some(45.0),
        ..Axis::default()
    };
    layout.yaxis = Axis {
        title: Some("Goals".to_string()),
        ..Axis::default()
    };
    layout.hovermode = Some("x unified".to_string());

    Figure {
        data: vec![
            line_trace("Scored", SCORED_COLOR, &scored),
            line_trace("Conceded", CONCEDED_COLOR, &conceded),
        ],
        layout,
    }
}

/// 80x40 density of shot coordinates for one team, season and event kind.
pub fn shot_density_heatmap(
    ctx: &DashboardContext,
    season: Season,
    team_id: u32,
    event: EventKind,
) -> Figure {
    let filter = ShotFilter::team(team_id).season(season).event(event);
    let points = ctx
        .tables
        .shots_matching(&filter)
        .map(|shot| (shot.st_x, shot.st_y));

    let xbins = BinSpec::over(RINK_X_RANGE, HEATMAP_X_BINS);
    let ybins = BinSpec::over(RINK_Y_RANGE, HEATMAP_Y_BINS);
    let z = bin_counts(points, &xbins, &ybins);

    let mut layout = FigureLayout::new(format!(
        "{} {} {}s",
        ctx.tables.teams.display_name(team_id),
        season,
        event.label()
    ));
    layout.xaxis = Axis::hidden(RINK_X_RANGE);
    layout.yaxis = Axis::hidden(RINK_Y_RANGE);
    layout.images.push(LayoutImage::rink(&ctx.rink, 1.0));
    layout.showlegend = false;

    Figure {
        data: vec![Trace::Histogram2d(DensityTrace {
            xbins,
            ybins,
            z,
            colorscale: "Reds".to_string(),
            opacity: 0.6,
        })],
        layout,
    }
}

/// Shot locations of one secondary type, optionally restricted to a single game.
pub fn shot_scatter(
    ctx: &DashboardContext,
    season: Season,
    team_id: u32,
    shot_type: &str,
    game_id: Option<u64>,
) -> Figure {
    let mut filter = ShotFilter::team(team_id)
        .season(season)
        .secondary_type(shot_type);
    if let Some(id) = game_id {
        filter = filter.game(id);
    }

    let mut by_kind: [(Vec<f64>, Vec<f64>); 3] = Default::default();
    for shot in ctx.tables.shots_matching(&filter) {
        let (xs, ys) = &mut by_kind[shot.event.index()];
        xs.push(shot.st_x);
        ys.push(shot.st_y);
    }
    let total: usize = by_kind.iter().map(|(xs, _)| xs.len()).sum();

    let data = by_kind
        .into_iter()
        .enumerate()
        .filter(|(_, (xs, _))| !xs.is_empty())
        .filter_map(|(idx, (x, y))| EventKind::from_index(idx).map(|kind| (kind, x, y)))
        .map(|(kind, x, y)| {
            Trace::Scatter(ScatterTrace {
                name: kind.label().to_string(),
                x,
                y,
                mode: TraceMode::Markers,
                line: None,
                marker: Some(event_marker(kind)),
                opacity: 0.6,
            })
        })
        .collect();

    let team = ctx.tables.teams.display_name(team_id);
    let title = match game_id {
        Some(id) => format!("{team} {season} Game ID: {id} {shot_type}s"),
        None => format!("{team} {season} {shot_type}s"),
    };
    let mut layout = FigureLayout::new(title);
    layout.subtitle = Some(format!("{total} shots"));
    layout.xaxis = Axis::hidden(RINK_X_RANGE);
    layout.yaxis = Axis::hidden(RINK_Y_RANGE);
    layout.images.push(LayoutImage::rink(&ctx.rink, 0.8));
    layout.template = "plotly_white".to_string();

    Figure { data, layout }
}

pub fn event_marker(kind: EventKind) -> MarkerStyle {
    let (symbol, color) = match kind {
        EventKind::Goal => (MarkerSymbol::Circle, "#EF553B"),
        EventKind::Shot => (MarkerSymbol::X, "#636EFA"),
        EventKind::MissedShot => (MarkerSymbol::TriangleUp, "#00CC96"),
    };
    MarkerStyle {
        symbol,
        color: color.to_string(),
        size: 10.0,
        line: MarkerOutline {
            width: 1.0,
            color: MARKER_OUTLINE.to_string(),
        },
    }
}

/// Counts points per bin; points outside either range are dropped.
pub fn bin_counts(
    points: impl IntoIterator<Item = (f64, f64)>,
    xbins: &BinSpec,
    ybins: &BinSpec,
) -> Vec<Vec<u32>> {
    let mut z = vec![vec![0u32; xbins.count()]; ybins.count()];
    for (x, y) in points {
        let (Some(ix), Some(iy)) = (xbins.index_of(x), ybins.index_of(y)) else {
            continue;
        };
        z[iy][ix] += 1;
    }
    z
}

fn line_trace(name: &str, color: &str, points: &[(f64, f64)]) -> Trace {
    Trace::Scatter(ScatterTrace {
        name: name.to_string(),
        x: points.iter().map(|p| p.0).collect(),
        y: points.iter().map(|p| p.1).collect(),
        mode: TraceMode::Lines,
        line: Some(LineStyle {
            color: color.to_string(),
        }),
        marker: None,
        opacity: 1.0,
    })
}

use ratatui::layout::Rect;
use ratatui::prelude::*;
use ratatui::style::{Color, Style};
use ratatui::symbols;
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Wrap};

use nhl_explorer::figures::{DensityTrace, Figure, Trace, TraceMode};

const SHADES: [char; 5] = [' ', '░', '▒', '▓', '█'];

struct Series {
    name: String,
    color: Color,
    line: bool,
    points: Vec<(f64, f64)>,
}

fn series_of(figure: &Figure) -> Vec<Series> {
    figure
        .data
        .iter()
        .filter_map(|trace| match trace {
            Trace::Scatter(s) => Some(s),
            Trace::Histogram2d(_) => None,
        })
        .map(|s| {
            let color = s
                .line
                .as_ref()
                .map(|l| l.color.as_str())
                .or(s.marker.as_ref().map(|m| m.color.as_str()))
                .and_then(hex_color)
                .unwrap_or(Color::White);
            Series {
                name: s.name.clone(),
                color,
                line: s.mode == TraceMode::Lines,
                points: s.x.iter().copied().zip(s.y.iter().copied()).collect(),
            }
        })
        .collect()
}

fn hex_color(raw: &str) -> Option<Color> {
    let hex = raw.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color::Rgb(r, g, b))
}

fn bounds(fixed: Option<[f64; 2]>, values: impl Iterator<Item = f64>) -> [f64; 2] {
    if let Some(range) = fixed {
        return range;
    }
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return [0.0, 1.0];
    }
    if lo == hi {
        return [lo - 1.0, hi + 1.0];
    }
    let pad = (hi - lo) * 0.05;
    [lo - pad, hi + pad]
}

fn chart_title(figure: &Figure) -> String {
    match &figure.layout.subtitle {
        Some(sub) => format!("{} ({sub})", figure.layout.title),
        None => figure.layout.title.clone(),
    }
}

fn render_placeholder(frame: &mut Frame, area: Rect, title: &str, error: Option<&str>) {
    let (text, style) = match error {
        Some(err) => (format!("unavailable: {err}"), Style::default().fg(Color::Red)),
        None => ("no selection".to_string(), Style::default().fg(Color::DarkGray)),
    };
    let widget = Paragraph::new(text)
        .style(style)
        .wrap(Wrap { trim: true })
        .block(Block::default().title(title.to_string()).borders(Borders::ALL));
    frame.render_widget(widget, area);
}

/// Line and marker traces as a braille chart; an empty figure still draws its axes.
pub fn render_xy_chart(
    frame: &mut Frame,
    area: Rect,
    fallback_title: &str,
    figure: Option<&Figure>,
    error: Option<&str>,
) {
    let Some(figure) = figure else {
        render_placeholder(frame, area, fallback_title, error);
        return;
    };
    let series = series_of(figure);
    let x_bounds = bounds(
        figure.layout.xaxis.range,
        series.iter().flat_map(|s| s.points.iter().map(|p| p.0)),
    );
    let y_bounds = bounds(
        figure.layout.yaxis.range,
        series.iter().flat_map(|s| s.points.iter().map(|p| p.1)),
    );

    let datasets = series
        .iter()
        .map(|s| {
            Dataset::default()
                .name(s.name.clone())
                .marker(if s.line {
                    symbols::Marker::Braille
                } else {
                    symbols::Marker::Dot
                })
                .graph_type(if s.line {
                    GraphType::Line
                } else {
                    GraphType::Scatter
                })
                .style(Style::default().fg(s.color))
                .data(&s.points)
        })
        .collect::<Vec<_>>();

    let mut x_axis = Axis::default().bounds(x_bounds);
    let mut y_axis = Axis::default().bounds(y_bounds);
    if figure.layout.xaxis.visible {
        x_axis = x_axis.labels(vec![
            Span::raw(format!("{:.0}", x_bounds[0])),
            Span::raw(format!("{:.0}", x_bounds[1])),
        ]);
        if let Some(title) = &figure.layout.xaxis.title {
            x_axis = x_axis.title(title.clone());
        }
    }
    if figure.layout.yaxis.visible {
        y_axis = y_axis.labels(vec![
            Span::raw(format!("{:.0}", y_bounds[0])),
            Span::raw(format!("{:.0}", y_bounds[1])),
        ]);
        if let Some(title) = &figure.layout.yaxis.title {
            y_axis = y_axis.title(title.clone());
        }
    }

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(chart_title(figure)),
        )
        .x_axis(x_axis)
        .y_axis(y_axis);
    frame.render_widget(chart, area);
}

/// The density grid resampled to the panel, highest y on top.
pub fn render_heatmap(
    frame: &mut Frame,
    area: Rect,
    fallback_title: &str,
    figure: Option<&Figure>,
    error: Option<&str>,
) {
    let Some(figure) = figure else {
        render_placeholder(frame, area, fallback_title, error);
        return;
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("{} [{} shots]", figure.layout.title, figure.point_count()));
    let inner = block.inner(area);
    let density = figure.data.iter().find_map(|trace| match trace {
        Trace::Histogram2d(h) => Some(h),
        Trace::Scatter(_) => None,
    });
    let lines = match density {
        Some(h) => shade_lines(h, inner.width as usize, inner.height as usize),
        None => Vec::new(),
    };
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn shade_lines(h: &DensityTrace, width: usize, height: usize) -> Vec<Line<'static>> {
    let rows = h.z.len();
    let cols = h.z.first().map(Vec::len).unwrap_or(0);
    if width == 0 || height == 0 || rows == 0 || cols == 0 {
        return Vec::new();
    }

    let mut cells = vec![vec![0u32; width]; height];
    for (iy, row) in h.z.iter().enumerate() {
        let cy = height - 1 - (iy * height / rows).min(height - 1);
        for (ix, count) in row.iter().enumerate() {
            let cx = (ix * width / cols).min(width - 1);
            cells[cy][cx] += count;
        }
    }
    let peak = cells.iter().flatten().copied().max().unwrap_or(0);

    cells
        .into_iter()
        .map(|row| {
            let spans: Vec<Span<'static>> = row
                .into_iter()
                .map(|count| {
                    if count == 0 || peak == 0 {
                        return Span::styled(" ", Style::default().fg(Color::DarkGray));
                    }
                    let level = 1 + (count as usize * (SHADES.len() - 2)) / peak as usize;
                    let level = level.min(SHADES.len() - 1);
                    Span::styled(
                        SHADES[level].to_string(),
                        Style::default().fg(Color::Rgb(181, 51, 18)),
                    )
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

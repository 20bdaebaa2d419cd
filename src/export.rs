use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::dashboard::{Dashboard, Fragment};
use crate::figures::{Figure, Trace};

pub struct ExportReport {
    pub trend_rows: usize,
    pub scatter_rows: usize,
    pub heatmap_cells: usize,
}

/// Writes the current selection and every rendered fragment to an xlsx workbook.
pub fn export_view(path: &Path, dashboard: &Dashboard) -> Result<ExportReport> {
    let ctx = dashboard.context();
    let sel = dashboard.selection();

    let mut selection_rows = vec![vec!["Field".to_string(), "Value".to_string()]];
    selection_rows.push(vec![
        "Team".to_string(),
        sel.team
            .map(|id| format!("{} ({id})", ctx.tables.teams.display_name(id)))
            .unwrap_or_default(),
    ]);
    selection_rows.push(vec![
        "Season".to_string(),
        sel.season.map(|s| s.to_string()).unwrap_or_default(),
    ]);
    selection_rows.push(vec![
        "Shot type".to_string(),
        sel.shot_type.clone().unwrap_or_default(),
    ]);
    selection_rows.push(vec![
        "Game".to_string(),
        sel.game
            .and_then(|g| g.game_id())
            .map(|id| id.to_string())
            .unwrap_or_else(|| "all".to_string()),
    ]);
    selection_rows.push(vec![
        "Event".to_string(),
        sel.event.map(|e| e.label().to_string()).unwrap_or_default(),
    ]);

    let mut score_rows = vec![vec![
        "Game ID".to_string(),
        "Team".to_string(),
        "Opponent".to_string(),
        "Score".to_string(),
        "Venue".to_string(),
    ]];
    if let Some(board) = dashboard.scoreboard() {
        let opponent = board
            .opponent
            .team_id()
            .map(|id| ctx.tables.teams.display_name(id).to_string())
            .unwrap_or_else(|| board.opponent.to_string());
        score_rows.push(vec![
            board.game_id.to_string(),
            ctx.tables.teams.display_name(board.team_id).to_string(),
            opponent,
            board.score_line(),
            board.venue.clone().unwrap_or_default(),
        ]);
    }

    let trend_rows = series_rows(dashboard.figure(Fragment::GoalsTrend), "Season", "Goals");
    let scatter_rows = series_rows(dashboard.figure(Fragment::Scatter), "st_x", "st_y");
    let heatmap_rows = heatmap_rows(dashboard.figure(Fragment::Heatmap));

    let mut workbook = Workbook::new();
    for (name, rows) in [
        ("Selection", &selection_rows),
        ("Scoreboard", &score_rows),
        ("GoalsTrend", &trend_rows),
        ("ShotScatter", &scatter_rows),
        ("ShotDensity", &heatmap_rows),
    ] {
        let sheet = workbook.add_worksheet();
        sheet.set_name(name)?;
        write_rows(sheet, rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        trend_rows: trend_rows.len().saturating_sub(1),
        scatter_rows: scatter_rows.len().saturating_sub(1),
        heatmap_cells: heatmap_rows.len().saturating_sub(1),
    })
}

fn series_rows(figure: Option<&Figure>, x_name: &str, y_name: &str) -> Vec<Vec<String>> {
    let mut rows = vec![vec![
        "Series".to_string(),
        x_name.to_string(),
        y_name.to_string(),
    ]];
    let Some(figure) = figure else {
        return rows;
    };
    for trace in &figure.data {
        let Trace::Scatter(trace) = trace else {
            continue;
        };
        for (x, y) in trace.x.iter().zip(&trace.y) {
            rows.push(vec![trace.name.clone(), format!("{x}"), format!("{y}")]);
        }
    }
    rows
}

// Only non-empty bins are written; a full 80x40 grid is mostly zeros.
fn heatmap_rows(figure: Option<&Figure>) -> Vec<Vec<String>> {
    let mut rows = vec![vec![
        "x_from".to_string(),
        "y_from".to_string(),
        "count".to_string(),
    ]];
    let Some(figure) = figure else {
        return rows;
    };
    for trace in &figure.data {
        let Trace::Histogram2d(h) = trace else {
            continue;
        };
        for (iy, row) in h.z.iter().enumerate() {
            for (ix, count) in row.iter().enumerate() {
                if *count == 0 {
                    continue;
                }
                let x = h.xbins.start + ix as f64 * h.xbins.size;
                let y = h.ybins.start + iy as f64 * h.ybins.size;
                rows.push(vec![format!("{x}"), format!("{y}"), count.to_string()]);
            }
        }
    }
    rows
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}

mod common;

use std::sync::Arc;

use nhl_explorer::config::DashboardConfig;
use nhl_explorer::dashboard::{Dashboard, FieldChange};
use nhl_explorer::export;
use nhl_explorer::options::GameChoice;

#[test]
fn export_writes_every_fragment() {
    let (dir, ctx) = common::fixture_context();
    let cfg = DashboardConfig::default();
    let mut dash = Dashboard::new(Arc::new(ctx), cfg.initial_selection()).expect("dashboard");
    dash.apply(FieldChange::Game(Some(GameChoice::Game(2019020001))));

    let path = dir.path().join("view.xlsx");
    let report = export::export_view(&path, &dash).expect("export");

    assert!(path.exists());
    // scored and conceded for two seasons
    assert_eq!(report.trend_rows, 4);
    // two wrist shots in that game
    assert_eq!(report.scatter_rows, 2);
    // Shot events for 2019: (60,-10), (50,20), (30,30)
    assert_eq!(report.heatmap_cells, 3);
}

#[test]
fn export_of_blank_view_still_succeeds() {
    let (dir, ctx) = common::fixture_context();
    let mut sel = DashboardConfig::default().initial_selection();
    sel.team = None;
    let dash = Dashboard::new(Arc::new(ctx), sel).expect("dashboard");

    let report = export::export_view(&dir.path().join("blank.xlsx"), &dash).expect("export");
    assert_eq!(report.trend_rows, 0);
    assert_eq!(report.scatter_rows, 0);
    assert_eq!(report.heatmap_cells, 0);
}

mod common;

use std::sync::Arc;

use nhl_explorer::dashboard::{
    Dashboard, Field, FieldChange, Fragment, Selection, dashboard_graph,
};
use nhl_explorer::figures::{self, HEATMAP_X_BINS, HEATMAP_Y_BINS, Trace};
use nhl_explorer::graph::DependencyGraph;
use nhl_explorer::options::{self, ALL_GAMES_LABEL, GameChoice};
use nhl_explorer::scoreboard::{self, Opponent};
use nhl_explorer::tables::{EventKind, Season};

fn selection(team: u32, event: EventKind) -> Selection {
    Selection {
        team: Some(team),
        season: None,
        shot_type: Some("Wrist Shot".to_string()),
        game: None,
        event: Some(event),
    }
}

fn dashboard(initial: Selection) -> (tempfile::TempDir, Dashboard) {
    let (dir, ctx) = common::fixture_context();
    let dash = Dashboard::new(Arc::new(ctx), initial).expect("graph builds");
    (dir, dash)
}

#[test]
fn heatmap_for_team_20_goals_in_2019() {
    let (_dir, dash) = dashboard(selection(20, EventKind::Goal));
    assert_eq!(dash.selection().season, Some(Season(2019)));

    let fig = dash.figure(Fragment::Heatmap).expect("heatmap rendered");
    let title = &fig.layout.title;
    assert!(title.contains("Calgary Flames"));
    assert!(title.contains("2019"));
    assert!(title.contains("Goals"));

    let Some(Trace::Histogram2d(h)) = fig.data.first() else {
        panic!("heatmap should carry a density trace");
    };
    assert_eq!((h.xbins.start, h.xbins.end), (-100.0, 100.0));
    assert_eq!((h.ybins.start, h.ybins.end), (-45.0, 45.0));
    assert_eq!(h.xbins.count(), HEATMAP_X_BINS);
    assert_eq!(h.ybins.count(), HEATMAP_Y_BINS);
    assert_eq!(h.z.len(), 40);
    assert!(h.z.iter().all(|row| row.len() == 80));
    // (80, 5) and the corner shot at (100, 45)
    assert_eq!(h.total(), 2);
    assert_eq!(h.z[39][79], 1);
}

#[test]
fn season_options_come_from_the_teams_own_shots() {
    let (_dir, ctx) = common::fixture_context();
    for (team_id, _) in ctx.tables.teams.iter() {
        let seasons: Vec<Season> = options::season_options(&ctx.tables, team_id)
            .into_iter()
            .map(|o| o.value)
            .collect();
        let mut sorted = seasons.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(seasons, sorted, "team {team_id} seasons sorted and distinct");
        for season in &seasons {
            assert!(
                ctx.tables
                    .shots
                    .iter()
                    .any(|s| s.team_id_for == team_id && s.season == *season)
            );
        }
    }
    let calgary: Vec<_> = options::season_options(&ctx.tables, 20)
        .into_iter()
        .map(|o| o.label)
        .collect();
    assert_eq!(calgary, vec!["2018", "2019"]);
}

#[test]
fn game_options_always_offer_all() {
    let (_dir, ctx) = common::fixture_context();
    for team in [20, 6, 5, 99] {
        for season in [Season(2018), Season(2019), Season(1990)] {
            let opts = options::game_options(&ctx.tables, team, season);
            assert_eq!(opts[0].label, ALL_GAMES_LABEL);
            assert_eq!(opts[0].value, GameChoice::All);
        }
    }
    let opts = options::game_options(&ctx.tables, 20, Season(2019));
    let labels: Vec<_> = opts.iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, vec!["all", "2019-10-03", "2019-10-12", "unknown date"]);
}

#[test]
fn scoreboard_counts_goals_and_handles_gaps() {
    let (_dir, ctx) = common::fixture_context();

    let board = scoreboard::compute_scoreboard(&ctx.tables, 2019020050, 20);
    assert_eq!(board.opponent, Opponent::Known(5));
    assert_eq!((board.goals_for, board.goals_against), (1, 0));
    assert_eq!(board.score_line(), "1 x 0");
    assert_eq!(board.venue.as_deref(), Some("PPG Paints Arena"));

    let scoreless = scoreboard::compute_scoreboard(&ctx.tables, 2019020050, 5);
    assert_eq!(scoreless.goals_for, 0);
    assert_eq!(scoreless.goals_against, 1);

    let absent = scoreboard::compute_scoreboard(&ctx.tables, 2019020001, 5);
    assert_eq!(absent.opponent, Opponent::Unknown);
    assert_eq!(absent.opponent.to_string(), "unknown");
    assert_eq!((absent.goals_for, absent.goals_against), (0, 0));

    let undated = scoreboard::compute_scoreboard(&ctx.tables, 2019020099, 20);
    assert_eq!(undated.venue, None);
    assert_eq!(undated.opponent, Opponent::Known(6));
}

#[test]
fn empty_subsets_give_valid_empty_charts() {
    let (_dir, ctx) = common::fixture_context();

    let scatter = figures::shot_scatter(&ctx, Season(2019), 20, "Tip-In", None);
    assert!(scatter.is_empty());
    assert_eq!(scatter.layout.subtitle.as_deref(), Some("0 shots"));
    assert!(scatter.to_json().expect("serializes").contains("Tip-In"));

    let heat = figures::shot_density_heatmap(&ctx, Season(1990), 6, EventKind::Shot);
    assert!(heat.is_empty());
    let Some(Trace::Histogram2d(h)) = heat.data.first() else {
        panic!("empty heatmap keeps its grid");
    };
    assert_eq!(h.z.len(), HEATMAP_Y_BINS);

    let trend = figures::team_goals_trend(&ctx, 5);
    assert!(trend.is_empty());
    assert_eq!(trend.data.len(), 2);
}

#[test]
fn team_change_recomputes_its_closure_in_topological_order() {
    let (_dir, mut dash) = dashboard(selection(20, EventKind::Shot));
    let graph: DependencyGraph<_> = dashboard_graph().expect("graph");
    let rank = |fragment: Fragment| {
        graph
            .topo_order()
            .iter()
            .position(|n| *n == nhl_explorer::dashboard::Node::Fragment(fragment))
            .expect("fragment in graph")
    };

    let report = dash.apply(FieldChange::Team(Some(6)));
    assert_eq!(report.recomputed.len(), 8);
    let ranks: Vec<usize> = report.recomputed.iter().map(|f| rank(*f)).collect();
    let mut sorted = ranks.clone();
    sorted.sort();
    assert_eq!(ranks, sorted);
    assert!(report.errors.is_empty());
    assert_eq!(
        dash.card(Fragment::TeamCard).map(|c| c.name.as_str()),
        Some("Boston Bruins")
    );
}

#[test]
fn event_change_touches_only_the_heatmap() {
    let (_dir, mut dash) = dashboard(selection(20, EventKind::Shot));
    let before = dash.fragment(Fragment::Scatter).expect("scatter").revision;

    let report = dash.apply(FieldChange::Event(Some(EventKind::Goal)));
    assert_eq!(report.recomputed, vec![Fragment::Heatmap]);
    assert!(report.reselected.is_empty());
    assert_eq!(dash.fragment(Fragment::Scatter).expect("scatter").revision, before);

    let again = dash.apply(FieldChange::Event(Some(EventKind::Goal)));
    assert!(again.is_noop());
}

#[test]
fn invalid_season_and_game_are_reselected() {
    let initial = Selection {
        season: Some(Season(2018)),
        game: Some(GameChoice::Game(2018020010)),
        ..selection(20, EventKind::Shot)
    };
    let (_dir, mut dash) = dashboard(initial);
    assert_eq!(dash.selection().season, Some(Season(2018)));
    assert!(dash.scoreboard().is_some());

    let report = dash.apply(FieldChange::Team(Some(5)));
    assert!(report.reselected.contains(&Field::Season));
    assert!(report.reselected.contains(&Field::Game));
    assert_eq!(dash.selection().season, Some(Season(2019)));
    assert_eq!(dash.selection().game, Some(GameChoice::All));
    assert!(dash.scoreboard().is_none());
    assert!(dash.card(Fragment::OpponentCard).is_none());
}

#[test]
fn picking_a_game_fills_score_and_opponent() {
    let (_dir, mut dash) = dashboard(selection(20, EventKind::Shot));
    let report = dash.apply(FieldChange::Game(Some(GameChoice::Game(2019020001))));
    assert!(report.recomputed.contains(&Fragment::Scoreboard));
    assert!(!report.recomputed.contains(&Fragment::Heatmap));

    let board = dash.scoreboard().expect("scoreboard");
    assert_eq!(board.score_line(), "1 x 1");
    assert_eq!(
        dash.card(Fragment::OpponentCard).map(|c| c.team_id),
        Some(6)
    );
    let scatter = dash.figure(Fragment::Scatter).expect("scatter");
    assert_eq!(scatter.point_count(), 2);
    assert!(scatter.layout.title.contains("Game ID: 2019020001"));
}

#[test]
fn unknown_team_degrades_to_blank_fragments() {
    let (_dir, mut dash) = dashboard(selection(20, EventKind::Shot));
    let report = dash.apply(FieldChange::Team(Some(99)));

    assert!(report.errors.iter().any(|(f, _)| *f == Fragment::TeamCard));
    let card = dash.fragment(Fragment::TeamCard).expect("card state");
    assert!(card.value.is_none());
    assert!(card.error.as_deref().unwrap_or_default().contains("99"));

    assert_eq!(dash.selection().season, None);
    assert!(dash.figure(Fragment::Heatmap).is_none());
    assert_eq!(dash.game_options().len(), 1);
    // unrelated to the missing name, so still renders
    assert!(dash.figure(Fragment::GoalsTrend).is_some());
}

#[test]
fn cycling_wraps_through_options() {
    let (_dir, mut dash) = dashboard(selection(20, EventKind::Shot));
    dash.cycle(Field::Season, 1);
    assert_eq!(dash.selection().season, Some(Season(2018)));
    dash.cycle(Field::Season, 1);
    assert_eq!(dash.selection().season, Some(Season(2019)));

    dash.cycle(Field::Event, -1);
    assert_eq!(dash.selection().event, Some(EventKind::Goal));
}

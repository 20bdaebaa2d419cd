use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use nhl_explorer::assets::{DashboardContext, RinkImage};
use nhl_explorer::dashboard::{Dashboard, FieldChange, Selection};
use nhl_explorer::figures;
use nhl_explorer::forest::{ClassWeightMode, ForestParams, RandomForest};
use nhl_explorer::options;
use nhl_explorer::tables::{
    EventKind, GameRecord, Season, ShotEvent, Tables, TeamConcededGoals, TeamLookup,
    TeamSeasonGoals,
};

const SHOT_TYPES: [&str; 4] = ["Wrist Shot", "Slap Shot", "Snap Shot", "Backhand"];

fn sample_context() -> DashboardContext {
    let names: BTreeMap<u32, String> = (1..=31).map(|id| (id, format!("Team {id}"))).collect();

    let mut games = Vec::new();
    let mut shots = Vec::new();
    let mut season_goals = Vec::new();
    let mut conceded_goals = Vec::new();
    for season in 2010u16..2020 {
        for team in 1..=31u32 {
            season_goals.push(TeamSeasonGoals {
                team_id: team,
                season: Season(season),
                number_of_goals: 180 + team * 2,
            });
            conceded_goals.push(TeamConcededGoals {
                team_id: team,
                season: Season(season),
                goals_conceded: 200 - team,
            });
        }
        for g in 0..400u64 {
            let game_id = u64::from(season) * 1_000_000 + 20_000 + g;
            let home = (g % 31) as u32 + 1;
            let away = ((g + 7) % 31) as u32 + 1;
            games.push(GameRecord {
                game_id,
                date: NaiveDate::from_ymd_opt(i32::from(season), 10, 1)
                    .and_then(|d| d.checked_add_days(chrono::Days::new(g / 3)))
                    .unwrap_or_default(),
                venue: format!("Arena {home}"),
            });
            for n in 0..60u64 {
                let (team_for, team_against) = if n % 2 == 0 { (home, away) } else { (away, home) };
                let event = match n % 11 {
                    0 => EventKind::Goal,
                    1..=4 => EventKind::MissedShot,
                    _ => EventKind::Shot,
                };
                shots.push(ShotEvent {
                    season: Season(season),
                    game_id,
                    team_id_for: team_for,
                    team_id_against: team_against,
                    event,
                    secondary_type: Some(SHOT_TYPES[(n % 4) as usize].to_string()),
                    st_x: ((n * 37 + g) % 200) as f64 - 100.0,
                    st_y: ((n * 13 + g) % 90) as f64 - 45.0,
                    period: (n % 3) as u8 + 1,
                    period_time: (n * 19 % 1200) as u32,
                });
            }
        }
    }

    let tables = Tables {
        teams: TeamLookup::new(names),
        games,
        shots,
        season_goals,
        conceded_goals,
    };
    DashboardContext::new(tables, RinkImage::from_bytes("image/png", &[0x89, b'P', b'N', b'G']), "assets")
}

fn bench_heatmap(c: &mut Criterion) {
    let ctx = sample_context();
    c.bench_function("heatmap_build", |b| {
        b.iter(|| {
            let fig = figures::shot_density_heatmap(
                &ctx,
                black_box(Season(2019)),
                black_box(20),
                EventKind::Shot,
            );
            black_box(fig.point_count());
        })
    });
}

fn bench_scatter(c: &mut Criterion) {
    let ctx = sample_context();
    c.bench_function("scatter_build", |b| {
        b.iter(|| {
            let fig = figures::shot_scatter(&ctx, Season(2019), black_box(20), "Wrist Shot", None);
            black_box(fig.point_count());
        })
    });
}

fn bench_game_options(c: &mut Criterion) {
    let ctx = sample_context();
    c.bench_function("game_options", |b| {
        b.iter(|| {
            let opts = options::game_options(&ctx.tables, black_box(20), Season(2019));
            black_box(opts.len());
        })
    });
}

fn bench_dashboard_team_change(c: &mut Criterion) {
    let ctx = Arc::new(sample_context());
    let initial = Selection {
        team: Some(20),
        season: None,
        shot_type: Some("Wrist Shot".to_string()),
        game: None,
        event: Some(EventKind::Shot),
    };
    let mut dash = Dashboard::new(ctx, initial).unwrap();
    let mut flip = false;
    c.bench_function("dashboard_team_change", |b| {
        b.iter(|| {
            flip = !flip;
            let team = if flip { 6 } else { 20 };
            let report = dash.apply(FieldChange::Team(Some(black_box(team))));
            black_box(report.recomputed.len());
        })
    });
}

fn bench_forest_fit(c: &mut Criterion) {
    let x: Vec<Vec<f64>> = (0..3000)
        .map(|i| {
            let v = i as f64;
            vec![(v * 0.37) % 200.0 - 100.0, (v * 0.91) % 90.0 - 45.0, (i % 3) as f64]
        })
        .collect();
    let y: Vec<usize> = (0..3000).map(|i| if i % 9 == 0 { 0 } else { 1 + i % 2 }).collect();
    let rows: Vec<usize> = (0..x.len()).collect();
    let params = ForestParams {
        n_estimators: 10,
        max_depth: Some(15),
        class_weight: ClassWeightMode::Balanced,
        ..ForestParams::default()
    };
    c.bench_function("forest_fit", |b| {
        b.iter(|| {
            let forest = RandomForest::fit(&x, &y, &rows, black_box(&params)).unwrap();
            black_box(forest.trees.len());
        })
    });
}

criterion_group!(
    perf,
    bench_heatmap,
    bench_scatter,
    bench_game_options,
    bench_dashboard_team_change,
    bench_forest_fit
);
criterion_main!(perf);

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use nhl_explorer::assets::{self, DashboardContext};

pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];

pub const TEAM_DICT: &str = r#"{"20": "Calgary Flames", "6": "Boston Bruins", "5": "Pittsburgh Penguins"}"#;

pub const GAMES: &str = r#"[
  {"game_id": "2019020001", "date": "2019-10-03", "venue": "Scotiabank Saddledome"},
  {"game_id": 2019020050, "date": "2019-10-12", "venue": "PPG Paints Arena"},
  {"game_id": 2018020010, "date": "2018-10-06", "venue": "Scotiabank Saddledome"}
]"#;

pub const SHOTS: &str = r#"[
  {"season": "20192020", "game_id": 2019020001, "team_id_for": 20, "team_id_against": 6, "event": "Goal", "secondaryType": "Wrist Shot", "st_x": 80.0, "st_y": 5.0, "period": 1, "periodTime": 300},
  {"season": "20192020", "game_id": 2019020001, "team_id_for": 20, "team_id_against": 6, "event": "Shot", "secondaryType": "Wrist Shot", "st_x": 60.0, "st_y": -10.0, "period": 1, "periodTime": 120},
  {"season": "20192020", "game_id": 2019020001, "team_id_for": 20, "team_id_against": 6, "event": "Missed Shot", "secondaryType": "Slap Shot", "st_x": -30.0, "st_y": 2.0, "period": 2, "periodTime": 50},
  {"season": "20192020", "game_id": 2019020001, "team_id_for": 6, "team_id_against": 20, "event": "Goal", "secondaryType": "Wrist Shot", "st_x": -70.0, "st_y": 3.0, "period": 3, "periodTime": 900},
  {"season": 2019, "game_id": 2019020050, "team_id_for": 20, "team_id_against": 5, "event": "Shot", "secondaryType": "Wrist Shot", "st_x": 50.0, "st_y": 20.0, "period": 1, "periodTime": 10},
  {"season": 2019, "game_id": 2019020050, "team_id_for": 20, "team_id_against": 5, "event": "Goal", "secondaryType": "Backhand", "st_x": 100.0, "st_y": 45.0, "period": 2, "periodTime": 400},
  {"season": 2019, "game_id": 2019020050, "team_id_for": 5, "team_id_against": 20, "event": "Shot", "secondaryType": "Snap Shot", "st_x": -40.0, "st_y": 0.0, "period": 2, "periodTime": 600},
  {"season": "20182019", "game_id": "2018020010", "team_id_for": "20", "team_id_against": "6", "event": "Goal", "secondaryType": "Wrist Shot", "st_x": 10.0, "st_y": 10.0, "period": 1, "periodTime": 60},
  {"season": "20192020", "game_id": 2019020099, "team_id_for": 20, "team_id_against": 6, "event": "Shot", "secondaryType": "Wrist Shot", "st_x": 30.0, "st_y": 30.0, "period": 1, "periodTime": 90}
]"#;

pub const TEAMS_SEASON: &str = r#"[
  {"team_id": 20, "season": "20182019", "number_of_goals": 248},
  {"team_id": 20, "season": "20192020", "number_of_goals": 210},
  {"team_id": 6, "season": 2019, "number_of_goals": 227}
]"#;

pub const TEAMS_CONCEDED: &str = r#"[
  {"team_id": 20, "season": "20192020", "goals_conceded": 215},
  {"team_id": 20, "season": "20182019", "goals_conceded": 227}
]"#;

pub fn write_assets(dir: &Path) {
    fs::create_dir_all(dir.join("img")).expect("img dir");
    fs::create_dir_all(dir.join(assets::LOGO_DIR)).expect("logo dir");
    fs::write(dir.join(assets::TEAM_DICT_FILE), TEAM_DICT).expect("team dict");
    fs::write(dir.join(assets::GAMES_FILE), GAMES).expect("games");
    fs::write(dir.join(assets::SHOTS_FILE), SHOTS).expect("shots");
    fs::write(dir.join(assets::TEAMS_SEASON_FILE), TEAMS_SEASON).expect("teams season");
    fs::write(dir.join(assets::TEAMS_CONCEDED_FILE), TEAMS_CONCEDED).expect("teams conceded");
    fs::write(dir.join(assets::RINK_IMAGE_FILE), PNG_BYTES).expect("rink");
}

pub fn fixture_context() -> (tempfile::TempDir, DashboardContext) {
    let dir = tempfile::tempdir().expect("tempdir");
    write_assets(dir.path());
    let ctx = assets::load_context(dir.path()).expect("load fixture assets");
    (dir, ctx)
}

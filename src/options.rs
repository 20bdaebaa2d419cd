use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use crate::tables::{EventKind, Season, ShotFilter, Tables};

pub const ALL_GAMES_LABEL: &str = "all";
pub const UNKNOWN_DATE_LABEL: &str = "unknown date";

/// Value of the game selector; `All` disables the single-game filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GameChoice {
    All,
    Game(u64),
}

impl GameChoice {
    pub fn game_id(self) -> Option<u64> {
        match self {
            GameChoice::All => None,
            GameChoice::Game(id) => Some(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DropdownOption<T> {
    pub label: String,
    pub value: T,
}

impl<T> DropdownOption<T> {
    pub fn new(label: impl Into<String>, value: T) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

pub fn team_options(tables: &Tables) -> Vec<DropdownOption<u32>> {
    let mut out: Vec<_> = tables
        .teams
        .iter()
        .map(|(id, name)| DropdownOption::new(name, id))
        .collect();
    out.sort_by(|a, b| a.label.cmp(&b.label).then(a.value.cmp(&b.value)));
    out
}

pub fn event_options(tables: &Tables) -> Vec<DropdownOption<EventKind>> {
    let mut seen = HashSet::new();
    tables
        .shots
        .iter()
        .filter(|s| seen.insert(s.event))
        .map(|s| DropdownOption::new(s.event.label(), s.event))
        .collect()
}

pub fn type_options(tables: &Tables) -> Vec<DropdownOption<String>> {
    let mut seen = HashSet::new();
    tables
        .shots
        .iter()
        .filter_map(|s| s.secondary_type.as_deref())
        .filter(|t| seen.insert(*t))
        .map(|t| DropdownOption::new(t, t.to_string()))
        .collect()
}

/// Seasons in which `team_id` recorded at least one shot event, ascending.
pub fn season_options(tables: &Tables, team_id: u32) -> Vec<DropdownOption<Season>> {
    let filter = ShotFilter::team(team_id);
    let seasons: BTreeSet<Season> = tables.shots_matching(&filter).map(|s| s.season).collect();
    seasons
        .into_iter()
        .map(|s| DropdownOption::new(s.to_string(), s))
        .collect()
}

/// The `all` sentinel followed by the team's games that season, ordered by date.
pub fn game_options(
    tables: &Tables,
    team_id: u32,
    season: Season,
) -> Vec<DropdownOption<GameChoice>> {
    let filter = ShotFilter::team(team_id).season(season);
    let mut seen = HashSet::new();
    let mut games: Vec<_> = tables
        .shots_matching(&filter)
        .filter(|s| seen.insert(s.game_id))
        .map(|s| (tables.game_date(s.game_id), s.game_id))
        .collect();

    // Undated games sort after every dated one.
    games.sort_by(|a, b| match (a.0, b.0) {
        (Some(x), Some(y)) => x.cmp(&y).then(a.1.cmp(&b.1)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.1.cmp(&b.1),
    });

    let mut out = Vec::with_capacity(games.len() + 1);
    out.push(DropdownOption::new(ALL_GAMES_LABEL, GameChoice::All));
    for (date, game_id) in games {
        let label = match date {
            Some(d) => d.format("%Y-%m-%d").to_string(),
            None => UNKNOWN_DATE_LABEL.to_string(),
        };
        out.push(DropdownOption::new(label, GameChoice::Game(game_id)));
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::tables::{GameRecord, ShotEvent, TeamLookup};

    fn shot(season: u16, game: u64, team: u32, kind: &str) -> ShotEvent {
        ShotEvent {
            season: Season(season),
            game_id: game,
            team_id_for: team,
            team_id_against: 1,
            event: EventKind::Shot,
            secondary_type: Some(kind.to_string()),
            st_x: 10.0,
            st_y: 5.0,
            period: 1,
            period_time: 30,
        }
    }

    fn game(id: u64, y: i32, m: u32, d: u32) -> GameRecord {
        GameRecord {
            game_id: id,
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            venue: format!("Venue {id}"),
        }
    }

    fn sample() -> Tables {
        Tables {
            teams: TeamLookup::new(
                [(20, "Calgary Flames".to_string()), (6, "Boston Bruins".to_string())]
                    .into_iter()
                    .collect(),
            ),
            games: vec![game(30, 2019, 11, 2), game(31, 2019, 10, 5)],
            shots: vec![
                shot(2019, 30, 20, "Wrist Shot"),
                shot(2017, 12, 20, "Slap Shot"),
                shot(2019, 31, 20, "Wrist Shot"),
                shot(2019, 31, 20, "Backhand"),
                shot(2019, 32, 20, "Wrist Shot"),
                shot(2018, 40, 6, "Wrist Shot"),
            ],
            ..Tables::default()
        }
    }

    #[test]
    fn team_options_sorted_by_label() {
        let opts = team_options(&sample());
        let labels: Vec<_> = opts.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["Boston Bruins", "Calgary Flames"]);
        assert_eq!(opts[1].value, 20);
    }

    #[test]
    fn seasons_are_distinct_and_ascending() {
        let opts = season_options(&sample(), 20);
        let values: Vec<_> = opts.iter().map(|o| o.value).collect();
        assert_eq!(values, vec![Season(2017), Season(2019)]);
        assert!(season_options(&sample(), 99).is_empty());
    }

    #[test]
    fn games_follow_sentinel_in_date_order() {
        let opts = game_options(&sample(), 20, Season(2019));
        let labels: Vec<_> = opts.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["all", "2019-10-05", "2019-11-02", UNKNOWN_DATE_LABEL]
        );
        assert_eq!(opts[0].value, GameChoice::All);
        assert_eq!(opts[3].value, GameChoice::Game(32));
    }

    #[test]
    fn game_options_keep_sentinel_when_nothing_matches() {
        let opts = game_options(&sample(), 6, Season(2001));
        assert_eq!(opts, vec![DropdownOption::new("all", GameChoice::All)]);
    }

    #[test]
    fn static_lists_keep_first_seen_order() {
        let tables = sample();
        let types: Vec<_> = type_options(&tables).into_iter().map(|o| o.value).collect();
        assert_eq!(types, vec!["Wrist Shot", "Slap Shot", "Backhand"]);
        assert_eq!(event_options(&tables).len(), 1);
    }
}

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Display name used whenever a team id has no entry in the lookup.
pub const UNKNOWN_TEAM: &str = "unknown";

/// Season identified by its start year ("2019" is the 2019-20 season).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "SeasonRepr", into = "u16")]
pub struct Season(pub u16);

impl Season {
    /// Accepts "2019", "20192020" (start+end year) or a bare year number.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let year = match trimmed.len() {
            4 => trimmed.parse::<u16>().ok()?,
            8 => trimmed[..4].parse::<u16>().ok()?,
            _ => return None,
        };
        Some(Season(year))
    }

    pub fn from_number(value: u64) -> Option<Self> {
        let year = if value >= 10_000_000 {
            value / 10_000
        } else {
            value
        };
        if (1800..=9999).contains(&year) {
            Some(Season(year as u16))
        } else {
            None
        }
    }

    pub fn year(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Season> for u16 {
    fn from(season: Season) -> Self {
        season.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SeasonRepr {
    Number(u64),
    Text(String),
}

impl TryFrom<SeasonRepr> for Season {
    type Error = String;

    fn try_from(raw: SeasonRepr) -> Result<Self, Self::Error> {
        match raw {
            SeasonRepr::Number(n) => {
                Season::from_number(n).ok_or_else(|| format!("invalid season number {n}"))
            }
            SeasonRepr::Text(s) => Season::parse(&s).ok_or_else(|| format!("invalid season {s:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    Goal,
    Shot,
    #[serde(rename = "Missed Shot")]
    MissedShot,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::Goal, EventKind::Shot, EventKind::MissedShot];

    pub fn label(self) -> &'static str {
        match self {
            EventKind::Goal => "Goal",
            EventKind::Shot => "Shot",
            EventKind::MissedShot => "Missed Shot",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(trimmed))
    }

    pub fn index(self) -> usize {
        match self {
            EventKind::Goal => 0,
            EventKind::Shot => 1,
            EventKind::MissedShot => 2,
        }
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamLookup {
    names: BTreeMap<u32, String>,
}

impl TeamLookup {
    pub fn new(names: BTreeMap<u32, String>) -> Self {
        Self { names }
    }

    pub fn name(&self, team_id: u32) -> Option<&str> {
        self.names.get(&team_id).map(String::as_str)
    }

    pub fn display_name(&self, team_id: u32) -> &str {
        self.name(team_id).unwrap_or(UNKNOWN_TEAM)
    }

    pub fn contains(&self, team_id: u32) -> bool {
        self.names.contains_key(&team_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.names.iter().map(|(id, name)| (*id, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecord {
    #[serde(deserialize_with = "lenient_u64")]
    pub game_id: u64,
    pub date: NaiveDate,
    #[serde(default)]
    pub venue: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShotEvent {
    pub season: Season,
    #[serde(deserialize_with = "lenient_u64")]
    pub game_id: u64,
    #[serde(deserialize_with = "lenient_u32")]
    pub team_id_for: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub team_id_against: u32,
    pub event: EventKind,
    #[serde(rename = "secondaryType", alias = "secondary_type", default)]
    pub secondary_type: Option<String>,
    pub st_x: f64,
    pub st_y: f64,
    #[serde(default)]
    pub period: u8,
    #[serde(rename = "periodTime", alias = "period_time", default)]
    pub period_time: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSeasonGoals {
    #[serde(deserialize_with = "lenient_u32")]
    pub team_id: u32,
    pub season: Season,
    pub number_of_goals: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamConcededGoals {
    #[serde(deserialize_with = "lenient_u32")]
    pub team_id: u32,
    pub season: Season,
    pub goals_conceded: u32,
}

/// Typed predicate over [`ShotEvent`]; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShotFilter {
    pub season: Option<Season>,
    pub team_for: Option<u32>,
    pub game: Option<u64>,
    pub event: Option<EventKind>,
    pub secondary_type: Option<String>,
}

impl ShotFilter {
    pub fn team(team_id: u32) -> Self {
        Self {
            team_for: Some(team_id),
            ..Self::default()
        }
    }

    pub fn season(mut self, season: Season) -> Self {
        self.season = Some(season);
        self
    }

    pub fn game(mut self, game_id: u64) -> Self {
        self.game = Some(game_id);
        self
    }

    pub fn event(mut self, event: EventKind) -> Self {
        self.event = Some(event);
        self
    }

    pub fn secondary_type(mut self, shot_type: impl Into<String>) -> Self {
        self.secondary_type = Some(shot_type.into());
        self
    }

    pub fn matches(&self, shot: &ShotEvent) -> bool {
        if self.season.is_some_and(|s| s != shot.season) {
            return false;
        }
        if self.team_for.is_some_and(|t| t != shot.team_id_for) {
            return false;
        }
        if self.game.is_some_and(|g| g != shot.game_id) {
            return false;
        }
        if self.event.is_some_and(|e| e != shot.event) {
            return false;
        }
        if let Some(wanted) = self.secondary_type.as_deref()
            && shot.secondary_type.as_deref() != Some(wanted)
        {
            return false;
        }
        true
    }
}

/// Everything the dashboard reads, loaded once and never mutated.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub teams: TeamLookup,
    pub games: Vec<GameRecord>,
    pub shots: Vec<ShotEvent>,
    pub season_goals: Vec<TeamSeasonGoals>,
    pub conceded_goals: Vec<TeamConcededGoals>,
}

impl Tables {
    pub fn shots_matching<'a>(
        &'a self,
        filter: &'a ShotFilter,
    ) -> impl Iterator<Item = &'a ShotEvent> {
        self.shots.iter().filter(move |shot| filter.matches(shot))
    }

    pub fn count_shots(&self, filter: &ShotFilter) -> usize {
        self.shots_matching(filter).count()
    }

    // Game ids are not guaranteed unique in the source extract; first row wins.
    pub fn game(&self, game_id: u64) -> Option<&GameRecord> {
        self.games.iter().find(|g| g.game_id == game_id)
    }

    pub fn venue(&self, game_id: u64) -> Option<&str> {
        self.game(game_id).map(|g| g.venue.as_str())
    }

    pub fn game_date(&self, game_id: u64) -> Option<NaiveDate> {
        self.game(game_id).map(|g| g.date)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Number(u64),
    Float(f64),
    Text(String),
}

impl IdRepr {
    fn into_u64(self) -> Result<u64, String> {
        match self {
            IdRepr::Number(n) => Ok(n),
            IdRepr::Float(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => Ok(f as u64),
            IdRepr::Float(f) => Err(format!("invalid id {f}")),
            IdRepr::Text(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| format!("invalid id {s:?}")),
        }
    }
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    IdRepr::deserialize(deserializer)?
        .into_u64()
        .map_err(serde::de::Error::custom)
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = lenient_u64(deserializer)?;
    u32::try_from(raw).map_err(|_| serde::de::Error::custom(format!("id {raw} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shot(season: u16, game: u64, team_for: u32, event: EventKind, kind: &str) -> ShotEvent {
        ShotEvent {
            season: Season(season),
            game_id: game,
            team_id_for: team_for,
            team_id_against: 99,
            event,
            secondary_type: Some(kind.to_string()),
            st_x: 0.0,
            st_y: 0.0,
            period: 1,
            period_time: 0,
        }
    }

    #[test]
    fn season_accepts_year_and_span_forms() {
        assert_eq!(Season::parse("2019"), Some(Season(2019)));
        assert_eq!(Season::parse("20192020"), Some(Season(2019)));
        assert_eq!(Season::parse("19-20"), None);
        assert_eq!(Season::from_number(20192020), Some(Season(2019)));

        let from_text: Season = serde_json::from_str("\"2018\"").unwrap();
        let from_num: Season = serde_json::from_str("2018").unwrap();
        assert_eq!(from_text, from_num);
    }

    #[test]
    fn event_kind_uses_display_labels_on_the_wire() {
        let kind: EventKind = serde_json::from_str("\"Missed Shot\"").unwrap();
        assert_eq!(kind, EventKind::MissedShot);
        assert_eq!(EventKind::from_label("goal"), Some(EventKind::Goal));
    }

    #[test]
    fn filter_combines_every_set_field() {
        let rows = vec![
            shot(2019, 1, 20, EventKind::Goal, "Wrist Shot"),
            shot(2019, 1, 20, EventKind::Shot, "Slap Shot"),
            shot(2018, 2, 20, EventKind::Goal, "Wrist Shot"),
            shot(2019, 3, 21, EventKind::Goal, "Wrist Shot"),
        ];
        let tables = Tables {
            shots: rows,
            ..Tables::default()
        };

        let filter = ShotFilter::team(20).season(Season(2019));
        assert_eq!(tables.count_shots(&filter), 2);
        let filter = filter.secondary_type("Wrist Shot");
        assert_eq!(tables.count_shots(&filter), 1);
        assert_eq!(tables.count_shots(&ShotFilter::default()), 4);
    }

    #[test]
    fn duplicate_game_ids_resolve_to_first_row() {
        let date = NaiveDate::from_ymd_opt(2019, 10, 3).unwrap();
        let tables = Tables {
            games: vec![
                GameRecord {
                    game_id: 7,
                    date,
                    venue: "First Arena".to_string(),
                },
                GameRecord {
                    game_id: 7,
                    date,
                    venue: "Second Arena".to_string(),
                },
            ],
            ..Tables::default()
        };
        assert_eq!(tables.venue(7), Some("First Arena"));
        assert_eq!(tables.venue(8), None);
    }

    #[test]
    fn ids_may_arrive_as_strings() {
        let raw = r#"{"season":"2019","game_id":"2019020001","team_id_for":"20",
            "team_id_against":6,"event":"Shot","secondaryType":"Wrist Shot",
            "st_x":-55.0,"st_y":6.0,"period":1,"periodTime":54}"#;
        let row: ShotEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(row.game_id, 2019020001);
        assert_eq!(row.team_id_for, 20);
        assert_eq!(row.team_id_against, 6);
    }
}

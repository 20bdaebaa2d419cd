use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::assets::DashboardContext;
use crate::tables::{EventKind, ShotFilter, Tables, UNKNOWN_TEAM};

/// Opposing team of a (game, team) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Opponent {
    Known(u32),
    Unknown,
}

impl Opponent {
    pub fn team_id(self) -> Option<u32> {
        match self {
            Opponent::Known(id) => Some(id),
            Opponent::Unknown => None,
        }
    }
}

impl fmt::Display for Opponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opponent::Known(id) => write!(f, "{id}"),
            Opponent::Unknown => f.write_str(UNKNOWN_TEAM),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scoreboard {
    pub game_id: u64,
    pub team_id: u32,
    pub opponent: Opponent,
    pub goals_for: u32,
    pub goals_against: u32,
    pub venue: Option<String>,
}

impl Scoreboard {
    pub fn score_line(&self) -> String {
        format!("{} x {}", self.goals_for, self.goals_against)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamCard {
    pub team_id: u32,
    pub name: String,
    pub logo: PathBuf,
}

pub fn goals_in_game(tables: &Tables, game_id: u64, team_id: u32) -> u32 {
    let filter = ShotFilter::team(team_id)
        .game(game_id)
        .event(EventKind::Goal);
    tables.count_shots(&filter) as u32
}

/// Team-against of the first event `team_id` recorded in `game_id`.
pub fn opponent_in_game(tables: &Tables, game_id: u64, team_id: u32) -> Opponent {
    let filter = ShotFilter::team(team_id).game(game_id);
    tables
        .shots_matching(&filter)
        .next()
        .map(|shot| Opponent::Known(shot.team_id_against))
        .unwrap_or(Opponent::Unknown)
}

pub fn compute_scoreboard(tables: &Tables, game_id: u64, team_id: u32) -> Scoreboard {
    let opponent = opponent_in_game(tables, game_id, team_id);
    let goals_against = opponent
        .team_id()
        .map(|opp| goals_in_game(tables, game_id, opp))
        .unwrap_or(0);
    Scoreboard {
        game_id,
        team_id,
        opponent,
        goals_for: goals_in_game(tables, game_id, team_id),
        goals_against,
        venue: tables.venue(game_id).map(str::to_string),
    }
}

pub fn team_card(ctx: &DashboardContext, team_id: u32) -> TeamCard {
    TeamCard {
        team_id,
        name: ctx.tables.teams.display_name(team_id).to_string(),
        logo: ctx.logo_path(team_id),
    }
}

/// Card of the side `team_id` faced in `game_id`, if that pairing exists.
pub fn opponent_card(ctx: &DashboardContext, game_id: u64, team_id: u32) -> Option<TeamCard> {
    opponent_in_game(&ctx.tables, game_id, team_id)
        .team_id()
        .map(|opp| team_card(ctx, opp))
}

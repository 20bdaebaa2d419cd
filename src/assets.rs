use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::info;

use crate::tables::{
    GameRecord, ShotEvent, Tables, TeamConcededGoals, TeamLookup, TeamSeasonGoals,
};

pub const TEAM_DICT_FILE: &str = "team_dict.json";
pub const GAMES_FILE: &str = "games.json";
pub const SHOTS_FILE: &str = "shots.json";
pub const TEAMS_SEASON_FILE: &str = "teams_season.json";
pub const TEAMS_CONCEDED_FILE: &str = "teams_conceded.json";
pub const RINK_IMAGE_FILE: &str = "img/NHL-rink.png";
pub const LOGO_DIR: &str = "logos-Transparent";

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("missing asset {path}: {source}")]
    Missing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed asset {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported image format for {path}")]
    UnsupportedImage { path: PathBuf },
    #[error("empty asset {path}")]
    Empty { path: PathBuf },
}

/// Background image ready to be embedded into a chart description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RinkImage {
    pub mime: &'static str,
    pub data_uri: String,
}

impl RinkImage {
    pub fn from_bytes(mime: &'static str, bytes: &[u8]) -> Self {
        Self {
            mime,
            data_uri: format!("data:{mime};base64,{}", BASE64.encode(bytes)),
        }
    }
}

/// Immutable state shared by every dashboard computation.
#[derive(Debug, Clone)]
pub struct DashboardContext {
    pub tables: Tables,
    pub rink: RinkImage,
    pub assets_dir: PathBuf,
}

impl DashboardContext {
    pub fn new(tables: Tables, rink: RinkImage, assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            tables,
            rink,
            assets_dir: assets_dir.into(),
        }
    }

    pub fn logo_path(&self, team_id: u32) -> PathBuf {
        self.assets_dir.join(LOGO_DIR).join(format!("{team_id}.png"))
    }
}

/// Loads every table and the rink image. Any failure aborts startup.
pub fn load_context(dir: &Path) -> Result<DashboardContext, AssetError> {
    let tables = load_tables(dir)?;
    let rink = load_rink_image(&dir.join(RINK_IMAGE_FILE))?;
    info!(
        teams = tables.teams.len(),
        games = tables.games.len(),
        shots = tables.shots.len(),
        "dashboard assets loaded from {}",
        dir.display()
    );
    Ok(DashboardContext::new(tables, rink, dir))
}

pub fn load_tables(dir: &Path) -> Result<Tables, AssetError> {
    let teams_path = dir.join(TEAM_DICT_FILE);
    let names: BTreeMap<u32, String> = read_json(&teams_path)?;
    if names.is_empty() {
        return Err(AssetError::Empty { path: teams_path });
    }
    let games: Vec<GameRecord> = read_json(&dir.join(GAMES_FILE))?;
    let shots: Vec<ShotEvent> = read_json(&dir.join(SHOTS_FILE))?;
    let season_goals: Vec<TeamSeasonGoals> = read_json(&dir.join(TEAMS_SEASON_FILE))?;
    let conceded_goals: Vec<TeamConcededGoals> = read_json(&dir.join(TEAMS_CONCEDED_FILE))?;

    Ok(Tables {
        teams: TeamLookup::new(names),
        games,
        shots,
        season_goals,
        conceded_goals,
    })
}

pub fn load_rink_image(path: &Path) -> Result<RinkImage, AssetError> {
    let mime = image_mime(path).ok_or_else(|| AssetError::UnsupportedImage {
        path: path.to_path_buf(),
    })?;
    let bytes = fs::read(path).map_err(|source| AssetError::Missing {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(AssetError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(RinkImage::from_bytes(mime, &bytes))
}

fn image_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AssetError> {
    let raw = fs::read_to_string(path).map_err(|source| AssetError::Missing {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| AssetError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

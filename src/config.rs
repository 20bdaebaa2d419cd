use std::path::PathBuf;
use std::time::Duration;

use crate::dashboard::Selection;
use crate::tables::EventKind;

pub const DEFAULT_TEAM_ID: u32 = 20;
pub const DEFAULT_SHOT_TYPE: &str = "Wrist Shot";
pub const DEFAULT_EVENT: EventKind = EventKind::Shot;

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub assets_dir: PathBuf,
    pub log_dir: PathBuf,
    pub export_dir: PathBuf,
    pub tick_rate: Duration,
    pub default_team: u32,
    pub default_shot_type: String,
    pub default_event: EventKind,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            log_dir: PathBuf::from("logs"),
            export_dir: PathBuf::from("exports"),
            tick_rate: Duration::from_millis(250),
            default_team: DEFAULT_TEAM_ID,
            default_shot_type: DEFAULT_SHOT_TYPE.to_string(),
            default_event: DEFAULT_EVENT,
        }
    }
}

impl DashboardConfig {
    /// Reads `.env.local` / `.env`, then `NHL_*` variables over the defaults.
    pub fn from_env() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let tick_ms = non_empty("NHL_TICK_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(250)
            .max(50);

        Self {
            assets_dir: non_empty("NHL_ASSETS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.assets_dir),
            log_dir: non_empty("NHL_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            export_dir: non_empty("NHL_EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.export_dir),
            tick_rate: Duration::from_millis(tick_ms),
            default_team: non_empty("NHL_DEFAULT_TEAM")
                .and_then(|v| v.trim().parse::<u32>().ok())
                .unwrap_or(defaults.default_team),
            default_shot_type: non_empty("NHL_DEFAULT_SHOT_TYPE")
                .map(|v| v.trim().to_string())
                .unwrap_or(defaults.default_shot_type),
            default_event: non_empty("NHL_DEFAULT_EVENT")
                .and_then(|v| EventKind::from_label(&v))
                .unwrap_or(defaults.default_event),
        }
    }

    /// Selector values shown before the user touches anything.
    pub fn initial_selection(&self) -> Selection {
        Selection {
            team: Some(self.default_team),
            season: None,
            shot_type: Some(self.default_shot_type.clone()),
            game: None,
            event: Some(self.default_event),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn env_values_override_defaults() {
        let env: HashMap<&str, &str> = [
            ("NHL_ASSETS_DIR", "/data/nhl"),
            ("NHL_DEFAULT_TEAM", "6"),
            ("NHL_DEFAULT_EVENT", "goal"),
            ("NHL_TICK_MS", "10"),
            ("NHL_DEFAULT_SHOT_TYPE", "  "),
        ]
        .into_iter()
        .collect();
        let cfg = DashboardConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.assets_dir, PathBuf::from("/data/nhl"));
        assert_eq!(cfg.default_team, 6);
        assert_eq!(cfg.default_event, EventKind::Goal);
        assert_eq!(cfg.tick_rate, Duration::from_millis(50));
        assert_eq!(cfg.default_shot_type, DEFAULT_SHOT_TYPE);
    }

    #[test]
    fn garbage_values_fall_back() {
        let cfg = DashboardConfig::from_lookup(|k| match k {
            "NHL_DEFAULT_TEAM" => Some("twenty".to_string()),
            "NHL_DEFAULT_EVENT" => Some("Hit".to_string()),
            _ => None,
        });
        assert_eq!(cfg.default_team, DEFAULT_TEAM_ID);
        assert_eq!(cfg.default_event, DEFAULT_EVENT);
        let sel = cfg.initial_selection();
        assert_eq!(sel.team, Some(DEFAULT_TEAM_ID));
        assert_eq!(sel.game, None);
    }
}

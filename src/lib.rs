pub mod assets;
pub mod config;
pub mod dashboard;
pub mod export;
pub mod figures;
pub mod forest;
pub mod graph;
pub mod logging;
pub mod model_search;
pub mod options;
pub mod play_dataset;
pub mod scoreboard;
pub mod tables;

pub mod bracket;
pub mod config;
pub mod draw;
pub mod engine;
pub mod participants;
pub mod record;
pub mod report;
pub mod result_parser;
pub mod standings;
pub mod store;

pub use engine::{Engine, Outcome, Rejection, Response, Stage};
pub use record::{Record, Score, TournamentKey};

//! Matchmaking: the waiting queue and the assignment pass

pub mod queue;
pub mod service;

pub use queue::MatchmakingQueue;
pub use service::Matchmaker;

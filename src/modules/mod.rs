pub mod action;
pub mod behavior;
pub mod client;
pub mod engine;
pub mod entity;
pub mod error;
pub mod exclusions;
pub mod pathfinder;
pub mod position;
pub mod snapshot;
pub mod spawning;
pub mod state;
pub mod stats;
pub mod strategy;
pub mod summary;
pub mod world;

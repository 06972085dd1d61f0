//! The memory scoring and connection engine.
//!
//! Leaves first: [`vectorizer`] turns text into vectors, [`similarity`] builds the
//! pairwise matrix, [`graph`] thresholds it into connections, [`search`] ranks
//! against a query and [`scores`] owns reinforcement. [`engine`] ties them together
//! behind one lock.

pub mod corpus;
pub mod engine;
pub mod graph;
pub mod persist;
pub mod scores;
pub mod search;
pub mod similarity;
pub mod types;
pub mod vectorizer;

pub use engine::MemoryEngine;

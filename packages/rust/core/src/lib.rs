//! Pipeline orchestration and dialogue generation for DialogueGen.
//!
//! This crate ties extraction, generation, and persistence together into a
//! single run (`validate → extract → combine → generate → persist`).

pub mod corpus;
pub mod generator;
pub mod parser;
pub mod pipeline;
pub mod retry;

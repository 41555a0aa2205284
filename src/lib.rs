//! # PLU Extract
//!
//! Extracts zoning limits (maximum building height, maximum footprint) from
//! PLU urbanism regulations with retrieval-augmented question answering, and
//! stores them in SQLite keyed by territory, commune, year, zone and section.
//!
//! The pipeline itself lives in [`plu_extract_core`]. This crate supplies the
//! concrete capabilities and the `plu` command line.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────┐   ┌────────────────┐
//! │  loader  │──▶│  ExtractionSession    │──▶│ FactRepository │
//! │ PDF/text │   │ chunk·embed·retrieve  │   │    SQLite      │
//! └──────────┘   │ prompt·generate       │   └────────────────┘
//!                └──────────┬───────────┘
//!                  Embedder │ Generator
//!          fastembed·Ollama·OpenAI·hashing
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! plu init                                   # create database
//! plu ask plu_0.pdf                          # interactive questions
//! plu extract plu_0.pdf --territoire T01 --codcom 33063 --annee 2024 \
//!     --section UA --zone U1 --zone U2       # extract and store facts
//! plu facts --codcom 33063                   # list stored facts
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`embedding`] | Embedding providers |
//! | [`generation`] | Generation providers |
//! | [`loader`] | PDF and text loading |
//! | [`pipeline`] | Session construction and ingest |
//! | [`repository`] | Fact persistence |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod ask_cmd;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract_cmd;
pub mod facts_cmd;
pub mod generation;
mod http;
pub mod loader;
pub mod logging;
pub mod migrate;
pub mod pipeline;
pub mod repository;

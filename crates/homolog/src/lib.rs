//! `gridrecon-homolog`: homologation engine for transmission-line and
//! transformer registries.
//!
//! Pure engine crate: receives pre-loaded records, returns matched rows and
//! per-month resolved parameters. The `load` module is a thin CSV adapter.

pub mod abbrev;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod load;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod parse;
pub mod sections;
pub mod similarity;
pub mod summary;
pub mod temporal;
pub mod transformer;

pub use abbrev::{AbbreviationEntry, AbbreviationTable};
pub use config::HomologConfig;
pub use engine::{resolve, run};
pub use error::HomologError;
pub use model::{HomologInput, HomologResult, HomologRow};
pub use normalize::Normalizer;
pub use temporal::EvaluationMonth;

//! Assigns demanded linear pieces to reclaimed stock, recovered leftovers,
//! market stock and, as a last resort, synthesized custom pieces.

pub mod config;
pub mod engine;
pub mod error;
pub mod feasibility;
pub mod grouping;
pub mod ids;
pub mod leftover;
pub mod loader;
pub mod report;
pub mod scorer;
pub mod selector;
pub mod types;

pub use config::EngineConfig;
pub use engine::{Engine, assign};
pub use error::{ConfigError, EngineError, InputError};
pub use types::{Demand, Section, Solution, StockElement, StockKind, StrengthClass};

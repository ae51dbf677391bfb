//! Positional cross-matching of astronomical catalogues.
//!
//! Queries a reference catalogue and one or more candidate catalogues over
//! the same cone, matches every reference source to its nearest neighbour
//! in each candidate catalogue, joins the results into one table and keeps
//! the rows whose separations fall below per-candidate thresholds.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`sphere`] | [`SkyPosition`], unit vectors, Vincenty separation |
//! | [`kdtree`] | k-d tree over unit vectors for nearest and radius search |
//! | [`engine`] | [`match_nearest`]: one [`MatchResult`] per reference row |
//! | [`assemble`] | [`assemble()`] joins matched tables, [`filter`] applies thresholds |
//! | [`config`] | [`CrossmatchConfig`]: defaults, JSON loading, validation |
//! | [`pipeline`] | [`Crossmatch`]: query, match, join and filter in one call |
//! | [`output`] | FITS binary table writer with atomic replace |
//! | [`plot`] | SVG sky plot and separation histogram |
//! | [`error`] | [`CrossmatchError`] |
//!
//! # Quick Start
//!
//! ```ignore
//! use celestial_catalog::{Registry, ScsClient};
//! use celestial_crossmatch::{write_fits, Crossmatch, CrossmatchConfig};
//!
//! let config = CrossmatchConfig::default();
//! let crossmatch = Crossmatch::new(config, Registry::builtin())?;
//! let run = crossmatch.run(&ScsClient::new()?)?;
//!
//! println!("{} of {} reference sources matched", run.filtered.len(), run.joined.len());
//! write_fits(&run.filtered.table, "crossmatch_cat.fits")?;
//! ```
//!
//! # Features
//!
//! - **`cli`** (default) — builds the `crossmatch` binary.

pub mod assemble;
pub mod config;
pub mod engine;
pub mod error;
pub mod kdtree;
pub mod output;
pub mod pipeline;
pub mod plot;
pub mod sphere;

pub use assemble::{assemble, filter, separation_column, CrossMatchResult, MatchedCandidate};
pub use config::CrossmatchConfig;
pub use engine::{extract_positions, match_nearest, MatchResult};
pub use error::{CrossmatchError, Result};
pub use output::write_fits;
pub use pipeline::{Crossmatch, CrossmatchRun};
pub use plot::write_plot;
pub use sphere::{angular_separation_deg, SkyPosition};

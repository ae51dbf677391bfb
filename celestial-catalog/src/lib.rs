//! Remote astronomical catalogues as in-memory tables.
//!
//! Maps catalogue names to Simple Cone Search (SCS) services, runs cone
//! searches against them and returns the VOTable results as column-oriented
//! [`CatalogueTable`]s. Everything is held in memory for a single run.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`registry`] | [`Registry`] of [`CatalogueConfig`] records: endpoint plus RA/Dec (and error) column names |
//! | [`table`] | [`CatalogueTable`], [`Column`], [`ColumnData`]: typed columns, row selection, text coercion |
//! | [`scs`] | [`ConeSearch`] trait, [`ScsClient`] over HTTP, VOTable parsing |
//! | [`error`] | [`CatalogError`] |
//!
//! # Quick Start
//!
//! ```ignore
//! use celestial_catalog::{ConeSearch, ConeSearchParams, Registry, ScsClient};
//!
//! let registry = Registry::builtin();
//! let gaia = registry.lookup("GAIA_DR3")?;
//! let client = ScsClient::new()?;
//!
//! let table = client.cone_search(gaia, &ConeSearchParams::new(191.25, 25.0, 0.1))?;
//! let ra = table.numeric_values(&gaia.ra_column)?;
//! ```
//!
//! # Features
//!
//! - **`integration-tests`** — enables tests that query the live services.

pub mod error;
pub mod registry;
pub mod scs;
pub mod table;

pub use error::{CatalogError, Result};
pub use registry::{CatalogueConfig, Registry};
pub use scs::{parse_votable, ConeSearch, ConeSearchParams, ScsClient};
pub use table::{CatalogueTable, Column, ColumnData, Value};

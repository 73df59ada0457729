//! `hpcc-client` runs ECL against an HPCC Systems cluster and moves tabular data in and out of it.
//!
//! Scripts are executed through an [`gateway::EclGateway`]; the provided
//! [`gateway::Connection`] drives the `ecl`/`eclcc` client tools installed on this machine.
//!
//! ## Uploading ("spraying") a dataset
//!
//! A local dataset is written to a logical file by generating ECL that embeds the rows as an
//! inline dataset. Datasets larger than one chunk are written concurrently as temporary files
//! (`TEMPHPYCC::<target>from<start>to<end>`) which are then concatenated into the target in row
//! order and deleted.
//!
//! ```no_run
//! use hpcc_client::config::ConnectionConfig;
//! use hpcc_client::gateway::Connection;
//! use hpcc_client::spray::{SprayOptions, Sprayer};
//!
//! # fn main() -> Result<(), hpcc_client::HpccError> {
//! let conn = Connection::new(ConnectionConfig::from_env()?);
//! let sprayer = Sprayer::new(conn, SprayOptions { overwrite: true, ..Default::default() })?;
//! let report = sprayer.spray_file("people.csv", "thor::people")?;
//! println!("{} rows via {:?}", report.rows, report.path);
//! # Ok(())
//! # }
//! ```
//!
//! Column names are sanitized into ECL identifiers and every column is declared `STRING` unless
//! [`ecl::TypePolicy::Inferred`] is selected.
//!
//! ## Reading results
//!
//! ```no_run
//! use hpcc_client::config::ConnectionConfig;
//! use hpcc_client::gateway::{Connection, RunOptions, ScriptSource};
//! use hpcc_client::results::get_output;
//!
//! # fn main() -> Result<(), hpcc_client::HpccError> {
//! let conn = Connection::new(ConnectionConfig::new("10.0.0.5"));
//! let ds = get_output(&conn, ScriptSource::Text("OUTPUT(DATASET([{1}], {INTEGER n}));"), &RunOptions::default())?;
//! println!("rows={}", ds.row_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: connection settings from defaults, JSON and `HPCC_*` environment variables
//! - [`gateway`]: the script execution seam, the `ecl` process gateway and syntax checking
//! - [`ecl`]: record layouts, literal serialization and script text
//! - [`execution`]: chunk planning and bounded-concurrency chunk execution with metrics
//! - [`spray`]: uploading datasets to logical files
//! - [`download`]: reading logical files in parallel chunks
//! - [`results`]: parsing script outputs
//! - [`save`]: writing outputs and logical files to CSV
//! - [`delete`]: removing logical files
//! - [`ingestion`]: loading local delimited files
//! - [`types`]: the in-memory dataset model

pub mod config;
pub mod delete;
pub mod download;
pub mod ecl;
pub mod error;
pub mod execution;
pub mod gateway;
pub mod ingestion;
pub mod results;
pub mod save;
pub mod spray;
pub mod types;

pub use error::{HpccError, HpccResult};

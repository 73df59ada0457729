//! ECL text generation.
//!
//! - [`record`]: derive an ECL record layout from a [`crate::types::DataSet`]
//! - [`literal`]: render cells as ECL literals and serialize row ranges as inline datasets
//! - [`script`]: assemble the scripts the cluster runs (write, concatenate, read, delete)

pub mod literal;
pub mod record;
pub mod script;

pub use literal::LiteralTable;
pub use record::{EclType, RecordField, RecordSchema, TypePolicy};
pub use script::FileLayout;

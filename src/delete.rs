//! Deleting logical files.

use tracing::info;

use crate::ecl::script;
use crate::error::HpccResult;
use crate::gateway::{EclGateway, RunOptions};

/// Delete `logical_file`. A file that does not exist is not an error.
pub fn delete_logical_file<G: EclGateway + ?Sized>(
    gateway: &G,
    logical_file: &str,
    delete_workunit: bool,
) -> HpccResult<()> {
    delete_logical_files(gateway, &[logical_file], delete_workunit)
}

/// Delete every file in `logical_files` with a single script.
pub fn delete_logical_files<G, S>(gateway: &G, logical_files: &[S], delete_workunit: bool) -> HpccResult<()>
where
    G: EclGateway + ?Sized,
    S: AsRef<str>,
{
    if logical_files.is_empty() {
        return Ok(());
    }
    info!(files = logical_files.len(), "deleting logical files");
    let script = script::delete_script(logical_files);
    gateway
        .run_string(&script, &RunOptions::generated(delete_workunit))?
        .into_checked(logical_files[0].as_ref())?;
    Ok(())
}

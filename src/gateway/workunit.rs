use crate::config::ConnectionConfig;
use crate::error::HpccResult;

/// ESP URL deleting workunit `wuid`.
pub(crate) fn delete_url(config: &ConnectionConfig, wuid: &str) -> String {
    format!("{}/WsWorkunits/WUDelete.json?Wuids={wuid}", config.base_url())
}

/// Delete a completed workunit through the ESP REST interface.
pub(crate) fn delete_workunit(
    client: &reqwest::blocking::Client,
    config: &ConnectionConfig,
    wuid: &str,
) -> HpccResult<()> {
    let mut request = client.get(delete_url(config, wuid));
    if let Some(password) = &config.password {
        request = request.basic_auth(&config.username, Some(password));
    }
    request.send()?.error_for_status()?;
    Ok(())
}

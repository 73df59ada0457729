//! Process-based gateway: runs scripts with the `ecl` client tool.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use super::{EclGateway, EclOutput, RunOptions, ScriptSource, StoredValue, syntax, workunit};
use crate::config::ConnectionConfig;
use crate::error::{HpccError, HpccResult};

static SCRIPT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A cluster reached through the locally installed `ecl` and `eclcc` tools.
///
/// Inline scripts are written to a temporary `.ecl` file for the duration of the run.
#[derive(Debug)]
pub struct Connection {
    config: ConnectionConfig,
    http: OnceLock<reqwest::blocking::Client>,
}

impl Connection {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            http: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Arguments for `ecl run` on `script`.
    pub fn run_args(&self, script: &Path, stored: &BTreeMap<String, StoredValue>) -> Vec<String> {
        let cfg = &self.config;
        let mut args = vec![
            "run".to_string(),
            "-v".to_string(),
            format!("--server={}", cfg.host()),
            format!("--port={}", cfg.port),
            format!("--username={}", cfg.username),
        ];
        if let Some(password) = &cfg.password {
            args.push(format!("--password={password}"));
        }
        if cfg.legacy {
            args.push("-legacy".to_string());
        }
        if let Some(repo) = &cfg.repo {
            args.push("-I".to_string());
            args.push(repo.display().to_string());
        }
        for (name, value) in stored {
            args.push(format!("-X{name}={value}"));
        }
        args.push(cfg.cluster.clone());
        args.push(script.display().to_string());
        args
    }

    /// Arguments for `eclcc -syntax` on `script`.
    pub fn syntax_args(&self, script: &Path) -> Vec<String> {
        let mut args = vec!["-syntax".to_string()];
        if self.config.legacy {
            args.push("-legacy".to_string());
        }
        if let Some(repo) = &self.config.repo {
            args.push("-I".to_string());
            args.push(repo.display().to_string());
        }
        args.push(script.display().to_string());
        args
    }

    /// Compile `script` without running it.
    pub fn syntax_check(&self, script: &Path) -> HpccResult<()> {
        if !script.is_file() {
            return Err(HpccError::invalid_input(format!(
                "script {} not found",
                script.display()
            )));
        }
        let out = execute(&self.config.eclcc_binary, &self.syntax_args(script))?;
        syntax::check(&script.display().to_string(), &out.stderr)
    }

    fn run_path(&self, script: &Path, options: &RunOptions) -> HpccResult<EclOutput> {
        if options.syntax_check {
            self.syntax_check(script)?;
        }
        info!(script = %script.display(), cluster = %self.config.cluster, "running script");
        let out = execute(&self.config.ecl_binary, &self.run_args(script, &options.stored))?;
        debug!(stdout_len = out.stdout.len(), stderr_len = out.stderr.len(), "script finished");

        if options.delete_workunit {
            match out.wuid() {
                Some(wuid) => {
                    if let Err(e) = self.delete_workunit(wuid) {
                        warn!(wuid, error = %e, "failed to delete workunit");
                    }
                }
                None => debug!("no wuid in output; nothing to delete"),
            }
        }
        Ok(out)
    }

    fn delete_workunit(&self, wuid: &str) -> HpccResult<()> {
        let client = match self.http.get() {
            Some(c) => c,
            None => {
                let built = reqwest::blocking::Client::builder().build()?;
                self.http.get_or_init(|| built)
            }
        };
        workunit::delete_workunit(client, &self.config, wuid)
    }
}

impl EclGateway for Connection {
    fn run(&self, script: ScriptSource<'_>, options: &RunOptions) -> HpccResult<EclOutput> {
        match script {
            ScriptSource::Path(path) => self.run_path(path, options),
            ScriptSource::Text(text) => {
                let file = TempScript::write(text)?;
                self.run_path(file.path(), options)
            }
        }
    }
}

fn execute(program: &str, args: &[String]) -> HpccResult<EclOutput> {
    let output = Command::new(program).args(args).output()?;
    Ok(EclOutput::new(
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr),
    ))
}

/// A uniquely named script file in the temp directory, removed on drop.
struct TempScript {
    path: PathBuf,
}

impl TempScript {
    fn write(text: &str) -> HpccResult<Self> {
        let n = SCRIPT_COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!("hpcc_client_{}_{n}.ecl", std::process::id()));
        fs::write(&path, text)?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempScript {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove temporary script");
        }
    }
}

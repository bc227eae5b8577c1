//! Finding (and if needed starting) the local backend.

use crate::client::rpc_client::RpcClient;
use crate::config::{Config, SERVICE_NAME};
use crate::error::DeskError;
use crate::runtime::PortFile;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Reads the port file and checks `/health` for the expected service.
#[derive(Debug, Clone)]
pub struct BackendLocator {
    port_file: PortFile,
    host: String,
    poll_interval: Duration,
    probe_timeout: Duration,
}

impl BackendLocator {
    pub fn new(port_file: PortFile) -> Self {
        Self {
            port_file,
            host: "127.0.0.1".to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let mut locator = Self::new(PortFile::new(cfg.port_file()));
        locator.host = cfg.host.clone();
        locator
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// One attempt: port file present, `/health` answers, identity matches.
    pub async fn probe(&self) -> Result<RpcClient, DeskError> {
        let port = self.port_file.read().await.ok_or_else(|| {
            DeskError::ServiceUnavailable(format!(
                "no backend port published at {}",
                self.port_file.path().display()
            ))
        })?;
        let base = Url::parse(&format!("http://{}:{port}/", self.host))?;
        let client = RpcClient::new(base).with_timeout(self.probe_timeout);
        let health = client.health().await?;
        if health.service != SERVICE_NAME {
            return Err(DeskError::ServiceUnavailable(format!(
                "port {port} is held by `{}`, not {SERVICE_NAME}",
                health.service
            )));
        }
        debug!(port, version = %health.version, "backend found");
        Ok(client.with_timeout(crate::client::rpc_client::DEFAULT_CALL_TIMEOUT))
    }

    /// Probe until one succeeds or `deadline` passes.
    pub async fn wait(&self, deadline: Duration) -> Result<RpcClient, DeskError> {
        self.wait_for(deadline, None).await
    }

    async fn wait_for(
        &self,
        deadline: Duration,
        mut child: Option<&mut Child>,
    ) -> Result<RpcClient, DeskError> {
        let give_up = Instant::now() + deadline;
        loop {
            let last = match self.probe().await {
                Ok(client) => return Ok(client),
                Err(e) => e,
            };
            if let Some(child) = child.as_deref_mut()
                && let Ok(Some(status)) = child.try_wait()
            {
                return Err(DeskError::ServiceUnavailable(format!(
                    "backend exited during startup with {status}"
                )));
            }
            if Instant::now() + self.poll_interval > give_up {
                return Err(DeskError::Timeout(format!(
                    "backend not reachable within {deadline:?}: {last}"
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// How to start the backend executable.
#[derive(Debug, Clone)]
pub struct BackendLauncher {
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
}

impl BackendLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Start detached from the caller's console and process group.
    pub fn spawn(&self) -> Result<Child, DeskError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);

        #[cfg(unix)]
        cmd.process_group(0);

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let child = cmd.spawn()?;
        info!(program = %self.program.display(), pid = ?child.id(), "backend spawned");
        Ok(child)
    }
}

/// Reuse a running backend, else spawn one and wait for it to publish its port.
/// The child handle is returned when a process was started.
pub async fn connect_or_spawn(
    locator: &BackendLocator,
    launcher: Option<&BackendLauncher>,
    deadline: Duration,
) -> Result<(RpcClient, Option<Child>), DeskError> {
    match locator.probe().await {
        Ok(client) => return Ok((client, None)),
        Err(e) => debug!(error = %e, "no running backend"),
    }
    let Some(launcher) = launcher else {
        return locator.wait(deadline).await.map(|c| (c, None));
    };
    let mut child = launcher.spawn()?;
    match locator.wait_for(deadline, Some(&mut child)).await {
        Ok(client) => Ok((client, Some(child))),
        Err(e) => {
            warn!(error = %e, "spawned backend did not come up");
            let _ = child.start_kill();
            Err(e)
        }
    }
}

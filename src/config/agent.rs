use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_IPAM_ROOT;
use crate::constants::LOG_FILE_NAME;
use crate::host_prefix;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AgentSettings {
    /// Name the allocator records this host's blocks under
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Root of the per-host allocation tree
    #[serde(default = "default_ipam_root")]
    pub ipam_root: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            ipam_root: default_ipam_root(),
            log_dir: default_log_dir(),
        }
    }
}

impl AgentSettings {
    pub fn validate(&self) -> Result<()> {
        if self.hostname.trim().is_empty() {
            return Err(Error::InvalidConfig("agent.hostname cannot be empty".into()));
        }
        if self.hostname.contains('/') {
            return Err(Error::InvalidConfig(format!(
                "agent.hostname {} must not contain '/'",
                self.hostname
            )));
        }
        if !self.ipam_root.starts_with('/') {
            return Err(Error::InvalidConfig(format!(
                "agent.ipam_root {} must be an absolute key path",
                self.ipam_root
            )));
        }
        if self.log_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("agent.log_dir cannot be empty".into()));
        }
        Ok(())
    }

    pub fn host_prefix(&self) -> String {
        host_prefix(&self.ipam_root, &self.hostname)
    }

    /// File the process log is appended to
    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE_NAME)
    }
}

fn default_hostname() -> String {
    "localhost".into()
}
fn default_ipam_root() -> String {
    DEFAULT_IPAM_ROOT.into()
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

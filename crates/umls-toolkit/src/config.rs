//! Connection and toolkit settings.
//!
//! Both structs can be built directly, loaded from the environment, or
//! deserialized. Nothing here substitutes defaults for the database
//! connection: every field must be supplied.

use crate::error::ToolkitError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// MySQL connection settings forwarded to every toolkit invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub hostname: String,
    pub socket: String,
    pub database: String,
}

impl ConnectionConfig {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        hostname: impl Into<String>,
        socket: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            hostname: hostname.into(),
            socket: socket.into(),
            database: database.into(),
        }
    }

    /// Load connection settings from environment variables.
    ///
    /// Required:
    /// - UMLS_USERNAME
    /// - UMLS_PASSWORD
    /// - UMLS_HOSTNAME
    /// - UMLS_SOCKET
    /// - UMLS_DATABASE
    pub fn from_env() -> Result<Self> {
        let read = |key: &'static str, field: &'static str| {
            std::env::var(key).map_err(|_| ToolkitError::MissingConnectionField(field))
        };

        let config = Self {
            username: read("UMLS_USERNAME", "username")?,
            password: read("UMLS_PASSWORD", "password")?,
            hostname: read("UMLS_HOSTNAME", "hostname")?,
            socket: read("UMLS_SOCKET", "socket")?,
            database: read("UMLS_DATABASE", "database")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject empty settings before anything is spawned.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("database", &self.database),
            ("username", &self.username),
            ("password", &self.password),
            ("hostname", &self.hostname),
            ("socket", &self.socket),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(ToolkitError::MissingConnectionField(name));
            }
        }
        Ok(())
    }

    /// Connection flags in the order the scripts document them.
    pub(crate) fn flags(&self) -> [(&'static str, &str); 5] {
        [
            ("--database", &self.database),
            ("--username", &self.username),
            ("--password", &self.password),
            ("--hostname", &self.hostname),
            ("--socket", &self.socket),
        ]
    }
}

/// Where the toolkit lives and how it is run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolkitConfig {
    /// Perl interpreter. When unset the script is executed directly.
    pub perl_bin: Option<PathBuf>,

    /// Directory holding the toolkit scripts; also the child's working dir.
    pub script_dir: PathBuf,

    /// Kill the child after this many seconds (0 = no limit).
    pub timeout_secs: u64,

    /// Pass `--forcerun` so the toolkit skips its interactive prompt.
    pub forcerun: bool,

    /// Decimal places requested from the similarity script.
    pub precision: u32,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            perl_bin: None,
            script_dir: PathBuf::from("."),
            timeout_secs: 0,
            forcerun: true,
            precision: 4,
        }
    }
}

impl ToolkitConfig {
    pub fn new(script_dir: impl Into<PathBuf>) -> Self {
        Self {
            script_dir: script_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_perl(mut self, perl_bin: impl Into<PathBuf>) -> Self {
        self.perl_bin = Some(perl_bin.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Load toolkit settings from environment variables.
    ///
    /// - UMLS_SCRIPT_DIR (optional, default: ".")
    /// - UMLS_PERL_BIN (optional)
    /// - UMLS_TIMEOUT_SECS (optional, default: 0)
    /// - UMLS_PRECISION (optional, default: 4)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            perl_bin: std::env::var("UMLS_PERL_BIN").ok().map(PathBuf::from),
            script_dir: std::env::var("UMLS_SCRIPT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.script_dir),
            timeout_secs: std::env::var("UMLS_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            forcerun: defaults.forcerun,
            precision: std::env::var("UMLS_PRECISION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.precision),
        }
    }

    /// Full path of a script inside `script_dir`.
    pub fn script_path(&self, file_name: &str) -> PathBuf {
        self.script_dir.join(file_name)
    }

    pub fn script_dir(&self) -> &Path {
        &self.script_dir
    }
}

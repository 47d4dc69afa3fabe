//! Oracle client detection.
//!
//! Looks for a usable client in `ORACLE_HOME`, then in common install roots,
//! then for client tools on `PATH`, and probes its version with
//! `sqlplus -version`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use serde::Serialize;

use crate::fsutil;

/// Major versions ora2pg is known to work with.
pub const SUPPORTED_MAJORS: &[&str] = &["11", "12", "18", "19", "21"];
const PATH_TOOLS: &[&str] = &["sqlplus", "tnsping", "lsnrctl"];

static VERSION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"Release\s+(\d+\.\d+\.\d+\.\d+\.\d+)",
        r"Version\s+(\d+\.\d+\.\d+\.\d+\.\d+)",
        r"(\d+\.\d+\.\d+\.\d+\.\d+)",
        r"(\d+\.\d+\.\d+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub installed: bool,
    /// Empty when the version could not be probed.
    pub version: String,
    /// Installation directory, empty when only found on `PATH`.
    pub home: String,
    pub instant_client: bool,
    pub architecture: String,
    /// Directory of the tool found on `PATH`, if that is how it was found.
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientStatus {
    NotInstalled,
    Compatible,
    Incompatible,
    UnknownVersion,
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotInstalled => "not installed",
            Self::Compatible => "compatible",
            Self::Incompatible => "incompatible",
            Self::UnknownVersion => "unknown version",
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientStatusReport {
    pub checked_at: DateTime<Utc>,
    pub status: ClientStatus,
    pub message: String,
    pub client: ClientInfo,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallationGuide {
    pub platform: String,
    pub download_url: String,
    pub instructions: Vec<String>,
}

/// First version-looking string in `sqlplus -version` output.
pub fn parse_version(output: &str) -> Option<String> {
    VERSION_PATTERNS
        .iter()
        .find_map(|re| re.captures(output))
        .map(|caps| caps[1].to_string())
}

pub fn is_compatible(version: &str) -> bool {
    let major = version.split('.').next().unwrap_or_default();
    !version.is_empty() && SUPPORTED_MAJORS.contains(&major)
}

fn exe(name: &str) -> String {
    if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

fn is_instant_client(path: &Path) -> bool {
    path.to_string_lossy()
        .to_ascii_lowercase()
        .contains("instantclient")
}

/// A full client has `bin/sqlplus` and `lib/`; an instant client has
/// `sqlplus` at its root.
fn is_valid_home(home: &Path) -> bool {
    if !fsutil::dir_exists(home) {
        return false;
    }
    if is_instant_client(home) {
        fsutil::file_exists(&home.join(exe("sqlplus")))
    } else {
        fsutil::file_exists(&home.join("bin").join(exe("sqlplus")))
            && fsutil::dir_exists(&home.join("lib"))
    }
}

fn common_roots() -> Vec<PathBuf> {
    let roots: Vec<String> = if cfg!(windows) {
        ["C:", "D:", "E:"]
            .iter()
            .flat_map(|drive| {
                [
                    r"\app\oracle\product",
                    r"\oracle\product",
                    r"\Oracle\instantclient",
                    r"\instantclient",
                    r"\Program Files\Oracle",
                    r"\Program Files (x86)\Oracle",
                ]
                .map(|p| format!("{drive}{p}"))
            })
            .collect()
    } else if cfg!(target_os = "macos") {
        ["/opt/oracle", "/usr/local/oracle", "/Applications/Oracle", "/opt/instantclient"]
            .map(String::from)
            .to_vec()
    } else {
        [
            "/opt/oracle",
            "/usr/lib/oracle",
            "/home/oracle",
            "/opt/instantclient",
            "/usr/local/oracle",
        ]
        .map(String::from)
        .to_vec()
    };
    roots.into_iter().map(PathBuf::from).collect()
}

fn subdirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

/// Roots themselves, then up to two levels of subdirectories below each.
fn expand_roots(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut expanded = Vec::new();
    for root in roots {
        for child in subdirs(root) {
            let grandchildren = subdirs(&child);
            expanded.push(child);
            expanded.extend(grandchildren);
        }
    }
    roots.iter().cloned().chain(expanded).collect()
}

pub struct ClientDetector {
    oracle_home: Option<PathBuf>,
    roots: Vec<PathBuf>,
    path_dirs: Vec<PathBuf>,
}

impl ClientDetector {
    /// Detector over the real environment: `ORACLE_HOME`, the platform's
    /// usual install roots, and `PATH`.
    pub fn from_env() -> Self {
        Self {
            oracle_home: std::env::var_os("ORACLE_HOME")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            roots: common_roots(),
            path_dirs: std::env::var_os("PATH")
                .map(|p| std::env::split_paths(&p).collect())
                .unwrap_or_default(),
        }
    }

    pub fn new(oracle_home: Option<PathBuf>, roots: Vec<PathBuf>, path_dirs: Vec<PathBuf>) -> Self {
        Self {
            oracle_home,
            roots,
            path_dirs,
        }
    }

    pub fn detect(&self) -> ClientInfo {
        let mut info = ClientInfo {
            architecture: std::env::consts::ARCH.to_string(),
            ..Default::default()
        };

        if let Some(home) = &self.oracle_home {
            tracing::debug!(home = %home.display(), "checking ORACLE_HOME");
            info.home = home.display().to_string();
            if is_valid_home(home) {
                info.installed = true;
                info.instant_client = is_instant_client(home);
                self.probe_version(&mut info);
                return info;
            }
        }

        if let Some(home) = expand_roots(&self.roots)
            .into_iter()
            .find(|p| is_valid_home(p))
        {
            tracing::debug!(home = %home.display(), "found Oracle client");
            info.home = home.display().to_string();
            info.installed = true;
            info.instant_client = is_instant_client(&home);
            self.probe_version(&mut info);
            return info;
        }

        for tool in PATH_TOOLS {
            if let Some(found) = fsutil::find_in(tool, self.path_dirs.iter().cloned()) {
                tracing::debug!(tool, path = %found.display(), "found Oracle tool on PATH");
                info.home.clear();
                info.installed = true;
                info.path = found
                    .parent()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                self.probe_version(&mut info);
                return info;
            }
        }

        tracing::warn!("no Oracle client detected");
        info.home.clear();
        info
    }

    fn sqlplus_path(&self, info: &ClientInfo) -> Option<PathBuf> {
        if !info.home.is_empty() {
            let home = Path::new(&info.home);
            return Some(if info.instant_client {
                home.join(exe("sqlplus"))
            } else {
                home.join("bin").join(exe("sqlplus"))
            });
        }
        if !info.path.is_empty() {
            return Some(Path::new(&info.path).join(exe("sqlplus")));
        }
        fsutil::find_in("sqlplus", self.path_dirs.iter().cloned())
    }

    fn probe_version(&self, info: &mut ClientInfo) {
        let Some(sqlplus) = self.sqlplus_path(info).filter(|p| p.is_file()) else {
            tracing::debug!("sqlplus not found, version unknown");
            return;
        };
        let output = Command::new(&sqlplus)
            .arg("-version")
            .stdin(Stdio::null())
            .output();
        match output {
            Ok(out) if out.status.success() => {
                if let Some(version) = parse_version(&String::from_utf8_lossy(&out.stdout)) {
                    tracing::debug!(%version, "detected Oracle client version");
                    info.version = version;
                }
            }
            Ok(out) => tracing::debug!(status = %out.status, "sqlplus -version failed"),
            Err(e) => tracing::debug!(error = %e, "could not run sqlplus"),
        }
    }

    pub fn status_report(&self) -> ClientStatusReport {
        let client = self.detect();
        let (status, message, recommendations): (_, _, &[&str]) = if !client.installed {
            (
                ClientStatus::NotInstalled,
                "no Oracle client detected".to_string(),
                &[
                    "install Oracle Instant Client or a full Oracle client",
                    "set the ORACLE_HOME environment variable",
                    "add the client directory to PATH",
                ],
            )
        } else if client.version.is_empty() {
            (
                ClientStatus::UnknownVersion,
                "Oracle client installed, but its version could not be determined".to_string(),
                &[
                    "check that sqlplus runs",
                    "verify the client installation is complete",
                ],
            )
        } else if is_compatible(&client.version) {
            (
                ClientStatus::Compatible,
                format!("Oracle client {} installed and compatible", client.version),
                &[],
            )
        } else {
            (
                ClientStatus::Incompatible,
                format!("Oracle client {} may not be compatible", client.version),
                &[
                    "use Oracle 11g, 12c, 18c, 19c or 21c",
                    "consider upgrading to a supported release",
                ],
            )
        };

        ClientStatusReport {
            checked_at: Utc::now(),
            status,
            message,
            client,
            recommendations: recommendations.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Download link and setup steps for the current platform.
pub fn installation_guide() -> InstallationGuide {
    installation_guide_for(std::env::consts::OS)
}

pub fn installation_guide_for(os: &str) -> InstallationGuide {
    let (url, steps): (&str, &[&str]) = match os {
        "windows" => (
            "https://www.oracle.com/database/technologies/instant-client/winx64-64-downloads.html",
            &[
                "download the Instant Client package for your system",
                "extract it to a directory such as C:\\instantclient",
                "add that directory to PATH",
                "set ORACLE_HOME to that directory",
                "restart your terminal so the variables take effect",
            ],
        ),
        "macos" => (
            "https://www.oracle.com/database/technologies/instant-client/macos-intel-x86-downloads.html",
            &[
                "download the Instant Client package for your system",
                "extract it to a directory such as /opt/instantclient",
                "export ORACLE_HOME=/opt/instantclient",
                "export PATH=$ORACLE_HOME:$PATH",
                "export DYLD_LIBRARY_PATH=$ORACLE_HOME:$DYLD_LIBRARY_PATH",
                "add the exports to ~/.zshrc or ~/.bash_profile",
            ],
        ),
        _ => (
            "https://www.oracle.com/database/technologies/instant-client/linux-x86-64-downloads.html",
            &[
                "download the Instant Client RPM or ZIP package for your system",
                "install or extract it to a directory such as /opt/instantclient",
                "export ORACLE_HOME=/opt/instantclient",
                "export PATH=$ORACLE_HOME:$PATH",
                "export LD_LIBRARY_PATH=$ORACLE_HOME:$LD_LIBRARY_PATH",
                "add the exports to ~/.bashrc or ~/.profile",
            ],
        ),
    };
    InstallationGuide {
        platform: os.to_string(),
        download_url: url.to_string(),
        instructions: steps.iter().map(|s| s.to_string()).collect(),
    }
}

//! LibreOffice discovery: find a usable `soffice` for a given host OS.
//!
//! Candidates are tried in a fixed order per OS. Absolute install locations
//! come first, bare command names looked up on `PATH` come last, so a known
//! installation wins over whatever wrapper happens to be first on `PATH`.
//!
//! Nothing here executes a program. The OS is passed in explicitly and the
//! filesystem is reached through [`Probe`], which keeps the ordering testable
//! against a fake filesystem.

use crate::envelope::Envelope;
use crate::error::RenderError;
use serde::Serialize;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Operating-system classification used for engine discovery and timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostOs {
    Windows,
    MacOs,
    /// Linux, BSDs and anything unrecognised.
    Unix,
}

impl HostOs {
    /// Classification of the platform this binary was built for.
    pub fn current() -> Self {
        Self::from_name(std::env::consts::OS)
    }

    /// Map an OS name (`std::env::consts::OS` style, or `win32` /
    /// `darwin`) to a classification. Unknown names fall back to [`HostOs::Unix`].
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "windows" | "win32" => HostOs::Windows,
            "macos" | "darwin" => HostOs::MacOs,
            _ => HostOs::Unix,
        }
    }

    /// How long the engine may run before it is killed.
    ///
    /// Windows gets longer because LibreOffice's first-run profile
    /// initialisation there regularly exceeds two minutes.
    pub fn conversion_timeout(self) -> Duration {
        match self {
            HostOs::Windows => Duration::from_secs(180),
            HostOs::MacOs | HostOs::Unix => Duration::from_secs(120),
        }
    }

    /// Ordered engine candidates for this OS.
    pub fn candidates(self) -> &'static [Candidate] {
        match self {
            HostOs::Windows => &[
                Candidate::InstallPath(r"C:\Program Files\LibreOffice\program\soffice.exe"),
                Candidate::InstallPath(r"C:\Program Files (x86)\LibreOffice\program\soffice.exe"),
                Candidate::Command("soffice.exe"),
                Candidate::Command("soffice"),
            ],
            HostOs::MacOs => &[
                Candidate::InstallPath("/Applications/LibreOffice.app/Contents/MacOS/soffice"),
                Candidate::Command("libreoffice"),
                Candidate::Command("soffice"),
            ],
            HostOs::Unix => &[
                Candidate::InstallPath("/usr/lib/libreoffice/program/soffice"),
                Candidate::InstallPath("/opt/libreoffice/program/soffice"),
                Candidate::Command("libreoffice"),
                Candidate::Command("soffice"),
            ],
        }
    }
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HostOs::Windows => "windows",
            HostOs::MacOs => "macos",
            HostOs::Unix => "unix",
        })
    }
}

/// One place the engine might live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    /// Absolute path, accepted if it is an existing file.
    InstallPath(&'static str),
    /// Command name, accepted if the executable search path resolves it.
    Command(&'static str),
}

/// Read-only view of the filesystem and search path.
pub trait Probe {
    fn is_file(&self, path: &Path) -> bool;
    fn find_on_path(&self, command: &str) -> Option<PathBuf>;
}

/// [`Probe`] backed by the real filesystem and the process `PATH`.
#[derive(Debug, Clone, Default)]
pub struct HostProbe {
    search_path: Option<OsString>,
    /// Extensions tried for commands without one (`PATHEXT`, Windows only).
    extensions: Vec<String>,
}

impl HostProbe {
    pub fn from_env() -> Self {
        let extensions = if cfg!(windows) {
            std::env::var("PATHEXT")
                .unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string())
                .split(';')
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect()
        } else {
            Vec::new()
        };
        Self {
            search_path: std::env::var_os("PATH"),
            extensions,
        }
    }
}

impl Probe for HostProbe {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn find_on_path(&self, command: &str) -> Option<PathBuf> {
        let search_path = self.search_path.as_ref()?;
        let has_extension = Path::new(command).extension().is_some();

        for dir in std::env::split_paths(search_path) {
            let direct = dir.join(command);
            if is_executable(&direct) {
                return Some(direct);
            }
            if !has_extension {
                for ext in &self.extensions {
                    let with_ext = dir.join(format!("{command}{ext}"));
                    if is_executable(&with_ext) {
                        return Some(with_ext);
                    }
                }
            }
        }
        None
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Locate LibreOffice on this host.
pub fn resolve(os: HostOs) -> Result<PathBuf, RenderError> {
    resolve_with(os, &HostProbe::from_env())
}

/// Locate LibreOffice using an explicit [`Probe`].
pub fn resolve_with(os: HostOs, probe: &dyn Probe) -> Result<PathBuf, RenderError> {
    for candidate in os.candidates() {
        let found = match *candidate {
            Candidate::InstallPath(p) => {
                let path = Path::new(p);
                probe.is_file(path).then(|| path.to_path_buf())
            }
            Candidate::Command(name) => probe.find_on_path(name),
        };
        if let Some(path) = found {
            debug!("Engine candidate {:?} resolved to {}", candidate, path.display());
            return Ok(path);
        }
    }

    Err(RenderError::EngineNotFound {
        os,
        hint: install_instructions(os).to_string(),
    })
}

/// Use `explicit` if given, otherwise run discovery.
///
/// An explicit path that is not a file is reported as not found rather than
/// silently falling back to discovery.
pub fn locate(os: HostOs, explicit: Option<&Path>) -> Result<PathBuf, RenderError> {
    match explicit {
        Some(path) if path.is_file() => Ok(path.to_path_buf()),
        Some(path) => Err(RenderError::EngineNotFound {
            os,
            hint: format!(
                "The configured engine path '{}' does not exist.\n{}",
                path.display(),
                install_instructions(os)
            ),
        }),
        None => resolve(os),
    }
}

/// Install instructions shown when no engine is found.
pub fn install_instructions(os: HostOs) -> &'static str {
    match os {
        HostOs::Windows => {
            "Install LibreOffice:\n  \
             1. Download from https://www.libreoffice.org/download/\n  \
             2. Run the installer (default location: C:\\Program Files\\LibreOffice)\n  \
             3. Or use chocolatey: choco install libreoffice"
        }
        HostOs::MacOs => {
            "Install LibreOffice:\n  \
             1. Download from https://www.libreoffice.org/download/\n  \
             2. Or use Homebrew: brew install --cask libreoffice"
        }
        HostOs::Unix => {
            "Install LibreOffice:\n  \
             1. Ubuntu/Debian: sudo apt-get install libreoffice\n  \
             2. Fedora/RHEL: sudo dnf install libreoffice\n  \
             3. Arch: sudo pacman -S libreoffice-fresh\n  \
             Or download from https://www.libreoffice.org/download/"
        }
    }
}

/// Result of a `--locate-engine` run.
#[derive(Debug, Clone, Serialize)]
pub struct EngineLocation {
    pub engine: PathBuf,
    pub os: HostOs,
}

/// The `--locate-engine` answer for `os`, as written to the output stream.
pub fn locate_report(os: HostOs, explicit: Option<&Path>) -> Envelope<EngineLocation> {
    locate(os, explicit)
        .map(|engine| EngineLocation { engine, os })
        .into()
}

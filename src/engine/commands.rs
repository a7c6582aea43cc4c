//! Platform-specific engine command catalogue.

use std::fmt::{Display, Formatter};

use crate::config::EngineConfig;
use crate::engine::runner::EngineCommand;

/// Docker install script fetched and piped to `sh` on Linux.
pub const LINUX_INSTALL_SCRIPT: &str = "curl -fsSL https://get.docker.com | sh";

/// Where users are sent when automatic installation is not available.
pub const MANUAL_INSTALL_URL: &str = "https://docs.docker.com/get-docker/";

/// Host platform as far as engine remediation is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    /// macOS: Homebrew install, `open -a Docker` start.
    MacOs,
    /// Linux: vendor install script, `systemctl` start.
    Linux,
    /// Anything else; no automatic install or start.
    Unsupported(String),
}

impl Platform {
    /// Platform of the running host.
    #[must_use]
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Map an OS identifier (as in `std::env::consts::OS`) to a platform.
    #[must_use]
    pub fn from_os(os: &str) -> Self {
        match os {
            "macos" => Self::MacOs,
            "linux" => Self::Linux,
            other => Self::Unsupported(other.to_owned()),
        }
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MacOs => f.write_str("macos"),
            Self::Linux => f.write_str("linux"),
            Self::Unsupported(os) => f.write_str(os),
        }
    }
}

/// Every external command the probe and bootstrapper may invoke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommands {
    /// Platform the remediation commands were chosen for.
    pub platform: Platform,
    /// Read-only: engine version query.
    pub version: EngineCommand,
    /// Read-only: live container listing (requires a running daemon).
    pub list: EngineCommand,
    /// Read-only: image id lookup by tag; empty output means absent.
    pub image_lookup: EngineCommand,
    /// Install procedure, if the platform has one.
    pub install: Option<EngineCommand>,
    /// Daemon start procedure, if the platform has one.
    pub start: Option<EngineCommand>,
    /// Image build against the configured tag and context.
    pub build: EngineCommand,
}

impl EngineCommands {
    /// Build the catalogue for `platform` from engine settings.
    #[must_use]
    pub fn for_platform(config: &EngineConfig, platform: Platform) -> Self {
        let binary = config.binary.as_str();
        let (install, start) = match platform {
            Platform::MacOs => (
                Some(EngineCommand::new("brew", ["install", "--cask", "docker"])),
                Some(EngineCommand::new("open", ["-a", "Docker"])),
            ),
            Platform::Linux => (
                Some(EngineCommand::shell(LINUX_INSTALL_SCRIPT)),
                Some(EngineCommand::new("sudo", ["systemctl", "start", "docker"])),
            ),
            Platform::Unsupported(_) => (None, None),
        };

        Self {
            platform,
            version: EngineCommand::new(binary, ["--version"]),
            list: EngineCommand::new(binary, ["ps"]),
            image_lookup: EngineCommand::new(binary, ["images", "-q", config.image_tag.as_str()]),
            install,
            start,
            build: EngineCommand::new(
                binary,
                [
                    "build".to_owned(),
                    "-t".to_owned(),
                    config.image_tag.clone(),
                    config.build_context.to_string_lossy().into_owned(),
                ],
            ),
        }
    }

    /// Catalogue for the running host.
    #[must_use]
    pub fn for_current_platform(config: &EngineConfig) -> Self {
        Self::for_platform(config, Platform::current())
    }
}

// src/platform.rs

//! Target platforms and their package subdirectories
//!
//! Built packages live in per-platform subdirectories named `<os>-<arch>`
//! (`linux-64`, `osx-arm64`, `win-64`), or in `noarch` when they are
//! platform independent.

use std::fmt;

/// Subdirectory name for platform-independent packages
pub const NOARCH_SUBDIR: &str = "noarch";

/// A target platform, identified by its package subdir
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    subdir: String,
    os: String,
    machine: String,
}

impl Platform {
    /// Build a platform from a subdir such as `linux-64` or `osx-arm64`
    ///
    /// Unknown subdirs are accepted; only the flags derived from them are
    /// limited to what can be inferred.
    pub fn from_subdir(subdir: &str) -> Self {
        let (os, arch) = subdir.split_once('-').unwrap_or((subdir, ""));
        let machine = match arch {
            "64" => "x86_64",
            "32" => "x86",
            "aarch64" => "aarch64",
            "arm64" => "arm64",
            "ppc64le" => "ppc64le",
            "s390x" => "s390x",
            "armv7l" => "armv7l",
            other => other,
        };

        Self {
            subdir: subdir.to_string(),
            os: os.to_string(),
            machine: machine.to_string(),
        }
    }

    /// Detect the platform of the running system
    pub fn detect() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "osx",
            "windows" => "win",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "64",
            "x86" => "32",
            "aarch64" if os == "osx" => "arm64",
            other => other,
        };
        Self::from_subdir(&format!("{}-{}", os, arch))
    }

    /// The package subdir (`linux-64`)
    pub fn subdir(&self) -> &str {
        &self.subdir
    }

    /// Operating system family (`linux`, `osx`, `win`)
    pub fn os(&self) -> &str {
        &self.os
    }

    /// Machine architecture (`x86_64`, `arm64`, ...)
    pub fn machine(&self) -> &str {
        &self.machine
    }

    /// Whether this is the `noarch` pseudo-platform
    pub fn is_noarch(&self) -> bool {
        self.subdir == NOARCH_SUBDIR
    }

    /// Boolean selector flags that hold on this platform
    pub fn flags(&self) -> Vec<&'static str> {
        if self.is_noarch() {
            return vec!["noarch"];
        }

        let mut flags = Vec::new();
        match self.os.as_str() {
            "linux" => flags.extend(["linux", "unix"]),
            "osx" => flags.extend(["osx", "unix"]),
            "win" => flags.push("win"),
            _ => {}
        }
        match self.machine.as_str() {
            "x86_64" => flags.push("x86_64"),
            "x86" => flags.push("x86"),
            "aarch64" => flags.push("aarch64"),
            "arm64" => flags.push("arm64"),
            "ppc64le" => flags.push("ppc64le"),
            "s390x" => flags.push("s390x"),
            "armv7l" => flags.push("armv7l"),
            _ => {}
        }
        match self.subdir.as_str() {
            "linux-64" => flags.push("linux64"),
            "linux-32" => flags.push("linux32"),
            "osx-64" => flags.push("osx64"),
            "win-64" => flags.push("win64"),
            "win-32" => flags.push("win32"),
            _ => {}
        }
        flags
    }

    /// Whether a selector flag holds on this platform
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags().contains(&flag)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.subdir)
    }
}

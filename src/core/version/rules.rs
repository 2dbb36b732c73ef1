// ─── Platform Rules ───
// Library applicability rules, evaluated as data: top to bottom, the last
// matching rule decides.

use serde::{Deserialize, Serialize};

use crate::core::error::InstallResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Windows,
    Osx,
    Linux,
}

impl OsFamily {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            OsFamily::Windows
        } else if cfg!(target_os = "macos") {
            OsFamily::Osx
        } else {
            OsFamily::Linux
        }
    }

    /// Name used by version manifests.
    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Windows => "windows",
            OsFamily::Osx => "osx",
            OsFamily::Linux => "linux",
        }
    }
}

/// The execution platform rules are evaluated against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub name: OsFamily,
    /// OS version string, matched against rule version patterns.
    #[serde(default)]
    pub version: String,
    /// Architecture in manifest vocabulary (`x86`, `x64`, `arm64`).
    pub arch: String,
}

impl Platform {
    pub fn current() -> Self {
        let arch = match std::env::consts::ARCH {
            "x86_64" => "x64".to_string(),
            "x86" => "x86".to_string(),
            "aarch64" => "arm64".to_string(),
            other => other.to_string(),
        };
        Self {
            name: OsFamily::current(),
            version: sysinfo::System::os_version().unwrap_or_default(),
            arch,
        }
    }

    pub fn new(name: OsFamily, version: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            name,
            version: version.into(),
            arch: arch.into(),
        }
    }

    /// Substitution for `${arch}` in native classifiers.
    pub fn arch_bits(&self) -> &'static str {
        if self.arch.contains("64") {
            "64"
        } else {
            "32"
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Regular expression over the OS version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

impl OsRule {
    fn matches(&self, platform: &Platform) -> InstallResult<bool> {
        if let Some(name) = &self.name {
            if name != platform.name.as_str() {
                return Ok(false);
            }
        }
        if let Some(arch) = &self.arch {
            if arch != &platform.arch {
                return Ok(false);
            }
        }
        if let Some(pattern) = &self.version {
            if !regex::Regex::new(pattern)?.is_match(&platform.version) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub action: RuleAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,
    /// Launcher feature flags; never satisfied for library applicability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Rule {
    pub fn matches(&self, platform: &Platform) -> InstallResult<bool> {
        if self.features.is_some() {
            return Ok(false);
        }
        match &self.os {
            None => Ok(true),
            Some(os) => os.matches(platform),
        }
    }
}

/// `None` allows everything. Otherwise start from "disallowed" and let every
/// matching rule overwrite the verdict.
pub fn rules_allow(rules: Option<&[Rule]>, platform: &Platform) -> InstallResult<bool> {
    let Some(rules) = rules else {
        return Ok(true);
    };

    let mut allowed = false;
    for rule in rules {
        if rule.matches(platform)? {
            allowed = rule.action == RuleAction::Allow;
        }
    }
    Ok(allowed)
}

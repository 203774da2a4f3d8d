//! Version candidates, increment rules and operator selection.

use anyhow::Result;
use semver::{BuildMetadata, Prerelease, Version};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::VersionError;
use crate::prompt::Prompter;

/// Kind of version increment, named the way npm semver names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    Major,
    Premajor,
    Minor,
    Preminor,
    Patch,
    Prepatch,
    Prerelease,
}

impl ReleaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Premajor => "premajor",
            Self::Minor => "minor",
            Self::Preminor => "preminor",
            Self::Patch => "patch",
            Self::Prepatch => "prepatch",
            Self::Prerelease => "prerelease",
        }
    }
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "major" => Ok(Self::Major),
            "premajor" => Ok(Self::Premajor),
            "minor" => Ok(Self::Minor),
            "preminor" => Ok(Self::Preminor),
            "patch" => Ok(Self::Patch),
            "prepatch" => Ok(Self::Prepatch),
            "prerelease" => Ok(Self::Prerelease),
            _ => Err(format!("Unknown release type: {}", s)),
        }
    }
}

/// A proposed next version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub release_type: ReleaseType,
    pub version: Version,
}

/// What the operator picked at the version prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorChoice {
    Preset(ReleaseType),
    Custom(String),
}

/// Candidate versions reachable from `old`.
///
/// patch, minor and major are always offered; the four prerelease kinds are
/// added when `old` already carries a prerelease, continuing its identifier.
pub fn enumerate_candidates(old: &Version) -> Result<Vec<Candidate>, semver::Error> {
    let mut types = vec![ReleaseType::Patch, ReleaseType::Minor, ReleaseType::Major];
    if !old.pre.is_empty() {
        types.extend([
            ReleaseType::Prepatch,
            ReleaseType::Preminor,
            ReleaseType::Premajor,
            ReleaseType::Prerelease,
        ]);
    }

    let identifier = prerelease_identifier(old);
    types
        .into_iter()
        .map(|release_type| {
            Ok(Candidate {
                release_type,
                version: increment(old, release_type, identifier.as_deref())?,
            })
        })
        .collect()
}

/// First prerelease identifier when it is alphanumeric (`alpha`, `rc`, ...).
pub fn prerelease_identifier(version: &Version) -> Option<String> {
    version
        .pre
        .as_str()
        .split('.')
        .next()
        .filter(|id| !id.is_empty() && !is_numeric(id))
        .map(str::to_string)
}

/// Apply one increment, following npm semver `inc` semantics.
pub fn increment(
    current: &Version,
    release_type: ReleaseType,
    identifier: Option<&str>,
) -> Result<Version, semver::Error> {
    let mut next = current.clone();
    next.build = BuildMetadata::EMPTY;

    match release_type {
        ReleaseType::Major => {
            // 2.0.0-rc.1 is released as 2.0.0, not 3.0.0
            if next.minor != 0 || next.patch != 0 || next.pre.is_empty() {
                next.major += 1;
            }
            next.minor = 0;
            next.patch = 0;
            next.pre = Prerelease::EMPTY;
        }
        ReleaseType::Minor => {
            if next.patch != 0 || next.pre.is_empty() {
                next.minor += 1;
            }
            next.patch = 0;
            next.pre = Prerelease::EMPTY;
        }
        ReleaseType::Patch => {
            if next.pre.is_empty() {
                next.patch += 1;
            }
            next.pre = Prerelease::EMPTY;
        }
        ReleaseType::Premajor => {
            next.major += 1;
            next.minor = 0;
            next.patch = 0;
            next.pre = increment_prerelease(&Prerelease::EMPTY, identifier)?;
        }
        ReleaseType::Preminor => {
            next.minor += 1;
            next.patch = 0;
            next.pre = increment_prerelease(&Prerelease::EMPTY, identifier)?;
        }
        ReleaseType::Prepatch => {
            next.patch += 1;
            next.pre = increment_prerelease(&Prerelease::EMPTY, identifier)?;
        }
        ReleaseType::Prerelease => {
            if next.pre.is_empty() {
                next.patch += 1;
            }
            next.pre = increment_prerelease(&next.pre, identifier)?;
        }
    }

    Ok(next)
}

fn increment_prerelease(
    pre: &Prerelease,
    identifier: Option<&str>,
) -> Result<Prerelease, semver::Error> {
    let mut parts: Vec<String> = if pre.is_empty() {
        Vec::new()
    } else {
        pre.as_str().split('.').map(str::to_string).collect()
    };

    if parts.is_empty() {
        parts.push("0".to_string());
    } else {
        match parts.iter().rposition(|p| is_numeric(p)) {
            Some(idx) => {
                let n: u64 = parts[idx].parse().unwrap_or(0);
                parts[idx] = (n + 1).to_string();
            }
            None => parts.push("0".to_string()),
        }
    }

    if let Some(id) = identifier {
        let keeps_counter = parts[0] == id && parts.get(1).is_some_and(|p| is_numeric(p));
        if !keeps_counter {
            parts = vec![id.to_string(), "0".to_string()];
        }
    }

    Prerelease::new(&parts.join("."))
}

fn is_numeric(identifier: &str) -> bool {
    !identifier.is_empty() && identifier.bytes().all(|b| b.is_ascii_digit())
}

/// Precedence comparison that ignores build metadata.
fn compare_precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch)
        .cmp(&(b.major, b.minor, b.patch))
        .then_with(|| a.pre.cmp(&b.pre))
}

/// The kind of change between two versions, following npm semver `diff`.
///
/// Returns `None` when both versions have the same precedence.
pub fn diff(a: &Version, b: &Version) -> Option<ReleaseType> {
    let ordering = compare_precedence(a, b);
    if ordering == Ordering::Equal {
        return None;
    }

    let (high, low) = if ordering == Ordering::Greater {
        (a, b)
    } else {
        (b, a)
    };
    let high_has_pre = !high.pre.is_empty();
    let low_has_pre = !low.pre.is_empty();

    if low_has_pre && !high_has_pre {
        // Leaving a prerelease: 1.0.0-1 -> 1.0.0 counts as the bump that
        // introduced the prerelease in the first place.
        if low.patch == 0 && low.minor == 0 {
            return Some(ReleaseType::Major);
        }
        if (low.major, low.minor, low.patch) == (high.major, high.minor, high.patch) {
            if low.minor != 0 && low.patch == 0 {
                return Some(ReleaseType::Minor);
            }
            return Some(ReleaseType::Patch);
        }
    }

    let kind = if a.major != b.major {
        (ReleaseType::Major, ReleaseType::Premajor)
    } else if a.minor != b.minor {
        (ReleaseType::Minor, ReleaseType::Preminor)
    } else if a.patch != b.patch {
        (ReleaseType::Patch, ReleaseType::Prepatch)
    } else {
        return Some(ReleaseType::Prerelease);
    };

    Some(if high_has_pre { kind.1 } else { kind.0 })
}

/// Validate an operator-typed version.
pub fn parse_custom(input: &str) -> Result<Version, VersionError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(VersionError::Empty);
    }

    let stripped = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(stripped).map_err(|_| VersionError::Invalid(input.to_string()))
}

/// Turn the operator's choice into a concrete version.
pub fn resolve_choice(
    candidates: &[Candidate],
    choice: &OperatorChoice,
) -> Result<Version, VersionError> {
    match choice {
        OperatorChoice::Preset(release_type) => candidates
            .iter()
            .find(|c| c.release_type == *release_type)
            .map(|c| c.version.clone())
            .ok_or_else(|| VersionError::Invalid(release_type.to_string())),
        OperatorChoice::Custom(input) => parse_custom(input),
    }
}

/// Run the select / custom / confirm prompt sequence.
///
/// `Ok(None)` means the operator declined the confirmation.
pub fn select_new_version(old: &Version, prompter: &mut dyn Prompter) -> Result<Option<Version>> {
    let candidates = enumerate_candidates(old)?;

    let mut options: Vec<String> = candidates
        .iter()
        .map(|c| format!("{} ({})", c.release_type, c.version))
        .collect();
    options.push("Custom".to_string());

    let index = prompter.select("Select new version", &options)?;
    let choice = match candidates.get(index) {
        Some(candidate) => OperatorChoice::Preset(candidate.release_type),
        None => OperatorChoice::Custom(prompter.input(
            "Enter new custom version",
            &|value: &str| parse_custom(value).map(|_| ()).map_err(|e| e.to_string()),
        )?),
    };

    let version = resolve_choice(&candidates, &choice)?;
    if !prompter.confirm(&format!("Confirm new version: {}", version))? {
        return Ok(None);
    }

    Ok(Some(version))
}

#[cfg(test)]
#[path = "version_tests.rs"]
mod tests;

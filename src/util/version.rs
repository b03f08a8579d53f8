use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Application version as reported by `CCDciel_Version`: a dotted release
/// (`0.9.92`) and a build revision (`3829`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AppVersion {
    pub release: Vec<u32>,
    pub revision: u32,
}

impl AppVersion {
    pub fn new(release: &[u32], revision: u32) -> Self {
        Self {
            release: release.to_vec(),
            revision,
        }
    }

    /// Builds a version from the release and revision strings returned by the application.
    pub fn from_parts(release: &str, revision: &str) -> Result<Self, VersionError> {
        let release = parse_release(release)?;
        let revision = revision
            .trim()
            .parse()
            .map_err(|_| VersionError(revision.to_string()))?;
        Ok(Self { release, revision })
    }

    pub fn at_least(&self, minimum: &AppVersion) -> bool {
        self >= minimum
    }
}

fn parse_release(s: &str) -> Result<Vec<u32>, VersionError> {
    let parts: Result<Vec<u32>, _> = s.trim().split('.').map(str::parse).collect();
    match parts {
        Ok(p) if !p.is_empty() => Ok(p),
        _ => Err(VersionError(s.to_string())),
    }
}

impl PartialEq for AppVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AppVersion {}

impl PartialOrd for AppVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AppVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        // 0.9 == 0.9.0
        let len = self.release.len().max(other.release.len());
        for i in 0..len {
            let a = self.release.get(i).copied().unwrap_or(0);
            let b = other.release.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                o => return o,
            }
        }
        self.revision.cmp(&other.revision)
    }
}

impl FromStr for AppVersion {
    type Err = VersionError;

    /// Parses `0.9.92-3829`. A missing revision means revision 0.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((release, revision)) => Self::from_parts(release, revision),
            None => Ok(Self {
                release: parse_release(s)?,
                revision: 0,
            }),
        }
    }
}

impl Display for AppVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let release: Vec<String> = self.release.iter().map(u32::to_string).collect();
        write!(f, "{}-{}", release.join("."), self.revision)
    }
}

impl TryFrom<String> for AppVersion {
    type Error = VersionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AppVersion> for String {
    fn from(v: AppVersion) -> Self {
        v.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version: {0}")]
pub struct VersionError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let v: AppVersion = "0.9.92-3829".parse().unwrap();
        assert_eq!(v, AppVersion::new(&[0, 9, 92], 3829));
        assert_eq!(v.to_string(), "0.9.92-3829");
        assert_eq!("1.0".parse::<AppVersion>().unwrap(), AppVersion::new(&[1, 0], 0));
        assert!("0.9.x-12".parse::<AppVersion>().is_err());
        assert!("0.9.92-abc".parse::<AppVersion>().is_err());
    }

    #[test]
    fn test_ordering() {
        let min: AppVersion = "0.9.92-3829".parse().unwrap();
        assert!(AppVersion::new(&[0, 9, 92], 3829).at_least(&min));
        assert!(AppVersion::new(&[0, 9, 92], 3900).at_least(&min));
        assert!(AppVersion::new(&[0, 9, 93], 10).at_least(&min));
        assert!(AppVersion::new(&[1, 0], 0).at_least(&min));
        assert!(!AppVersion::new(&[0, 9, 92], 3828).at_least(&min));
        assert!(!AppVersion::new(&[0, 9, 91], 9999).at_least(&min));
        assert_eq!(
            AppVersion::new(&[0, 9], 5).cmp(&AppVersion::new(&[0, 9, 0], 5)),
            Ordering::Equal
        );
    }
}

//! Branch and tag naming grammar
//!
//! ```text
//! release:     r<int>
//! patch:       r<int>.<int>
//! environment: r<int>.<int>-<name>
//! candidate:   r<int>.<int>-<name>-RC<int>
//! version tag: v<int>
//! ```
//!
//! Integers are canonical decimal, so formatting a parsed name always gives
//! back the exact input. Release and candidate numbers start at 1, patches
//! at 0.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::{Error, Result};

const INT: &str = r"(0|[1-9][0-9]*)";
const POSITIVE: &str = r"([1-9][0-9]*)";

static RELEASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^r{POSITIVE}$")).expect("valid release pattern"));
static PATCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^r{POSITIVE}\.{INT}$")).expect("valid patch pattern"));
static CANDIDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^r{POSITIVE}\.{INT}-(\S+)-RC{POSITIVE}$"))
        .expect("valid candidate pattern")
});
static ENVIRONMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^r{POSITIVE}\.{INT}-(\S+)$")).expect("valid environment pattern")
});
static VERSION_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^v{POSITIVE}$")).expect("valid version tag pattern"));
static CANDIDATE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|-)RC[0-9]+$").expect("valid suffix pattern"));

/// A classified branch or tag name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefName {
    /// `r<version>`
    Release { version: u32 },
    /// `r<release>.<patch>`
    Patch { release: u32, patch: u32 },
    /// `r<release>.<patch>-<name>`
    Environment {
        release: u32,
        patch: u32,
        name: String,
    },
    /// `r<release>.<patch>-<environment>-RC<candidate>`
    Candidate {
        release: u32,
        patch: u32,
        environment: String,
        candidate: u32,
    },
    /// `v<version>`
    VersionTag { version: u32 },
}

impl RefName {
    pub fn release(version: u32) -> Self {
        Self::Release { version }
    }

    pub fn patch(release: u32, patch: u32) -> Self {
        Self::Patch { release, patch }
    }

    pub fn environment(release: u32, patch: u32, name: impl Into<String>) -> Self {
        Self::Environment {
            release,
            patch,
            name: name.into(),
        }
    }

    pub fn candidate(release: u32, patch: u32, environment: impl Into<String>, candidate: u32) -> Self {
        Self::Candidate {
            release,
            patch,
            environment: environment.into(),
            candidate,
        }
    }

    /// Classify a short branch or tag name.
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = || Error::InvalidRefName {
            name: name.to_string(),
        };
        let int = |s: &str| s.parse::<u32>().map_err(|_| invalid());

        if let Some(c) = RELEASE.captures(name) {
            return Ok(Self::release(int(&c[1])?));
        }
        if let Some(c) = PATCH.captures(name) {
            return Ok(Self::patch(int(&c[1])?, int(&c[2])?));
        }
        if let Some(c) = CANDIDATE.captures(name) {
            if !is_environment_name(&c[3]) {
                return Err(invalid());
            }
            return Ok(Self::candidate(
                int(&c[1])?,
                int(&c[2])?,
                &c[3],
                int(&c[4])?,
            ));
        }
        if let Some(c) = ENVIRONMENT.captures(name) {
            if !is_environment_name(&c[3]) {
                return Err(invalid());
            }
            return Ok(Self::environment(int(&c[1])?, int(&c[2])?, &c[3]));
        }
        if let Some(c) = VERSION_TAG.captures(name) {
            return Ok(Self::VersionTag {
                version: int(&c[1])?,
            });
        }
        Err(invalid())
    }

    /// Classify a full reference name such as `refs/heads/r1.0-dev`.
    ///
    /// Only the last path segment is significant.
    pub fn parse_ref(full_name: &str) -> Result<Self> {
        Self::parse(short_name(full_name))
    }

    /// Release number this name belongs to, if any.
    pub fn release_number(&self) -> Option<u32> {
        match self {
            Self::Release { version } => Some(*version),
            Self::Patch { release, .. }
            | Self::Environment { release, .. }
            | Self::Candidate { release, .. } => Some(*release),
            Self::VersionTag { .. } => None,
        }
    }

    /// Whether this name is carried by a tag rather than a branch.
    pub fn is_tag(&self) -> bool {
        matches!(self, Self::Candidate { .. } | Self::VersionTag { .. })
    }
}

/// Last `/` separated segment of a reference name.
pub fn short_name(full_name: &str) -> &str {
    full_name.rsplit('/').next().unwrap_or(full_name)
}

/// Whether `name` can label an environment.
///
/// Names that look like a candidate suffix (`RC<n>` or `...-RC<n>`) are refused
/// so that environment and candidate names never collide.
pub fn is_environment_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains('/')
        && !name.chars().any(char::is_whitespace)
        && !CANDIDATE_SUFFIX.is_match(name)
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Release { version } => write!(f, "r{version}"),
            Self::Patch { release, patch } => write!(f, "r{release}.{patch}"),
            Self::Environment {
                release,
                patch,
                name,
            } => write!(f, "r{release}.{patch}-{name}"),
            Self::Candidate {
                release,
                patch,
                environment,
                candidate,
            } => write!(f, "r{release}.{patch}-{environment}-RC{candidate}"),
            Self::VersionTag { version } => write!(f, "v{version}"),
        }
    }
}

impl FromStr for RefName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("r1", RefName::release(1))]
    #[case("r4294967295", RefName::release(u32::MAX))]
    #[case("r1.0", RefName::patch(1, 0))]
    #[case("r12.3", RefName::patch(12, 3))]
    #[case("r1.0-dev", RefName::environment(1, 0, "dev"))]
    #[case("r1.0-pre-prod", RefName::environment(1, 0, "pre-prod"))]
    #[case("r1.0-dev-RC2", RefName::candidate(1, 0, "dev", 2))]
    #[case("r1.0-pre-prod-RC10", RefName::candidate(1, 0, "pre-prod", 10))]
    #[case("v7", RefName::VersionTag { version: 7 })]
    fn test_parse_valid(#[case] input: &str, #[case] expected: RefName) {
        let parsed = RefName::parse(input).unwrap();
        assert_eq!(parsed, expected);
        assert_eq!(parsed.to_string(), input);
    }

    #[rstest]
    #[case("master")]
    #[case("feature/r1")]
    #[case("r01")]
    #[case("r0")]
    #[case("r0.1")]
    #[case("r0.0-dev")]
    #[case("v0")]
    #[case("r1.00")]
    #[case("r1.0-")]
    #[case("r1.0-RC1")]
    #[case("r1.0-dev-RC0")]
    #[case("r1.0-dev-RC1-RC2")]
    #[case("R1")]
    #[case("r1.0.1")]
    #[case("v")]
    #[case("r99999999999")]
    fn test_parse_invalid(#[case] input: &str) {
        assert!(RefName::parse(input).is_err(), "{input} should be rejected");
    }

    #[test]
    fn test_parse_ref_uses_last_segment() {
        assert_eq!(
            RefName::parse_ref("refs/heads/r2.1-qa").unwrap(),
            RefName::environment(2, 1, "qa")
        );
        assert_eq!(
            RefName::parse_ref("refs/tags/r2.1-qa-RC3").unwrap(),
            RefName::candidate(2, 1, "qa", 3)
        );
    }

    #[test]
    fn test_environment_names() {
        assert!(is_environment_name("dev"));
        assert!(is_environment_name("RCX"));
        assert!(is_environment_name("prod-RC"));
        assert!(!is_environment_name("RC4"));
        assert!(!is_environment_name("dev-RC4"));
        assert!(!is_environment_name(""));
    }

    #[test]
    fn test_release_number() {
        assert_eq!(RefName::candidate(3, 1, "dev", 1).release_number(), Some(3));
        assert_eq!(RefName::VersionTag { version: 3 }.release_number(), None);
    }

    fn env_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9]{0,6}(-[a-z][a-z0-9]{0,4}){0,2}"
    }

    fn any_ref() -> impl Strategy<Value = RefName> {
        prop_oneof![
            (1..=u32::MAX).prop_map(RefName::release),
            (1..=u32::MAX, any::<u32>()).prop_map(|(r, p)| RefName::patch(r, p)),
            (1..=u32::MAX, any::<u32>(), env_name())
                .prop_map(|(r, p, n)| RefName::environment(r, p, n)),
            (1..=u32::MAX, any::<u32>(), env_name(), 1..=u32::MAX)
                .prop_map(|(r, p, n, c)| RefName::candidate(r, p, n, c)),
            (1..=u32::MAX).prop_map(|version| RefName::VersionTag { version }),
        ]
    }

    proptest! {
        #[test]
        fn prop_format_parse_round_trip(name in any_ref()) {
            let text = name.to_string();
            let parsed = RefName::parse(&text).unwrap();
            prop_assert_eq!(parsed.to_string(), text);
            prop_assert_eq!(parsed, name);
        }
    }
}

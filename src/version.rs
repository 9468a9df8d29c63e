//! CPython version identifiers.
//!
//! Only fully-qualified `MAJOR.MINOR.PATCH` versions are accepted. Every path
//! and link name altpy derives is a pure function of this value, so two
//! processes handling the same version always agree on where things live.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Fixed prefix of every published executable name.
pub const LINK_PREFIX: &str = "altpy-python";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PythonVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl PythonVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// `3.8` for `3.8.2`; the suffix `make altinstall` gives the interpreter.
    pub fn short(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }

    /// Name of the interpreter binary inside `<prefix>/bin`.
    pub fn interpreter_name(&self) -> String {
        format!("python{}", self.short())
    }

    /// Version-qualified executable name, e.g. `altpy-python3.8.2`.
    pub fn link_name(&self) -> String {
        format!("{}{}", LINK_PREFIX, self)
    }

    /// Name of the top-level directory inside the upstream source archive.
    pub fn source_dir_name(&self) -> String {
        format!("Python-{}", self)
    }

    pub fn archive_name(&self) -> String {
        format!("Python-{}.tgz", self)
    }
}

impl fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

fn parse_part(part: &str) -> Option<u32> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

impl FromStr for PythonVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidVersion(s.to_string());

        let mut parts = s.split('.');
        let major = parts.next().and_then(parse_part).ok_or_else(invalid)?;
        let minor = parts.next().and_then(parse_part).ok_or_else(invalid)?;
        let patch = parts.next().and_then(parse_part).ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self::new(major, minor, patch))
    }
}

impl TryFrom<String> for PythonVersion {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PythonVersion> for String {
    fn from(version: PythonVersion) -> Self {
        version.to_string()
    }
}

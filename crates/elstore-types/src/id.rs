use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

const RADIX: u32 = 36;
const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Longest base-36 rendering of a `u64` (`3w5e11264sgsf`).
const MAX_LEN: usize = 13;

/// Number of leading id characters used as the fan-out directory name.
pub const SHARD_LEN: usize = 2;

/// Unique identifier of an element.
///
/// The textual form is lowercase base-36, which is safe to use as a file
/// name on every supported platform. The value itself is assigned by the
/// element and never changes.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(u64);

impl ElementId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw numeric value.
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Lowercase base-36 representation.
    pub fn to_base36(&self) -> String {
        let mut buf = [0u8; MAX_LEN];
        let mut pos = MAX_LEN;
        let mut n = self.0;
        loop {
            pos -= 1;
            buf[pos] = DIGITS[(n % RADIX as u64) as usize];
            n /= RADIX as u64;
            if n == 0 {
                break;
            }
        }
        buf[pos..].iter().map(|&b| b as char).collect()
    }

    /// Parse a base-36 string. Letters may be in either case.
    pub fn from_base36(s: &str) -> Result<Self, TypeError> {
        if s.is_empty() {
            return Err(invalid(s, "empty"));
        }
        // `from_str_radix` tolerates a leading `+`; file names must not.
        if let Some(c) = s.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(invalid(s, format!("unexpected character {c:?}")));
        }
        u64::from_str_radix(s, RADIX)
            .map(Self)
            .map_err(|e| invalid(s, e.to_string()))
    }

    /// Name of the fan-out directory holding this element: the first
    /// [`SHARD_LEN`] characters of the base-36 form, or all of it when
    /// shorter.
    pub fn shard(&self) -> String {
        let mut text = self.to_base36();
        text.truncate(SHARD_LEN);
        text
    }
}

fn invalid(input: &str, reason: impl Into<String>) -> TypeError {
    TypeError::InvalidId {
        input: input.to_string(),
        reason: reason.into(),
    }
}

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementId({})", self.to_base36())
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base36())
    }
}

impl FromStr for ElementId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base36(s)
    }
}

impl From<u64> for ElementId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<ElementId> for u64 {
    fn from(id: ElementId) -> Self {
        id.0
    }
}

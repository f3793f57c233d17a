// Target language version used to gate rules at registration time.

use std::fmt;
use std::str::FromStr;

/// A language version encoded as `major * 10000 + minor * 100 + patch`,
/// e.g. "8.1" -> 80100. Rules carry an optional minimum version; the
/// registry drops rules the configured target does not satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TargetVersion(pub u32);

impl TargetVersion {
    pub const LATEST: TargetVersion = TargetVersion(u32::MAX);

    pub fn satisfies(&self, minimum: Option<u32>) -> bool {
        match minimum {
            Some(min) => self.0 >= min,
            None => true,
        }
    }
}

impl Default for TargetVersion {
    fn default() -> Self {
        TargetVersion::LATEST
    }
}

impl FromStr for TargetVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("empty version".to_string());
        }
        // Either an already-encoded integer ("80100") or dotted ("8.1.0").
        if !trimmed.contains('.') {
            return trimmed
                .parse::<u32>()
                .map(TargetVersion)
                .map_err(|e| format!("invalid version {:?}: {}", trimmed, e));
        }
        let mut parts = trimmed.splitn(3, '.');
        let mut encoded: u32 = 0;
        for weight in [10000u32, 100, 1] {
            let part = parts.next().unwrap_or("0");
            let value: u32 = part
                .parse()
                .map_err(|e| format!("invalid version {:?}: {}", trimmed, e))?;
            encoded = value
                .checked_mul(weight)
                .and_then(|scaled| encoded.checked_add(scaled))
                .ok_or_else(|| format!("invalid version {:?}: out of range", trimmed))?;
        }
        Ok(TargetVersion(encoded))
    }
}

impl fmt::Display for TargetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == u32::MAX {
            return write!(f, "latest");
        }
        write!(
            f,
            "{}.{}.{}",
            self.0 / 10000,
            (self.0 / 100) % 100,
            self.0 % 100
        )
    }
}

// Worker resource discipline: memory-limit parsing and the per-process
// address-space ceiling, plus the default worker count.

use anyhow::{bail, Result};

/// Parses limits like "512M", "2G", "1024K", or a plain byte count.
pub fn parse_memory_limit(text: &str) -> Result<u64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        bail!("empty memory limit");
    }
    let (digits, multiplier) = match trimmed.chars().last() {
        Some('K') | Some('k') => (&trimmed[..trimmed.len() - 1], 1024u64),
        Some('M') | Some('m') => (&trimmed[..trimmed.len() - 1], 1024 * 1024),
        Some('G') | Some('g') => (&trimmed[..trimmed.len() - 1], 1024 * 1024 * 1024),
        _ => (trimmed, 1),
    };
    let value: u64 = digits
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid memory limit: {}", text))?;
    if value == 0 {
        bail!("memory limit must be positive: {}", text);
    }
    Ok(value * multiplier)
}

/// Applies the ceiling to this process. Exceeding it afterwards is fatal
/// at the OS level; nothing catches it.
#[cfg(unix)]
pub fn apply_memory_limit(bytes: u64) -> Result<()> {
    let limit = libc::rlimit {
        rlim_cur: bytes as libc::rlim_t,
        rlim_max: bytes as libc::rlim_t,
    };
    let rc = unsafe { libc::setrlimit(libc::RLIMIT_AS, &limit) };
    if rc != 0 {
        bail!(
            "setrlimit failed: {}",
            std::io::Error::last_os_error()
        );
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn apply_memory_limit(bytes: u64) -> Result<()> {
    eprintln!(
        "[Recast] WARN: memory limit of {} bytes not enforced on this platform",
        bytes
    );
    Ok(())
}

/// Half the cores, minimum one, leaving capacity for the rest of the
/// system.
pub fn default_worker_count() -> usize {
    std::cmp::max(1, num_cpus::get() / 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffixed_limits_parse() {
        assert_eq!(parse_memory_limit("512M").unwrap(), 512 * 1024 * 1024);
        assert_eq!(parse_memory_limit("2G").unwrap(), 2 * 1024 * 1024 * 1024);
        assert_eq!(parse_memory_limit("64k").unwrap(), 64 * 1024);
        assert_eq!(parse_memory_limit("1048576").unwrap(), 1048576);
    }

    #[test]
    fn test_invalid_limits_are_rejected() {
        assert!(parse_memory_limit("").is_err());
        assert!(parse_memory_limit("0M").is_err());
        assert!(parse_memory_limit("lots").is_err());
    }

    #[test]
    fn test_default_worker_count_is_at_least_one() {
        assert!(default_worker_count() >= 1);
    }
}

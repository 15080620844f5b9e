// Host resolution for attached databases.
//
// When the server runs inside a container, "localhost" in a connect request
// refers to the container itself, not the machine hosting the target
// database. Rewrite loopback hosts to the Docker gateway alias in that case.

use std::env;
use std::fs;
use std::path::Path;

const DOCKER_GATEWAY_ALIAS: &str = "host.docker.internal";

/// Resolve a requested hostname for the current execution environment.
///
/// Loopback hosts are rewritten to `host.docker.internal` when the process
/// detects it is running inside a container; all other hosts pass through
/// unchanged.
pub fn resolve(host: &str) -> String {
    resolve_with(host, running_in_container())
}

fn resolve_with(host: &str, in_container: bool) -> String {
    if in_container && is_loopback(host) {
        tracing::info!(
            "Container environment detected: rewriting '{}' to '{}'",
            host,
            DOCKER_GATEWAY_ALIAS
        );
        return DOCKER_GATEWAY_ALIAS.to_string();
    }
    host.to_string()
}

fn is_loopback(host: &str) -> bool {
    matches!(host.to_lowercase().as_str(), "localhost" | "127.0.0.1")
}

/// Detect whether the process runs inside a container.
///
/// Three independent signals, any one of which is conclusive. A signal that
/// cannot be read counts as absent.
pub fn running_in_container() -> bool {
    Path::new("/.dockerenv").exists() || cgroup_mentions_container() || has_container_style_hostname()
}

fn cgroup_mentions_container() -> bool {
    fs::read_to_string("/proc/1/cgroup")
        .map(|content| content.contains("docker") || content.contains("containerd"))
        .unwrap_or(false)
}

// Docker assigns 12-character hex hostnames by default
fn has_container_style_hostname() -> bool {
    env::var("HOSTNAME")
        .map(|h| h.len() == 12 && h.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_rewritten_inside_container() {
        assert_eq!(resolve_with("localhost", true), "host.docker.internal");
        assert_eq!(resolve_with("127.0.0.1", true), "host.docker.internal");
        assert_eq!(resolve_with("LOCALHOST", true), "host.docker.internal");
    }

    #[test]
    fn test_loopback_unchanged_outside_container() {
        assert_eq!(resolve_with("localhost", false), "localhost");
        assert_eq!(resolve_with("127.0.0.1", false), "127.0.0.1");
    }

    #[test]
    fn test_remote_host_never_rewritten() {
        assert_eq!(resolve_with("db.internal.example.com", true), "db.internal.example.com");
        assert_eq!(resolve_with("10.1.2.3", true), "10.1.2.3");
    }

    #[test]
    fn test_container_style_hostname_heuristic() {
        let check = |h: &str| h.len() == 12 && h.chars().all(|c| c.is_ascii_alphanumeric());
        assert!(check("0a1b2c3d4e5f"));
        assert!(!check("my-laptop"));
        assert!(!check("0a1b2c3d4e5")); // 11 chars
        assert!(!check("0a1b2c3d4e5f6")); // 13 chars
    }
}

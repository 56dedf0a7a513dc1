/// Network association check done before each sweep
use log::trace;
use std::fs;
use std::path::Path;

const SYS_CLASS_NET: &str = "/sys/class/net";

/// True when at least one non-loopback interface is operational
pub fn link_is_up() -> bool {
    link_is_up_in(Path::new(SYS_CLASS_NET))
}

/// Scan a sysfs-style directory of interfaces for an operational one.
///
/// Drivers that do not track carrier state report `unknown`, which is
/// treated as up.
pub fn link_is_up_in(root: &Path) -> bool {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            trace!("Cannot read {}: {}", root.display(), e);
            return false;
        }
    };

    entries.flatten().any(|entry| {
        if entry.file_name() == "lo" {
            return false;
        }
        match fs::read_to_string(entry.path().join("operstate")) {
            Ok(state) => matches!(state.trim(), "up" | "unknown"),
            Err(_) => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interface(root: &Path, name: &str, state: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("operstate"), format!("{}\n", state)).unwrap();
    }

    #[test]
    fn loopback_alone_is_not_a_link() {
        let root = tempfile::tempdir().unwrap();
        interface(root.path(), "lo", "unknown");
        assert!(!link_is_up_in(root.path()));
    }

    #[test]
    fn detects_operational_interface() {
        let root = tempfile::tempdir().unwrap();
        interface(root.path(), "lo", "unknown");
        interface(root.path(), "eth0", "down");
        assert!(!link_is_up_in(root.path()));

        interface(root.path(), "wlan0", "up");
        assert!(link_is_up_in(root.path()));
    }

    #[test]
    fn missing_directory_means_down() {
        let root = tempfile::tempdir().unwrap();
        assert!(!link_is_up_in(&root.path().join("absent")));
    }
}

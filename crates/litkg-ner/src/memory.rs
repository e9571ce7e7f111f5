//! Host memory pressure.

use std::sync::Mutex;

use sysinfo::System;

/// Reports current memory usage as a percentage in `[0, 100]`.
pub trait MemoryProbe: Send + Sync {
    fn used_percent(&self) -> f32;
}

/// Used memory of the whole host, as reported by the OS.
pub struct SystemMemoryProbe {
    system: Mutex<System>,
}

impl SystemMemoryProbe {
    pub fn new() -> Self {
        Self { system: Mutex::new(System::new()) }
    }
}

impl Default for SystemMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SystemMemoryProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemMemoryProbe").finish_non_exhaustive()
    }
}

impl MemoryProbe for SystemMemoryProbe {
    fn used_percent(&self) -> f32 {
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        system.refresh_memory();
        percent(system.used_memory(), system.total_memory())
    }
}

fn percent(used: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    (used as f64 * 100.0 / total as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(50, 200), 25.0);
    }

    #[test]
    fn test_system_probe_in_range() {
        let usage = SystemMemoryProbe::new().used_percent();
        assert!((0.0..=100.0).contains(&usage));
    }
}

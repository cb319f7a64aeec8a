use std::sync::Mutex;
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// 單一階段的耗時與記憶體快照
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSample {
    pub phase: String,
    pub duration: Duration,
    pub memory_mb: Option<u64>,
}

/// Records how long each audit phase took and, when sysinfo can see the
/// current process, its resident memory at the end of the phase.
pub struct RunMonitor {
    enabled: bool,
    started: Instant,
    last_mark: Mutex<Instant>,
    samples: Mutex<Vec<PhaseSample>>,
    #[cfg(feature = "cli")]
    process: Option<(Pid, Mutex<System>)>,
}

impl RunMonitor {
    pub fn new(enabled: bool) -> Self {
        let now = Instant::now();
        Self {
            enabled,
            started: now,
            last_mark: Mutex::new(now),
            samples: Mutex::new(Vec::new()),
            #[cfg(feature = "cli")]
            process: if enabled {
                sysinfo::get_current_pid()
                    .ok()
                    .map(|pid| (pid, Mutex::new(System::new())))
            } else {
                None
            },
        }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[cfg(feature = "cli")]
    fn memory_mb(&self) -> Option<u64> {
        let (pid, system) = self.process.as_ref()?;
        let mut system = system.lock().ok()?;
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[*pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        system.process(*pid).map(|p| p.memory() / 1024 / 1024)
    }

    #[cfg(not(feature = "cli"))]
    fn memory_mb(&self) -> Option<u64> {
        None
    }

    /// Close the current phase: everything since the previous mark is
    /// attributed to `phase`.
    pub fn mark_phase(&self, phase: &str) {
        if !self.enabled {
            return;
        }

        let now = Instant::now();
        let duration = match self.last_mark.lock() {
            Ok(mut last) => {
                let elapsed = now.duration_since(*last);
                *last = now;
                elapsed
            }
            Err(_) => return,
        };

        let sample = PhaseSample {
            phase: phase.to_string(),
            duration,
            memory_mb: self.memory_mb(),
        };

        match sample.memory_mb {
            Some(mb) => tracing::info!("📊 {} took {:?}, memory {}MB", phase, duration, mb),
            None => tracing::info!("📊 {} took {:?}", phase, duration),
        }

        if let Ok(mut samples) = self.samples.lock() {
            samples.push(sample);
        }
    }

    pub fn samples(&self) -> Vec<PhaseSample> {
        self.samples
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn peak_memory_mb(&self) -> Option<u64> {
        self.samples().iter().filter_map(|s| s.memory_mb).max()
    }

    pub fn log_summary(&self) {
        if !self.enabled {
            return;
        }
        let total = self.started.elapsed();
        match self.peak_memory_mb() {
            Some(peak) => tracing::info!("📊 Total {:?}, peak memory {}MB", total, peak),
            None => tracing::info!("📊 Total {:?}", total),
        }
    }
}

impl Default for RunMonitor {
    fn default() -> Self {
        Self::disabled()
    }
}

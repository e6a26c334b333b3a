//! HAL Core struct and RT loop management.
//!
//! The `HalCore` struct is the main entry point for HAL operations.
//! It owns the board, drives its read/write cycle at the configured period
//! and keeps timing statistics.

use litecnc_common::config::ConfigLoader;
use litecnc_common::hal::config::BoardConfig;
use litecnc_common::hal::driver::HalError;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::board::Board;
use crate::transport_registry::TransportRegistry;

/// HAL Core manages the board and the real-time loop.
pub struct HalCore {
    /// Board configuration
    config: BoardConfig,
    /// Active board (None until `init`)
    board: Option<Board>,
    /// Running flag for RT loop control
    running: Arc<AtomicBool>,
    /// Cycle time from config
    cycle_time: Duration,
    /// Timing statistics
    stats: TimingStats,
}

/// Timing statistics for RT loop monitoring.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TimingStats {
    /// Number of cycles executed
    pub cycle_count: u64,
    /// Number of timing violations (cycle exceeded target)
    pub timing_violations: u64,
    /// Maximum observed cycle time
    pub max_cycle_time_us: u64,
    /// Sum of cycle times for average calculation
    pub total_cycle_time_us: u64,
    /// Cycles whose write did not reach the board
    pub transport_faults: u64,
}

impl TimingStats {
    /// Average cycle time in microseconds.
    pub fn avg_cycle_time_us(&self) -> u64 {
        if self.cycle_count > 0 {
            self.total_cycle_time_us / self.cycle_count
        } else {
            0
        }
    }
}

impl HalCore {
    /// Create a new HalCore instance with the given configuration.
    ///
    /// # Errors
    /// Returns error if configuration validation fails.
    pub fn new(config: BoardConfig) -> Result<Self, HalError> {
        config.validate()?;

        let cycle_time = Duration::from_micros(config.cycle_time_us as u64);

        info!(
            "HalCore created for board '{}' ({} PWM, {} encoders), cycle_time={}us",
            config.name,
            config.pwm.len(),
            config.encoders.len(),
            config.cycle_time_us
        );

        Ok(Self {
            config,
            board: None,
            running: Arc::new(AtomicBool::new(false)),
            cycle_time,
            stats: TimingStats::default(),
        })
    }

    /// Load a board configuration file (TOML, or JSON by extension).
    pub fn load_config(config_path: &Path) -> Result<BoardConfig, HalError> {
        info!("Loading configuration from {:?}", config_path);

        let config = BoardConfig::load(config_path).map_err(|e| {
            HalError::ConfigError(format!("Failed to load config file {:?}: {}", config_path, e))
        })?;

        info!(
            "Loaded config: board={}, clock={}Hz, {} PWM, {} encoders",
            config.name,
            config.clock_frequency,
            config.pwm.len(),
            config.encoders.len()
        );

        Ok(config)
    }

    /// Initialize the HAL Core: create the transport and build the board.
    ///
    /// # Errors
    /// Returns error if the transport is unknown or board construction fails.
    pub fn init(&mut self, registry: &TransportRegistry, transport_name: &str) -> Result<(), HalError> {
        info!("Initializing HalCore with transport '{}'...", transport_name);

        let transport = registry.create_transport(transport_name, &self.config)?;
        let board = Board::new(&self.config, transport)?;
        info!(
            "Board ready: {} signal slots, tx={}B rx={}B",
            board.pin_names().len(),
            board.write_size(),
            board.read_size()
        );

        self.board = Some(board);
        info!("HalCore initialized successfully");
        Ok(())
    }

    /// Run the real-time loop.
    ///
    /// Blocks until shutdown is requested through the running flag, or
    /// until `max_cycles` cycles have run.
    ///
    /// # Errors
    /// Returns error if the board was not initialized.
    pub fn run(&mut self, max_cycles: Option<u64>) -> Result<(), HalError> {
        let board = self
            .board
            .as_mut()
            .ok_or_else(|| HalError::InitFailed("Board not initialized".to_string()))?;

        info!(
            "Starting HalCore RT loop (cycle_time={}us)...",
            self.cycle_time.as_micros()
        );
        self.running.store(true, Ordering::SeqCst);

        if detect_rt_mode() {
            info!("Running in real-time mode");
        } else {
            info!("Running in standard (non-RT) mode");
        }

        let target_us = self.config.cycle_time_us as u64;
        let mut executed = 0u64;

        while self.running.load(Ordering::SeqCst) && max_cycles.is_none_or(|max| executed < max) {
            let cycle_start = Instant::now();

            board.read(self.cycle_time);
            if board.write().is_err() {
                self.stats.transport_faults += 1;
            }

            // Update timing stats
            let cycle_time_us = cycle_start.elapsed().as_micros() as u64;
            executed += 1;
            self.stats.cycle_count += 1;
            self.stats.total_cycle_time_us += cycle_time_us;
            if cycle_time_us > self.stats.max_cycle_time_us {
                self.stats.max_cycle_time_us = cycle_time_us;
            }

            if cycle_time_us > target_us {
                self.stats.timing_violations += 1;
                if self.stats.timing_violations <= 10 || self.stats.timing_violations % 1000 == 0 {
                    warn!(
                        "Timing violation #{}: cycle took {}us (target {}us)",
                        self.stats.timing_violations, cycle_time_us, target_us
                    );
                }
            }

            // Sleep for remaining cycle time
            let elapsed = cycle_start.elapsed();
            if elapsed < self.cycle_time {
                std::thread::sleep(self.cycle_time - elapsed);
            }

            if self.stats.cycle_count % 1000 == 0 {
                debug!(
                    "RT loop: {} cycles, avg={}us, max={}us, violations={}, faults={}",
                    self.stats.cycle_count,
                    self.stats.avg_cycle_time_us(),
                    self.stats.max_cycle_time_us,
                    self.stats.timing_violations,
                    self.stats.transport_faults
                );
            }
        }

        info!(
            "HalCore RT loop stopped after {} cycles (violations: {}, transport faults: {})",
            self.stats.cycle_count, self.stats.timing_violations, self.stats.transport_faults
        );
        Ok(())
    }

    /// Request shutdown of the RT loop.
    pub fn shutdown(&mut self) {
        info!("Shutdown requested");
        self.running.store(false, Ordering::SeqCst);
    }

    /// Get the running flag for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// The board configuration.
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// The board, once initialized.
    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    /// The board, for the host layer between cycles.
    pub fn board_mut(&mut self) -> Option<&mut Board> {
        self.board.as_mut()
    }

    /// Get timing statistics.
    pub fn stats(&self) -> TimingStats {
        self.stats
    }
}

/// Detect if running in real-time mode by checking scheduler policy.
fn detect_rt_mode() -> bool {
    #[cfg(target_os = "linux")]
    {
        use libc::{SCHED_FIFO, SCHED_RR, sched_getscheduler};
        // SAFETY: sched_getscheduler(0) only queries the calling thread.
        unsafe {
            let policy = sched_getscheduler(0);
            policy == SCHED_FIFO || policy == SCHED_RR
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BoardConfig {
        BoardConfig::from_toml_str(
            r#"
clock_frequency = 50000000
cycle_time_us = 100

[[pwm]]

[[encoders]]
x4_mode = true

[simulation]
counts_per_cycle = [5]
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_run_without_init_fails() {
        let mut core = HalCore::new(config()).unwrap();
        assert!(matches!(core.run(Some(1)), Err(HalError::InitFailed(_))));
    }

    #[test]
    fn test_unknown_transport() {
        let mut core = HalCore::new(config()).unwrap();
        let registry = TransportRegistry::with_builtin();
        assert!(matches!(
            core.init(&registry, "etherbone"),
            Err(HalError::TransportNotFound(_))
        ));
        assert!(core.board().is_none());
    }

    #[test]
    fn test_bounded_run() {
        let mut core = HalCore::new(config()).unwrap();
        core.init(&TransportRegistry::with_builtin(), "simulation").unwrap();
        core.run(Some(4)).unwrap();

        let stats = core.stats();
        assert_eq!(stats.cycle_count, 4);
        assert_eq!(stats.transport_faults, 0);

        // Response of write N is decoded by read N+1: three transactions seen.
        let board = core.board().unwrap();
        assert_eq!(board.encoders().channels()[0].pins.counts, 15);
        assert_eq!(board.stats().writes, 4);
    }

    #[test]
    fn test_stopped_flag_ends_loop() {
        let mut core = HalCore::new(config()).unwrap();
        core.init(&TransportRegistry::with_builtin(), "simulation").unwrap();
        core.shutdown();
        assert!(!core.running_flag().load(Ordering::SeqCst));
        // run() re-arms the flag, so a bounded run still executes.
        core.run(Some(1)).unwrap();
        assert_eq!(core.stats().cycle_count, 1);
    }

    #[test]
    fn test_load_config_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(br#"{"clock_frequency": 50000000, "pwm": [{}, {}]}"#)
            .unwrap();
        let config = HalCore::load_config(file.path()).unwrap();
        assert_eq!(config.pwm.len(), 2);

        let missing = HalCore::load_config(Path::new("/nonexistent/board.toml"));
        assert!(matches!(missing, Err(HalError::ConfigError(_))));
    }

    #[test]
    fn test_avg_cycle_time() {
        let stats = TimingStats {
            cycle_count: 4,
            total_cycle_time_us: 100,
            ..Default::default()
        };
        assert_eq!(stats.avg_cycle_time_us(), 25);
        assert_eq!(TimingStats::default().avg_cycle_time_us(), 0);
    }
}

//! Cycle orchestrator for one attached board.
//!
//! A `Board` owns the channel modules and the transport. The RT scheduler
//! calls [`Board::read`] then [`Board::write`] once per period:
//!
//! ```text
//!   Idle ──read()──► Reading ──► Idle ──write()──► Writing ──► Idle
//! ```
//!
//! Module order on the wire is fixed: encoder blocks on the read side,
//! PWM then encoder blocks on the write side.
//!
//! # Fault gate
//!
//! While the transport reports a latched fault both calls return without
//! touching channel state, so every output keeps its last value. The fault
//! is cleared only through [`Board::clear_io_error`].

use litecnc_common::hal::config::BoardConfig;
use litecnc_common::hal::driver::{HalError, Transport, TransportError};
use litecnc_common::wire::{WireReader, WireWriter};
use std::time::Duration;
use tracing::{info, trace, warn};

use crate::modules::BoardModule;
use crate::modules::encoder::EncoderModule;
use crate::modules::pwm::PwmModule;

/// Phase of the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclePhase {
    /// Between callbacks
    #[default]
    Idle,
    /// Decoding the inbound buffer
    Reading,
    /// Encoding and sending the outbound buffer
    Writing,
}

/// Per-board cycle counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoardStats {
    /// Completed read cycles
    pub reads: u64,
    /// Completed write cycles
    pub writes: u64,
    /// Cycles skipped by the fault gate
    pub faulted_cycles: u64,
    /// Reads skipped because the inbound buffer was too short
    pub short_reads: u64,
    /// Writes rejected by the transport
    pub transport_errors: u64,
}

/// One FPGA board: channel modules plus the transport.
///
/// The transport type defaults to a trait object; tests and benchmarks name
/// the concrete type to reach its extra controls through
/// [`Board::transport_mut`].
pub struct Board<T: Transport + ?Sized = dyn Transport> {
    name: String,
    pwm: PwmModule,
    encoders: EncoderModule,
    transport: Box<T>,
    /// Outbound buffer, allocated once at init
    tx_buffer: Box<[u8]>,
    read_size: usize,
    phase: CyclePhase,
    stats: BoardStats,
}

/// Rate limit for diagnostics emitted from the RT path.
#[inline]
fn should_log(count: u64) -> bool {
    count <= 10 || count % 1000 == 0
}

impl<T: Transport + ?Sized> Board<T> {
    /// Build the channel arrays and buffers from a board configuration.
    ///
    /// # Errors
    /// Returns `HalError::ConfigError` if the configuration is invalid.
    pub fn new(config: &BoardConfig, transport: Box<T>) -> Result<Self, HalError> {
        config.validate()?;

        let pwm = PwmModule::new(config);
        let encoders = EncoderModule::new(config);

        let write_size = pwm.write_size() + encoders.write_size();
        let read_size = pwm.read_size() + encoders.read_size();

        info!(
            "Board '{}' created: {} PWM, {} encoder channels, tx={}B rx={}B, transport={}",
            config.name,
            pwm.channels().len(),
            encoders.channels().len(),
            write_size,
            read_size,
            transport.name()
        );

        Ok(Self {
            name: config.name.clone(),
            pwm,
            encoders,
            transport,
            tx_buffer: vec![0u8; write_size].into_boxed_slice(),
            read_size,
            phase: CyclePhase::Idle,
            stats: BoardStats::default(),
        })
    }

    /// Board name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Outbound transaction width in bytes.
    pub fn write_size(&self) -> usize {
        self.tx_buffer.len()
    }

    /// Inbound transaction width in bytes.
    pub fn read_size(&self) -> usize {
        self.read_size
    }

    /// Current cycle phase.
    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Cycle counters.
    pub fn stats(&self) -> BoardStats {
        self.stats
    }

    /// PWM channels.
    pub fn pwm(&self) -> &PwmModule {
        &self.pwm
    }

    /// PWM channels, for the host layer.
    pub fn pwm_mut(&mut self) -> &mut PwmModule {
        &mut self.pwm
    }

    /// Encoder channels.
    pub fn encoders(&self) -> &EncoderModule {
        &self.encoders
    }

    /// Encoder channels, for the host layer.
    pub fn encoders_mut(&mut self) -> &mut EncoderModule {
        &mut self.encoders
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The transport, for fault handling and test control outside the cycle.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// True while the transport is latched in its fault state.
    pub fn io_error(&self) -> bool {
        self.transport.io_error()
    }

    /// Clear a latched transport fault. Not called from the RT cycle.
    pub fn clear_io_error(&mut self) {
        if self.transport.io_error() {
            info!("Board '{}': transport fault cleared", self.name);
        }
        self.transport.clear_io_error();
    }

    /// Every slot name exposed by this board, PWM channels first.
    pub fn pin_names(&self) -> Vec<String> {
        self.pwm
            .channels()
            .iter()
            .flat_map(|channel| channel.pin_names())
            .chain(
                self.encoders
                    .channels()
                    .iter()
                    .flat_map(|channel| channel.pin_names()),
            )
            .collect()
    }

    /// Read half of the cycle: decode the last inbound transaction.
    ///
    /// `period` is the scheduling period, used as the velocity time base.
    pub fn read(&mut self, period: Duration) {
        if self.transport.io_error() {
            self.stats.faulted_cycles += 1;
            if should_log(self.stats.faulted_cycles) {
                warn!(
                    "Board '{}': transport faulted, read skipped (#{})",
                    self.name, self.stats.faulted_cycles
                );
            }
            return;
        }

        self.phase = CyclePhase::Reading;

        let response = self.transport.response();
        if response.len() < self.read_size {
            self.stats.short_reads += 1;
            if should_log(self.stats.short_reads) {
                warn!(
                    "Board '{}': short response {}B (expected {}B), read skipped (#{})",
                    self.name,
                    response.len(),
                    self.read_size,
                    self.stats.short_reads
                );
            }
            self.phase = CyclePhase::Idle;
            return;
        }

        let mut reader = WireReader::new(&response[..self.read_size]);
        self.pwm.process_read(&mut reader, period);
        self.encoders.process_read(&mut reader, period);
        debug_assert_eq!(reader.remaining(), 0);

        self.stats.reads += 1;
        self.phase = CyclePhase::Idle;
        trace!("Board '{}': read cycle {}", self.name, self.stats.reads);
    }

    /// Write half of the cycle: encode channel state and send it.
    ///
    /// # Errors
    /// Returns the transport's error; `TransportError::Faulted` if the fault
    /// gate is closed and nothing was sent.
    pub fn write(&mut self) -> Result<(), TransportError> {
        if self.transport.io_error() {
            return Err(TransportError::Faulted);
        }

        self.phase = CyclePhase::Writing;

        self.tx_buffer.fill(0);
        let mut writer = WireWriter::new(&mut self.tx_buffer);
        self.pwm.prepare_write(&mut writer);
        self.encoders.prepare_write(&mut writer);
        debug_assert_eq!(writer.remaining(), 0);

        let result = self.transport.write(&self.tx_buffer);
        self.phase = CyclePhase::Idle;

        match result {
            Ok(()) => {
                self.stats.writes += 1;
                Ok(())
            }
            Err(e) => {
                self.stats.transport_errors += 1;
                if should_log(self.stats.transport_errors) {
                    warn!(
                        "Board '{}': transport write failed: {} (#{})",
                        self.name, e, self.stats.transport_errors
                    );
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use litecnc_common::config::ConfigLoader;

    /// Transport that records the last outbound buffer and serves a fixed response.
    struct LoopbackTransport {
        faulted: bool,
        fail_next: bool,
        sent: Vec<u8>,
        response: Vec<u8>,
    }

    impl Transport for LoopbackTransport {
        fn name(&self) -> &str {
            "loopback"
        }

        fn io_error(&self) -> bool {
            self.faulted
        }

        fn clear_io_error(&mut self) {
            self.faulted = false;
        }

        fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
            if self.fail_next {
                self.fail_next = false;
                self.faulted = true;
                return Err(TransportError::Timeout);
            }
            self.sent.clear();
            self.sent.extend_from_slice(data);
            Ok(())
        }

        fn response(&self) -> &[u8] {
            &self.response
        }
    }

    fn board(response: Vec<u8>) -> Board<LoopbackTransport> {
        let config = BoardConfig::from_toml_str(
            r#"
clock_frequency = 100000000

[[pwm]]
pwm_freq = 100000.0

[[encoders]]
"#,
        )
        .unwrap();
        let transport = LoopbackTransport {
            faulted: false,
            fail_next: false,
            sent: Vec::new(),
            response,
        };
        Board::new(&config, Box::new(transport)).unwrap()
    }

    #[test]
    fn test_sizes() {
        let b = board(Vec::new());
        // PWM: 1 enable byte + 8; encoder: 1 index-enable byte
        assert_eq!(b.write_size(), 10);
        // encoder: 1 pulse byte + 4
        assert_eq!(b.read_size(), 5);
        assert_eq!(b.pin_names().len(), 12 + 10);
        assert_eq!(b.phase(), CyclePhase::Idle);
    }

    #[test]
    fn test_short_response_skips_read() {
        let mut b = board(vec![0x80, 0, 0]);
        b.read(Duration::from_millis(1));
        assert_eq!(b.stats().short_reads, 1);
        assert_eq!(b.stats().reads, 0);
        assert!(!b.encoders().channels()[0].pins.index_pulse);
    }

    #[test]
    fn test_write_failure_latches_gate() {
        let mut b = board(vec![0; 5]);
        b.transport_mut().fail_next = true;

        assert_eq!(b.write(), Err(TransportError::Timeout));
        assert!(b.io_error());
        assert_eq!(b.write(), Err(TransportError::Faulted));
        assert_eq!(b.stats().transport_errors, 1);

        b.read(Duration::from_millis(1));
        assert_eq!(b.stats().faulted_cycles, 1);

        b.clear_io_error();
        b.pwm_mut().channels_mut()[0].pins.enable = true;
        assert!(b.write().is_ok());
        assert_eq!(b.stats().writes, 1);
        let sent = &b.transport().sent;
        assert_eq!(sent.len(), 10);
        assert_eq!(sent[0], 0x80);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = BoardConfig::from_toml_str("clock_frequency = 1").unwrap();
        config.clock_frequency = 0;
        let transport: Box<dyn Transport> = Box::new(LoopbackTransport {
            faulted: false,
            fail_next: false,
            sent: Vec::new(),
            response: Vec::new(),
        });
        assert!(matches!(
            Board::new(&config, transport),
            Err(HalError::ConfigError(_))
        ));
    }

    #[test]
    fn test_should_log_rate_limit() {
        assert!(should_log(1));
        assert!(should_log(10));
        assert!(!should_log(11));
        assert!(!should_log(999));
        assert!(should_log(1000));
        assert!(should_log(5000));
    }
}

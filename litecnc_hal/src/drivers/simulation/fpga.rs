//! Simulated FPGA board.
//!
//! `SimulatedFpga` answers every transaction the way the gateware would:
//! it decodes the outbound registers with the shared codec, advances one
//! 32-bit counter per encoder and encodes the inbound buffer that the next
//! read cycle decodes.

use litecnc_common::hal::config::BoardConfig;
use litecnc_common::hal::driver::{Transport, TransportError};
use litecnc_common::hal::registers::{EncoderRecord, PwmRecord};
use litecnc_common::wire::{WireReader, WireRecord, WireWriter, shared_register_size};
use tracing::{debug, info};

/// Simulated encoder counter.
#[derive(Debug, Clone, Copy, Default)]
struct SimEncoder {
    /// Raw 32-bit counter
    counts: i32,
    /// Raw counts added per transaction
    step: i32,
    /// Index armed by the last outbound transaction
    index_armed: bool,
    /// Index fired during the last transaction
    index_pulse: bool,
}

/// Simulated FPGA implementing [`Transport`].
#[derive(Debug)]
pub struct SimulatedFpga {
    pwm_enabled: Box<[bool]>,
    pwm_registers: Box<[PwmRecord]>,
    encoders: Box<[SimEncoder]>,
    counts_per_revolution: u32,
    write_size: usize,
    /// Inbound buffer of the last transaction, allocated once
    response: Box<[u8]>,
    faulted: bool,
    pending_fault: Option<TransportError>,
    transactions: u64,
}

impl SimulatedFpga {
    /// Build a board matching the channel layout of `config`.
    pub fn new(config: &BoardConfig) -> Self {
        let pwm_count = config.pwm.len();
        let encoder_count = config.encoders.len();

        let encoders: Box<[SimEncoder]> = (0..encoder_count)
            .map(|index| SimEncoder {
                step: config
                    .simulation
                    .counts_per_cycle
                    .get(index)
                    .copied()
                    .unwrap_or(0),
                ..Default::default()
            })
            .collect();

        let write_size = shared_register_size(pwm_count)
            + pwm_count * PwmRecord::SIZE
            + shared_register_size(encoder_count);
        let read_size = shared_register_size(encoder_count) + encoder_count * EncoderRecord::SIZE;

        info!(
            "Simulated FPGA: {} PWM, {} encoders, {} counts/rev",
            pwm_count, encoder_count, config.simulation.counts_per_revolution
        );

        Self {
            pwm_enabled: vec![false; pwm_count].into_boxed_slice(),
            pwm_registers: vec![PwmRecord::default(); pwm_count].into_boxed_slice(),
            encoders,
            counts_per_revolution: config.simulation.counts_per_revolution,
            write_size,
            response: vec![0u8; read_size].into_boxed_slice(),
            faulted: false,
            pending_fault: None,
            transactions: 0,
        }
    }

    /// Make the next `write` fail with `error`.
    pub fn inject_fault(&mut self, error: TransportError) {
        self.pending_fault = Some(error);
    }

    /// Overwrite the raw counter of encoder `index`.
    pub fn set_counts(&mut self, index: usize, counts: i32) {
        self.encoders[index].counts = counts;
    }

    /// Raw counter of encoder `index`.
    pub fn counts(&self, index: usize) -> i32 {
        self.encoders[index].counts
    }

    /// Period and width registers last written for PWM channel `index`.
    pub fn pwm_register(&self, index: usize) -> PwmRecord {
        self.pwm_registers[index]
    }

    /// Enable bit last written for PWM channel `index`.
    pub fn pwm_enabled(&self, index: usize) -> bool {
        self.pwm_enabled[index]
    }

    /// Index-enable bit last written for encoder `index`.
    pub fn index_armed(&self, index: usize) -> bool {
        self.encoders[index].index_armed
    }

    /// Completed transactions.
    pub fn transactions(&self) -> u64 {
        self.transactions
    }

    fn decode_outbound(&mut self, data: &[u8]) {
        let mut reader = WireReader::new(data);

        let pwm_enabled = &mut self.pwm_enabled;
        reader.unpack_flags(pwm_enabled.len(), |index, flag| pwm_enabled[index] = flag);
        for register in self.pwm_registers.iter_mut() {
            *register = reader.get_record();
        }

        let encoders = &mut self.encoders;
        reader.unpack_flags(encoders.len(), |index, flag| encoders[index].index_armed = flag);
    }

    fn advance_encoders(&mut self) {
        let revolution = self.counts_per_revolution as i64;
        for encoder in self.encoders.iter_mut() {
            let old = encoder.counts as i64;
            let new = old + encoder.step as i64;

            let crossed = revolution > 0
                && encoder.step != 0
                && old.div_euclid(revolution) != new.div_euclid(revolution);

            if encoder.index_armed && crossed {
                // The gateware zeroes the counter on the index edge.
                encoder.counts = 0;
                encoder.index_pulse = true;
            } else {
                encoder.counts = encoder.counts.wrapping_add(encoder.step);
                encoder.index_pulse = false;
            }
        }
    }

    fn encode_inbound(&mut self) {
        let mut writer = WireWriter::new(&mut self.response);
        writer.pack_flags(self.encoders.iter().map(|encoder| encoder.index_pulse));
        for encoder in self.encoders.iter() {
            writer.put_record(&EncoderRecord {
                counts: encoder.counts,
            });
        }
    }
}

impl Transport for SimulatedFpga {
    fn name(&self) -> &str {
        "simulation"
    }

    fn io_error(&self) -> bool {
        self.faulted
    }

    fn clear_io_error(&mut self) {
        self.faulted = false;
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.faulted {
            return Err(TransportError::Faulted);
        }
        if let Some(error) = self.pending_fault.take() {
            self.faulted = true;
            return Err(error);
        }
        if data.len() != self.write_size {
            self.faulted = true;
            return Err(TransportError::Io(format!(
                "transaction is {}B, board expects {}B",
                data.len(),
                self.write_size
            )));
        }

        self.decode_outbound(data);
        self.advance_encoders();
        self.encode_inbound();
        self.transactions += 1;

        if self.transactions % 10_000 == 0 {
            debug!("Simulated FPGA: {} transactions", self.transactions);
        }
        Ok(())
    }

    fn response(&self) -> &[u8] {
        &self.response
    }
}

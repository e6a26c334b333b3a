//! # LiteCNC HAL Library
//!
//! Real-time read/write cycle for LiteCNC FPGA boards.
//!
//! Every scheduling period the host calls [`Board::read`] to decode the
//! board's last answer into channel state, then [`Board::write`] to encode
//! the channel commands and send them through the [`Transport`].
//!
//! # Module Structure
//!
//! - [`board`] - Cycle orchestrator, fault gate, transaction buffers
//! - [`modules`] - PWM/PDM and quadrature encoder channel engines
//! - [`core`] - HalCore struct, RT loop management
//! - [`transport_registry`] - Transport factory registration
//! - [`drivers`] - Transport implementations
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                    litecnc_hal (single crate)                  │
//! │  ┌─────────────┐    ┌──────────────┐    ┌──────────────────┐   │
//! │  │  HalCore    │───►│    Board     │◄──►│ Transport        │   │
//! │  │  (RT loop)  │    │ read / write │    │ (trait object)   │   │
//! │  └─────────────┘    └──────┬───────┘    └──────────────────┘   │
//! │                            │                                   │
//! │                 ┌──────────┴──────────┐                        │
//! │                 ▼                     ▼                        │
//! │           ┌───────────┐        ┌─────────────┐                 │
//! │           │ PwmModule │        │EncoderModule│                 │
//! │           └───────────┘        └─────────────┘                 │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`Transport`]: litecnc_common::hal::driver::Transport

#![deny(missing_docs)]

pub mod board;
pub mod core;
pub mod drivers;
pub mod modules;
pub mod transport_registry;

// Re-export key types for convenience
pub use crate::board::{Board, BoardStats, CyclePhase};
pub use crate::core::{HalCore, TimingStats};
pub use crate::transport_registry::TransportRegistry;

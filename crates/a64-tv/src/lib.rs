#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::too_many_lines,
    clippy::missing_errors_doc
)]

pub mod aslt;
pub mod classic;
pub mod config;
pub mod emit;
pub mod error;
pub mod inst;
pub mod lift;

/// Test harness module for writing unit and integration tests.
///
/// This module is only available when running tests or when the
/// `test-harness` feature is enabled.
#[cfg(any(test, feature = "test-harness"))]
pub mod test_harness;

pub use aslt::{HttpSemanticsClient, SemanticsClient, SemanticsReply, StaticSemanticsClient};
pub use config::Config;
pub use emit::EmissionContext;
pub use error::{Error, Result};
pub use inst::{Cond, FpWidth, Gpr, Inst, Opcode, Operand, RegWidth, VecArr};
pub use lift::{lift_function, Lifted};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The semantics backend had no entry for this encoding (or the
    /// transport failed). Fatal only when `ASLP_FAIL_MISSING` is set;
    /// the dispatcher otherwise falls back to the classic catalog.
    #[error("unknown encoding 0x{0:08x}")]
    UnknownEncoding(u32),

    /// The classic catalog has no routine for this opcode.
    /// The message carries the partially lifted function.
    #[error("unsupported opcode {mnemonic}\n----------partially-lifted-arm-target----------\n{ir}")]
    UnsupportedOpcode { mnemonic: String, ir: String },

    #[error("malformed semantics: {0}")]
    MalformedSemantics(String),

    /// Internal assertion in the emission helpers: width mismatch,
    /// missing local, unexpected operand shape. The message includes
    /// the offending IR value textually.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("environment error: {0}")]
    Environment(String),

    #[error("LLVM builder error: {0}")]
    Llvm(String),
}

pub type Result<T> = std::result::Result<T, Error>;

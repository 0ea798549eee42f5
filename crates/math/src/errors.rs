//! # Math Errors

use thiserror::Error;

/// Arithmetic range failures. Callers treat every variant as fatal.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    #[error("Tick {0} outside [-887272, 887272]")]
    TickOutOfRange(i32),

    #[error("Sqrt price outside [MIN_SQRT_RATIO, MAX_SQRT_RATIO)")]
    SqrtPriceOutOfRange,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Mul div result does not fit in 256 bits")]
    MulDivOverflow,

    #[error("Math overflow")]
    Overflow,
}

/// Result type for math operations
pub type MathResult<T> = Result<T, MathError>;

use core::fmt;

use heapless::Vec;

use crate::module::{ModuleId, UnknownModule};

/// A 16-bit error code returned by any module.
///
/// `ErrorCode::NONE` (zero) is reserved for the success case and is never
/// produced by [`ErrorCode::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorCode(u16);

impl ErrorCode {
    pub const NONE: ErrorCode = ErrorCode(0);

    pub const fn new(module: ModuleId, local: u8) -> Self {
        Self(((module as u16) << 8) | local as u16)
    }

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    pub const fn module_bits(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn module(self) -> Result<ModuleId, UnknownModule> {
        ModuleId::try_from(self.module_bits())
    }

    pub const fn local(self) -> u8 {
        self.0 as u8
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// Returned when a serialisation target cannot hold the encoded chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferTooSmall {
    pub needed: usize,
}

/// An ordered chain of errors, from the highest-level failure down to the
/// root cause.
///
/// A UART fault that breaks the EPS component which in turn breaks the power
/// application is recorded as `[POWER_ERR, EPS_ERR, UART_ERR]`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorChain<const N: usize> {
    codes: Vec<ErrorCode, N>,
}

impl<const N: usize> ErrorChain<N> {
    pub const fn new() -> Self {
        Self { codes: Vec::new() }
    }

    /// Start a chain from its top-level error.
    pub fn from_code(code: ErrorCode) -> Self {
        let mut chain = Self::new();
        // A zero-capacity chain silently records nothing.
        let _ = chain.codes.push(code);
        chain
    }

    /// Append the cause of the current deepest error.
    ///
    /// Returns the rejected code if the chain is full.
    pub fn push_cause(&mut self, code: ErrorCode) -> Result<(), ErrorCode> {
        self.codes.push(code)
    }

    pub fn code(&self) -> Option<ErrorCode> {
        self.codes.first().copied()
    }

    pub fn root_cause(&self) -> Option<ErrorCode> {
        self.codes.last().copied()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn clear(&mut self) {
        self.codes.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = ErrorCode> + '_ {
        self.codes.iter().copied()
    }

    /// Serialise the chain as big-endian `u16`s, top-level error first.
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, BufferTooSmall> {
        let needed = self.codes.len() * 2;
        if out.len() < needed {
            return Err(BufferTooSmall { needed });
        }
        for (chunk, code) in out.chunks_exact_mut(2).zip(self.codes.iter()) {
            chunk.copy_from_slice(&code.raw().to_be_bytes());
        }
        Ok(needed)
    }
}

impl<const N: usize> Default for ErrorChain<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Display for ErrorChain<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, code) in self.codes.iter().enumerate() {
            if i > 0 {
                f.write_str(" <- ")?;
            }
            write!(f, "{}", code)?;
        }
        Ok(())
    }
}

//! Exception handler ranges of a method body.
//!
//! Ranges are expressed as instruction indices into the owning body, not byte offsets. A
//! range is half-open: `try_start..try_end` covers the protected instructions, and an end
//! index may equal the body length when a region runs to the last instruction.

use bitflags::bitflags;

use crate::metadata::signatures::TypeSignature;

bitflags! {
    /// Exception handler flags defining the type of exception handling clause.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ExceptionHandlerFlags: u16 {
        /// A typed exception clause.
        ///
        /// `catch_type` holds the exception type this handler catches.
        const EXCEPTION = 0x0000;

        /// An exception filter and handler clause.
        const FILTER = 0x0001;

        /// A finally clause.
        const FINALLY = 0x0002;

        /// A fault clause (finally that executes only on exception).
        const FAULT = 0x0004;
    }
}

/// Exception handler defining a protected region and its handling code.
///
/// # Layout
///
/// ```text
/// try {
///     // try_start .. try_end
/// }
/// catch (catch_type) {
///     // handler_start .. handler_end
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionHandler {
    /// Flags describing the type of exception handler (catch, filter, finally, fault).
    pub flags: ExceptionHandlerFlags,
    /// Index of the first protected instruction
    pub try_start: usize,
    /// Index one past the last protected instruction
    pub try_end: usize,
    /// Index of the first handler instruction
    pub handler_start: usize,
    /// Index one past the last handler instruction
    pub handler_end: usize,
    /// Index of the first filter instruction, for `FILTER` clauses
    pub filter_start: Option<usize>,
    /// If flags == EXCEPTION, then this type will handle the exception.
    pub catch_type: Option<TypeSignature>,
}

impl ExceptionHandler {
    /// Creates a typed catch clause.
    #[must_use]
    pub fn catch(
        try_range: std::ops::Range<usize>,
        handler_range: std::ops::Range<usize>,
        catch_type: TypeSignature,
    ) -> Self {
        ExceptionHandler {
            flags: ExceptionHandlerFlags::EXCEPTION,
            try_start: try_range.start,
            try_end: try_range.end,
            handler_start: handler_range.start,
            handler_end: handler_range.end,
            filter_start: None,
            catch_type: Some(catch_type),
        }
    }

    /// Creates a finally clause.
    #[must_use]
    pub fn finally(try_range: std::ops::Range<usize>, handler_range: std::ops::Range<usize>) -> Self {
        ExceptionHandler {
            flags: ExceptionHandlerFlags::FINALLY,
            try_start: try_range.start,
            try_end: try_range.end,
            handler_start: handler_range.start,
            handler_end: handler_range.end,
            filter_start: None,
            catch_type: None,
        }
    }

    /// Rewrites every boundary index through `remap`.
    pub fn remap<F>(&mut self, mut remap: F)
    where
        F: FnMut(usize) -> usize,
    {
        self.try_start = remap(self.try_start);
        self.try_end = remap(self.try_end);
        self.handler_start = remap(self.handler_start);
        self.handler_end = remap(self.handler_end);
        if let Some(filter) = self.filter_start.as_mut() {
            *filter = remap(*filter);
        }
    }

    /// Shifts every boundary index by `delta`.
    pub fn shift(&mut self, delta: usize) {
        self.remap(|index| index + delta);
    }
}

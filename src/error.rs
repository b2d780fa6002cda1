use thiserror::Error;

use crate::metadata::token::Token;

macro_rules! precondition_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::PreconditionViolated {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::PreconditionViolated {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every failure is raised synchronously at the point it is detected and is never retried
/// internally. Operations mutate the [`crate::metadata::image::Image`] in place, so an error
/// leaves the graph partially modified: the caller is expected to discard the whole in-progress
/// image and rebuild it rather than retry the failed call.
///
/// # Error Categories
///
/// ## Symbol Resolution Errors
/// - [`Error::AmbiguousMatch`] - A lookup that requires exactly one result found several
/// - [`Error::NotFound`] - A path, name, handle or token resolves to nothing
///
/// ## Injection Errors
/// - [`Error::PreconditionViolated`] - Hook arity/signature mismatch or unusable input state
/// - [`Error::UnsupportedSlot`] - The resolver was asked to handle a reference kind it does not know
/// - [`Error::RecursionLimit`] - Type nesting deeper than the configured limit
///
/// # Examples
///
/// ```rust
/// use cilhook::{Error, metadata::image::Image};
///
/// let image = Image::new();
/// match image.method(cilhook::metadata::token::Token::new(0x0600_0001)) {
///     Ok(_) => unreachable!(),
///     Err(Error::NotFound(what)) => println!("missing: {what}"),
///     Err(e) => println!("other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// Name resolution found more than one candidate where exactly one was required.
    ///
    /// Proceeding with an arbitrary candidate could silently hook the wrong routine, so
    /// every single-result lookup fails instead.
    ///
    /// # Fields
    ///
    /// * `query` - The path, name or handle that was looked up
    /// * `count` - How many candidates matched
    #[error("Ambiguous match for '{query}' - {count} candidates")]
    AmbiguousMatch {
        /// The lookup that produced several results
        query: String,
        /// Number of matching candidates
        count: usize,
    },

    /// A path, name, runtime handle or token resolves to nothing.
    #[error("Not found - {0}")]
    NotFound(String),

    /// An input violates the contract of the requested operation.
    ///
    /// Raised for hook arity/signature mismatches (a post-hook fragment missing the
    /// return-value parameter, a zero-parameter hook asked to drop a receiver), for
    /// malformed lookup paths, and for entities in a state the operation cannot work
    /// with (a type without module asked to fix its references). The error includes
    /// the source location where the violation was detected.
    ///
    /// # Fields
    ///
    /// * `message` - Description of the violated precondition
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Precondition violated - {file}:{line}: {message}")]
    PreconditionViolated {
        /// The message to be printed for the PreconditionViolated error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The reference resolver was asked to find or replace a reference kind it does not
    /// recognize, such as a module token or a replacement of a different symbol kind.
    #[error("Unsupported reference slot - {0}")]
    UnsupportedSlot(String),

    /// Recursion limit reached.
    ///
    /// Deep-cloning nested types recurses once per nesting level; the depth is bounded by
    /// [`crate::inject::InjectorConfig::max_nesting_depth`].
    ///
    /// The associated value shows the recursion limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),
}

impl Error {
    /// Creates a [`Error::NotFound`] naming a token that is absent from its arena.
    pub(crate) fn missing_token(token: Token) -> Self {
        Error::NotFound(format!("token {token}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_macro_records_location() {
        let err = precondition_error!("hook has {} parameters", 0);
        match err {
            Error::PreconditionViolated {
                message,
                file,
                line,
            } => {
                assert_eq!(message, "hook has 0 parameters");
                assert!(file.ends_with("error.rs"));
                assert!(line > 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_display_messages() {
        let ambiguous = Error::AmbiguousMatch {
            query: "Target.Program.Add".to_string(),
            count: 2,
        };
        assert_eq!(
            ambiguous.to_string(),
            "Ambiguous match for 'Target.Program.Add' - 2 candidates"
        );

        let missing = Error::missing_token(Token::new(0x0600_0003));
        assert_eq!(missing.to_string(), "Not found - token 0x06000003");
    }
}

//! Common error types for shell operations

/// A common error type for shell operations.
///
/// This enum defines the set of errors that can surface while a line is
/// being parsed and dispatched. It is designed to be simple and portable
/// for `no_std` environments. Every variant is recovered at the
/// dispatcher boundary: the offending command is aborted, one diagnostic
/// is written to the session output, and the shell returns to accepting
/// the next line.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// A token could not be converted to the declared parameter type:
    /// a malformed literal, an unresolved `$name` reference, or a
    /// malformed array element.
    Parse,
    /// No command, variable, or key descriptor matched the lookup.
    NotFound,
    /// Authentication has not been passed, or the current user's
    /// permission level is below the command's requirement.
    PermissionDenied,
    /// The number of supplied tokens disagrees with the arity declared
    /// by a signature-typed handler.
    ParamCount,
    /// An array argument exceeded the fixed marshalling capacity.
    Allocation,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Parse => defmt::write!(f, "Parse"),
            Error::NotFound => defmt::write!(f, "NotFound"),
            Error::PermissionDenied => defmt::write!(f, "PermissionDenied"),
            Error::ParamCount => defmt::write!(f, "ParamCount"),
            Error::Allocation => defmt::write!(f, "Allocation"),
        }
    }
}

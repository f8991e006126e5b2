//! Global error handling mechanisms.

/// Let Eddy handle fatal errors in the process.
///
/// Errors passed through here are invariant violations, for example finalizing an
/// accumulator which never saw a value. There is no sensible way to continue after them.
pub trait EddyFatal<T, E>: Sized + sealed::Sealed {
    /// Abort the computation due to a fatal non-recoverable error.
    fn eddy_fatal(self) -> T;
}

impl<T, E> EddyFatal<T, E> for Result<T, E>
where
    E: std::fmt::Debug + std::error::Error + Send + Sync + 'static,
{
    fn eddy_fatal(self) -> T {
        match self {
            Ok(x) => x,
            Err(e) => {
                let report = eyre::Report::new(e);
                tracing::error!("Fatal error: {report:?}");
                panic!("{report:?}")
            }
        }
    }
}

mod sealed {
    pub trait Sealed {}

    impl<T, E> Sealed for Result<T, E> {}
}

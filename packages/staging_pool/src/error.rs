use thiserror::Error;

/// Errors that can occur when configuring a [`RegionPool`][crate::RegionPool].
#[derive(Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The pool was built without specifying a block size.
    #[error("pool block size must be set using .block_size() before building")]
    MissingBlockSize,

    /// The pool was configured with a block size of zero bytes.
    #[error("pool block size must be non-zero")]
    ZeroBlockSize,

    /// The pool was configured to grow by zero blocks at a time.
    #[error("pool allocation amount must be non-zero")]
    ZeroAllocationAmount,
}

/// A specialized `Result` type for pool configuration, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug, std::error::Error);

    #[test]
    fn messages_name_the_setting() {
        assert!(Error::ZeroBlockSize.to_string().contains("block size"));
        assert!(
            Error::ZeroAllocationAmount
                .to_string()
                .contains("allocation amount")
        );
    }
}

use std::fmt;

use backtrace::Backtrace;

/// The error type threaded through every fallible API in this crate.
///
/// Every variant carries a captured [`Backtrace`] so a caller can print
/// it with [`SmallError::show_backtrace`] when debugging a failing test,
/// without it showing up in the normal `Display` output.
#[derive(Debug)]
pub enum SmallError {
    /// The 500ms lock-acquire deadline elapsed, or eviction found no
    /// clean page to reclaim while the cache was full.
    TransactionAborted { message: String, backtrace: Backtrace },
    /// `HeapPage::insert_tuple` found no empty slot.
    NoSpace { backtrace: Backtrace },
    /// `HeapPage::delete_tuple` targeted a slot that is not occupied.
    NotFound { backtrace: Backtrace },
    /// `page_number` is out of range for `HeapFile::read_page` /
    /// `write_page`.
    InvalidPage { page_number: usize, backtrace: Backtrace },
    /// Underlying file I/O failure.
    Io { source: std::io::Error, backtrace: Backtrace },
}

impl SmallError {
    pub fn transaction_aborted(message: &str) -> Self {
        Self::TransactionAborted {
            message: message.to_string(),
            backtrace: Backtrace::new(),
        }
    }

    pub fn no_space() -> Self {
        Self::NoSpace {
            backtrace: Backtrace::new(),
        }
    }

    pub fn not_found() -> Self {
        Self::NotFound {
            backtrace: Backtrace::new(),
        }
    }

    pub fn invalid_page(page_number: usize) -> Self {
        Self::InvalidPage {
            page_number,
            backtrace: Backtrace::new(),
        }
    }

    /// Log the captured backtrace at `error` level. Kept off the `Display`
    /// path so assertion failures in tests stay readable.
    pub fn show_backtrace(&self) {
        log::error!("{}\n{:?}", self, self.backtrace());
    }

    fn backtrace(&self) -> &Backtrace {
        match self {
            SmallError::TransactionAborted { backtrace, .. } => backtrace,
            SmallError::NoSpace { backtrace } => backtrace,
            SmallError::NotFound { backtrace } => backtrace,
            SmallError::InvalidPage { backtrace, .. } => backtrace,
            SmallError::Io { backtrace, .. } => backtrace,
        }
    }
}

impl fmt::Display for SmallError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SmallError::TransactionAborted { message, .. } => {
                write!(f, "transaction aborted: {}", message)
            }
            SmallError::NoSpace { .. } => write!(f, "page has no empty slot"),
            SmallError::NotFound { .. } => write!(f, "tuple not found"),
            SmallError::InvalidPage { page_number, .. } => {
                write!(f, "invalid page number: {}", page_number)
            }
            SmallError::Io { source, .. } => write!(f, "io error: {}", source),
        }
    }
}

impl std::error::Error for SmallError {}

impl From<std::io::Error> for SmallError {
    fn from(source: std::io::Error) -> Self {
        SmallError::Io {
            source,
            backtrace: Backtrace::new(),
        }
    }
}

/// Shorthand used throughout the crate, mirroring the teacher's
/// `SmallResult` alias.
pub type SmallResult<T> = std::result::Result<T, SmallError>;

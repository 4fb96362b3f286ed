use std::error::Error as StdError;
use std::fmt;

use crate::canvas::CanvasError;
use crate::compositor::CompositorError;
use crate::config::ConfigError;
use crate::icon::IconError;

/// `Result<T>` provides a simplified result type with a common error type
pub type Result<T> = std::result::Result<T, Error>;

/// An error indicating that something went wrong at a module boundary that
/// can meaningfully fail and be reported. Internal per-event handling uses
/// plain `Option`/`bool` returns instead -- see the error handling design
/// for the policy this follows.
#[derive(Debug)]
pub enum Error {
    // Malformed or unreadable `.info` icon file
    Icon(IconError),

    // Malformed configuration file
    Config(ConfigError),

    // Canvas store exhausted or otherwise inconsistent
    Canvas(CanvasError),

    // Compositor bootstrap failure, e.g. a missing X extension
    Compositor(CompositorError),

    // std::io::Error, e.g. xattr or directory scan failures
    Io(std::io::Error),

    // std::str::Utf8Error
    Utf8(std::str::Utf8Error),

    // x11rb errors
    Connect(x11rb::errors::ConnectError),
    Connection(x11rb::errors::ConnectionError),
    Reply(x11rb::errors::ReplyError),
    ReplyOrId(x11rb::errors::ReplyOrIdError),
}
impl Error {
    /// Implemented directly on the `Error` type to reduce casting required
    pub fn is<T: StdError + 'static>(&self) -> bool {
        self.as_ref().is::<T>()
    }

    /// Implemented directly on the `Error` type to reduce casting required
    pub fn downcast_ref<T: StdError + 'static>(&self) -> Option<&T> {
        self.as_ref().downcast_ref::<T>()
    }

    /// Implemented directly on the `Error` type to reduce casting required
    pub fn downcast_mut<T: StdError + 'static>(&mut self) -> Option<&mut T> {
        self.as_mut().downcast_mut::<T>()
    }

    /// Implemented directly on the `Error` type to reduce casting required
    /// which allows for using as_ref to get the correct pass through.
    pub fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.as_ref().source()
    }
}
impl StdError for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Icon(ref err) => write!(f, "{}", err),
            Error::Config(ref err) => write!(f, "{}", err),
            Error::Canvas(ref err) => write!(f, "{}", err),
            Error::Compositor(ref err) => write!(f, "{}", err),
            Error::Io(ref err) => write!(f, "{}", err),
            Error::Utf8(ref err) => write!(f, "{}", err),
            Error::Connect(ref err) => write!(f, "{}", err),
            Error::Connection(ref err) => write!(f, "{}", err),
            Error::Reply(ref err) => write!(f, "{}", err),
            Error::ReplyOrId(ref err) => write!(f, "{}", err),
        }
    }
}

impl AsRef<dyn StdError> for Error {
    fn as_ref(&self) -> &(dyn StdError + 'static) {
        match *self {
            Error::Icon(ref err) => err,
            Error::Config(ref err) => err,
            Error::Canvas(ref err) => err,
            Error::Compositor(ref err) => err,
            Error::Io(ref err) => err,
            Error::Utf8(ref err) => err,
            Error::Connect(ref err) => err,
            Error::Connection(ref err) => err,
            Error::Reply(ref err) => err,
            Error::ReplyOrId(ref err) => err,
        }
    }
}

impl AsMut<dyn StdError> for Error {
    fn as_mut(&mut self) -> &mut (dyn StdError + 'static) {
        match *self {
            Error::Icon(ref mut err) => err,
            Error::Config(ref mut err) => err,
            Error::Canvas(ref mut err) => err,
            Error::Compositor(ref mut err) => err,
            Error::Io(ref mut err) => err,
            Error::Utf8(ref mut err) => err,
            Error::Connect(ref mut err) => err,
            Error::Connection(ref mut err) => err,
            Error::Reply(ref mut err) => err,
            Error::ReplyOrId(ref mut err) => err,
        }
    }
}

impl From<IconError> for Error {
    fn from(err: IconError) -> Error {
        Error::Icon(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Error {
        Error::Config(err)
    }
}

impl From<CanvasError> for Error {
    fn from(err: CanvasError) -> Error {
        Error::Canvas(err)
    }
}

impl From<CompositorError> for Error {
    fn from(err: CompositorError) -> Error {
        Error::Compositor(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Error {
        Error::Utf8(err)
    }
}

// x11rb errors
//--------------------------------------------------------------------------------------------------
impl From<x11rb::errors::ConnectError> for Error {
    fn from(err: x11rb::errors::ConnectError) -> Error {
        Error::Connect(err)
    }
}

impl From<x11rb::errors::ConnectionError> for Error {
    fn from(err: x11rb::errors::ConnectionError) -> Error {
        Error::Connection(err)
    }
}

impl From<x11rb::errors::ReplyError> for Error {
    fn from(err: x11rb::errors::ReplyError) -> Error {
        Error::Reply(err)
    }
}

impl From<x11rb::errors::ReplyOrIdError> for Error {
    fn from(err: x11rb::errors::ReplyOrIdError) -> Error {
        Error::ReplyOrId(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcasts_wrapped_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let err: Error = io.into();
        assert!(err.is::<std::io::Error>());
    }
}

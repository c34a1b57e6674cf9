use std::error::Error as StdError;
use std::io::ErrorKind;

use crate::domain::FailureKind;

/// Maps a transport failure onto the failure taxonomy.
pub(crate) fn classify_error(err: &reqwest::Error) -> FailureKind {
    if err.is_timeout() {
        return FailureKind::Timeout;
    }
    if err.is_connect() || has_connection_io_error(err) {
        return FailureKind::ConnectionError;
    }
    if err.is_request() || err.is_body() || err.is_decode() || err.is_redirect() {
        return FailureKind::ProtocolError;
    }
    FailureKind::Unexpected
}

fn has_connection_io_error(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<std::io::Error>()
            && is_connection_kind(io_err.kind())
        {
            return true;
        }
        source = inner.source();
    }
    false
}

const fn is_connection_kind(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
    )
}

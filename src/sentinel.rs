//! Return-value sentinels for the blocking read/write/accept path.
//!
//! These are literal, not an enum, because the API surface they serve
//! returns a byte count on the same channel (`isize`) — callers compare
//! against these constants the way POSIX callers compare against `-1`.

/// Peer closed its write side (FIN received); no more data will arrive.
pub const EOF: isize = -1;

/// The call's timeout elapsed before it could complete.
pub const TIMEOUT: isize = -2;

/// The connection was reset or aborted by the peer or the stack.
pub const ABORT: isize = -3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_values_are_the_normative_literals() {
        assert_eq!(EOF, -1);
        assert_eq!(TIMEOUT, -2);
        assert_eq!(ABORT, -3);
    }
}

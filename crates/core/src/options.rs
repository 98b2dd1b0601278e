use crate::network::SocketOption;

/// Value of a socket option that has never been set.
pub const UNSET: i32 = -1;

/// Last-applied socket buffer sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketOptions {
    pub send_buffer_size: i32,
    pub recv_buffer_size: i32,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            send_buffer_size: UNSET,
            recv_buffer_size: UNSET,
        }
    }
}

impl SocketOptions {
    /// Record `value` for `option`. Returns `false` when the option kind is
    /// not tracked, leaving both sizes untouched.
    pub fn apply(&mut self, option: SocketOption, value: i32) -> bool {
        match option {
            SocketOption::SendBufferSize => self.send_buffer_size = value,
            SocketOption::RecvBufferSize => self.recv_buffer_size = value,
            other => {
                tracing::debug!(option = ?other, value, "socket option ignored");
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unset() {
        let opts = SocketOptions::default();
        assert_eq!(opts.send_buffer_size, UNSET);
        assert_eq!(opts.recv_buffer_size, UNSET);
    }

    #[test]
    fn last_value_wins() {
        let mut opts = SocketOptions::default();
        assert!(opts.apply(SocketOption::SendBufferSize, 1024));
        assert!(opts.apply(SocketOption::SendBufferSize, 4096));
        assert!(opts.apply(SocketOption::RecvBufferSize, 2048));
        assert_eq!(opts.send_buffer_size, 4096);
        assert_eq!(opts.recv_buffer_size, 2048);
    }

    #[test]
    fn unknown_option_is_ignored() {
        let mut opts = SocketOptions::default();
        opts.apply(SocketOption::SendBufferSize, 10);
        assert!(!opts.apply(SocketOption::NoDelay, 1));
        assert!(!opts.apply(SocketOption::DontFragment, 1));
        assert_eq!(opts.send_buffer_size, 10);
        assert_eq!(opts.recv_buffer_size, UNSET);
    }
}

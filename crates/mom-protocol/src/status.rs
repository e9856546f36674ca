/// Result of handling a request or notification.
///
/// `Continue` is a private sentinel meaning "not handled here, fall through
/// to the next stage" and must never be written to the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    SocketError = -3,
    NoMemory = -2,
    Continue = -1,
    Success = 0,
    InvalidRequest = 1,
    InvalidParameter = 2,
    RequiresMaster = 4,
}

impl Status {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_external_contract() {
        assert_eq!(Status::SocketError.code(), -3);
        assert_eq!(Status::NoMemory.code(), -2);
        assert_eq!(Status::Continue.code(), -1);
        assert_eq!(Status::Success.code(), 0);
        assert_eq!(Status::InvalidRequest.code(), 1);
        assert_eq!(Status::InvalidParameter.code(), 2);
        assert_eq!(Status::RequiresMaster.code(), 4);
    }
}

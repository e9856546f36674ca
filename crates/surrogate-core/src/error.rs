/// Crate-level error type, unifying the resource-error category of the
/// error-handling design (§7.3): bind/socket failures and interface
/// enumeration failures. Protocol and transport errors (§7.1, §7.2) are
/// represented as `mom_protocol::Status` values on the wire, not as this
/// type — they're expected outcomes of normal operation, not failures of
/// the engine itself.
#[derive(Debug)]
pub enum SurrogateError {
    Io(std::io::Error),
    /// `BeginDiscoverability` called while already discoverable.
    AlreadyDiscoverable,
    InterfaceEnumeration(std::io::Error),
}

impl std::fmt::Display for SurrogateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurrogateError::Io(e) => write!(f, "I/O error: {e}"),
            SurrogateError::AlreadyDiscoverable => {
                write!(f, "controller is already discoverable")
            }
            SurrogateError::InterfaceEnumeration(e) => {
                write!(f, "interface enumeration failed: {e}")
            }
        }
    }
}

impl std::error::Error for SurrogateError {}

impl From<std::io::Error> for SurrogateError {
    fn from(value: std::io::Error) -> Self {
        SurrogateError::Io(value)
    }
}

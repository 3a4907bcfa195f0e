#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOperation {
    Connect,
    Read,
    Write,
    Flush,
    Configure,
    Control,
}

impl std::fmt::Display for IoOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Flush => write!(f, "flush"),
            Self::Configure => write!(f, "configure"),
            Self::Control => write!(f, "control"),
        }
    }
}

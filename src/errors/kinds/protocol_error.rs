/// Ways a structurally valid, non-exception response can still violate
/// the contract of the request that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    FunctionMismatch,
    ByteCountMismatch,
    EchoMismatch,
    TransactionIdMismatch,
    InvalidProtocolId,
    InvalidConformityLevel,
    InvalidPdu,
}

impl std::fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FunctionMismatch => write!(f, "Function code mismatch"),
            Self::ByteCountMismatch => write!(f, "Byte count mismatch"),
            Self::EchoMismatch => write!(f, "Echo mismatch"),
            Self::TransactionIdMismatch => write!(f, "Transaction ID mismatch"),
            Self::InvalidProtocolId => write!(f, "Invalid protocol ID"),
            Self::InvalidConformityLevel => write!(f, "Invalid conformity level"),
            Self::InvalidPdu => write!(f, "Invalid PDU format"),
        }
    }
}

#[macro_use]
extern crate tracing;

pub mod ber;
pub mod credssp;
pub mod ntlm;
pub mod utils;

mod auth_identity;
mod config;
mod mechanism;
mod secret;
mod transport;

use std::{error, fmt, io, result};

pub use crate::auth_identity::{AuthIdentity, AuthIdentityBuffers};
pub use crate::config::{CredSspConfig, SmartCardConfig};
pub use crate::credssp::{CredSspClient, CredSspState, TsRequest, TS_REQUEST_VERSION};
pub use crate::mechanism::{
    ContextGrantedFlags, ContextRequestFlags, ContextStep, MechanismId, SecurityProvider, SecurityStatus,
    MECHANISM_SPNEGO_KRB5,
};
pub use crate::secret::Secret;
pub use crate::transport::SecureTransport;

pub type Result<T> = result::Result<T, Error>;

/// The failure classes of the NLA handshake. Every failure is terminal for the
/// connection attempt: the caller either falls back to a lower-assurance
/// authentication path or abandons the connection.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    /// The secure transport failed to connect, send or receive.
    TransportFailure,
    /// The negotiation library does not offer the desired mechanism.
    MechanismUnavailable,
    /// A tag, type or field value did not match the protocol grammar.
    ProtocolViolation,
    /// A declared length exceeds the bytes actually available.
    TruncatedMessage,
    /// The negotiated security services do not include encryption.
    ConfidentialityUnavailable,
    /// The server's public-key proof does not match the transport key.
    PublicKeyMismatch,
    /// The credential structure could not be encoded.
    CredentialEncodingFailure,
    /// An operation was invoked in a state that does not permit it.
    OutOfSequence,
}

/// Holds the [`ErrorKind`](enum.ErrorKind.html) and the description of the error.
#[derive(Debug, Clone)]
pub struct Error {
    pub error_type: ErrorKind,
    pub description: String,
}

impl Error {
    /// Allows to fill a new error easily, supplying it with a coherent description.
    pub fn new(error_type: ErrorKind, description: impl Into<String>) -> Self {
        Self {
            error_type,
            description: description.into(),
        }
    }
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.error_type, self.description)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        let error_type = match err.kind() {
            io::ErrorKind::UnexpectedEof => ErrorKind::TruncatedMessage,
            io::ErrorKind::InvalidData => ErrorKind::ProtocolViolation,
            _ => ErrorKind::TransportFailure,
        };

        Self::new(error_type, format!("IO error: {}", err))
    }
}

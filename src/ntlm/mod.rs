//! Self-contained codec for the three-message challenge-response fallback,
//! used when no system negotiation library is available for the desired
//! mechanism. This module owns message construction and parsing only; the
//! response computation (hashes, key exchange) belongs to the caller, exactly
//! like the rest of the cryptography in this crate.

mod config;
mod messages;
#[cfg(test)]
mod test;

use std::io;

use bitflags::bitflags;
use messages::client;

pub use self::config::NtlmConfig;
use crate::mechanism::SecurityStatus;
use crate::AuthIdentityBuffers;

pub const CHALLENGE_SIZE: usize = 8;
pub const NTLM_VERSION_SIZE: usize = 8;

bitflags! {
    /// Capability flags of the fallback negotiation ([MS-NLMP] 2.2.2.5).
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct NegotiateFlags: u32 {
        const NTLM_SSP_NEGOTIATE56 = 0x8000_0000;
        const NTLM_SSP_NEGOTIATE_KEY_EXCH = 0x4000_0000;
        const NTLM_SSP_NEGOTIATE128 = 0x2000_0000;
        const NTLM_SSP_NEGOTIATE_VERSION = 0x0200_0000;
        const NTLM_SSP_NEGOTIATE_TARGET_INFO = 0x0080_0000;
        const NTLM_SSP_REQUEST_NON_NT_SESSION_KEY = 0x0040_0000;
        const NTLM_SSP_NEGOTIATE_IDENTIFY = 0x0010_0000;
        const NTLM_SSP_NEGOTIATE_EXTENDED_SESSION_SECURITY = 0x0008_0000;
        const NTLM_SSP_TARGET_TYPE_SERVER = 0x0002_0000;
        const NTLM_SSP_TARGET_TYPE_DOMAIN = 0x0001_0000;
        const NTLM_SSP_NEGOTIATE_ALWAYS_SIGN = 0x0000_8000;
        const NTLM_SSP_NEGOTIATE_OEM_WORKSTATION_SUPPLIED = 0x0000_2000;
        const NTLM_SSP_NEGOTIATE_OEM_DOMAIN_SUPPLIED = 0x0000_1000;
        const NTLM_SSP_NEGOTIATE_NTLM = 0x0000_0200;
        const NTLM_SSP_NEGOTIATE_LM_KEY = 0x0000_0080;
        const NTLM_SSP_NEGOTIATE_DATAGRAM = 0x0000_0040;
        const NTLM_SSP_NEGOTIATE_SEAL = 0x0000_0020;
        const NTLM_SSP_NEGOTIATE_SIGN = 0x0000_0010;
        const NTLM_SSP_REQUEST_TARGET = 0x0000_0004;
        const NTLM_SSP_NEGOTIATE_OEM = 0x0000_0002;
        const NTLM_SSP_NEGOTIATE_UNICODE = 0x0000_0001;
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum NtlmState {
    Negotiate,
    Challenge,
    Authenticate,
    Final,
}

/// The parsed server challenge.
#[derive(Debug, Clone)]
pub struct ChallengeMessage {
    pub server_challenge: [u8; CHALLENGE_SIZE],
    pub negotiated_flags: NegotiateFlags,
    pub target_name: Option<Vec<u8>>,
    pub target_info: Option<Vec<u8>>,
}

/// Proof material computed by the caller from the server challenge and the
/// user's secret, carried verbatim by the final message.
#[derive(Debug, Clone, Default)]
pub struct NtlmResponses {
    pub lm_challenge_response: Vec<u8>,
    pub nt_challenge_response: Vec<u8>,
    pub encrypted_random_session_key: Option<Vec<u8>>,
    /// Exported session key, retained for whoever seals the later traffic.
    pub session_key: Option<Vec<u8>>,
}

/// The assembled final message. The integrity-check slot is written as zeros;
/// `mic_offset` tells a later pass where to splice the computed value in.
#[derive(Debug, Clone)]
pub struct AuthenticateMessage {
    message: Vec<u8>,
    mic_offset: Option<usize>,
}

impl AuthenticateMessage {
    pub fn message(&self) -> &[u8] {
        &self.message
    }

    pub fn mic_offset(&self) -> Option<usize> {
        self.mic_offset
    }
}

/// Fallback negotiation context: capability flags, the server challenge and
/// the session key once known. Lives for one connection attempt.
#[derive(Debug, Clone)]
pub struct Ntlm {
    config: NtlmConfig,

    state: NtlmState,
    flags: NegotiateFlags,

    negotiate_message: Option<Vec<u8>>,
    challenge_message: Option<ChallengeMessage>,
    authenticate_message: Option<AuthenticateMessage>,

    session_key: Option<Vec<u8>>,
}

impl Ntlm {
    pub fn new() -> Self {
        Self::with_config(NtlmConfig::default())
    }

    pub fn with_config(config: NtlmConfig) -> Self {
        Self {
            config,

            state: NtlmState::Negotiate,
            flags: NegotiateFlags::empty(),

            negotiate_message: None,
            challenge_message: None,
            authenticate_message: None,

            session_key: None,
        }
    }

    pub fn negotiated_flags(&self) -> NegotiateFlags {
        self.flags
    }

    /// Raw bytes of the sent offer, kept because the integrity check of the
    /// final message covers all three messages.
    pub fn negotiate_message(&self) -> Option<&[u8]> {
        self.negotiate_message.as_deref()
    }

    pub fn challenge(&self) -> Option<&ChallengeMessage> {
        self.challenge_message.as_ref()
    }

    pub fn authenticate_message(&self) -> Option<&AuthenticateMessage> {
        self.authenticate_message.as_ref()
    }

    pub fn session_key(&self) -> Option<&[u8]> {
        self.session_key.as_deref()
    }

    /// Builds and sends the initial offer.
    pub fn write_negotiate(&mut self, transport: impl io::Write) -> crate::Result<SecurityStatus> {
        client::write_negotiate(self, transport)
    }

    /// Parses the server challenge. `stream` must carry exactly one message.
    pub fn read_challenge(&mut self, stream: impl io::Read) -> crate::Result<SecurityStatus> {
        client::read_challenge(self, stream)
    }

    /// Assembles and sends the final response.
    pub fn write_authenticate(
        &mut self,
        identity: &AuthIdentityBuffers,
        responses: NtlmResponses,
        transport: impl io::Write,
    ) -> crate::Result<SecurityStatus> {
        client::write_authenticate(self, identity, responses, transport)
    }
}

impl Default for Ntlm {
    fn default() -> Self {
        Self::new()
    }
}

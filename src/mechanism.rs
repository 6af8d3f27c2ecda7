use std::fmt;

use bitflags::bitflags;

/// DER-encoded body of a mechanism object identifier.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct MechanismId(pub &'static [u8]);

/// The Kerberos v5 mechanism (1.2.840.113554.1.2.2), negotiated through SPNEGO.
pub const MECHANISM_SPNEGO_KRB5: MechanismId =
    MechanismId(&[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x12, 0x01, 0x02, 0x02]);

impl fmt::Debug for MechanismId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MechanismId(0x")?;
        self.0.iter().try_for_each(|byte| write!(f, "{byte:02x}"))?;
        write!(f, ")")?;

        Ok(())
    }
}

bitflags! {
    /// Services requested from the negotiation library when a context is
    /// initialized.
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct ContextRequestFlags: u32 {
        const DELEGATE = 0x1;
        const MUTUAL_AUTH = 0x2;
        const REPLAY_DETECT = 0x4;
        const SEQUENCE_DETECT = 0x8;
        const CONFIDENTIALITY = 0x10;
        const INTEGRITY = 0x20;
    }
}

bitflags! {
    /// Services the negotiation library reports as actually granted.
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct ContextGrantedFlags: u32 {
        const DELEGATE = 0x1;
        const MUTUAL_AUTH = 0x2;
        const REPLAY_DETECT = 0x4;
        const SEQUENCE_DETECT = 0x8;
        const CONFIDENTIALITY = 0x10;
        const INTEGRITY = 0x20;
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SecurityStatus {
    /// The context is fully established.
    Completed,
    /// Another token exchange with the peer is required.
    ContinueNeeded,
}

/// Result of one context-establishment step.
#[derive(Debug, Clone)]
pub struct ContextStep {
    pub status: SecurityStatus,
    /// Token to forward to the peer. Empty when the mechanism produced none
    /// for this round.
    pub output_token: Vec<u8>,
    pub granted: ContextGrantedFlags,
}

/// The system-provided security negotiation library (GSS-API shaped). The
/// library owns all cryptography; this crate only drives the token exchange
/// and the wrap/unwrap calls.
///
/// The context handle is opaque to the caller and lives for at most one
/// connection attempt; the state machine releases it on every exit path.
pub trait SecurityProvider {
    type Context;
    type TargetName;

    /// Reports whether the library supports `mechanism` at all. Checked
    /// before the first round so an unusable setup fails fast instead of
    /// mid-handshake.
    fn mechanism_available(&mut self, mechanism: &MechanismId) -> crate::Result<bool>;

    /// Imports a `service@hostname` principal into the library's name form.
    fn import_service_name(&mut self, service_principal: &str) -> crate::Result<Self::TargetName>;

    /// Runs one step of context establishment. `context` is `None` on the
    /// first call and carries the partially established context afterwards;
    /// `input_token` is empty on round zero.
    fn initialize_context(
        &mut self,
        context: &mut Option<Self::Context>,
        target_name: &Self::TargetName,
        mechanism: &MechanismId,
        flags: ContextRequestFlags,
        input_token: &[u8],
    ) -> crate::Result<ContextStep>;

    /// Protects a message with the established context. With `confidential`
    /// set the call must fail rather than fall back to signing only.
    fn wrap(&mut self, context: &mut Self::Context, plaintext: &[u8], confidential: bool) -> crate::Result<Vec<u8>>;

    /// Removes the protection applied by the peer's `wrap`.
    fn unwrap(&mut self, context: &mut Self::Context, ciphertext: &[u8]) -> crate::Result<Vec<u8>>;

    /// Disposes of a context. Infallible by design: there is nothing a caller
    /// could do about a failed release on its way out.
    fn release_context(&mut self, context: Self::Context);
}

pub mod ts_credentials;
mod ts_request;

use std::io;

pub use self::ts_request::{TsRequest, TS_REQUEST_VERSION};
use crate::mechanism::{ContextGrantedFlags, ContextRequestFlags, SecurityProvider, SecurityStatus};
use crate::{ber, AuthIdentity, AuthIdentityBuffers, CredSspConfig, Error, ErrorKind, SecureTransport, MECHANISM_SPNEGO_KRB5};

/// Service class of the remote-desktop service principal.
const SERVICE_CLASS: &str = "TERMSRV";

/// Number of bytes read to decode the outer envelope header before the rest
/// of the message length is known.
const ENVELOPE_HEADER_PREFIX: usize = 4;

/// Progress of one connection attempt. `Failed` is terminal and reachable
/// from every other state.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CredSspState {
    Init,
    MechanismCheck,
    TargetResolved,
    Negotiating,
    PubKeyBound,
    CredentialsSent,
    Established,
    Failed,
}

/// Implements the CredSSP *client*: drives the SPNEGO token exchange over the
/// secure transport, proves the transport endpoint through the public-key
/// echo and finally delegates the user's credentials to the server.
///
/// One instance covers exactly one connection attempt; a retry takes a fresh
/// instance with a fresh security context.
pub struct CredSspClient<T, P: SecurityProvider> {
    transport: T,
    provider: P,
    credentials: AuthIdentity,
    config: CredSspConfig,
    server_hostname: String,
    state: CredSspState,
    context: Option<P::Context>,
}

impl<T: SecureTransport, P: SecurityProvider> CredSspClient<T, P> {
    pub fn new(
        transport: T,
        provider: P,
        credentials: AuthIdentity,
        config: CredSspConfig,
        server_hostname: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            provider,
            credentials,
            config,
            server_hostname: server_hostname.into(),
            state: CredSspState::Init,
            context: None,
        }
    }

    pub fn state(&self) -> CredSspState {
        self.state
    }

    /// Runs the complete handshake. There is no partial success: the result
    /// is `Ok(())` once the credentials have been delegated, or the first
    /// fatal error. The security context and the key buffers are released on
    /// every exit path, success and failure alike.
    #[instrument(fields(server = %self.server_hostname), skip_all)]
    pub fn authenticate(&mut self) -> crate::Result<()> {
        if matches!(self.state, CredSspState::Established | CredSspState::Failed) {
            return Err(Error::new(
                ErrorKind::OutOfSequence,
                "'authenticate' must not be fired again after a terminal state",
            ));
        }

        let outcome = self.run_handshake();

        if let Some(context) = self.context.take() {
            self.provider.release_context(context);
        }

        match &outcome {
            Ok(()) => {
                self.state = CredSspState::Established;
                debug!("NLA handshake established");
            }
            Err(error) => {
                self.state = CredSspState::Failed;
                error!(%error, "NLA handshake failed");
            }
        }

        outcome
    }

    fn run_handshake(&mut self) -> crate::Result<()> {
        self.state = CredSspState::MechanismCheck;
        if !self.provider.mechanism_available(&MECHANISM_SPNEGO_KRB5)? {
            return Err(Error::new(
                ErrorKind::MechanismUnavailable,
                "the system does not support the desired authentication mechanism; \
                 is a valid Kerberos ticket available?",
            ));
        }

        let service_principal = format!("{}@{}", SERVICE_CLASS, self.server_hostname);
        let target_name = self.provider.import_service_name(&service_principal)?;
        self.state = CredSspState::TargetResolved;

        // Both the channel and its public key are preconditions for every
        // negotiation round.
        self.transport.connect()?;
        let public_key = self.transport.peer_public_key()?;

        self.state = CredSspState::Negotiating;
        self.negotiate(&target_name, &public_key)?;

        self.verify_public_key_echo(&public_key)?;
        self.state = CredSspState::PubKeyBound;

        self.send_credentials()?;
        self.state = CredSspState::CredentialsSent;

        Ok(())
    }

    /// The SPNEGO loop: feed the peer's previous token to the mechanism,
    /// forward whatever token it produces, repeat until the mechanism reports
    /// completion. Completion on our side is signaled to the peer by the
    /// encrypted public key instead of another token.
    fn negotiate(&mut self, target_name: &P::TargetName, public_key: &[u8]) -> crate::Result<()> {
        let mut input_token = Vec::new();
        let mut round = 0;

        loop {
            let step = self
                .provider
                .initialize_context(
                    &mut self.context,
                    target_name,
                    &MECHANISM_SPNEGO_KRB5,
                    ContextRequestFlags::MUTUAL_AUTH | ContextRequestFlags::DELEGATE,
                    &input_token,
                )
                .map_err(|error| {
                    if round == 0 {
                        warn!("failed to initialize NLA, do you have a correct Kerberos TGT initialized?");
                    }
                    error
                })?;

            if !step.output_token.is_empty() {
                self.send_ts_request(TsRequest::with_nego_tokens(step.output_token))?;
            }

            match step.status {
                SecurityStatus::ContinueNeeded => {
                    input_token = self.read_ts_response(false)?;
                    round += 1;
                }
                SecurityStatus::Completed => {
                    debug!(rounds = round + 1, "security context established");

                    if !step.granted.contains(ContextGrantedFlags::CONFIDENTIALITY) {
                        return Err(Error::new(
                            ErrorKind::ConfidentialityUnavailable,
                            "confidentiality service required but was not negotiated",
                        ));
                    }

                    let proof = self.wrap(public_key)?;
                    self.send_ts_request(TsRequest::with_pub_key_auth(proof))?;

                    return Ok(());
                }
            }
        }
    }

    /// Reads the server's confirmation and checks the anti-replay echo: the
    /// server adds one to the first byte of the public key before wrapping
    /// it, so the unwrapped blob must match the transport key after the first
    /// byte is decremented again.
    fn verify_public_key_echo(&mut self, public_key: &[u8]) -> crate::Result<()> {
        let blob = self.read_ts_response(true)?;
        let mut echoed = self.unwrap(&blob)?;

        if let Some(first_byte) = echoed.first_mut() {
            *first_byte = first_byte.wrapping_sub(1);
        }

        if echoed.as_slice() != public_key {
            error!("public key mismatch, cannot guarantee the integrity of the server connection");

            return Err(Error::new(
                ErrorKind::PublicKeyMismatch,
                "the echoed public key does not match the transport public key",
            ));
        }

        Ok(())
    }

    fn send_credentials(&mut self) -> crate::Result<()> {
        let identity = AuthIdentityBuffers::from(self.credentials.clone());
        let ts_credentials = ts_credentials::write_ts_credentials(&identity, &self.config)?;

        let blob = self.wrap(&ts_credentials)?;
        self.send_ts_request(TsRequest::with_auth_info(blob))?;
        debug!("TSCredentials have been delegated");

        Ok(())
    }

    fn send_ts_request(&mut self, ts_request: TsRequest) -> crate::Result<()> {
        let mut buffer = Vec::new();
        ts_request.encode(&mut buffer)?;

        self.transport.send(&buffer)
    }

    /// Reads one envelope from the transport and extracts the expected
    /// payload field. The outer header is decoded from a fixed-size prefix to
    /// learn how many bytes the rest of the message occupies.
    fn read_ts_response(&mut self, expect_pubkey: bool) -> crate::Result<Vec<u8>> {
        let mut buffer = self.transport.recv(ENVELOPE_HEADER_PREFIX)?;

        let mut stream = io::Cursor::new(buffer.as_slice());
        let declared = ber::read_sequence_tag(&mut stream)?;
        let in_hand = buffer.len() - stream.position() as usize;

        if declared > in_hand {
            let rest = self.transport.recv(declared - in_hand)?;
            buffer.extend_from_slice(&rest);
        }

        let ts_request = TsRequest::from_buffer(&buffer)?;

        if expect_pubkey {
            ts_request.pub_key_auth.ok_or_else(|| {
                Error::new(
                    ErrorKind::ProtocolViolation,
                    "expected an encrypted public key in the server response",
                )
            })
        } else {
            ts_request.nego_tokens.ok_or_else(|| {
                Error::new(
                    ErrorKind::ProtocolViolation,
                    "expected a negotiation token in the server response",
                )
            })
        }
    }

    fn wrap(&mut self, plaintext: &[u8]) -> crate::Result<Vec<u8>> {
        let context = self
            .context
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::OutOfSequence, "no security context has been established"))?;

        self.provider.wrap(context, plaintext, true)
    }

    fn unwrap(&mut self, ciphertext: &[u8]) -> crate::Result<Vec<u8>> {
        let context = self
            .context
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::OutOfSequence, "no security context has been established"))?;

        self.provider.unwrap(context, ciphertext)
    }
}

use std::io;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::mechanism::SecurityStatus;
use crate::ntlm::messages::{MessageFields, MessageTypes, NTLM_SIGNATURE};
use crate::ntlm::{
    AuthenticateMessage, NegotiateFlags, Ntlm, NtlmResponses, NtlmState, NTLM_VERSION_SIZE,
};
use crate::{utils, AuthIdentityBuffers, Error, ErrorKind};

const HEADER_SIZE: usize = 64;
const MESSAGE_INTEGRITY_CHECK_SIZE: usize = 16;

struct AuthenticateMessageFields {
    domain_name: MessageFields,
    user_name: MessageFields,
    workstation: MessageFields,
    lm_challenge_response: MessageFields,
    nt_challenge_response: MessageFields,
    encrypted_random_session_key: MessageFields,
}

impl AuthenticateMessageFields {
    fn new(
        identity: &AuthIdentityBuffers,
        workstation: Option<&str>,
        responses: &NtlmResponses,
        flags: NegotiateFlags,
        offset: u32,
    ) -> Self {
        let mut domain_name = MessageFields::with_buffer(encode_text_buffer(&identity.domain, flags));
        let mut user_name = MessageFields::with_buffer(encode_text_buffer(&identity.user, flags));
        let mut workstation = MessageFields::with_buffer(encode_text(workstation.unwrap_or_default(), flags));
        let mut lm_challenge_response = MessageFields::with_buffer(responses.lm_challenge_response.clone());
        let mut nt_challenge_response = MessageFields::with_buffer(responses.nt_challenge_response.clone());
        let mut encrypted_random_session_key =
            MessageFields::with_buffer(responses.encrypted_random_session_key.clone().unwrap_or_default());

        domain_name.buffer_offset = offset;
        user_name.buffer_offset = domain_name.buffer_offset + domain_name.buffer.len() as u32;
        workstation.buffer_offset = user_name.buffer_offset + user_name.buffer.len() as u32;
        lm_challenge_response.buffer_offset = workstation.buffer_offset + workstation.buffer.len() as u32;
        nt_challenge_response.buffer_offset =
            lm_challenge_response.buffer_offset + lm_challenge_response.buffer.len() as u32;
        encrypted_random_session_key.buffer_offset =
            nt_challenge_response.buffer_offset + nt_challenge_response.buffer.len() as u32;

        AuthenticateMessageFields {
            domain_name,
            user_name,
            workstation,
            lm_challenge_response,
            nt_challenge_response,
            encrypted_random_session_key,
        }
    }

    fn data_len(&self) -> usize {
        self.encrypted_random_session_key.buffer_offset as usize + self.encrypted_random_session_key.buffer.len()
    }
}

fn check_state(state: NtlmState) -> crate::Result<()> {
    if state != NtlmState::Authenticate {
        Err(Error::new(
            ErrorKind::OutOfSequence,
            "write authenticate was fired but the state is not an Authenticate",
        ))
    } else {
        Ok(())
    }
}

pub(crate) fn write_authenticate(
    context: &mut Ntlm,
    identity: &AuthIdentityBuffers,
    responses: NtlmResponses,
    mut transport: impl io::Write,
) -> crate::Result<SecurityStatus> {
    check_state(context.state)?;

    if responses.nt_challenge_response.is_empty() {
        return Err(Error::new(
            ErrorKind::CredentialEncodingFailure,
            "the NT challenge response cannot be empty",
        ));
    }

    let flags = context.flags;
    let with_version = flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_VERSION);
    let with_mic = flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_TARGET_INFO);

    let mut payload_offset = HEADER_SIZE;
    if with_version {
        payload_offset += NTLM_VERSION_SIZE;
    }
    if with_mic {
        payload_offset += MESSAGE_INTEGRITY_CHECK_SIZE;
    }

    let message_fields = AuthenticateMessageFields::new(
        identity,
        context.config.workstation.as_deref(),
        &responses,
        flags,
        payload_offset as u32,
    );

    let mut buffer = Vec::with_capacity(message_fields.data_len());

    write_header(flags, &message_fields, &mut buffer)?;

    if with_version {
        buffer.extend_from_slice(&[0x00; NTLM_VERSION_SIZE]);
    }

    let mic_offset = if with_mic {
        let mic_offset = buffer.len();
        buffer.extend_from_slice(&[0x00; MESSAGE_INTEGRITY_CHECK_SIZE]);
        Some(mic_offset)
    } else {
        None
    };

    write_payload(&message_fields, &mut buffer)?;

    transport.write_all(buffer.as_slice())?;
    transport.flush()?;

    context.session_key = responses.session_key;
    context.authenticate_message = Some(AuthenticateMessage {
        message: buffer,
        mic_offset,
    });
    context.state = NtlmState::Final;

    Ok(SecurityStatus::Completed)
}

fn write_header(
    negotiate_flags: NegotiateFlags,
    message_fields: &AuthenticateMessageFields,
    mut buffer: impl io::Write,
) -> io::Result<()> {
    buffer.write_all(NTLM_SIGNATURE)?; // signature 8 bytes
    buffer.write_u32::<LittleEndian>(MessageTypes::Authenticate as u32)?; // message type 4 bytes
    message_fields.lm_challenge_response.write_to(&mut buffer)?; // LmChallengeResponseFields 8 bytes
    message_fields.nt_challenge_response.write_to(&mut buffer)?; // NtChallengeResponseFields 8 bytes
    message_fields.domain_name.write_to(&mut buffer)?; // DomainNameFields 8 bytes
    message_fields.user_name.write_to(&mut buffer)?; // UserNameFields 8 bytes
    message_fields.workstation.write_to(&mut buffer)?; // WorkstationFields 8 bytes
    message_fields.encrypted_random_session_key.write_to(&mut buffer)?; // EncryptedRandomSessionKeyFields 8 bytes
    buffer.write_u32::<LittleEndian>(negotiate_flags.bits())?; // negotiate flags 4 bytes

    Ok(())
}

fn write_payload(message_fields: &AuthenticateMessageFields, mut buffer: impl io::Write) -> io::Result<()> {
    message_fields.domain_name.write_buffer_to(&mut buffer)?;
    message_fields.user_name.write_buffer_to(&mut buffer)?;
    message_fields.workstation.write_buffer_to(&mut buffer)?;
    message_fields.lm_challenge_response.write_buffer_to(&mut buffer)?;
    message_fields.nt_challenge_response.write_buffer_to(&mut buffer)?;
    message_fields.encrypted_random_session_key.write_buffer_to(&mut buffer)?;

    Ok(())
}

/// Identity buffers are kept in UTF-16LE; the wire form depends on what the
/// peers negotiated.
fn encode_text_buffer(buffer: &[u8], flags: NegotiateFlags) -> Vec<u8> {
    if flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_UNICODE) {
        buffer.to_vec()
    } else {
        utils::bytes_to_utf16_string(buffer).into_bytes()
    }
}

fn encode_text(value: &str, flags: NegotiateFlags) -> Vec<u8> {
    if flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_UNICODE) {
        utils::string_to_utf16(value)
    } else {
        value.as_bytes().to_vec()
    }
}

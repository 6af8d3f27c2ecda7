use std::io;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::ntlm::messages::{MessageFields, MessageTypes, NTLM_SIGNATURE};
use crate::ntlm::{NegotiateFlags, Ntlm, NtlmConfig, NtlmState};
use crate::mechanism::SecurityStatus;
use crate::{Error, ErrorKind};

const HEADER_SIZE: usize = 32;

struct NegotiateMessageFields {
    domain_name: MessageFields,
    workstation: MessageFields,
}

impl NegotiateMessageFields {
    fn new(config: &NtlmConfig, offset: u32) -> Self {
        let mut domain_name = MessageFields::with_buffer(
            config.domain.as_ref().map(|domain| domain.as_bytes().to_vec()).unwrap_or_default(),
        );
        let mut workstation = MessageFields::with_buffer(
            config
                .workstation
                .as_ref()
                .map(|workstation| workstation.as_bytes().to_vec())
                .unwrap_or_default(),
        );

        domain_name.buffer_offset = offset;
        workstation.buffer_offset = domain_name.buffer_offset + domain_name.buffer.len() as u32;

        NegotiateMessageFields {
            domain_name,
            workstation,
        }
    }

    fn data_len(&self) -> usize {
        self.workstation.buffer_offset as usize + self.workstation.buffer.len()
    }
}

fn check_state(state: NtlmState) -> crate::Result<()> {
    if state != NtlmState::Negotiate {
        Err(Error::new(
            ErrorKind::OutOfSequence,
            "write negotiate was fired but the state is not a Negotiate",
        ))
    } else {
        Ok(())
    }
}

pub(crate) fn write_negotiate(context: &mut Ntlm, mut transport: impl io::Write) -> crate::Result<SecurityStatus> {
    check_state(context.state)?;

    let negotiate_flags = get_flags(&context.config);
    let message_fields = NegotiateMessageFields::new(&context.config, HEADER_SIZE as u32);

    let mut buffer = Vec::with_capacity(message_fields.data_len());

    write_header(negotiate_flags, &message_fields, &mut buffer)?;
    write_payload(&message_fields, &mut buffer)?;
    context.flags = negotiate_flags;

    transport.write_all(buffer.as_slice())?;
    transport.flush()?;

    context.negotiate_message = Some(buffer);
    context.state = NtlmState::Challenge;

    Ok(SecurityStatus::ContinueNeeded)
}

/// The fixed base set requests signing and sealing through the LM-key policy
/// with extended session security; 56-bit encryption is deliberately left
/// out.
fn get_flags(config: &NtlmConfig) -> NegotiateFlags {
    let mut flags = NegotiateFlags::NTLM_SSP_NEGOTIATE_KEY_EXCH
        | NegotiateFlags::NTLM_SSP_NEGOTIATE128
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_LM_KEY
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_SEAL
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_SIGN
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_EXTENDED_SESSION_SECURITY
        | NegotiateFlags::NTLM_SSP_REQUEST_TARGET
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_OEM;

    if config.domain.is_some() {
        flags |= NegotiateFlags::NTLM_SSP_NEGOTIATE_OEM_DOMAIN_SUPPLIED;
    }

    if config.workstation.is_some() {
        flags |= NegotiateFlags::NTLM_SSP_NEGOTIATE_OEM_WORKSTATION_SUPPLIED;
    }

    if config.connectionless {
        flags |= NegotiateFlags::NTLM_SSP_NEGOTIATE_DATAGRAM;
    }

    flags
}

fn write_header(
    negotiate_flags: NegotiateFlags,
    message_fields: &NegotiateMessageFields,
    mut buffer: impl io::Write,
) -> io::Result<()> {
    buffer.write_all(NTLM_SIGNATURE)?; // signature 8 bytes
    buffer.write_u32::<LittleEndian>(MessageTypes::Negotiate as u32)?; // message type 4 bytes
    buffer.write_u32::<LittleEndian>(negotiate_flags.bits())?; // negotiate flags 4 bytes
    message_fields.domain_name.write_to(&mut buffer)?; // domain name 8 bytes
    message_fields.workstation.write_to(&mut buffer)?; // workstation 8 bytes

    Ok(())
}

fn write_payload(message_fields: &NegotiateMessageFields, mut buffer: impl io::Write) -> io::Result<()> {
    message_fields.domain_name.write_buffer_to(&mut buffer)?;
    message_fields.workstation.write_buffer_to(&mut buffer)?;

    Ok(())
}

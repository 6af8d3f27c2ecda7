use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::mechanism::SecurityStatus;
use crate::ntlm::messages::{read_ntlm_header, try_read_version, MessageFields, MessageTypes};
use crate::ntlm::{ChallengeMessage, NegotiateFlags, Ntlm, NtlmState, CHALLENGE_SIZE};
use crate::{Error, ErrorKind};

/// Signature through the target-info descriptor; the version field that may
/// follow is not part of the fixed part.
const FIXED_PART_SIZE: usize = 48;

fn check_state(state: NtlmState) -> crate::Result<()> {
    if state != NtlmState::Challenge {
        Err(Error::new(
            ErrorKind::OutOfSequence,
            "read challenge was fired but the state is not a Challenge",
        ))
    } else {
        Ok(())
    }
}

pub(crate) fn read_challenge(context: &mut Ntlm, mut stream: impl io::Read) -> crate::Result<SecurityStatus> {
    check_state(context.state)?;

    let mut buffer = Vec::with_capacity(FIXED_PART_SIZE);
    stream.read_to_end(&mut buffer)?;
    let total_length = buffer.len();

    if total_length < FIXED_PART_SIZE {
        return Err(Error::new(
            ErrorKind::TruncatedMessage,
            "the challenge is shorter than its fixed part",
        ));
    }

    let mut cursor = io::Cursor::new(buffer.as_slice());
    read_ntlm_header(&mut cursor, MessageTypes::Challenge)?;

    let mut target_name = MessageFields::new();
    target_name.read_from(&mut cursor)?;
    check_requested_target(&target_name, context.flags)?;

    let negotiated_flags =
        NegotiateFlags::from_bits(cursor.read_u32::<LittleEndian>()?).unwrap_or_else(NegotiateFlags::empty);

    let mut server_challenge = [0x00; CHALLENGE_SIZE];
    cursor.read_exact(&mut server_challenge)?;

    if cursor.read_u32::<LittleEndian>()? != 0 || cursor.read_u32::<LittleEndian>()? != 0 {
        return Err(Error::new(
            ErrorKind::ProtocolViolation,
            "a reserved field of the challenge is not zero",
        ));
    }

    let mut target_info = MessageFields::new();
    target_info.read_from(&mut cursor)?;

    let _version = try_read_version(negotiated_flags, &mut cursor)?;

    resolve_payload_region(&mut target_name, total_length, &mut cursor)?;
    resolve_payload_region(&mut target_info, total_length, &mut cursor)?;

    if negotiated_flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_TARGET_INFO) && target_info.buffer.is_empty() {
        return Err(Error::new(
            ErrorKind::ProtocolViolation,
            "target info was negotiated but the challenge carries none",
        ));
    }

    context.flags = negotiated_flags;
    context.challenge_message = Some(ChallengeMessage {
        server_challenge,
        negotiated_flags,
        target_name: non_empty(target_name.buffer),
        target_info: non_empty(target_info.buffer),
    });
    context.state = NtlmState::Authenticate;

    Ok(SecurityStatus::ContinueNeeded)
}

/// A target name we asked for must actually be there, and with unicode
/// strings the descriptor has to stay 2-byte aligned.
fn check_requested_target(target_name: &MessageFields, original_flags: NegotiateFlags) -> crate::Result<()> {
    if !original_flags.contains(NegotiateFlags::NTLM_SSP_REQUEST_TARGET) {
        return Ok(());
    }

    if target_name.buffer.is_empty() || target_name.buffer_offset == 0 {
        return Err(Error::new(
            ErrorKind::ProtocolViolation,
            "a target name was requested but the challenge carries none",
        ));
    }

    if original_flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_UNICODE)
        && (target_name.buffer_offset % 2 != 0 || target_name.buffer.len() % 2 != 0)
    {
        return Err(Error::new(
            ErrorKind::ProtocolViolation,
            "the target name descriptor is not aligned for unicode",
        ));
    }

    Ok(())
}

/// The payload regions may come in either relative order; each is located
/// through its own offset. An offset pointing into the fixed header is
/// hostile, a region past the end of the message is truncation.
fn resolve_payload_region(
    field: &mut MessageFields,
    total_length: usize,
    cursor: &mut io::Cursor<&[u8]>,
) -> crate::Result<()> {
    if field.buffer.is_empty() {
        return Ok(());
    }

    let offset = field.buffer_offset as usize;

    if offset < FIXED_PART_SIZE {
        return Err(Error::new(
            ErrorKind::ProtocolViolation,
            "a payload descriptor points inside the fixed part of the challenge",
        ));
    }

    if offset + field.buffer.len() > total_length {
        return Err(Error::new(
            ErrorKind::TruncatedMessage,
            "a payload descriptor exceeds the length of the challenge",
        ));
    }

    field.read_buffer_from(cursor)?;

    Ok(())
}

fn non_empty(buffer: Vec<u8>) -> Option<Vec<u8>> {
    if buffer.is_empty() {
        None
    } else {
        Some(buffer)
    }
}

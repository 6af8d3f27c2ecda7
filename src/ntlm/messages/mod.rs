pub(crate) mod client;

use std::io;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;

use crate::ntlm::{NegotiateFlags, NTLM_VERSION_SIZE};
use crate::{Error, ErrorKind};

pub(crate) const NTLM_SIGNATURE: &[u8; NTLM_SIGNATURE_SIZE] = b"NTLMSSP\0";
const NTLM_SIGNATURE_SIZE: usize = 8;

#[derive(Debug, Copy, Clone, Eq, PartialEq, FromPrimitive)]
pub(crate) enum MessageTypes {
    Negotiate = 1,
    Challenge = 2,
    Authenticate = 3,
}

/// One (len, maxLen, bufferOffset) descriptor plus the payload bytes it
/// points at. Writing emits len twice since this client never reserves more
/// space than it fills.
pub(crate) struct MessageFields {
    pub buffer: Vec<u8>,
    pub buffer_offset: u32,
}

impl MessageFields {
    pub(crate) fn new() -> Self {
        Self {
            buffer: Vec::new(),
            buffer_offset: 0,
        }
    }

    pub(crate) fn with_buffer(buffer: Vec<u8>) -> Self {
        Self {
            buffer,
            buffer_offset: 0,
        }
    }

    pub(crate) fn write_to(&self, mut buffer: impl io::Write) -> io::Result<()> {
        buffer.write_u16::<LittleEndian>(self.buffer.len() as u16)?; // Len
        buffer.write_u16::<LittleEndian>(self.buffer.len() as u16)?; // MaxLen
        buffer.write_u32::<LittleEndian>(self.buffer_offset)?; // BufferOffset

        Ok(())
    }

    pub(crate) fn write_buffer_to(&self, mut buffer: impl io::Write) -> io::Result<()> {
        buffer.write_all(&self.buffer)?;

        Ok(())
    }

    pub(crate) fn read_from(&mut self, mut buffer: impl io::Read) -> io::Result<()> {
        let len = buffer.read_u16::<LittleEndian>()?; // Len
        let _max_len = buffer.read_u16::<LittleEndian>()?; // MaxLen
        self.buffer_offset = buffer.read_u32::<LittleEndian>()?; // BufferOffset
        self.buffer.resize(usize::from(len), 0x00);

        Ok(())
    }

    /// Seeks to the descriptor's offset and reads the payload region. Seeking
    /// makes the resolution independent of the relative order of the regions
    /// inside the payload.
    pub(crate) fn read_buffer_from(&mut self, mut cursor: impl io::Read + io::Seek) -> io::Result<()> {
        cursor.seek(io::SeekFrom::Start(u64::from(self.buffer_offset)))?;
        cursor.read_exact(&mut self.buffer)?;

        Ok(())
    }
}

pub(crate) fn read_ntlm_header(mut stream: impl io::Read, expected_message_type: MessageTypes) -> crate::Result<()> {
    let mut signature = [0x00; NTLM_SIGNATURE_SIZE];
    stream.read_exact(signature.as_mut())?;

    if signature.as_ref() != NTLM_SIGNATURE {
        return Err(Error::new(
            ErrorKind::ProtocolViolation,
            format!("read NTLM signature is invalid: {:?}", signature),
        ));
    }

    let message_type = stream.read_u32::<LittleEndian>()?;
    match MessageTypes::from_u32(message_type) {
        Some(message_type) if message_type == expected_message_type => Ok(()),
        _ => Err(Error::new(
            ErrorKind::ProtocolViolation,
            format!(
                "message type is invalid: {} != expected ({})",
                message_type, expected_message_type as u32
            ),
        )),
    }
}

pub(crate) fn try_read_version(
    flags: NegotiateFlags,
    mut stream: impl io::Read,
) -> io::Result<Option<[u8; NTLM_VERSION_SIZE]>> {
    if flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_VERSION) {
        // major 1 byte, minor 1 byte, build 2 bytes, reserved 3 bytes,
        // revision 1 byte
        let mut version = [0x00; NTLM_VERSION_SIZE];
        stream.read_exact(version.as_mut())?;

        Ok(Some(version))
    } else {
        Ok(None)
    }
}


use std::io::{self, Read};

use crate::{ber, Error, ErrorKind};

/// The protocol version written into every outgoing request. The peer's
/// version field is consumed but not validated; servers answer a version-2
/// client with whatever they speak.
pub const TS_REQUEST_VERSION: u32 = 2;

/// The outer envelope of every negotiation round. Exactly one of the payload
/// fields is populated per round; the structure is built, sent and discarded
/// within that round.
///
/// Wire form: `SEQUENCE { [0] version INTEGER, [1] negoTokens OPTIONAL,
/// [2] authInfo OCTET STRING OPTIONAL, [3] pubKeyAuth OCTET STRING OPTIONAL }`,
/// where negoTokens is a SEQUENCE OF SEQUENCE wrapping a single
/// `[0] OCTET STRING` per item.
#[derive(Debug, Clone)]
pub struct TsRequest {
    /// Version of the request the peer claims to speak.
    pub version: u32,
    /// Token produced by the negotiation mechanism for this round.
    pub nego_tokens: Option<Vec<u8>>,
    /// The delegated credentials, protected by the established context.
    pub auth_info: Option<Vec<u8>>,
    /// The public-key binding proof, protected by the established context.
    pub pub_key_auth: Option<Vec<u8>>,
}

impl Default for TsRequest {
    fn default() -> Self {
        Self {
            version: TS_REQUEST_VERSION,
            nego_tokens: None,
            auth_info: None,
            pub_key_auth: None,
        }
    }
}

impl TsRequest {
    pub fn with_nego_tokens(nego_tokens: Vec<u8>) -> Self {
        Self {
            nego_tokens: Some(nego_tokens),
            ..Self::default()
        }
    }

    pub fn with_auth_info(auth_info: Vec<u8>) -> Self {
        Self {
            auth_info: Some(auth_info),
            ..Self::default()
        }
    }

    pub fn with_pub_key_auth(pub_key_auth: Vec<u8>) -> Self {
        Self {
            pub_key_auth: Some(pub_key_auth),
            ..Self::default()
        }
    }

    /// Decodes one envelope from `buffer`. A buffer shorter than the outer
    /// length field declares fails with `TruncatedMessage`; a tag mismatch at
    /// any nesting level fails with `ProtocolViolation`. Trailing bytes after
    /// the declared envelope are ignored.
    pub fn from_buffer(buffer: &[u8]) -> crate::Result<TsRequest> {
        let mut stream = io::Cursor::new(buffer);

        let declared = ber::read_sequence_tag(&mut stream)?;
        if buffer.len() < stream.position() as usize + declared {
            return Err(Error::new(
                ErrorKind::TruncatedMessage,
                "the negotiation envelope declares more bytes than were received",
            ));
        }

        ber::read_contextual_tag(&mut stream, 0, ber::Pc::Construct)?;
        let version = ber::read_integer(&mut stream)? as u32;

        let nego_tokens = if ber::read_contextual_tag_or_unwind(&mut stream, 1, ber::Pc::Construct)?.is_some() {
            ber::read_sequence_tag(&mut stream)?;
            ber::read_sequence_tag(&mut stream)?;
            ber::read_contextual_tag(&mut stream, 0, ber::Pc::Construct)?;
            Some(read_octet_string(&mut stream)?)
        } else {
            None
        };

        let auth_info = if ber::read_contextual_tag_or_unwind(&mut stream, 2, ber::Pc::Construct)?.is_some() {
            Some(read_octet_string(&mut stream)?)
        } else {
            None
        };

        let pub_key_auth = if ber::read_contextual_tag_or_unwind(&mut stream, 3, ber::Pc::Construct)?.is_some() {
            Some(read_octet_string(&mut stream)?)
        } else {
            None
        };

        Ok(TsRequest {
            version,
            nego_tokens,
            auth_info,
            pub_key_auth,
        })
    }

    /// Encodes the envelope into `stream`, ready for the transport.
    pub fn encode(&self, mut stream: impl io::Write) -> io::Result<()> {
        let mut fields = ber::wrap_contextual(0, &ber::wrap_integer(self.version));

        /* [1] negoTokens (NegoData) */
        if let Some(ref nego_tokens) = self.nego_tokens {
            let item = ber::wrap_sequence(&ber::wrap_contextual(0, &ber::wrap_octet_string(nego_tokens)));
            let items = ber::wrap_sequence(&item);
            fields.extend_from_slice(&ber::wrap_contextual(1, &items));
        }

        /* [2] authInfo (OCTET STRING) */
        if let Some(ref auth_info) = self.auth_info {
            fields.extend_from_slice(&ber::wrap_contextual(2, &ber::wrap_octet_string(auth_info)));
        }

        /* [3] pubKeyAuth (OCTET STRING) */
        if let Some(ref pub_key_auth) = self.pub_key_auth {
            fields.extend_from_slice(&ber::wrap_contextual(3, &ber::wrap_octet_string(pub_key_auth)));
        }

        stream.write_all(&ber::wrap_sequence(&fields))
    }
}

fn read_octet_string(stream: &mut io::Cursor<&[u8]>) -> crate::Result<Vec<u8>> {
    let length = ber::read_octet_string_tag(&mut *stream)?;

    let remaining = stream.get_ref().len() - stream.position() as usize;
    if length > remaining {
        return Err(Error::new(
            ErrorKind::TruncatedMessage,
            "an octet string declares more bytes than remain in the envelope",
        ));
    }

    let mut value = vec![0x00; length];
    stream.read_exact(&mut value)?;

    Ok(value)
}

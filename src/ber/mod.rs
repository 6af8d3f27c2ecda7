//! BER tag/length/value primitives restricted to the shapes the CredSSP
//! message grammar uses: constructed sequences, context-specific tags,
//! primitive octet strings and small integers, all with definite lengths.
//!
//! Writing is wrap-based: a child structure is fully materialized before the
//! parent header is emitted, so a length is always known when its header is
//! written. Reading is strictly sequential; a reader yields the declared
//! content length and the caller consumes exactly that many bytes. Callers
//! are responsible for bounds-checking a declared length against the input
//! that is actually available.


use std::io;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

const TAG_MASK: u8 = 0x1F;

#[repr(u8)]
#[derive(Copy, Clone)]
pub enum Pc {
    Primitive = 0x00,
    Construct = 0x20,
}

#[repr(u8)]
#[derive(Copy, Clone)]
enum Class {
    Universal = 0x00,
    ContextSpecific = 0x80,
}

#[repr(u8)]
#[derive(Copy, Clone)]
enum Tag {
    Integer = 0x02,
    OctetString = 0x04,
    Sequence = 0x10,
}

fn identifier(class: Class, pc: Pc, tagnum: u8) -> u8 {
    class as u8 | pc as u8 | (TAG_MASK & tagnum)
}

/// Prefixes `content` with a header carrying `identifier` and the exact
/// content length. The only size limit is available memory.
pub fn wrap(identifier: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 6);
    out.push(identifier);
    push_length(&mut out, content.len());
    out.extend_from_slice(content);

    out
}

pub fn wrap_sequence(content: &[u8]) -> Vec<u8> {
    wrap(identifier(Class::Universal, Pc::Construct, Tag::Sequence as u8), content)
}

pub fn wrap_contextual(tagnum: u8, content: &[u8]) -> Vec<u8> {
    wrap(identifier(Class::ContextSpecific, Pc::Construct, tagnum), content)
}

pub fn wrap_octet_string(content: &[u8]) -> Vec<u8> {
    wrap(
        identifier(Class::Universal, Pc::Primitive, Tag::OctetString as u8),
        content,
    )
}

pub fn wrap_integer(value: u32) -> Vec<u8> {
    let body: &[u8] = &value.to_be_bytes();
    let significant = if value < 0x80 {
        1
    } else if value < 0x8000 {
        2
    } else if value < 0x0080_0000 {
        3
    } else {
        4
    };

    wrap(
        identifier(Class::Universal, Pc::Primitive, Tag::Integer as u8),
        &body[body.len() - significant..],
    )
}

/// Decodes one header and returns the raw identifier octet with the declared
/// content length. Callers validate the identifier against the grammar
/// position themselves; the typed readers below do both in one step.
pub fn read_header(mut stream: impl io::Read) -> io::Result<(u8, usize)> {
    let identifier = stream.read_u8()?;
    let length = read_length(stream)?;

    Ok((identifier, length))
}

pub fn read_sequence_tag(mut stream: impl io::Read) -> io::Result<usize> {
    read_identifier(
        &mut stream,
        identifier(Class::Universal, Pc::Construct, Tag::Sequence as u8),
        "invalid sequence tag identifier",
    )?;

    read_length(stream)
}

pub fn read_contextual_tag(mut stream: impl io::Read, tagnum: u8, pc: Pc) -> io::Result<usize> {
    read_identifier(
        &mut stream,
        identifier(Class::ContextSpecific, pc, tagnum),
        "invalid contextual tag identifier",
    )?;

    read_length(stream)
}

/// Backtracking variant of [`read_contextual_tag`] for OPTIONAL grammar
/// positions: an identifier mismatch rewinds the single consumed byte and
/// yields `None` instead of an error.
pub fn read_contextual_tag_or_unwind(
    mut stream: impl io::Read + io::Seek,
    tagnum: u8,
    pc: Pc,
) -> io::Result<Option<usize>> {
    let byte = match stream.read_u8() {
        Ok(byte) => byte,
        Err(ref e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };

    if byte == identifier(Class::ContextSpecific, pc, tagnum) {
        read_length(stream).map(Some)
    } else {
        stream.seek(io::SeekFrom::Current(-1))?;

        Ok(None)
    }
}

pub fn read_octet_string_tag(mut stream: impl io::Read) -> io::Result<usize> {
    read_identifier(
        &mut stream,
        identifier(Class::Universal, Pc::Primitive, Tag::OctetString as u8),
        "invalid octet string tag identifier",
    )?;

    read_length(stream)
}

pub fn read_integer(mut stream: impl io::Read) -> io::Result<u64> {
    read_identifier(
        &mut stream,
        identifier(Class::Universal, Pc::Primitive, Tag::Integer as u8),
        "invalid integer tag identifier",
    )?;
    let length = read_length(&mut stream)?;

    if length == 0 || length > 8 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "invalid integer length"));
    }

    let mut value = 0u64;
    for _ in 0..length {
        value = (value << 8) | u64::from(stream.read_u8()?);
    }

    Ok(value)
}

fn read_identifier(mut stream: impl io::Read, expected: u8, message: &'static str) -> io::Result<()> {
    let byte = stream.read_u8()?;

    if byte != expected {
        Err(io::Error::new(io::ErrorKind::InvalidData, message))
    } else {
        Ok(())
    }
}

fn push_length(out: &mut Vec<u8>, length: usize) {
    if length < 0x80 {
        out.push(length as u8);
    } else {
        let body = (length as u32).to_be_bytes();
        let skip = body.iter().take_while(|&&byte| byte == 0).count();
        out.push(0x80 | (body.len() - skip) as u8);
        out.extend_from_slice(&body[skip..]);
    }
}

fn read_length(mut stream: impl io::Read) -> io::Result<usize> {
    let byte = stream.read_u8()?;

    if byte & 0x80 == 0 {
        return Ok(usize::from(byte));
    }

    match byte & !0x80 {
        1 => stream.read_u8().map(usize::from),
        2 => stream.read_u16::<BigEndian>().map(usize::from),
        3 => {
            let high = stream.read_u8()?;
            let low = stream.read_u16::<BigEndian>()?;

            Ok(usize::from(high) << 16 | usize::from(low))
        }
        4 => stream.read_u32::<BigEndian>().map(|length| length as usize),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "invalid length of the length",
        )),
    }
}

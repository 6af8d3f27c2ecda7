use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::*;
use crate::{AuthIdentity, ErrorKind};

const SERVER_CHALLENGE: [u8; CHALLENGE_SIZE] = [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF];

fn base_flags() -> NegotiateFlags {
    NegotiateFlags::NTLM_SSP_NEGOTIATE_KEY_EXCH
        | NegotiateFlags::NTLM_SSP_NEGOTIATE128
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_LM_KEY
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_SEAL
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_SIGN
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_EXTENDED_SESSION_SECURITY
        | NegotiateFlags::NTLM_SSP_REQUEST_TARGET
        | NegotiateFlags::NTLM_SSP_NEGOTIATE_OEM
}

struct TestChallenge {
    negotiated_flags: NegotiateFlags,
    target_name: Vec<u8>,
    target_info: Vec<u8>,
    info_first: bool,
    name_offset: Option<u32>,
    info_offset: Option<u32>,
    reserved: [u32; 2],
    cut_tail: usize,
}

impl Default for TestChallenge {
    fn default() -> Self {
        Self {
            negotiated_flags: base_flags() | NegotiateFlags::NTLM_SSP_NEGOTIATE_TARGET_INFO,
            target_name: b"SRV".to_vec(),
            target_info: vec![0x02, 0x00, 0x06, 0x00, 0x53, 0x00, 0x52, 0x00, 0x56, 0x00, 0x00, 0x00, 0x00, 0x00],
            info_first: false,
            name_offset: None,
            info_offset: None,
            reserved: [0, 0],
            cut_tail: 0,
        }
    }
}

impl TestChallenge {
    fn build(&self) -> Vec<u8> {
        const FIXED_PART_SIZE: u32 = 48;

        let (name_offset, info_offset) = if self.info_first {
            (
                FIXED_PART_SIZE + self.target_info.len() as u32,
                FIXED_PART_SIZE,
            )
        } else {
            (
                FIXED_PART_SIZE,
                FIXED_PART_SIZE + self.target_name.len() as u32,
            )
        };
        let name_offset = self.name_offset.unwrap_or(name_offset);
        let info_offset = self.info_offset.unwrap_or(info_offset);

        let mut out = Vec::new();
        out.extend_from_slice(b"NTLMSSP\0");
        out.write_u32::<LittleEndian>(2).unwrap();
        out.write_u16::<LittleEndian>(self.target_name.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(self.target_name.len() as u16).unwrap();
        out.write_u32::<LittleEndian>(name_offset).unwrap();
        out.write_u32::<LittleEndian>(self.negotiated_flags.bits()).unwrap();
        out.extend_from_slice(&SERVER_CHALLENGE);
        out.write_u32::<LittleEndian>(self.reserved[0]).unwrap();
        out.write_u32::<LittleEndian>(self.reserved[1]).unwrap();
        out.write_u16::<LittleEndian>(self.target_info.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(self.target_info.len() as u16).unwrap();
        out.write_u32::<LittleEndian>(info_offset).unwrap();
        assert_eq!(out.len(), FIXED_PART_SIZE as usize);

        if self.info_first {
            out.extend_from_slice(&self.target_info);
            out.extend_from_slice(&self.target_name);
        } else {
            out.extend_from_slice(&self.target_name);
            out.extend_from_slice(&self.target_info);
        }

        out.truncate(out.len() - self.cut_tail);

        out
    }
}

fn negotiated_client() -> Ntlm {
    let mut ntlm = Ntlm::with_config(NtlmConfig::new(String::from("WKS")));
    ntlm.write_negotiate(&mut Vec::new()).unwrap();

    ntlm
}

fn identity_buffers() -> AuthIdentityBuffers {
    AuthIdentityBuffers::from(AuthIdentity {
        username: "user".into(),
        password: String::from("ignored").into(),
        domain: Some("dom".into()),
    })
}

fn responses() -> NtlmResponses {
    NtlmResponses {
        lm_challenge_response: vec![0x01; 24],
        nt_challenge_response: vec![0x02; 30],
        encrypted_random_session_key: Some(vec![0x03; 16]),
        session_key: Some(vec![0x04; 16]),
    }
}

#[test]
fn negotiate_message_layout() {
    let mut ntlm = Ntlm::with_config(NtlmConfig::new(String::from("WKS")));
    let mut message = Vec::new();

    let status = ntlm.write_negotiate(&mut message).unwrap();

    assert_eq!(status, crate::SecurityStatus::ContinueNeeded);
    assert_eq!(&message[..8], b"NTLMSSP\0");
    assert_eq!(u32::from_le_bytes(message[8..12].try_into().unwrap()), 1);

    let expected_flags = base_flags() | NegotiateFlags::NTLM_SSP_NEGOTIATE_OEM_WORKSTATION_SUPPLIED;
    assert_eq!(
        u32::from_le_bytes(message[12..16].try_into().unwrap()),
        expected_flags.bits()
    );

    // empty domain descriptor at the start of the payload region
    assert_eq!(u16::from_le_bytes(message[16..18].try_into().unwrap()), 0);
    assert_eq!(u32::from_le_bytes(message[20..24].try_into().unwrap()), 32);
    // workstation descriptor right after the domain
    assert_eq!(u16::from_le_bytes(message[24..26].try_into().unwrap()), 3);
    assert_eq!(u32::from_le_bytes(message[28..32].try_into().unwrap()), 32);
    assert_eq!(&message[32..], b"WKS");

    assert_eq!(ntlm.negotiate_message(), Some(message.as_slice()));
}

#[test]
fn base_capability_set_excludes_56_bit_encryption() {
    let mut ntlm = Ntlm::new();
    ntlm.write_negotiate(&mut Vec::new()).unwrap();

    let flags = ntlm.negotiated_flags();

    assert!(!flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE56));
    assert!(flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_LM_KEY));
    assert!(flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_SEAL));
    assert!(flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_SIGN));
    assert!(flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_EXTENDED_SESSION_SECURITY));
    assert!(!flags.contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_OEM_WORKSTATION_SUPPLIED));
}

#[test]
fn connectionless_transport_sets_the_datagram_flag() {
    let mut config = NtlmConfig::default();
    config.connectionless = true;
    let mut ntlm = Ntlm::with_config(config);

    ntlm.write_negotiate(&mut Vec::new()).unwrap();

    assert!(ntlm
        .negotiated_flags()
        .contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_DATAGRAM));
}

#[test]
fn domain_presence_sets_the_domain_supplied_flag() {
    let mut config = NtlmConfig::default();
    config.domain = Some(String::from("DOM"));
    let mut ntlm = Ntlm::with_config(config);
    let mut message = Vec::new();

    ntlm.write_negotiate(&mut message).unwrap();

    assert!(ntlm
        .negotiated_flags()
        .contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_OEM_DOMAIN_SUPPLIED));
    assert_eq!(&message[32..], b"DOM");
}

#[test]
fn challenge_fields_are_extracted() {
    let mut ntlm = negotiated_client();

    let status = ntlm.read_challenge(TestChallenge::default().build().as_slice()).unwrap();

    assert_eq!(status, crate::SecurityStatus::ContinueNeeded);
    let challenge = ntlm.challenge().unwrap();
    assert_eq!(challenge.server_challenge, SERVER_CHALLENGE);
    assert_eq!(challenge.target_name.as_deref(), Some(&b"SRV"[..]));
    assert_eq!(
        challenge.target_info.as_deref(),
        Some(TestChallenge::default().target_info.as_slice())
    );
    assert!(ntlm
        .negotiated_flags()
        .contains(NegotiateFlags::NTLM_SSP_NEGOTIATE_TARGET_INFO));
}

#[test]
fn challenge_payload_regions_may_come_in_either_order() {
    let mut ntlm = negotiated_client();
    let challenge = TestChallenge {
        info_first: true,
        ..TestChallenge::default()
    };

    ntlm.read_challenge(challenge.build().as_slice()).unwrap();

    let challenge = ntlm.challenge().unwrap();
    assert_eq!(challenge.target_name.as_deref(), Some(&b"SRV"[..]));
    assert_eq!(
        challenge.target_info.as_deref(),
        Some(TestChallenge::default().target_info.as_slice())
    );
}

#[test]
fn target_info_offset_inside_the_fixed_part_is_rejected() {
    let mut ntlm = negotiated_client();
    let challenge = TestChallenge {
        info_offset: Some(40),
        ..TestChallenge::default()
    };

    let err = ntlm.read_challenge(challenge.build().as_slice()).unwrap_err();

    assert_eq!(err.error_type, ErrorKind::ProtocolViolation);
}

#[test]
fn payload_region_past_the_end_is_truncation() {
    let mut ntlm = negotiated_client();
    let challenge = TestChallenge {
        cut_tail: 4,
        ..TestChallenge::default()
    };

    let err = ntlm.read_challenge(challenge.build().as_slice()).unwrap_err();

    assert_eq!(err.error_type, ErrorKind::TruncatedMessage);
}

#[test]
fn requested_target_name_must_be_present() {
    let mut ntlm = negotiated_client();
    let challenge = TestChallenge {
        target_name: Vec::new(),
        negotiated_flags: base_flags(),
        target_info: Vec::new(),
        ..TestChallenge::default()
    };

    let err = ntlm.read_challenge(challenge.build().as_slice()).unwrap_err();

    assert_eq!(err.error_type, ErrorKind::ProtocolViolation);
}

#[test]
fn unicode_target_name_descriptor_must_be_aligned() {
    let mut ntlm = negotiated_client();
    ntlm.flags |= NegotiateFlags::NTLM_SSP_NEGOTIATE_UNICODE;

    let err = ntlm.read_challenge(TestChallenge::default().build().as_slice()).unwrap_err();

    assert_eq!(err.error_type, ErrorKind::ProtocolViolation);
}

#[test]
fn nonzero_reserved_field_is_rejected() {
    let mut ntlm = negotiated_client();
    let challenge = TestChallenge {
        reserved: [0, 1],
        ..TestChallenge::default()
    };

    let err = ntlm.read_challenge(challenge.build().as_slice()).unwrap_err();

    assert_eq!(err.error_type, ErrorKind::ProtocolViolation);
}

#[test]
fn negotiated_target_info_must_not_be_empty() {
    let mut ntlm = negotiated_client();
    let challenge = TestChallenge {
        target_info: Vec::new(),
        ..TestChallenge::default()
    };

    let err = ntlm.read_challenge(challenge.build().as_slice()).unwrap_err();

    assert_eq!(err.error_type, ErrorKind::ProtocolViolation);
}

#[test]
fn bad_signature_is_rejected() {
    let mut ntlm = negotiated_client();
    let mut message = TestChallenge::default().build();
    message[0] = b'X';

    let err = ntlm.read_challenge(message.as_slice()).unwrap_err();

    assert_eq!(err.error_type, ErrorKind::ProtocolViolation);
}

#[test]
fn wrong_message_type_is_rejected() {
    let mut ntlm = negotiated_client();
    let mut message = TestChallenge::default().build();
    message[8] = 3;

    let err = ntlm.read_challenge(message.as_slice()).unwrap_err();

    assert_eq!(err.error_type, ErrorKind::ProtocolViolation);
}

#[test]
fn short_challenge_is_truncation() {
    let mut ntlm = negotiated_client();

    let err = ntlm.read_challenge(&TestChallenge::default().build()[..20]).unwrap_err();

    assert_eq!(err.error_type, ErrorKind::TruncatedMessage);
}

#[test]
fn messages_out_of_order_are_rejected() {
    let mut ntlm = Ntlm::new();

    let err = ntlm.read_challenge(TestChallenge::default().build().as_slice()).unwrap_err();
    assert_eq!(err.error_type, ErrorKind::OutOfSequence);

    let err = ntlm
        .write_authenticate(&identity_buffers(), responses(), &mut Vec::new())
        .unwrap_err();
    assert_eq!(err.error_type, ErrorKind::OutOfSequence);
}

#[test]
fn authenticate_message_layout() {
    let mut ntlm = negotiated_client();
    ntlm.read_challenge(TestChallenge::default().build().as_slice()).unwrap();

    let mut message = Vec::new();
    let status = ntlm
        .write_authenticate(&identity_buffers(), responses(), &mut message)
        .unwrap();

    assert_eq!(status, crate::SecurityStatus::Completed);
    assert_eq!(&message[..8], b"NTLMSSP\0");
    assert_eq!(u32::from_le_bytes(message[8..12].try_into().unwrap()), 3);

    // OEM was negotiated, so the identity strings are down-converted
    let payload_offset = 64 + 16; // header + integrity check slot
    let mut cursor = std::io::Cursor::new(&message[12..]);
    let mut expected_offset = payload_offset as u32;
    // descriptor order: lm, nt, domain, user, workstation, session key;
    // payload order: domain, user, workstation, lm, nt, session key
    let lengths = [(24u16, 3), (30, 4), (3, 0), (4, 1), (3, 2), (16, 5)];
    let mut offsets = [0u32; 6];
    let payload_lengths = [3u32, 4, 3, 24, 30, 16];
    for position in 0..6 {
        offsets[position] = expected_offset;
        expected_offset += payload_lengths[position];
    }
    for (length, payload_position) in lengths {
        assert_eq!(cursor.read_u16::<LittleEndian>().unwrap(), length);
        assert_eq!(cursor.read_u16::<LittleEndian>().unwrap(), length);
        assert_eq!(
            cursor.read_u32::<LittleEndian>().unwrap(),
            offsets[payload_position as usize]
        );
    }
    assert_eq!(
        cursor.read_u32::<LittleEndian>().unwrap(),
        ntlm.negotiated_flags().bits()
    );

    // integrity-check slot is zeroed and reported
    let mic_offset = ntlm.authenticate_message().unwrap().mic_offset().unwrap();
    assert_eq!(mic_offset, 64);
    assert!(message[mic_offset..mic_offset + 16].iter().all(|&byte| byte == 0));

    // payload region: domain "dom", user "user", workstation "WKS", then the responses
    assert_eq!(&message[80..83], b"dom");
    assert_eq!(&message[83..87], b"user");
    assert_eq!(&message[87..90], b"WKS");
    assert_eq!(&message[90..114], &[0x01; 24][..]);
    assert_eq!(&message[114..144], &[0x02; 30][..]);
    assert_eq!(&message[144..160], &[0x03; 16][..]);
    assert_eq!(message.len(), 160);

    assert_eq!(ntlm.session_key(), Some(&[0x04; 16][..]));
}

#[test]
fn authenticate_requires_an_nt_response() {
    let mut ntlm = negotiated_client();
    ntlm.read_challenge(TestChallenge::default().build().as_slice()).unwrap();

    let mut empty = responses();
    empty.nt_challenge_response.clear();

    let err = ntlm
        .write_authenticate(&identity_buffers(), empty, &mut Vec::new())
        .unwrap_err();

    assert_eq!(err.error_type, ErrorKind::CredentialEncodingFailure);
}

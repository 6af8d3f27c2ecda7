
use crate::{ber, utils, AuthIdentityBuffers, CredSspConfig, Error, ErrorKind, SmartCardConfig};

const TS_PASSWORD_CREDS: u32 = 1;
const TS_SMART_CARD_CREDS: u32 = 2;

/// KeySpec value announcing a key-exchange key (`AT_KEYEXCHANGE`).
const KEY_SPEC_KEY_EXCHANGE: u32 = 1;

/// Encodes the `TSCredentials` structure that is delegated to the server.
///
/// Pure function of identity and configuration: the same inputs produce
/// byte-identical output. `config.use_password_as_pin` selects the smart-card
/// encoding, in which the password buffer carries the PIN and the
/// username/domain turn into the optional user/domain hints.
///
/// The inner credential structure is double-encoded: it is serialized first
/// and the result is carried as an opaque octet string inside the outer
/// sequence.
pub fn write_ts_credentials(identity: &AuthIdentityBuffers, config: &CredSspConfig) -> crate::Result<Vec<u8>> {
    let (cred_type, encoded_credentials) = if config.use_password_as_pin {
        (TS_SMART_CARD_CREDS, write_smart_card_credentials(identity, &config.smart_card))
    } else {
        if identity.is_empty() {
            return Err(Error::new(
                ErrorKind::CredentialEncodingFailure,
                "a password credential requires a user name",
            ));
        }

        (TS_PASSWORD_CREDS, write_password_credentials(identity))
    };

    /* TSCredentials ::= SEQUENCE { [0] credType INTEGER, [1] credentials OCTET STRING } */
    let mut fields = ber::wrap_contextual(0, &ber::wrap_integer(cred_type));
    fields.extend_from_slice(&ber::wrap_contextual(1, &ber::wrap_octet_string(&encoded_credentials)));

    Ok(ber::wrap_sequence(&fields))
}

/// `TSPasswordCreds ::= SEQUENCE { [0] domainName, [1] userName, [2] password }`,
/// every field present even when empty.
fn write_password_credentials(identity: &AuthIdentityBuffers) -> Vec<u8> {
    let mut fields = ber::wrap_contextual(0, &ber::wrap_octet_string(&identity.domain));
    fields.extend_from_slice(&ber::wrap_contextual(1, &ber::wrap_octet_string(&identity.user)));
    fields.extend_from_slice(&ber::wrap_contextual(2, &ber::wrap_octet_string(identity.password.as_ref())));

    ber::wrap_sequence(&fields)
}

/// `TSSmartCardCreds ::= SEQUENCE { [0] pin, [1] cspData, [2] userHint
/// OPTIONAL, [3] domainHint OPTIONAL }`. The hints are omitted when the
/// corresponding identity buffer is empty.
fn write_smart_card_credentials(identity: &AuthIdentityBuffers, smart_card: &SmartCardConfig) -> Vec<u8> {
    let mut fields = ber::wrap_contextual(0, &ber::wrap_octet_string(identity.password.as_ref()));
    fields.extend_from_slice(&ber::wrap_contextual(1, &write_csp_data_detail(smart_card)));

    if !identity.user.is_empty() {
        fields.extend_from_slice(&ber::wrap_contextual(2, &ber::wrap_octet_string(&identity.user)));
    }

    if !identity.domain.is_empty() {
        fields.extend_from_slice(&ber::wrap_contextual(3, &ber::wrap_octet_string(&identity.domain)));
    }

    ber::wrap_sequence(&fields)
}

/// `TSCspDataDetail ::= SEQUENCE { [0] keySpec, [1] cardName OPTIONAL,
/// [2] readerName OPTIONAL, [3] containerName OPTIONAL, [4] cspName OPTIONAL }`.
/// Each name is emitted only when configured, independently of the others.
fn write_csp_data_detail(smart_card: &SmartCardConfig) -> Vec<u8> {
    let mut fields = ber::wrap_contextual(0, &ber::wrap_integer(KEY_SPEC_KEY_EXCHANGE));

    let names = [
        (1, smart_card.card_name.as_deref()),
        (2, smart_card.reader_name.as_deref()),
        (3, smart_card.container_name.as_deref()),
        (4, smart_card.csp_name.as_deref()),
    ];
    for (tagnum, name) in names {
        if let Some(name) = name {
            fields.extend_from_slice(&ber::wrap_contextual(
                tagnum,
                &ber::wrap_octet_string(&utils::string_to_utf16(name)),
            ));
        }
    }

    ber::wrap_sequence(&fields)
}

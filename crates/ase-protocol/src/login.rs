//! TDS 5.0 login record construction.
//!
//! The login record is a fixed-layout block sent without a token in a
//! packet of type [`MessageType::Login`](crate::packet::MessageType). Every
//! string occupies a fixed-width slot padded with zeros and followed by
//! a length byte. Several flags describe the client's data representation
//! and depend on the negotiated byte order.
//!
//! The record is followed by a [`CapabilityPackage`](crate::package::CapabilityPackage)
//! in the same message.

use ase_types::Endian;

use crate::error::ProtocolError;
use crate::package::{MsgId, TokenlessPackage};
use crate::version::{LIBRARY_NAME, LIBRARY_VERSION};

/// Width of name slots.
pub const MAX_NAME: usize = 30;
/// Width of the remote password slot.
pub const REMOTE_PASSWORD_LEN: usize = 255;
/// Width of the program name slot.
pub const PROGRAM_NAME_LEN: usize = 10;
/// Width of the packet size slot.
pub const PACKET_SIZE_LEN: usize = 6;

const NET_BUF_LEN: usize = 4;
const OLD_SECURE_LEN: usize = 2;
const HA_SESSION_LEN: usize = 6;
const SEC_SPARE_LEN: usize = 2;
const DUMMY_LEN: usize = 4;

/// TDS protocol version requested by the login record.
const TDS_VERSION: [u8; 4] = [5, 0, 0, 0];

/// Security bits of the login record.
mod sec_login {
    pub(super) const ENCRYPT: u8 = 0x01;
    pub(super) const EXTENDED: u8 = 0x20;
    pub(super) const EXTENDED_PLUS: u8 = 0x80;
}

/// Fields of a login record.
#[derive(Debug, Clone, Default)]
pub struct LoginRecord {
    /// Client hostname.
    pub hostname: String,
    /// Login name.
    pub username: String,
    /// Password. Blanked when an encrypted login is requested.
    pub password: String,
    /// Client process identifier.
    pub host_process: String,
    /// Application name.
    pub app_name: String,
    /// Server name.
    pub server_name: String,
    /// Session language.
    pub language: String,
    /// Client character set.
    pub charset: String,
    /// Requested packet size. The server renegotiates it.
    pub packet_size: u16,
    /// Requested password encryption, `None` for a plain login.
    pub encryption: Option<MsgId>,
}

impl LoginRecord {
    /// Whether the password travels through the encryption sub-negotiation.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some_and(is_encryption_level)
    }

    fn sec_login(&self) -> u8 {
        use sec_login::{ENCRYPT, EXTENDED, EXTENDED_PLUS};

        match self.encryption {
            Some(MsgId::SecEncrypt) => ENCRYPT,
            Some(MsgId::SecEncrypt2) => ENCRYPT | EXTENDED,
            Some(MsgId::SecEncrypt3 | MsgId::SecEncrypt4) => ENCRYPT | EXTENDED | EXTENDED_PLUS,
            _ => 0,
        }
    }

    /// Encode the record for the given payload byte order.
    pub fn encode(&self, endian: Endian) -> Result<Vec<u8>, ProtocolError> {
        let by_endian = |little: u8, big: u8| match endian {
            Endian::Little => little,
            Endian::Big => big,
        };
        let password = if self.is_encrypted() { "" } else { &self.password };

        let mut buf = Vec::with_capacity(512);
        put_padded(&mut buf, "hostname", &self.hostname, MAX_NAME)?;
        put_padded(&mut buf, "username", &self.username, MAX_NAME)?;
        put_padded(&mut buf, "password", password, MAX_NAME)?;
        put_padded(&mut buf, "host process", &self.host_process, MAX_NAME)?;

        // int2, int4, char (ASCII), float, date representation
        buf.push(by_endian(3, 2));
        buf.push(by_endian(1, 0));
        buf.push(6);
        buf.push(by_endian(10, 4));
        buf.push(by_endian(9, 8));
        // usedb, dmpld, interface spare, type
        buf.extend_from_slice(&[1, 1, 0, 0]);
        // buffer size (unused) and spare
        buf.extend_from_slice(&[0; NET_BUF_LEN + 3]);

        put_padded(&mut buf, "application name", &self.app_name, MAX_NAME)?;
        put_padded(&mut buf, "server name", &self.server_name, MAX_NAME)?;
        put_padded(&mut buf, "remote password", "", REMOTE_PASSWORD_LEN)?;

        buf.extend_from_slice(&TDS_VERSION);
        put_padded(&mut buf, "program name", LIBRARY_NAME, PROGRAM_NAME_LEN)?;
        buf.extend_from_slice(&LIBRARY_VERSION.to_bytes());

        // noshort, float4 and date4 representation
        buf.push(0);
        buf.push(by_endian(13, 12));
        buf.push(by_endian(17, 16));

        put_padded(&mut buf, "language", &self.language, MAX_NAME)?;
        // notify of language changes
        buf.push(1);
        buf.extend_from_slice(&[0; OLD_SECURE_LEN]);
        buf.push(self.sec_login());
        // secbulk, halogin
        buf.extend_from_slice(&[1, 1]);
        buf.extend_from_slice(&[0; HA_SESSION_LEN + SEC_SPARE_LEN]);

        put_padded(&mut buf, "charset", &self.charset, MAX_NAME)?;
        // notify of charset changes
        buf.push(1);
        put_padded(
            &mut buf,
            "packet size",
            &self.packet_size.to_string(),
            PACKET_SIZE_LEN,
        )?;
        buf.extend_from_slice(&[0; DUMMY_LEN]);

        Ok(buf)
    }

    /// Encode the record as a tokenless package.
    pub fn to_package(&self, endian: Endian) -> Result<TokenlessPackage, ProtocolError> {
        Ok(TokenlessPackage {
            data: self.encode(endian)?,
        })
    }
}

/// Whether `msg_id` names one of the password encryption schemes.
#[must_use]
pub fn is_encryption_level(msg_id: MsgId) -> bool {
    matches!(
        msg_id,
        MsgId::SecEncrypt | MsgId::SecEncrypt2 | MsgId::SecEncrypt3 | MsgId::SecEncrypt4
    )
}

/// Write `s` zero-padded to `width` followed by its length.
fn put_padded(
    buf: &mut Vec<u8>,
    field: &'static str,
    s: &str,
    width: usize,
) -> Result<(), ProtocolError> {
    if s.len() > width {
        return Err(ProtocolError::TooLong {
            field,
            max: width,
            actual: s.len(),
        });
    }
    buf.extend_from_slice(s.as_bytes());
    buf.resize(buf.len() + width - s.len(), 0);
    buf.push(s.len() as u8);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const RECORD_LEN: usize = 4 * (MAX_NAME + 1)
        + 5
        + 4
        + NET_BUF_LEN
        + 3
        + 2 * (MAX_NAME + 1)
        + (REMOTE_PASSWORD_LEN + 1)
        + 4
        + (PROGRAM_NAME_LEN + 1)
        + 4
        + 3
        + (MAX_NAME + 1)
        + 1
        + OLD_SECURE_LEN
        + 3
        + HA_SESSION_LEN
        + SEC_SPARE_LEN
        + (MAX_NAME + 1)
        + 1
        + (PACKET_SIZE_LEN + 1)
        + DUMMY_LEN;

    fn record() -> LoginRecord {
        LoginRecord {
            hostname: "client".into(),
            username: "sa".into(),
            password: "secret".into(),
            host_process: "4711".into(),
            app_name: "tests".into(),
            server_name: "ase".into(),
            language: "us_english".into(),
            charset: "utf8".into(),
            packet_size: 512,
            encryption: None,
        }
    }

    #[test]
    fn test_fixed_layout() {
        let bytes = record().encode(Endian::Little).unwrap();
        assert_eq!(bytes.len(), RECORD_LEN);

        assert_eq!(&bytes[..6], b"client");
        assert!(bytes[6..MAX_NAME].iter().all(|b| *b == 0));
        assert_eq!(bytes[MAX_NAME], 6);

        let password = 2 * (MAX_NAME + 1);
        assert_eq!(&bytes[password..password + 6], b"secret");
        assert_eq!(bytes[password + MAX_NAME], 6);

        assert_eq!(&bytes[RECORD_LEN - 11..RECORD_LEN - 8], b"512");
        assert_eq!(bytes[RECORD_LEN - 5], 3);
    }

    #[test]
    fn test_representation_follows_endian() {
        let flags = 4 * (MAX_NAME + 1);
        let little = record().encode(Endian::Little).unwrap();
        let big = record().encode(Endian::Big).unwrap();
        assert_eq!(little[flags..flags + 5], [3, 1, 6, 10, 9]);
        assert_eq!(big[flags..flags + 5], [2, 0, 6, 4, 8]);
    }

    #[test]
    fn test_encrypted_login_blanks_password() {
        let mut record = record();
        record.encryption = Some(MsgId::SecEncrypt4);
        assert!(record.is_encrypted());

        let bytes = record.encode(Endian::Little).unwrap();
        let password = 2 * (MAX_NAME + 1);
        assert!(bytes[password..=password + MAX_NAME].iter().all(|b| *b == 0));

        let sec_login = RECORD_LEN - DUMMY_LEN - (PACKET_SIZE_LEN + 1) - 1 - (MAX_NAME + 1)
            - SEC_SPARE_LEN
            - HA_SESSION_LEN
            - 3;
        assert_eq!(bytes[sec_login], 0xA1);
    }

    #[test]
    fn test_name_too_long() {
        let mut record = record();
        record.username = "u".repeat(MAX_NAME + 1);
        assert!(matches!(
            record.encode(Endian::Little),
            Err(ProtocolError::TooLong {
                field: "username",
                ..
            })
        ));
    }
}

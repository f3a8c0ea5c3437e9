//! Server-side packages for scripting login and session scenarios.

use ase_protocol::package::{
    CapabilityPackage, DonePackage, EedPackage, EedStatus, EnvChangeMember, EnvChangePackage,
    EnvChangeType, FormatKind, FormatPackage, LoginAckPackage, LoginAckStatus, MsgId, MsgPackage,
    MsgStatus, TransState,
};
use ase_protocol::{FieldData, FieldFmt, Package, Version};
use ase_types::DataType;
use bytes::Bytes;
use rand::RngCore;
use rsa::pkcs1::{EncodeRsaPublicKey, LineEnding};
use rsa::{Oaep, RsaPrivateKey};
use sha1::Sha1;

/// Key size used by the mock server, small to keep tests fast.
const KEY_BITS: usize = 1024;

/// RSA key pair of a mock server's encrypted login negotiation.
#[derive(Debug, Clone)]
pub struct ServerKey {
    private: RsaPrivateKey,
    nonce: Vec<u8>,
}

impl ServerKey {
    /// Generate a key pair and a random nonce.
    pub fn generate() -> rsa::Result<Self> {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, KEY_BITS)?;
        let mut nonce = vec![0u8; 32];
        rng.fill_bytes(&mut nonce);
        Ok(Self { private, nonce })
    }

    /// Nonce the client prefixes every secret with.
    #[must_use]
    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    /// Public key as PKCS#1 PEM, the way servers send it.
    pub fn public_key_pem(&self) -> rsa::pkcs1::Result<String> {
        self.private
            .to_public_key()
            .to_pkcs1_pem(LineEnding::LF)
    }

    /// Decrypt a secret sent by the client and strip the nonce.
    ///
    /// Returns `None` when decryption fails or the nonce does not match.
    #[must_use]
    pub fn decrypt(&self, ciphertext: &[u8]) -> Option<Vec<u8>> {
        let plain = self.private.decrypt(Oaep::new::<Sha1>(), ciphertext).ok()?;
        plain.strip_prefix(self.nonce.as_slice()).map(<[u8]>::to_vec)
    }

    /// Packages asking the client for an encrypted login.
    pub fn negotiation(&self) -> rsa::pkcs1::Result<Vec<Package>> {
        let format = FormatPackage::new(
            FormatKind::Param,
            false,
            vec![
                FieldFmt::new(DataType::Int4),
                FieldFmt::new(DataType::LongBinary),
                FieldFmt::new(DataType::LongBinary),
            ],
        );
        let params = format.data(vec![
            FieldData::new(1i32),
            FieldData::new(Bytes::from(self.public_key_pem()?.into_bytes())),
            FieldData::new(Bytes::from(self.nonce.clone())),
        ]);

        Ok(vec![
            login_ack(LoginAckStatus::Negotiate),
            Package::Msg(MsgPackage::new(MsgStatus::HasArgs, MsgId::SecEncrypt4)),
            Package::ParamFmt(format),
            Package::Params(params),
            done(),
        ])
    }
}

/// Login acknowledgment with `status`.
#[must_use]
pub fn login_ack(status: LoginAckStatus) -> Package {
    Package::LoginAck(LoginAckPackage {
        status,
        tds_version: Version::new(5, 0, 0, 0),
        program_name: "mock ASE".to_string(),
        program_version: Version::new(16, 0, 0, 0),
    })
}

/// Final done.
#[must_use]
pub fn done() -> Package {
    Package::Done(DonePackage::final_done())
}

/// Packages completing a successful login, echoing `capabilities`.
#[must_use]
pub fn login_success(capabilities: CapabilityPackage) -> Vec<Package> {
    vec![
        login_ack(LoginAckStatus::Succeed),
        Package::Capability(capabilities),
        done(),
    ]
}

/// Environment change announcing a new packet size.
#[must_use]
pub fn packet_size_change(old: usize, new: usize) -> Package {
    Package::EnvChange(EnvChangePackage {
        members: vec![EnvChangeMember {
            kind: EnvChangeType::PacketSize,
            new_value: new.to_string(),
            old_value: old.to_string(),
        }],
    })
}

/// Extended error data.
///
/// Informational messages have `info` set; clients swallow them.
#[must_use]
pub fn eed(msg_number: u32, msg: &str, info: bool) -> Package {
    Package::Eed(EedPackage {
        msg_number,
        state: 1,
        class: if info { 10 } else { 16 },
        sql_state: b"ZZZZZ".to_vec(),
        status: if info {
            EedStatus::INFO
        } else {
            EedStatus::empty()
        },
        tran_state: TransState::NotInTran,
        msg: msg.to_string(),
        server_name: "MOCK".to_string(),
        proc_name: String::new(),
        line_nr: 1,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rsa::RsaPublicKey;
    use rsa::pkcs1::DecodeRsaPublicKey;

    #[test]
    fn test_server_key_decrypts_nonce_prefixed_secret() {
        let key = ServerKey::generate().unwrap();
        let public = RsaPublicKey::from_pkcs1_pem(&key.public_key_pem().unwrap()).unwrap();

        let mut secret = key.nonce().to_vec();
        secret.extend_from_slice(b"hunter2");
        let ciphertext = public
            .encrypt(&mut rand::thread_rng(), Oaep::new::<Sha1>(), &secret)
            .unwrap();

        assert_eq!(key.decrypt(&ciphertext).unwrap(), b"hunter2");
        assert!(key.decrypt(b"garbage").is_none());
    }

    #[test]
    fn test_negotiation_packages() {
        let key = ServerKey::generate().unwrap();
        let packages = key.negotiation().unwrap();

        assert_eq!(packages.len(), 5);
        assert!(matches!(&packages[0], Package::LoginAck(ack) if ack.status == LoginAckStatus::Negotiate));
        assert!(matches!(&packages[3], Package::Params(params) if params.fields.len() == 3));
        assert!(packages[4].is_done_final());
    }

    #[test]
    fn test_eed_info_flag() {
        let Package::Eed(info) = eed(5701, "changed database", true) else {
            panic!("expected EED");
        };
        assert!(info.is_info());

        let Package::Eed(error) = eed(208, "not found", false) else {
            panic!("expected EED");
        };
        assert!(!error.is_info());
    }
}

//! Login negotiation.
//!
//! The client sends the login record and its capabilities in one message.
//! A plain login is acknowledged right away. With password encryption the
//! server answers with a negotiation request carrying an RSA public key
//! and a nonce. The client then sends the encrypted login password, the
//! encrypted remote server passwords and an encrypted symmetric key, and
//! the server acknowledges the login and echoes the capabilities.
//!
//! ```text
//! client                               server
//!   LOGIN record + Capability   ──▶
//!                               ◀──    LoginAck(negotiate) Msg ParamFmt Params Done
//!   Msg ParamFmt Params (x3)    ──▶
//!                               ◀──    LoginAck(succeed) Capability Done
//! ```

use ase_auth::PasswordEncryptor;
use ase_protocol::login::is_encryption_level;
use ase_protocol::package::{
    FormatKind, FormatPackage, LoginAckStatus, MsgId, MsgPackage, MsgStatus,
};
use ase_protocol::{FieldData, FieldFmt, MessageType, Package};
use ase_types::{DataType, SqlValue};
use bytes::Bytes;

use crate::channel::Channel;
use crate::config::LoginConfig;
use crate::error::{Error, Result};

/// Number of parameters of the server's encryption negotiation.
const NEGOTIATION_PARAMS: usize = 3;

impl Channel {
    /// Log in with `config`.
    ///
    /// Must run on channel 0 of a fresh connection. On success the
    /// connection adopts the capabilities echoed by the server.
    pub async fn login(&self, config: &LoginConfig) -> Result<()> {
        let encrypted = match config.encryption {
            Some(MsgId::SecEncrypt4) => true,
            Some(level) if is_encryption_level(level) => {
                return Err(Error::UnsupportedEncryption(level));
            }
            _ => false,
        };

        tracing::debug!(
            channel = self.id(),
            username = %config.credentials.username,
            encrypted,
            "logging in"
        );

        let endian = self.shared().config.endian;
        self.set_current_header_type(MessageType::Login);
        self.queue_package(&Package::Tokenless(config.record().to_package(endian)?))
            .await?;
        self.queue_package(&Package::Capability(self.capabilities()))
            .await?;
        self.send_remaining_packets().await?;

        let ack = match self.next_package(true).await? {
            Package::LoginAck(ack) => ack,
            other => return Err(Error::unexpected("login", "LoginAck", &other)),
        };

        if encrypted {
            if ack.status != LoginAckStatus::Negotiate {
                return Err(Error::Login(format!(
                    "expected login negotiation, received {}",
                    ack.status
                )));
            }
            self.negotiate_encryption(config).await?;
        } else {
            if ack.status != LoginAckStatus::Succeed {
                return Err(Error::Login(format!("login rejected: {}", ack.status)));
            }
            self.expect_done("login").await?;
        }

        self.reset().await;
        tracing::debug!(channel = self.id(), "logged in");
        Ok(())
    }

    async fn negotiate_encryption(&self, config: &LoginConfig) -> Result<()> {
        const STEP: &str = "encryption negotiation";

        match self.next_package(true).await? {
            Package::Msg(msg) if msg.msg_id == MsgId::SecEncrypt4 => {}
            Package::Msg(msg) => return Err(Error::UnsupportedEncryption(msg.msg_id)),
            other => return Err(Error::unexpected(STEP, "Msg", &other)),
        }

        match self.next_package(true).await? {
            Package::ParamFmt(fmt) if fmt.formats.len() == NEGOTIATION_PARAMS => {}
            Package::ParamFmt(fmt) => {
                return Err(Error::Login(format!(
                    "expected {NEGOTIATION_PARAMS} negotiation parameter formats, received {}",
                    fmt.formats.len()
                )));
            }
            other => return Err(Error::unexpected(STEP, "ParamFmt", &other)),
        }

        let params = match self.next_package(true).await? {
            Package::Params(params) if params.fields.len() == NEGOTIATION_PARAMS => params,
            Package::Params(params) => {
                return Err(Error::Login(format!(
                    "expected {NEGOTIATION_PARAMS} negotiation parameters, received {}",
                    params.fields.len()
                )));
            }
            other => return Err(Error::unexpected(STEP, "Params", &other)),
        };

        self.expect_done(STEP).await?;

        let asymmetric_type = match &params.fields[0].value {
            SqlValue::Int(value) => *value,
            other => {
                return Err(Error::Login(format!(
                    "asymmetric encryption type is {other:?} instead of an integer"
                )));
            }
        };
        let public_key = binary_param(&params.fields[1], "public key")?;
        let nonce = binary_param(&params.fields[2], "nonce")?;
        let encryptor = PasswordEncryptor::new(asymmetric_type, public_key, nonce)?;

        self.send_encrypted_secrets(config, &encryptor).await?;

        let ack = self
            .next_package_until(true, |package| match package {
                Package::LoginAck(_) => Ok(true),
                _ => Ok(false),
            })
            .await?;
        match ack {
            Package::LoginAck(ack) if ack.status == LoginAckStatus::Succeed => {}
            Package::LoginAck(ack) => {
                return Err(Error::Login(format!("login rejected: {}", ack.status)));
            }
            other => return Err(Error::unexpected("login", "LoginAck", &other)),
        }

        let echo = match self.next_package(true).await? {
            Package::Capability(echo) => echo,
            other => return Err(Error::unexpected("login", "Capability", &other)),
        };
        self.capabilities()
            .check_echo(&echo)
            .map_err(Error::CapabilityRejected)?;
        self.adopt_capabilities(echo);

        self.expect_done("login").await
    }

    /// Queue the login password, the remote server passwords and the
    /// symmetric key, each encrypted with the server's key, and send them
    /// as one message.
    async fn send_encrypted_secrets(
        &self,
        config: &LoginConfig,
        encryptor: &PasswordEncryptor,
    ) -> Result<()> {
        let password = encryptor.encrypt(config.credentials.password.as_bytes())?;
        self.queue_secret(MsgId::SecLogPwd3, password).await?;

        let servers = config.remote_servers_with_login_server();
        let mut formats = Vec::with_capacity(servers.len() * 2);
        let mut fields = Vec::with_capacity(servers.len() * 2);
        for server in &servers {
            formats.push(FieldFmt::new(DataType::VarChar));
            fields.push(FieldData::new(server.name.as_str()));
            formats.push(FieldFmt::new(DataType::LongBinary));
            fields.push(FieldData::new(Bytes::from(
                encryptor.encrypt(server.password.as_bytes())?,
            )));
        }
        self.queue_params(MsgId::SecRemPwd3, formats, fields).await?;

        let symmetric_key = self.shared().config.symmetric_cipher.generate_key();
        let symmetric_key = encryptor.encrypt(&symmetric_key)?;
        self.queue_secret(MsgId::SecSymKey, symmetric_key).await?;

        self.send_remaining_packets().await
    }

    async fn queue_secret(&self, msg_id: MsgId, secret: Vec<u8>) -> Result<()> {
        self.queue_params(
            msg_id,
            vec![FieldFmt::new(DataType::LongBinary)],
            vec![FieldData::new(Bytes::from(secret))],
        )
        .await
    }

    async fn queue_params(
        &self,
        msg_id: MsgId,
        formats: Vec<FieldFmt>,
        fields: Vec<FieldData>,
    ) -> Result<()> {
        let format = FormatPackage::new(FormatKind::Param, false, formats);
        let params = format.data(fields);

        self.queue_package(&Package::Msg(MsgPackage::new(MsgStatus::HasArgs, msg_id)))
            .await?;
        self.queue_package(&Package::ParamFmt(format)).await?;
        self.queue_package(&Package::Params(params)).await
    }

    async fn expect_done(&self, step: &'static str) -> Result<()> {
        match self.next_package(true).await? {
            Package::Done(_) => Ok(()),
            other => Err(Error::unexpected(step, "Done", &other)),
        }
    }
}

fn binary_param<'a>(field: &'a FieldData, name: &str) -> Result<&'a [u8]> {
    match &field.value {
        SqlValue::Binary(bytes) => Ok(bytes),
        other => Err(Error::Login(format!(
            "{name} is {other:?} instead of binary data"
        ))),
    }
}

//! TDS 5.0 token identifiers.
//!
//! Every package except the tokenless fallback starts with one of these
//! bytes.

use std::fmt;

macro_rules! tokens {
    ($($variant:ident = $value:literal => $name:literal,)+) => {
        /// Token byte identifying a package.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Token {
            $(
                #[doc = concat!("`", $name, "`")]
                $variant = $value,
            )+
        }

        impl Token {
            /// Every defined token.
            pub const ALL: &'static [Token] = &[$(Token::$variant,)+];

            /// Look up a token by its byte value.
            #[must_use]
            pub fn from_u8(value: u8) -> Option<Self> {
                match value {
                    $($value => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// Canonical protocol name.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }
    };
}

tokens! {
    CurDeclare3 = 0x10 => "TDS_CURDECLARE3",
    ParamFmt2 = 0x20 => "TDS_PARAMFMT2",
    Language = 0x21 => "TDS_LANGUAGE",
    OrderBy2 = 0x22 => "TDS_ORDERBY2",
    CurDeclare2 = 0x23 => "TDS_CURDECLARE2",
    ColFmtOld = 0x2A => "TDS_COLFMTOLD",
    DebugCmd = 0x60 => "TDS_DEBUGCMD",
    RowFmt2 = 0x61 => "TDS_ROWFMT2",
    Dynamic2 = 0x62 => "TDS_DYNAMIC2",
    Msg = 0x65 => "TDS_MSG",
    Logout = 0x71 => "TDS_LOGOUT",
    Offset = 0x78 => "TDS_OFFSET",
    ReturnStatus = 0x79 => "TDS_RETURNSTATUS",
    ProcId = 0x7C => "TDS_PROCID",
    CurClose = 0x80 => "TDS_CURCLOSE",
    CurDelete = 0x81 => "TDS_CURDELETE",
    CurFetch = 0x82 => "TDS_CURFETCH",
    CurInfo = 0x83 => "TDS_CURINFO",
    CurOpen = 0x84 => "TDS_CUROPEN",
    CurUpdate = 0x85 => "TDS_CURUPDATE",
    CurDeclare = 0x86 => "TDS_CURDECLARE",
    CurInfo2 = 0x87 => "TDS_CURINFO2",
    CurInfo3 = 0x88 => "TDS_CURINFO3",
    ColName = 0xA0 => "TDS_COLNAME",
    ColFmt = 0xA1 => "TDS_COLFMT",
    EventNotice = 0xA2 => "TDS_EVENTNOTICE",
    TabName = 0xA4 => "TDS_TABNAME",
    ColInfo = 0xA5 => "TDS_COLINFO",
    OptionCmd = 0xA6 => "TDS_OPTIONCMD",
    AltName = 0xA7 => "TDS_ALTNAME",
    AltFmt = 0xA8 => "TDS_ALTFMT",
    OrderBy = 0xA9 => "TDS_ORDERBY",
    Error = 0xAA => "TDS_ERROR",
    Info = 0xAB => "TDS_INFO",
    ReturnValue = 0xAC => "TDS_RETURNVALUE",
    LoginAck = 0xAD => "TDS_LOGINACK",
    Control = 0xAE => "TDS_CONTROL",
    AltControl = 0xAF => "TDS_ALTCONTROL",
    Key = 0xCA => "TDS_KEY",
    Row = 0xD1 => "TDS_ROW",
    AltRow = 0xD3 => "TDS_ALTROW",
    Params = 0xD7 => "TDS_PARAMS",
    Rpc = 0xE0 => "TDS_RPC",
    Capability = 0xE2 => "TDS_CAPABILITY",
    EnvChange = 0xE3 => "TDS_ENVCHANGE",
    Eed = 0xE5 => "TDS_EED",
    DbRpc = 0xE6 => "TDS_DBRPC",
    Dynamic = 0xE7 => "TDS_DYNAMIC",
    DbRpc2 = 0xE8 => "TDS_DBRPC2",
    ParamFmt = 0xEC => "TDS_PARAMFMT",
    RowFmt = 0xEE => "TDS_ROWFMT",
    Done = 0xFD => "TDS_DONE",
    DoneProc = 0xFE => "TDS_DONEPROC",
    DoneInProc = 0xFF => "TDS_DONEINPROC",
}

impl Token {
    /// Byte value on the wire.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_lookup() {
        for token in Token::ALL {
            assert_eq!(Token::from_u8(token.as_u8()), Some(*token));
        }
        assert_eq!(Token::from_u8(0x00), None);
        assert_eq!(Token::Eed.to_string(), "TDS_EED");
        assert_eq!(Token::DoneInProc.as_u8(), 0xFF);
    }
}

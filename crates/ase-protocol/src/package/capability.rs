//! `CAPABILITY` package and value masks.
//!
//! Capabilities are exchanged as three bit masks. A capability's numeric
//! value is its bit index: bit 0 is the least significant bit of the last
//! byte on the wire, counting up towards the first byte.

use std::fmt;

use super::check_length;
use crate::error::ProtocolError;
use crate::queue::PacketQueue;
use crate::token::Token;

/// Category of a capability mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CapabilityType {
    /// Requests the client may send.
    Request = 1,
    /// Responses the client does not want to receive.
    Response = 2,
    /// Security mechanisms.
    Security = 3,
}

impl CapabilityType {
    /// All categories in wire order.
    pub const ALL: [Self; 3] = [Self::Request, Self::Response, Self::Security];

    /// Look up a category by value.
    pub fn from_u8(value: u8) -> Result<Self, ProtocolError> {
        match value {
            1 => Ok(Self::Request),
            2 => Ok(Self::Response),
            3 => Ok(Self::Security),
            _ => Err(ProtocolError::InvalidValue {
                field: "capability type",
                value: u64::from(value),
            }),
        }
    }
}

impl fmt::Display for CapabilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Request => "CapabilityRequest",
            Self::Response => "CapabilityResponse",
            Self::Security => "CapabilitySecurity",
        })
    }
}

macro_rules! capabilities {
    ($(#[$meta:meta])* $enum:ident { $($variant:ident = $value:literal => $name:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum $enum {
            $(
                #[doc = concat!("`TDS_", $name, "`")]
                $variant = $value,
            )+
        }

        impl $enum {
            /// Every defined capability.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            /// Highest defined capability value.
            pub const MAX: u8 = {
                let mut max = 0;
                let mut i = 0;
                while i < Self::ALL.len() {
                    if Self::ALL[i] as u8 > max {
                        max = Self::ALL[i] as u8;
                    }
                    i += 1;
                }
                max
            };

            /// Look up a capability by value.
            #[must_use]
            pub fn from_u8(value: u8) -> Option<Self> {
                match value {
                    $($value => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// Protocol name without prefix.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $enum {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

capabilities! {
    /// Request capability.
    RequestCapability {
        Lang = 1 => "REQ_LANG",
        Rpc = 2 => "REQ_RPC",
        Evt = 3 => "REQ_EVT",
        Mstmt = 4 => "REQ_MSTMT",
        Bcp = 5 => "REQ_BCP",
        Cursor = 6 => "REQ_CURSOR",
        Dynf = 7 => "REQ_DYNF",
        Msg = 8 => "REQ_MSG",
        Param = 9 => "REQ_PARAM",
        DataInt1 = 10 => "DATA_INT1",
        DataInt2 = 11 => "DATA_INT2",
        DataInt4 = 12 => "DATA_INT4",
        DataBit = 13 => "DATA_BIT",
        DataChar = 14 => "DATA_CHAR",
        DataVchar = 15 => "DATA_VCHAR",
        DataBin = 16 => "DATA_BIN",
        DataVbin = 17 => "DATA_VBIN",
        DataMny8 = 18 => "DATA_MNY8",
        DataMny4 = 19 => "DATA_MNY4",
        DataDate8 = 20 => "DATA_DATE8",
        DataDate4 = 21 => "DATA_DATE4",
        DataFlt4 = 22 => "DATA_FLT4",
        DataFlt8 = 23 => "DATA_FLT8",
        DataNum = 24 => "DATA_NUM",
        DataText = 25 => "DATA_TEXT",
        DataImage = 26 => "DATA_IMAGE",
        DataDec = 27 => "DATA_DEC",
        DataLchar = 28 => "DATA_LCHAR",
        DataLbin = 29 => "DATA_LBIN",
        DataIntn = 30 => "DATA_INTN",
        DataDatetimen = 31 => "DATA_DATETIMEN",
        DataMoneyn = 32 => "DATA_MONEYN",
        CsrPrev = 33 => "CSR_PREV",
        CsrFirst = 34 => "CSR_FIRST",
        CsrLast = 35 => "CSR_LAST",
        CsrAbs = 36 => "CSR_ABS",
        CsrRel = 37 => "CSR_REL",
        CsrMulti = 38 => "CSR_MULTI",
        ConOob = 39 => "CON_OOB",
        ConInband = 40 => "CON_INBAND",
        ConLogical = 41 => "CON_LOGICAL",
        ProtoText = 42 => "PROTO_TEXT",
        ProtoBulk = 43 => "PROTO_BULK",
        ReqUrgevt = 44 => "REQ_URGEVT",
        DataSensitivity = 45 => "DATA_SENSITIVITY",
        DataBoundary = 46 => "DATA_BOUNDARY",
        ProtoDynamic = 47 => "PROTO_DYNAMIC",
        ProtoDynproc = 48 => "PROTO_DYNPROC",
        DataFltn = 49 => "DATA_FLTN",
        DataBitn = 50 => "DATA_BITN",
        DataInt8 = 51 => "DATA_INT8",
        DataVoid = 52 => "DATA_VOID",
        DolBulk = 53 => "DOL_BULK",
        ObjectJava1 = 54 => "OBJECT_JAVA1",
        ObjectChar = 55 => "OBJECT_CHAR",
        ReqReserved1 = 56 => "REQ_RESERVED1",
        ObjectBinary = 57 => "OBJECT_BINARY",
        DataColumnstatus = 58 => "DATA_COLUMNSTATUS",
        Widetables = 59 => "WIDETABLES",
        ReqReserved2 = 60 => "REQ_RESERVED2",
        DataUint2 = 61 => "DATA_UINT2",
        DataUint4 = 62 => "DATA_UINT4",
        DataUint8 = 63 => "DATA_UINT8",
        DataUintn = 64 => "DATA_UINTN",
        CurImplicit = 65 => "CUR_IMPLICIT",
        DataNlbin = 66 => "DATA_NLBIN",
        ImageNchar = 67 => "IMAGE_NCHAR",
        BlobNchar16 = 68 => "BLOB_NCHAR_16",
        BlobNchar8 = 69 => "BLOB_NCHAR_8",
        BlobNcharScsu = 70 => "BLOB_NCHAR_SCSU",
        DataDate = 71 => "DATA_DATE",
        DataTime = 72 => "DATA_TIME",
        DataInterval = 73 => "DATA_INTERVAL",
        CsrScroll = 74 => "CSR_SCROLL",
        CsrSensitive = 75 => "CSR_SENSITIVE",
        CsrInsensitive = 76 => "CSR_INSENSITIVE",
        CsrSemisensitive = 77 => "CSR_SEMISENSITIVE",
        CsrKeysetdriven = 78 => "CSR_KEYSETDRIVEN",
        ReqSrvpktsize = 79 => "REQ_SRVPKTSIZE",
        DataUnitext = 80 => "DATA_UNITEXT",
        CapClusterfailover = 81 => "CAP_CLUSTERFAILOVER",
        DataSint1 = 82 => "DATA_SINT1",
        ReqLargeident = 83 => "REQ_LARGEIDENT",
        ReqBlobNchar16 = 84 => "REQ_BLOB_NCHAR_16",
        DataXml = 85 => "DATA_XML",
        ReqCurinfo3 = 86 => "REQ_CURINFO3",
        ReqDbrpc2 = 87 => "REQ_DBRPC2",
        UnusedReq = 88 => "UNUSED_REQ",
        ReqMigrate = 89 => "REQ_MIGRATE",
        MultiRequests = 90 => "MULTI_REQUESTS",
        ReqOptioncmd2 = 91 => "REQ_OPTIONCMD2",
        ReqLoginfo = 92 => "REQ_LOGINFO",
        DataBigdatetime = 93 => "DATA_BIGDATETIME",
        DataUsecs = 94 => "DATA_USECS",
        RpcparamLob = 95 => "RPCPARAM_LOB",
        ReqInstid = 96 => "REQ_INSTID",
        ReqGrid = 97 => "REQ_GRID",
        ReqDynBatch = 98 => "REQ_DYN_BATCH",
        ReqLangBatch = 99 => "REQ_LANG_BATCH",
        ReqRpcBatch = 100 => "REQ_RPC_BATCH",
        DataLoblocator = 101 => "DATA_LOBLOCATOR",
        ReqRowcountForSelect = 102 => "REQ_ROWCOUNT_FOR_SELECT",
        ReqLogparams = 103 => "REQ_LOGPARAMS",
        ReqDynamicSuppressParamfmt = 104 => "REQ_DYNAMIC_SUPPRESS_PARAMFMT",
        ReqReadonly = 105 => "REQ_READONLY",
        ReqCommandEncryption = 106 => "REQ_COMMAND_ENCRYPTION",
    }
}

capabilities! {
    /// Response capability. Each one asks the server to not send
    /// something.
    ResponseCapability {
        ResNomsg = 1 => "RES_NOMSG",
        ResNoeed = 2 => "RES_NOEED",
        ResNoparam = 3 => "RES_NOPARAM",
        DataNoint1 = 4 => "DATA_NOINT1",
        DataNoint2 = 5 => "DATA_NOINT2",
        DataNoint4 = 6 => "DATA_NOINT4",
        DataNobit = 7 => "DATA_NOBIT",
        DataNochar = 8 => "DATA_NOCHAR",
        DataNovchar = 9 => "DATA_NOVCHAR",
        DataNobin = 10 => "DATA_NOBIN",
        DataNovbin = 11 => "DATA_NOVBIN",
        DataNomny8 = 12 => "DATA_NOMNY8",
        DataNomny4 = 13 => "DATA_NOMNY4",
        DataNodate8 = 14 => "DATA_NODATE8",
        DataNodate4 = 15 => "DATA_NODATE4",
        DataNoflt4 = 16 => "DATA_NOFLT4",
        DataNoflt8 = 17 => "DATA_NOFLT8",
        DataNonum = 18 => "DATA_NONUM",
        DataNotext = 19 => "DATA_NOTEXT",
        DataNoimage = 20 => "DATA_NOIMAGE",
        DataNodec = 21 => "DATA_NODEC",
        DataNolchar = 22 => "DATA_NOLCHAR",
        DataNolbin = 23 => "DATA_NOLBIN",
        DataNointn = 24 => "DATA_NOINTN",
        DataNodatetimen = 25 => "DATA_NODATETIMEN",
        DataNomoneyn = 26 => "DATA_NOMONEYN",
        ConNooob = 27 => "CON_NOOOB",
        ConNoinband = 28 => "CON_NOINBAND",
        ProtoNotext = 29 => "PROTO_NOTEXT",
        ProtoNobulk = 30 => "PROTO_NOBULK",
        DataNosensitivity = 31 => "DATA_NOSENSITIVITY",
        DataNoboundary = 32 => "DATA_NOBOUNDARY",
        ResNotdsdebug = 33 => "RES_NOTDSDEBUG",
        ResNostripblanks = 34 => "RES_NOSTRIPBLANKS",
        DataNoint8 = 35 => "DATA_NOINT8",
        ObjectNojava1 = 36 => "OBJECT_NOJAVA1",
        ObjectNochar = 37 => "OBJECT_NOCHAR",
        DataNocolumnstatus = 38 => "DATA_NOCOLUMNSTATUS",
        ObjectNobinary = 39 => "OBJECT_NOBINARY",
        ResReserved = 40 => "RES_RESERVED",
        DataNouint2 = 41 => "DATA_NOUINT2",
        DataNouint4 = 42 => "DATA_NOUINT4",
        DataNouint8 = 43 => "DATA_NOUINT8",
        DataNouintn = 44 => "DATA_NOUINTN",
        NoWidetables = 45 => "NO_WIDETABLES",
        DataNonlbin = 46 => "DATA_NONLBIN",
        ImageNonchar = 47 => "IMAGE_NONCHAR",
        BlobNonchar16 = 48 => "BLOB_NONCHAR_16",
        BlobNonchar8 = 49 => "BLOB_NONCHAR_8",
        BlobNoncharScsu = 50 => "BLOB_NONCHAR_SCSU",
        DataNodate = 51 => "DATA_NODATE",
        DataNotime = 52 => "DATA_NOTIME",
        DataNointerval = 53 => "DATA_NOINTERVAL",
        DataNounitext = 54 => "DATA_NOUNITEXT",
        DataNosint1 = 55 => "DATA_NOSINT1",
        NoLargeident = 56 => "NO_LARGEIDENT",
        NoBlobNchar16 = 57 => "NO_BLOB_NCHAR_16",
        NoSrvpktsize = 58 => "NO_SRVPKTSIZE",
        DataNoxml = 59 => "DATA_NOXML",
        NonintReturnValue = 60 => "NONINT_RETURN_VALUE",
        ResNoxnlmetadata = 61 => "RES_NOXNLMETADATA",
        ResSuppressFmt = 62 => "RES_SUPPRESS_FMT",
        ResSuppressDoneinproc = 63 => "RES_SUPPRESS_DONEINPROC",
        UnusedRes = 64 => "UNUSED_RES",
        DataNobigdatetime = 65 => "DATA_NOBIGDATETIME",
        DataNousecs = 66 => "DATA_NOUSECS",
        ResNoTdscontrol = 67 => "RES_NO_TDSCONTROL",
        RpcparamNolob = 68 => "RPCPARAM_NOLOB",
        DataNoloblocator = 69 => "DATA_NOLOBLOCATOR",
        ResNorowcountForSelect = 70 => "RES_NOROWCOUNT_FOR_SELECT",
        ResCumulativeDone = 71 => "RES_CUMULATIVE_DONE",
        ResListDrMap = 72 => "RES_LIST_DR_MAP",
        ResDrNokill = 73 => "RES_DR_NOKILL",
    }
}

/// A capability bit mask.
///
/// The mask holds one bit per capability value, so index 0 is never used
/// by a defined capability.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValueMask {
    bits: Vec<bool>,
}

impl ValueMask {
    /// Create an empty mask able to hold capabilities up to `max`.
    #[must_use]
    pub fn new(max: u8) -> Self {
        Self {
            bits: vec![false; usize::from(max) + 1],
        }
    }

    /// Parse a mask from its wire representation.
    ///
    /// The parsed mask holds exactly the transmitted bits, so writing it
    /// back yields the same number of bytes.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Self {
        let mut bits = Vec::with_capacity(bytes.len() * 8);
        for byte in bytes.iter().rev() {
            for bit in 0..8 {
                bits.push(byte & (1 << bit) != 0);
            }
        }
        Self { bits }
    }

    /// Number of bits held.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bits.len()
    }

    /// Set or clear a capability.
    pub fn set(&mut self, capability: u8, enable: bool) -> Result<(), ProtocolError> {
        let len = self.bits.len();
        let bit = self
            .bits
            .get_mut(usize::from(capability))
            .ok_or(ProtocolError::CapabilityOutOfRange { capability, len })?;
        *bit = enable;
        Ok(())
    }

    /// Whether a capability is set. Capabilities beyond the mask are not.
    #[must_use]
    pub fn get(&self, capability: u8) -> bool {
        self.bits
            .get(usize::from(capability))
            .copied()
            .unwrap_or(false)
    }

    /// Whether no capability is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.len() <= 1 || !self.bits.iter().any(|b| *b)
    }

    /// Values of all set capabilities in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, set)| **set)
            .filter_map(|(i, _)| u8::try_from(i).ok())
    }

    /// Wire representation.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let len = self.bits.len().div_ceil(8);
        let mut bytes = vec![0u8; len];
        for (i, set) in self.bits.iter().enumerate() {
            if *set {
                bytes[len - 1 - i / 8] |= 1 << (i % 8);
            }
        }
        bytes
    }
}

impl fmt::Display for ValueMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, capability) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{capability}")?;
        }
        Ok(())
    }
}

/// Capabilities requested by the client or granted by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityPackage {
    /// Request capabilities.
    pub request: ValueMask,
    /// Response capabilities.
    pub response: ValueMask,
    /// Security capabilities.
    pub security: ValueMask,
}

impl Default for CapabilityPackage {
    fn default() -> Self {
        Self {
            request: ValueMask::new(RequestCapability::MAX),
            response: ValueMask::new(ResponseCapability::MAX),
            security: ValueMask::new(0),
        }
    }
}

impl CapabilityPackage {
    /// Create a package with the given capabilities set.
    pub fn new(
        request: &[RequestCapability],
        response: &[ResponseCapability],
        security: &[u8],
    ) -> Result<Self, ProtocolError> {
        let mut package = Self::default();
        for capability in request {
            package.request.set(*capability as u8, true)?;
        }
        for capability in response {
            package.response.set(*capability as u8, true)?;
        }
        for capability in security {
            package.security.set(*capability, true)?;
        }
        Ok(package)
    }

    /// Capabilities a client requests during login.
    #[must_use]
    pub fn client_default() -> Self {
        use RequestCapability as Req;

        let request = [
            Req::Lang,
            Req::Mstmt,
            Req::Dynf,
            Req::Msg,
            Req::Param,
            Req::DataInt1,
            Req::DataInt2,
            Req::DataInt4,
            Req::DataBit,
            Req::DataChar,
            Req::DataVchar,
            Req::DataBin,
            Req::DataVbin,
            Req::DataMny8,
            Req::DataMny4,
            Req::DataDate8,
            Req::DataDate4,
            Req::DataFlt4,
            Req::DataFlt8,
            Req::DataNum,
            Req::DataText,
            Req::DataImage,
            Req::DataDec,
            Req::DataLchar,
            Req::DataLbin,
            Req::DataIntn,
            Req::DataDatetimen,
            Req::DataMoneyn,
            Req::DataSensitivity,
            Req::DataBoundary,
            Req::DataFltn,
            Req::DataBitn,
            Req::DataInt8,
            Req::DataUint2,
            Req::DataUint4,
            Req::DataUint8,
            Req::DataUintn,
            Req::DataNlbin,
            Req::ImageNchar,
            Req::BlobNchar16,
            Req::BlobNchar8,
            Req::BlobNcharScsu,
            Req::DataDate,
            Req::DataTime,
            Req::DataInterval,
            Req::DataUnitext,
            Req::DataSint1,
            Req::ReqLargeident,
            Req::ReqBlobNchar16,
            Req::DataXml,
            Req::DataBigdatetime,
            Req::DataUsecs,
            Req::ConOob,
            Req::ConInband,
            Req::ReqUrgevt,
            Req::ProtoDynproc,
            Req::DataColumnstatus,
            Req::ReqCurinfo3,
            Req::ReqDbrpc2,
            Req::Widetables,
            Req::CsrScroll,
            Req::CsrSensitive,
            Req::CsrInsensitive,
            Req::CsrSemisensitive,
            Req::CsrKeysetdriven,
            Req::ReqSrvpktsize,
            Req::ReqDynBatch,
            Req::ReqLangBatch,
            Req::ReqRpcBatch,
            Req::ReqCommandEncryption,
        ];

        let mut package = Self::default();
        for capability in request {
            package.request.bits[capability as usize] = true;
        }
        package.response.bits[ResponseCapability::ResNoTdscontrol as usize] = true;
        package
    }

    /// Mask of a category.
    #[must_use]
    pub fn mask(&self, kind: CapabilityType) -> &ValueMask {
        match kind {
            CapabilityType::Request => &self.request,
            CapabilityType::Response => &self.response,
            CapabilityType::Security => &self.security,
        }
    }

    fn mask_mut(&mut self, kind: CapabilityType) -> &mut ValueMask {
        match kind {
            CapabilityType::Request => &mut self.request,
            CapabilityType::Response => &mut self.response,
            CapabilityType::Security => &mut self.security,
        }
    }

    /// Whether a request capability is set.
    #[must_use]
    pub fn has_request(&self, capability: RequestCapability) -> bool {
        self.request.get(capability as u8)
    }

    /// Whether a response capability is set.
    #[must_use]
    pub fn has_response(&self, capability: ResponseCapability) -> bool {
        self.response.get(capability as u8)
    }

    /// Whether a security capability is set.
    #[must_use]
    pub fn has_security(&self, capability: u8) -> bool {
        self.security.get(capability)
    }

    /// Check the server's echo of the requested capabilities.
    ///
    /// A category the client requested that comes back with every bit
    /// cleared means the server did not understand the request at all.
    /// Returns that category as the error.
    pub fn check_echo(&self, echo: &Self) -> Result<(), CapabilityType> {
        for kind in CapabilityType::ALL {
            let echoed = echo.mask(kind);
            if !self.mask(kind).is_empty() && echoed.capacity() > 1 && echoed.is_empty() {
                return Err(kind);
            }
        }
        Ok(())
    }

    pub(crate) fn decode(queue: &mut PacketQueue) -> Result<Self, ProtocolError> {
        let length = usize::from(queue.u16()?);
        let start = queue.consumed();

        let mut package = Self {
            request: ValueMask::default(),
            response: ValueMask::default(),
            security: ValueMask::default(),
        };
        while queue.consumed() - start < length {
            let kind = CapabilityType::from_u8(queue.u8()?)?;
            let mask_len = queue.u8()?;
            let bytes = queue.bytes(usize::from(mask_len))?;
            *package.mask_mut(kind) = ValueMask::parse(&bytes);
        }

        check_length("Capability", length, start, queue)?;
        Ok(package)
    }

    pub(crate) fn encode(&self, queue: &mut PacketQueue) -> Result<(), ProtocolError> {
        let masks: Vec<(CapabilityType, Vec<u8>)> = CapabilityType::ALL
            .into_iter()
            .filter(|kind| !self.mask(*kind).is_empty())
            .map(|kind| (kind, self.mask(kind).to_bytes()))
            .collect();

        let length: usize = masks.iter().map(|(_, bytes)| 2 + bytes.len()).sum();
        let length = u16::try_from(length).map_err(|_| ProtocolError::TooLong {
            field: "Capability",
            max: usize::from(u16::MAX),
            actual: length,
        })?;

        queue.write_u8(Token::Capability.as_u8());
        queue.write_u16(length);
        for (kind, bytes) in masks {
            let mask_len = u8::try_from(bytes.len()).map_err(|_| ProtocolError::TooLong {
                field: "value mask",
                max: usize::from(u8::MAX),
                actual: bytes.len(),
            })?;
            queue.write_u8(kind as u8);
            queue.write_u8(mask_len);
            queue.write_bytes(&bytes);
        }
        Ok(())
    }
}

impl fmt::Display for CapabilityPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Request=[{}], Response=[{}], Security=[{}]",
            self.request, self.response, self.security
        )
    }
}

//! Client library version carried in the login record.

use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Program name sent in the login record.
pub const LIBRARY_NAME: &str = "ase-tds";

/// Program version sent in the login record.
pub const LIBRARY_VERSION: Version = Version::new(0, 1, 0, 0);

/// A four part version number.
///
/// Ordering compares major, minor, service pack and patch in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    major: u8,
    minor: u8,
    sp: u8,
    patch: u8,
}

impl Version {
    /// Create a version from its parts.
    #[must_use]
    pub const fn new(major: u8, minor: u8, sp: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            sp,
            patch,
        }
    }

    /// Create a version from its wire representation.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        match bytes {
            [major, minor, sp, patch] => Ok(Self::new(*major, *minor, *sp, *patch)),
            _ => Err(ProtocolError::InvalidVersion(format!(
                "expected 4 bytes, received {}",
                bytes.len()
            ))),
        }
    }

    /// Wire representation.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 4] {
        [self.major, self.minor, self.sp, self.patch]
    }

    /// Major version.
    #[must_use]
    pub const fn major(self) -> u8 {
        self.major
    }

    /// Minor version.
    #[must_use]
    pub const fn minor(self) -> u8 {
        self.minor
    }

    /// Service pack.
    #[must_use]
    pub const fn sp(self) -> u8 {
        self.sp
    }

    /// Patch level.
    #[must_use]
    pub const fn patch(self) -> u8 {
        self.patch
    }
}

impl FromStr for Version {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 4 {
            return Err(ProtocolError::InvalidVersion(format!(
                "expected 4 parts, received {} in '{s}'",
                parts.len()
            )));
        }

        let mut bytes = [0u8; 4];
        for (byte, part) in bytes.iter_mut().zip(&parts) {
            *byte = part
                .parse::<u8>()
                .map_err(|e| ProtocolError::InvalidVersion(format!("'{part}' in '{s}': {e}")))?;
        }
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.sp, self.patch)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse() {
        let v: Version = "16.0.3.7".parse().unwrap();
        assert_eq!(v, Version::new(16, 0, 3, 7));
        assert_eq!(v.to_string(), "16.0.3.7");
        assert_eq!(Version::from_bytes(&v.to_bytes()).unwrap(), v);

        assert!("1.2.3".parse::<Version>().is_err());
        assert!("1.2.3.256".parse::<Version>().is_err());
        assert!(Version::from_bytes(&[1, 2]).is_err());
    }

    #[test]
    fn test_version_ordering() {
        assert!(Version::new(1, 0, 0, 0) > Version::new(0, 9, 9, 9));
        assert!(Version::new(1, 2, 0, 1) > Version::new(1, 2, 0, 0));
        assert_eq!(
            Version::new(1, 2, 3, 4).cmp(&Version::new(1, 2, 3, 4)),
            std::cmp::Ordering::Equal
        );
    }

    #[test]
    fn test_library_name_fits_login_record() {
        assert!(LIBRARY_NAME.len() <= 10);
    }
}

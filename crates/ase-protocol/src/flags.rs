//! Rendering of flag sets in log output.

use std::fmt;

use bitflags::Flags;

/// Write the names of the set flags joined by `|`, or `empty` when no
/// flag is set. Bits without a name are rendered in hex.
pub(crate) fn write_flags<F>(f: &mut fmt::Formatter<'_>, flags: &F, empty: &str) -> fmt::Result
where
    F: Flags,
    F::Bits: fmt::LowerHex,
{
    if flags.is_empty() {
        return f.write_str(empty);
    }

    let mut first = true;
    for (name, _) in flags.iter_names() {
        if !first {
            f.write_str("|")?;
        }
        f.write_str(name)?;
        first = false;
    }

    let unknown = F::from_bits_retain(flags.bits()).difference(F::from_bits_truncate(flags.bits()));
    if !unknown.is_empty() {
        if !first {
            f.write_str("|")?;
        }
        write!(f, "0x{:x}", unknown.bits())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use bitflags::bitflags;

    use super::*;

    bitflags! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        struct Sample: u8 {
            const A = 0x01;
            const B = 0x02;
        }
    }

    impl fmt::Display for Sample {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write_flags(f, self, "NONE")
        }
    }

    #[test]
    fn test_write_flags() {
        assert_eq!(Sample::empty().to_string(), "NONE");
        assert_eq!((Sample::A | Sample::B).to_string(), "A|B");
        assert_eq!(Sample::from_bits_retain(0x81).to_string(), "A|0x80");
    }
}

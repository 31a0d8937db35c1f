//! CDR encapsulation kinds.
//!
//! Every message starts with the 4-byte header `[0x00, kind, 0x00, 0x00]`.
//! Bit 0 of the kind selects little-endian; kinds above `0x03` use the
//! CDR2 rules (delimiter headers for appendable/mutable types).

/// Encapsulation identifiers from the DDS-XTypes representation table,
/// including the RTPS-scoped variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EncapsulationKind {
    /// Plain CDR, big-endian.
    CdrBe = 0x00,
    /// Plain CDR, little-endian.
    CdrLe = 0x01,
    /// Parameter-list CDR (member headers + sentinel), big-endian.
    PlCdrBe = 0x02,
    /// Parameter-list CDR (member headers + sentinel), little-endian.
    PlCdrLe = 0x03,
    /// RTPS variant of plain CDR2.
    RtpsCdr2Be = 0x06,
    RtpsCdr2Le = 0x07,
    /// RTPS variant of delimited CDR2.
    RtpsDelimitedCdr2Be = 0x08,
    RtpsDelimitedCdr2Le = 0x09,
    /// RTPS variant of parameter-list CDR2.
    RtpsPlCdr2Be = 0x0A,
    RtpsPlCdr2Le = 0x0B,
    /// Plain CDR2.
    Cdr2Be = 0x10,
    Cdr2Le = 0x11,
    /// Parameter-list CDR2 (delimiter + member headers + sentinel).
    PlCdr2Be = 0x12,
    PlCdr2Le = 0x13,
    /// Delimited CDR2.
    DelimitedCdr2Be = 0x14,
    DelimitedCdr2Le = 0x15,
}

impl EncapsulationKind {
    /// Map byte 1 of an encapsulation header to its kind.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x00 => Self::CdrBe,
            0x01 => Self::CdrLe,
            0x02 => Self::PlCdrBe,
            0x03 => Self::PlCdrLe,
            0x06 => Self::RtpsCdr2Be,
            0x07 => Self::RtpsCdr2Le,
            0x08 => Self::RtpsDelimitedCdr2Be,
            0x09 => Self::RtpsDelimitedCdr2Le,
            0x0A => Self::RtpsPlCdr2Be,
            0x0B => Self::RtpsPlCdr2Le,
            0x10 => Self::Cdr2Be,
            0x11 => Self::Cdr2Le,
            0x12 => Self::PlCdr2Be,
            0x13 => Self::PlCdr2Le,
            0x14 => Self::DelimitedCdr2Be,
            0x15 => Self::DelimitedCdr2Le,
            _ => return None,
        })
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn is_little_endian(self) -> bool {
        self.as_byte() & 0x01 == 0x01
    }

    /// Whether this kind follows the CDR2 rules. Delimiter headers only
    /// exist under CDR2; classic kinds frame appendable types as final.
    pub fn is_cdr2(self) -> bool {
        !matches!(self, Self::CdrBe | Self::CdrLe | Self::PlCdrBe | Self::PlCdrLe)
    }
}

//! # Encoding rule selection

/// The set of transfer syntaxes supported by this crate. Every PDU is
/// produced and consumed under exactly one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EncodingRules {
    /// X.690 — Basic Encoding Rules
    Ber,
    /// X.690 — Canonical Encoding Rules
    Cer,
    /// X.690 — Distinguished Encoding Rules
    Der,
}

impl EncodingRules {
    pub fn is_ber(self) -> bool {
        matches!(self, Self::Ber)
    }

    pub fn is_cer(self) -> bool {
        matches!(self, Self::Cer)
    }

    pub fn is_der(self) -> bool {
        matches!(self, Self::Der)
    }

    /// Whether the indefinite length form (`0x80` + end-of-contents) is a
    /// legal encoding under this rule. BER permits it for any constructed
    /// value; CER requires it for constructed values; DER forbids it.
    pub fn allows_indefinite(self) -> bool {
        !matches!(self, Self::Der)
    }

    /// Whether SET and SET OF elements must appear in ascending
    /// lexicographic order of their encoded bytes.
    pub fn canonical_ordering(self) -> bool {
        !matches!(self, Self::Ber)
    }

    /// Whether length octets must use the shortest possible form.
    pub fn requires_minimal_length(self) -> bool {
        !matches!(self, Self::Ber)
    }

    /// The maximum number of content octets a primitive string encoding may
    /// carry before it must be split into a constructed encoding of
    /// primitive segments.
    pub fn max_primitive_string_length(self) -> usize {
        match self {
            Self::Cer => 1000,
            _ => usize::MAX,
        }
    }
}

impl core::fmt::Display for EncodingRules {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Ber => write!(f, "BER"),
            Self::Cer => write!(f, "CER"),
            Self::Der => write!(f, "DER"),
        }
    }
}

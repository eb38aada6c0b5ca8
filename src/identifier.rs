use crate::tag::{Class, Tag};

/// The identifier octets of a TLV: the tag plus the primitive/constructed
/// encoding bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Identifier {
    /// The ASN.1 tag.
    pub tag: Tag,
    /// Whether a value is using `constructed` or `primitive` encoding.
    is_constructed: bool,
}

impl Identifier {
    /// Instantiates a new instance of `Identifier` from its components.
    pub const fn new(class: Class, is_constructed: bool, tag: u32) -> Self {
        Self {
            tag: Tag::new(class, tag),
            is_constructed,
        }
    }

    pub const fn from_tag(tag: Tag, is_constructed: bool) -> Self {
        Self {
            tag,
            is_constructed,
        }
    }

    /// Instantiates a new identifier from `self` with `tag` overwritten.
    pub fn tag_number(self, tag: u32) -> Self {
        Self {
            tag: self.tag.set_value(tag),
            is_constructed: self.is_constructed,
        }
    }

    /// Instantiates a new identifier from `self` with `class` overwritten.
    pub fn class(self, class: Class) -> Self {
        Self {
            tag: self.tag.set_class(class),
            is_constructed: self.is_constructed,
        }
    }

    /// Instantiates a new identifier from `self` with the constructed bit set.
    pub fn constructed(self) -> Self {
        Self {
            tag: self.tag,
            is_constructed: true,
        }
    }

    pub fn is_constructed(&self) -> bool {
        self.is_constructed
    }

    pub fn is_primitive(&self) -> bool {
        !self.is_constructed()
    }
}

impl core::ops::Deref for Identifier {
    type Target = Tag;

    fn deref(&self) -> &Self::Target {
        &self.tag
    }
}

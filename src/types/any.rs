/// A complete encoded TLV held as raw bytes, used for extension fields and
/// open types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Any {
    pub contents: Vec<u8>,
}

impl Any {
    pub fn new(contents: Vec<u8>) -> Self {
        Self { contents }
    }
}

impl From<Vec<u8>> for Any {
    fn from(contents: Vec<u8>) -> Self {
        Self { contents }
    }
}

impl AsRef<[u8]> for Any {
    fn as_ref(&self) -> &[u8] {
        &self.contents
    }
}

use crate::codec::WordType;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid index file: bad magic {found:#010x}")]
    BadMagic { found: u32 },

    #[error("Malformed index: {0}")]
    Malformed(String),

    #[error("Hash name {name} is not recognized. Supported hashes are: {supported}.")]
    UnknownHash { name: String, supported: &'static str },

    #[error("Hash name {name} is longer than {max} bytes")]
    HashNameTooLong { name: String, max: usize },

    #[error("Invalid data size: {bits} bits (expected {min}..={max} for this wordlist)")]
    InvalidDataBits { bits: u32, min: u32, max: u32 },

    #[error("Line {line} is too long (larger than {max} bytes)")]
    LineTooLong { line: u64, max: usize },

    #[error("Tag bits collide with the last payload byte {byte:#04x} of a {word_type:?} word")]
    TagCollision { byte: u8, word_type: WordType },

    #[error("Pointer {offset} does not fit in a {data_bytes}-byte data field")]
    PointerOverflow { offset: u64, data_bytes: usize },

    #[error("Payload of {len} bytes does not fit in a {data_bytes}-byte data field")]
    PayloadTooLarge { len: usize, data_bytes: usize },

    #[error("Index entry data bytes mismatch: {first} != {second}")]
    DataBytesMismatch { first: u8, second: u8 },

    #[error("Index hash names mismatch: {first} != {second}")]
    HashMismatch { first: String, second: String },

    #[error("Corrupt {word_type:?} word: no terminator within {len} bytes")]
    CorruptWord { word_type: WordType, len: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

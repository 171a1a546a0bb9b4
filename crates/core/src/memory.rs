//! Backing image, bank table and segmented address resolution.
//!
//! Display lists never reference the image directly. Every pointer they carry
//! is a *segmented address*: the top byte selects a bank (segment) and the
//! low 24 bits are an offset into it. The [`BankTable`] maps segment ids to
//! absolute offsets inside the [`BackingImage`].
//!
//! Resolution is total: an address either maps to an absolute offset or it is
//! unmapped (`None`). Nothing here panics on foreign data.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::{log, LogCategory, LogLevel};

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("Invalid bank table: {0}")]
    InvalidBankTable(String),
    #[error("Bank table parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A 32-bit segmented address (segment in bits 24..31, offset in bits 0..23)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SegmentedAddress(pub u32);

impl SegmentedAddress {
    pub const OFFSET_MASK: u32 = 0x00FF_FFFF;

    pub fn new(segment: u8, offset: u32) -> Self {
        Self(((segment as u32) << 24) | (offset & Self::OFFSET_MASK))
    }

    pub fn segment(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn offset(self) -> u32 {
        self.0 & Self::OFFSET_MASK
    }

    /// Address `bytes` further into the same segment (wraps inside 32 bits)
    pub fn add(self, bytes: u32) -> Self {
        Self(self.0.wrapping_add(bytes))
    }
}

impl fmt::Display for SegmentedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

impl From<u32> for SegmentedAddress {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// One segment of the bank table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bank {
    /// Absolute offset of the segment's first byte in the image
    pub base: usize,
    /// Segment length; offsets at or past it are unmapped
    #[serde(default)]
    pub size: Option<usize>,
}

/// Segment id -> bank mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BankTable {
    banks: BTreeMap<u8, Bank>,
}

impl BankTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a segment, replacing any previous mapping
    pub fn insert(&mut self, segment: u8, bank: Bank) {
        self.banks.insert(segment, bank);
    }

    /// Builder-style [`BankTable::insert`]
    pub fn with_bank(mut self, segment: u8, base: usize, size: Option<usize>) -> Self {
        self.insert(segment, Bank { base, size });
        self
    }

    pub fn get(&self, segment: u8) -> Option<&Bank> {
        self.banks.get(&segment)
    }

    pub fn len(&self) -> usize {
        self.banks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &Bank)> {
        self.banks.iter().map(|(segment, bank)| (*segment, bank))
    }

    /// Parse a JSON object of the form `{"2": {"base": 0, "size": 4096}}`
    pub fn from_json_str(json: &str) -> Result<Self, MemoryError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a `SEG=BASE[:SIZE]` spec (numbers in hex, optional `0x` prefix)
    pub fn parse_bank_spec(spec: &str) -> Result<(u8, Bank), MemoryError> {
        let (segment, rest) = spec
            .split_once('=')
            .ok_or_else(|| MemoryError::InvalidBankTable(format!("missing '=' in {spec:?}")))?;
        let (base, size) = match rest.split_once(':') {
            Some((base, size)) => (base, Some(size)),
            None => (rest, None),
        };

        let segment = parse_hex(segment)
            .and_then(|value| u8::try_from(value).ok())
            .ok_or_else(|| MemoryError::InvalidBankTable(format!("bad segment in {spec:?}")))?;
        let base = parse_hex(base)
            .ok_or_else(|| MemoryError::InvalidBankTable(format!("bad base in {spec:?}")))?;
        let size = match size {
            Some(size) => Some(
                parse_hex(size).ok_or_else(|| {
                    MemoryError::InvalidBankTable(format!("bad size in {spec:?}"))
                })?,
            ),
            None => None,
        };

        Ok((segment, Bank { base, size }))
    }
}

/// Parse a hexadecimal number with an optional `0x` prefix
pub fn parse_hex(text: &str) -> Option<usize> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    usize::from_str_radix(digits, 16).ok()
}

/// Dump byte orders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub enum ByteOrder {
    /// Native order (.z64), also assumed for headerless scene files
    BigEndian,
    /// 32-bit byte-swapped (.n64)
    LittleEndian,
    /// 16-bit byte-swapped (.v64)
    MiddleEndian,
}

/// Immutable, big-endian byte image the display lists live in
#[derive(Debug, Clone, Default)]
pub struct BackingImage {
    bytes: Vec<u8>,
}

impl BackingImage {
    /// Wrap bytes that are already in native (big-endian) order
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Load a dump, normalizing byte-swapped cartridge images to big-endian.
    ///
    /// Data without a recognized cartridge magic is taken as-is.
    pub fn load(data: &[u8]) -> Result<Self, MemoryError> {
        if data.is_empty() {
            return Err(MemoryError::InvalidImage("image is empty".to_string()));
        }

        let order = Self::detect_byte_order(data);
        log(LogCategory::Memory, LogLevel::Info, || {
            format!("loaded {} byte image ({:?})", data.len(), order)
        });

        let mut bytes = data.to_vec();
        match order {
            ByteOrder::BigEndian => {}
            ByteOrder::LittleEndian => {
                for chunk in bytes.chunks_exact_mut(4) {
                    chunk.reverse();
                }
            }
            ByteOrder::MiddleEndian => {
                for chunk in bytes.chunks_exact_mut(2) {
                    chunk.swap(0, 1);
                }
            }
        }
        Ok(Self { bytes })
    }

    pub fn detect_byte_order(data: &[u8]) -> ByteOrder {
        match data.get(0..4) {
            Some([0x40, 0x12, 0x37, 0x80]) => ByteOrder::LittleEndian,
            Some([0x37, 0x80, 0x40, 0x12]) => ByteOrder::MiddleEndian,
            _ => ByteOrder::BigEndian,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Turns segmented addresses into absolute offsets of a byte image
///
/// Implementations must never panic: unmapped addresses resolve to `None`.
pub trait MemoryResolver {
    /// Absolute offset of `addr` in [`MemoryResolver::bytes`], or `None` when unmapped
    fn resolve(&self, addr: SegmentedAddress) -> Option<usize>;

    /// The backing bytes resolved offsets index into
    fn bytes(&self) -> &[u8];

    fn read_u8(&self, offset: usize) -> Option<u8> {
        self.bytes().get(offset).copied()
    }

    fn read_u16(&self, offset: usize) -> Option<u16> {
        let end = offset.checked_add(2)?;
        let raw = self.bytes().get(offset..end)?;
        Some(u16::from_be_bytes([raw[0], raw[1]]))
    }

    fn read_i16(&self, offset: usize) -> Option<i16> {
        self.read_u16(offset).map(|value| value as i16)
    }

    fn read_u32(&self, offset: usize) -> Option<u32> {
        let end = offset.checked_add(4)?;
        let raw = self.bytes().get(offset..end)?;
        Some(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    /// `len` bytes starting at `offset`, if entirely inside the image
    fn slice(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let end = offset.checked_add(len)?;
        self.bytes().get(offset..end)
    }
}

/// The stock resolver: an image plus its bank table
#[derive(Debug, Clone, Copy)]
pub struct BankedImage<'a> {
    image: &'a BackingImage,
    banks: &'a BankTable,
}

impl<'a> BankedImage<'a> {
    pub fn new(image: &'a BackingImage, banks: &'a BankTable) -> Self {
        Self { image, banks }
    }

    pub fn banks(&self) -> &BankTable {
        self.banks
    }
}

impl MemoryResolver for BankedImage<'_> {
    fn resolve(&self, addr: SegmentedAddress) -> Option<usize> {
        let bank = self.banks.get(addr.segment())?;
        let offset = addr.offset() as usize;
        if bank.size.is_some_and(|size| offset >= size) {
            return None;
        }
        let absolute = bank.base.checked_add(offset)?;
        (absolute < self.image.len()).then_some(absolute)
    }

    fn bytes(&self) -> &[u8] {
        self.image.bytes()
    }
}

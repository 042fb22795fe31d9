//! Typed views over the 28-byte record payload.
//!
//! A layout is decoded into an owned value and encoded back explicitly; the
//! bytes are never aliased as a struct. Reads past the end of the buffer
//! yield zeroes and writes past the end are dropped, so no payload, however
//! malformed, can make a view panic.

use crate::config::ModConfig;

/// Raw payload storage of one record.
pub type PayloadBytes = [u8; ModConfig::PAYLOAD_SIZE];

/// A behavior-specific interpretation of the payload bytes.
///
/// Layouts occupy `SIZE` bytes starting at offset 0. Bytes beyond `SIZE` are
/// left untouched when the layout is written back.
pub trait PayloadLayout: Sized {
    /// Encoded size in bytes; must not exceed [`ModConfig::PAYLOAD_SIZE`].
    const SIZE: usize;

    fn read(reader: &mut PayloadReader<'_>) -> Self;

    fn write(&self, writer: &mut PayloadWriter<'_>);

    fn decode(bytes: &PayloadBytes) -> Self {
        const { assert!(Self::SIZE <= ModConfig::PAYLOAD_SIZE) };
        Self::read(&mut PayloadReader::new(bytes))
    }

    fn encode_into(&self, bytes: &mut PayloadBytes) {
        const { assert!(Self::SIZE <= ModConfig::PAYLOAD_SIZE) };
        self.write(&mut PayloadWriter::new(bytes));
    }
}

/// Behaviors without replicated data.
impl PayloadLayout for () {
    const SIZE: usize = 0;

    fn read(_reader: &mut PayloadReader<'_>) -> Self {}

    fn write(&self, _writer: &mut PayloadWriter<'_>) {}
}

/// Little-endian cursor over payload bytes.
pub struct PayloadReader<'a> {
    bytes: &'a PayloadBytes,
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(bytes: &'a PayloadBytes) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        let start = self.pos.min(self.bytes.len());
        let end = (self.pos + N).min(self.bytes.len());
        out[..end - start].copy_from_slice(&self.bytes[start..end]);
        self.pos += N;
        out
    }

    pub fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    pub fn bool(&mut self) -> bool {
        self.u8() != 0
    }

    pub fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    pub fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    pub fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }

    pub fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.take())
    }

    /// Reads a 0-based index stored with the header's +1 sentinel encoding.
    pub fn index(&mut self) -> Option<u8> {
        self.u8().checked_sub(1)
    }

    pub fn vec2(&mut self) -> crate::Vec2 {
        let x = self.f32();
        let y = self.f32();
        crate::Vec2::new(x, y)
    }
}

/// Little-endian cursor writing into payload bytes.
pub struct PayloadWriter<'a> {
    bytes: &'a mut PayloadBytes,
    pos: usize,
}

impl<'a> PayloadWriter<'a> {
    pub fn new(bytes: &'a mut PayloadBytes) -> Self {
        Self { bytes, pos: 0 }
    }

    fn put<const N: usize>(&mut self, value: [u8; N]) {
        let start = self.pos.min(self.bytes.len());
        let end = (self.pos + N).min(self.bytes.len());
        self.bytes[start..end].copy_from_slice(&value[..end - start]);
        self.pos += N;
    }

    pub fn u8(&mut self, value: u8) {
        self.put([value]);
    }

    pub fn bool(&mut self, value: bool) {
        self.u8(u8::from(value));
    }

    pub fn u16(&mut self, value: u16) {
        self.put(value.to_le_bytes());
    }

    pub fn u32(&mut self, value: u32) {
        self.put(value.to_le_bytes());
    }

    pub fn i32(&mut self, value: i32) {
        self.put(value.to_le_bytes());
    }

    pub fn f32(&mut self, value: f32) {
        self.put(value.to_le_bytes());
    }

    /// Writes a 0-based index with the +1 sentinel; `None` becomes 0.
    ///
    /// 255 has no representation and is stored as 254.
    pub fn index(&mut self, value: Option<u8>) {
        self.u8(value.map_or(0, |index| index.min(u8::MAX - 1) + 1));
    }

    pub fn vec2(&mut self, value: crate::Vec2) {
        self.f32(value.x);
        self.f32(value.y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_past_end_yield_zero() {
        let bytes = [0xAB; ModConfig::PAYLOAD_SIZE];
        let mut reader = PayloadReader::new(&bytes);
        for _ in 0..7 {
            reader.u32();
        }
        assert_eq!(reader.u32(), 0);
        assert_eq!(reader.u8(), 0);
    }

    #[test]
    fn straddling_write_is_truncated() {
        let mut bytes = [0u8; ModConfig::PAYLOAD_SIZE];
        let mut writer = PayloadWriter::new(&mut bytes);
        for _ in 0..26 {
            writer.u8(1);
        }
        writer.u32(0xFFFF_FFFF);
        assert_eq!(&bytes[26..], &[0xFF, 0xFF]);
    }

    #[test]
    fn index_uses_plus_one_sentinel() {
        let mut bytes = [0u8; ModConfig::PAYLOAD_SIZE];
        let mut writer = PayloadWriter::new(&mut bytes);
        writer.index(None);
        writer.index(Some(0));
        writer.index(Some(7));
        assert_eq!(&bytes[..3], &[0, 1, 8]);

        let mut reader = PayloadReader::new(&bytes);
        assert_eq!(reader.index(), None);
        assert_eq!(reader.index(), Some(0));
        assert_eq!(reader.index(), Some(7));
    }
}

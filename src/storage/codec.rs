//! Fixed-width little-endian encoding for the key and value types that may
//! be stored inside hash bucket pages.
//!
//! Every type persisted in a page slot must occupy exactly `WIDTH` bytes so
//! that slot offsets can be computed arithmetically.

use std::fmt;

use crate::common::config::PageId;
use crate::common::rid::Rid;

/// A type with a fixed-width on-page encoding.
pub trait FixedWidthCodec: Copy + fmt::Debug + Send + Sync + 'static {
    /// Number of bytes this type occupies in a page slot.
    const WIDTH: usize;

    /// Encodes `self` into `buf`, which must be at least `WIDTH` bytes.
    fn encode_to(&self, buf: &mut [u8]);

    /// Decodes a value from `buf`, which must be at least `WIDTH` bytes.
    fn decode_from(buf: &[u8]) -> Self;
}

macro_rules! int_codec {
    ($($t:ty),*) => {
        $(
            impl FixedWidthCodec for $t {
                const WIDTH: usize = std::mem::size_of::<$t>();

                fn encode_to(&self, buf: &mut [u8]) {
                    buf[..Self::WIDTH].copy_from_slice(&self.to_le_bytes());
                }

                fn decode_from(buf: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(&buf[..Self::WIDTH]);
                    <$t>::from_le_bytes(raw)
                }
            }
        )*
    };
}

int_codec!(i32, u32, i64, u64);

/// `[page_id: u32][slot_num: u32]`, little-endian.
impl FixedWidthCodec for Rid {
    const WIDTH: usize = 8;

    fn encode_to(&self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.page_id().to_le_bytes());
        buf[4..8].copy_from_slice(&self.slot_num().to_le_bytes());
    }

    fn decode_from(buf: &[u8]) -> Self {
        let page_id = PageId::decode_from(&buf[..4]);
        let slot_num = u32::decode_from(&buf[4..8]);
        Rid::new(page_id, slot_num)
    }
}

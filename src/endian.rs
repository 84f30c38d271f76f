//! Endian codec shared by the walkers.
//!
//! Byte order is expressed with nom's [`Endianness`], the same type the
//! TIFF header decodes into. Walkers hand raw multi-byte values to callers in
//! host order, so a consumer can always use `from_ne_bytes`.

use nom::number::Endianness;

#[inline]
fn is_host_order(endian: Endianness) -> bool {
    match endian {
        Endianness::Native => true,
        Endianness::Little => cfg!(target_endian = "little"),
        Endianness::Big => cfg!(target_endian = "big"),
    }
}

/// Reverses `data` in place unless it is already in host order.
pub fn to_native_order(data: &mut [u8], endian: Endianness) {
    if !is_host_order(endian) {
        data.reverse();
    }
}

/// Like [`to_native_order`], but treats `data` as a packed array of
/// `width`-byte elements and reverses each element independently. A trailing
/// partial element is left untouched.
pub fn to_native_order_elements(data: &mut [u8], endian: Endianness, width: usize) {
    if width < 2 || is_host_order(endian) {
        return;
    }
    data.chunks_exact_mut(width).for_each(|x| x.reverse());
}

/// Fixed-width integers decodable from a byte slice in a given byte order.
pub(crate) trait FromEndianBytes: Sized {
    const SIZE: usize;

    /// Returns `None` if `bs` is shorter than `Self::SIZE`.
    fn from_endian_bytes(bs: &[u8], endian: Endianness) -> Option<Self>;
}

macro_rules! impl_from_endian_bytes {
    ($($t:ty),*) => {
        $(
            impl FromEndianBytes for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                fn from_endian_bytes(bs: &[u8], endian: Endianness) -> Option<Self> {
                    let (int_bytes, _) = bs.split_at_checked(Self::SIZE)?;
                    let int_bytes = int_bytes.try_into().ok()?;
                    Some(match endian {
                        Endianness::Big => Self::from_be_bytes(int_bytes),
                        Endianness::Little => Self::from_le_bytes(int_bytes),
                        Endianness::Native => Self::from_ne_bytes(int_bytes),
                    })
                }
            }
        )*
    };
}

impl_from_endian_bytes!(u8, i8, u16, i16, u32, i32, u64, f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_value() {
        let mut be = [0x12, 0x34, 0x56, 0x78];
        to_native_order(&mut be, Endianness::Big);
        assert_eq!(u32::from_ne_bytes(be), 0x12345678);

        let mut le = [0x78, 0x56, 0x34, 0x12];
        to_native_order(&mut le, Endianness::Little);
        assert_eq!(u32::from_ne_bytes(le), 0x12345678);

        let mut native = 0x12345678u32.to_ne_bytes();
        to_native_order(&mut native, Endianness::Native);
        assert_eq!(u32::from_ne_bytes(native), 0x12345678);
    }

    #[test]
    fn per_element() {
        // two big-endian SHORTs, must not be reversed as one 4-byte block
        let mut data = [0x00, 0x01, 0x00, 0x02];
        to_native_order_elements(&mut data, Endianness::Big, 2);
        assert_eq!(u16::from_ne_bytes([data[0], data[1]]), 1);
        assert_eq!(u16::from_ne_bytes([data[2], data[3]]), 2);

        let mut data = [1, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0];
        to_native_order_elements(&mut data, Endianness::Little, 8);
        assert_eq!(u64::from_ne_bytes(data[..8].try_into().unwrap()), 1);
        assert_eq!(u64::from_ne_bytes(data[8..].try_into().unwrap()), 2);

        let mut bytes = [1, 2, 3];
        to_native_order_elements(&mut bytes, Endianness::Big, 1);
        assert_eq!(bytes, [1, 2, 3]);
    }

    #[test]
    fn decode() {
        assert_eq!(u16::from_endian_bytes(&[0x01, 0x02], Endianness::Big), Some(0x0102));
        assert_eq!(u16::from_endian_bytes(&[0x01, 0x02], Endianness::Little), Some(0x0201));
        assert_eq!(
            u32::from_endian_bytes(&[0, 0, 0, 6, 0xff], Endianness::Big),
            Some(6)
        );
        assert_eq!(u32::from_endian_bytes(&[0, 0, 6], Endianness::Big), None);
        assert_eq!(
            i16::from_endian_bytes(&[0xff, 0xfe], Endianness::Big),
            Some(-2)
        );
    }
}

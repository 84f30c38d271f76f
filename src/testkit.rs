//! Builders for synthetic TIFF, ISOBMFF and JPEG streams used by the unit
//! tests.

use nom::number::Endianness;

pub struct TiffField {
    pub tag: u16,
    pub field_type: u16,
    pub count: u32,
    /// Already in the byte order of the stream.
    pub data: Vec<u8>,
}

impl TiffField {
    pub fn ascii(tag: u16, s: &str) -> Self {
        let mut data = s.as_bytes().to_vec();
        data.push(0);
        TiffField {
            tag,
            field_type: 2,
            count: data.len() as u32,
            data,
        }
    }

    pub fn shorts(endian: Endianness, tag: u16, values: &[u16]) -> Self {
        TiffField {
            tag,
            field_type: 3,
            count: values.len() as u32,
            data: values.iter().flat_map(|v| u16_bytes(endian, *v)).collect(),
        }
    }

    pub fn longs(endian: Endianness, tag: u16, values: &[u32]) -> Self {
        TiffField {
            tag,
            field_type: 4,
            count: values.len() as u32,
            data: values.iter().flat_map(|v| u32_bytes(endian, *v)).collect(),
        }
    }

    pub fn rationals(endian: Endianness, tag: u16, values: &[(u32, u32)]) -> Self {
        TiffField {
            tag,
            field_type: 5,
            count: values.len() as u32,
            data: values
                .iter()
                .flat_map(|(n, d)| [u32_bytes(endian, *n), u32_bytes(endian, *d)].concat())
                .collect(),
        }
    }
}

fn u16_bytes(endian: Endianness, v: u16) -> [u8; 2] {
    match endian {
        Endianness::Little => v.to_le_bytes(),
        _ => v.to_be_bytes(),
    }
}

fn u32_bytes(endian: Endianness, v: u32) -> [u8; 4] {
    match endian {
        Endianness::Little => v.to_le_bytes(),
        _ => v.to_be_bytes(),
    }
}

/// Builds a TIFF stream: header, then every IFD directly followed by its out
/// of line values. Offsets are relative to the first byte of the result.
pub fn tiff(endian: Endianness, ifds: &[Vec<TiffField>]) -> Vec<u8> {
    let mut out = match endian {
        Endianness::Little => b"II\x2a\0".to_vec(),
        _ => b"MM\0\x2a".to_vec(),
    };
    let ifd0 = if ifds.is_empty() { 0 } else { 8 };
    out.extend(u32_bytes(endian, ifd0));

    for (i, fields) in ifds.iter().enumerate() {
        let start = out.len();
        let mut data_offset = start + 2 + fields.len() * 12 + 4;
        let mut data = Vec::new();

        out.extend(u16_bytes(endian, fields.len() as u16));
        for f in fields {
            out.extend(u16_bytes(endian, f.tag));
            out.extend(u16_bytes(endian, f.field_type));
            out.extend(u32_bytes(endian, f.count));
            if f.data.len() <= 4 {
                let mut inline = f.data.clone();
                inline.resize(4, 0);
                out.extend(inline);
            } else {
                out.extend(u32_bytes(endian, data_offset as u32));
                data_offset += f.data.len();
                data.extend_from_slice(&f.data);
            }
        }

        let next = if i + 1 == ifds.len() { 0 } else { data_offset };
        out.extend(u32_bytes(endian, next as u32));
        out.extend(data);
    }

    out
}

pub fn bbox(box_type: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let size = (8 + body.len()) as u32;
    [&size.to_be_bytes()[..], &box_type[..], body].concat()
}

pub fn full_box(box_type: &[u8; 4], version: u8, flags: u32, body: &[u8]) -> Vec<u8> {
    let flags = flags.to_be_bytes();
    bbox(box_type, &[&[version][..], &flags[1..], body].concat())
}

/// An `infe` entry. `rest` follows the item type (item name and so on).
pub fn infe(version: u8, id: u32, item_type: &[u8; 4], rest: &[u8]) -> Vec<u8> {
    let id = if version == 2 {
        (id as u16).to_be_bytes().to_vec()
    } else {
        id.to_be_bytes().to_vec()
    };
    let body = [&id[..], &[0, 0][..], &item_type[..], rest].concat();
    full_box(b"infe", version, 0, &body)
}

type IlocItem = (u32, Option<u16>, u64, Vec<(u64, u64, u64)>);

/// Body of an `iloc` box, without the version and flags.
pub struct IlocBuilder {
    version: u8,
    offset_size: u8,
    length_size: u8,
    base_offset_size: u8,
    index_size: u8,
    items: Vec<IlocItem>,
}

impl IlocBuilder {
    pub fn new(
        version: u8,
        offset_size: u8,
        length_size: u8,
        base_offset_size: u8,
        index_size: u8,
    ) -> Self {
        IlocBuilder {
            version,
            offset_size,
            length_size,
            base_offset_size,
            index_size,
            items: Vec::new(),
        }
    }

    /// Extents are `(index, offset, length)`.
    pub fn item(
        mut self,
        id: u32,
        construction_method: Option<u16>,
        base_offset: u64,
        extents: &[(u64, u64, u64)],
    ) -> Self {
        self.items
            .push((id, construction_method, base_offset, extents.to_vec()));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![
            (self.offset_size << 4) | self.length_size,
            (self.base_offset_size << 4) | self.index_size,
        ];
        self.put_id(&mut out, self.items.len() as u32);

        for (id, method, base_offset, extents) in self.items.iter() {
            self.put_id(&mut out, *id);
            if let Some(m) = method {
                out.extend(m.to_be_bytes());
            }
            out.extend(0u16.to_be_bytes());
            put_sized(&mut out, self.base_offset_size, *base_offset);
            out.extend((extents.len() as u16).to_be_bytes());
            for (index, offset, length) in extents {
                if self.version == 1 || self.version == 2 {
                    put_sized(&mut out, self.index_size, *index);
                }
                put_sized(&mut out, self.offset_size, *offset);
                put_sized(&mut out, self.length_size, *length);
            }
        }
        out
    }

    fn put_id(&self, out: &mut Vec<u8>, v: u32) {
        if self.version < 2 {
            out.extend((v as u16).to_be_bytes());
        } else {
            out.extend(v.to_be_bytes());
        }
    }
}

fn put_sized(out: &mut Vec<u8>, size: u8, v: u64) {
    match size {
        4 => out.extend((v as u32).to_be_bytes()),
        8 => out.extend(v.to_be_bytes()),
        _ => (),
    }
}

/// A HEIF file with an `hvc1` item 1 and an `Exif` item 2 holding
/// `exif_item`, both stored in `mdat`.
pub fn heif(exif_item: &[u8], iinf_first: bool) -> Vec<u8> {
    let ftyp = bbox(b"ftyp", b"heic\0\0\0\0mif1heic");
    let image = [0xAAu8; 16];

    let meta = |image_offset: u64, exif_offset: u64| {
        let iloc = full_box(
            b"iloc",
            0,
            0,
            &IlocBuilder::new(0, 4, 4, 0, 0)
                .item(1, None, 0, &[(0, image_offset, image.len() as u64)])
                .item(2, None, 0, &[(0, exif_offset, exif_item.len() as u64)])
                .build(),
        );
        let iinf = full_box(
            b"iinf",
            0,
            0,
            &[
                2u16.to_be_bytes().to_vec(),
                infe(2, 1, b"hvc1", b"\0"),
                infe(2, 2, b"Exif", b"\0"),
            ]
            .concat(),
        );
        let hdlr = full_box(b"hdlr", 0, 0, b"\0\0\0\0pict\0\0\0\0\0\0\0\0\0\0\0\0\0");
        let children = if iinf_first {
            [hdlr, iinf, iloc].concat()
        } else {
            [hdlr, iloc, iinf].concat()
        };
        full_box(b"meta", 0, 0, &children)
    };

    // field widths are fixed, so the size of meta doesn't depend on offsets
    let mdat_body_start = (ftyp.len() + meta(0, 0).len() + 8) as u64;
    let image_offset = mdat_body_start;
    let exif_offset = mdat_body_start + image.len() as u64;

    let mdat = bbox(b"mdat", &[image.as_slice(), exif_item].concat());
    [ftyp, meta(image_offset, exif_offset), mdat].concat()
}

/// A marker segment with data.
pub fn jpeg_segment(code: u8, payload: &[u8]) -> Vec<u8> {
    let size = (payload.len() + 2) as u16;
    [&[0xFF, code][..], &size.to_be_bytes()[..], payload].concat()
}

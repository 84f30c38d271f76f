use std::io::Read;

use nom::{
    bytes::complete::take,
    combinator::{all_consuming, map},
    multi::many0,
    number::complete::be_u32,
    sequence::tuple,
    AsChar, IResult,
};
#[cfg(feature = "json_dump")]
use serde::Serialize;

use crate::{
    error::{convert_parse_error, Error},
    BoxHeader, ByteCursor, Skip,
};

/// File type box.
#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtypBox {
    pub major_brand: String,
    pub minor_version: u32,
    pub compatible_brands: Vec<String>,
}

impl FtypBox {
    /// Consumes the whole body of the `ftyp` box described by `header`.
    pub fn read<R: Read, S: Skip<R>>(
        cursor: &mut ByteCursor<R, S>,
        header: &BoxHeader,
    ) -> crate::Result<FtypBox> {
        let size = header.data_size;
        if size % 4 != 0 {
            return Err(Error::invalid(
                "compatible brands",
                format!("ftyp body size {size} is not a multiple of 4"),
            ));
        }
        if size < 8 {
            return Err(Error::Truncated("ftyp"));
        }

        let body = cursor.read_bytes(size, "ftyp")?;
        let (_, ftyp) = Self::parse_body(&body).map_err(|e| convert_parse_error(e, "ftyp"))?;
        Ok(ftyp)
    }

    fn parse_body(input: &[u8]) -> IResult<&[u8], FtypBox> {
        map(
            all_consuming(tuple((brand, be_u32, many0(brand)))),
            |(major_brand, minor_version, compatible_brands)| FtypBox {
                major_brand,
                minor_version,
                compatible_brands,
            },
        )(input)
    }
}

fn brand(input: &[u8]) -> IResult<&[u8], String> {
    map(take(4_usize), |bs: &[u8]| {
        bs.iter().map(|b| b.as_char()).collect::<String>()
    })(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bbox::parse_box, testkit::bbox, BufCursor, Flow};
    use test_case::test_case;

    fn read(body: &[u8]) -> crate::Result<FtypBox> {
        let mut c = BufCursor::from_vec(bbox(b"ftyp", body));
        let mut ftyp = None;
        let res = parse_box(&mut c, "", |c, h| {
            ftyp = Some(FtypBox::read(c, h)?);
            Ok(Flow::Consumed)
        })?;
        assert!(res.is_continue());
        assert!(!c.has_remaining()?);
        Ok(ftyp.unwrap())
    }

    #[test]
    fn ftyp() {
        let ftyp = read(b"heic\0\0\0\x01mif1miafheic").unwrap();
        assert_eq!(ftyp.major_brand, "heic");
        assert_eq!(ftyp.minor_version, 1);
        assert_eq!(ftyp.compatible_brands, ["mif1", "miaf", "heic"]);

        let ftyp = read(b"avif\0\0\0\0").unwrap();
        assert!(ftyp.compatible_brands.is_empty());
    }

    #[test_case(b"heic\0\0\0\0mif1mi" ; "brands")]
    #[test_case(b"heic\0\0" ; "minor version")]
    #[test_case(b"hei" ; "major brand")]
    fn not_multiple_of_four(body: &[u8]) {
        let err = read(body).unwrap_err();
        assert!(matches!(err, Error::Invalid { field: "compatible brands", .. }));
    }

    #[test]
    fn too_short() {
        assert!(read(b"heic").unwrap_err().is_truncated());
    }
}

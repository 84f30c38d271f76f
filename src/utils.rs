use nom::{bytes::streaming::take_till, combinator::map_res, IResult};

/// Parses a NUL-terminated UTF-8 string and consumes the terminator.
///
/// Returns `Incomplete` if no terminator is found, so callers holding a
/// complete box body can report the field as truncated.
pub(crate) fn parse_cstr(input: &[u8]) -> IResult<&[u8], String> {
    let (remain, s) = map_res(take_till(|b| b == 0), |bs: &[u8]| {
        String::from_utf8(bs.to_vec())
    })(input)?;

    // streaming take_till only returns once the NUL is in `remain`
    Ok((&remain[1..], s)) // Safe-slice
}

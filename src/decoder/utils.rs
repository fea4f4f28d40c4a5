use bytes_parser::BytesParser;

use crate::errors::DecodeError;

/// A [`String`] parser, tailor-made for `__consumer_offsets` messages.
///
/// See the crate documentation for details about the wire format. Returns
/// [`String::default`] if the parsed `i16` length is negative.
pub(crate) fn parse_str(parser: &mut BytesParser) -> Result<String, DecodeError> {
    let strlen = parse_i16(parser)?;
    if strlen < 0 {
        return Ok(String::default());
    }

    parser.parse_str_utf8(strlen as usize).map(|s| s.into()).map_err(DecodeError::ByteParsing)
}

/// A `__consumer_offsets`-specific parser for `Vec<u8>`: 4-byte length prefix, then that many bytes.
pub(crate) fn parse_vec_bytes(parser: &mut BytesParser) -> Result<Vec<u8>, DecodeError> {
    let len = parse_i32(parser)?;
    let slice = parser.parse_slice(len as usize).map_err(DecodeError::ByteParsing)?;
    Ok(slice.to_vec())
}

pub(crate) fn parse_i16(parser: &mut BytesParser) -> Result<i16, DecodeError> {
    parser.parse_i16().map_err(DecodeError::ByteParsing)
}

pub(crate) fn parse_i32(parser: &mut BytesParser) -> Result<i32, DecodeError> {
    parser.parse_i32().map_err(DecodeError::ByteParsing)
}

pub(crate) fn parse_i64(parser: &mut BytesParser) -> Result<i64, DecodeError> {
    parser.parse_i64().map_err(DecodeError::ByteParsing)
}

/// Used in unit tests to verify a type is thread-safe (`Send + Sync`) and safe to move
/// after pinning (`Unpin`), which every projection/query value needs to be to live behind
/// a [`dashmap::DashMap`] or [`arc_swap::ArcSwap`] and cross `tokio::spawn` boundaries.
#[cfg(test)]
pub(crate) fn is_thread_safe<T: Sized + Send + Sync + Unpin>() {}

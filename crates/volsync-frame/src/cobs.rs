//! Consistent Overhead Byte Stuffing.
//!
//! Wire format of one frame:
//! ```text
//! ┌──────┬───────────────┬──────┬───────────────┬─────┬──────┐
//! │ code │ code-1 bytes  │ code │ code-1 bytes  │ ... │ 0x00 │
//! └──────┴───────────────┴──────┴───────────────┴─────┴──────┘
//! ```
//! Each code byte gives the distance to the next code byte. A code below
//! `0xFF` stands for a zero in the original data at that position, except at
//! the very end of the frame. The body never contains `0x00`.

use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Frame delimiter.
pub const DELIMITER: u8 = 0x00;

/// Longest run of non-zero bytes one code byte can describe.
const MAX_BLOCK: usize = 254;

/// Worst-case encoded length of `len` payload bytes, delimiter included.
pub const fn max_encoded_len(len: usize) -> usize {
    let blocks = len.div_ceil(MAX_BLOCK);
    len + if blocks == 0 { 1 } else { blocks } + 1
}

/// Stuff `src` and append it to `dst`, followed by the delimiter.
pub fn encode_into(src: &[u8], dst: &mut BytesMut) {
    dst.reserve(max_encoded_len(src.len()));

    let mut code_at = dst.len();
    dst.put_u8(0);
    let mut code: u8 = 1;

    for (idx, &byte) in src.iter().enumerate() {
        if byte == 0 {
            dst[code_at] = code;
            code_at = dst.len();
            dst.put_u8(0);
            code = 1;
            continue;
        }

        dst.put_u8(byte);
        code += 1;
        if code == 0xFF {
            dst[code_at] = code;
            // A full final block needs no trailing code byte.
            if idx + 1 == src.len() {
                dst.put_u8(DELIMITER);
                return;
            }
            code_at = dst.len();
            dst.put_u8(0);
            code = 1;
        }
    }

    dst[code_at] = code;
    dst.put_u8(DELIMITER);
}

/// Reverse the stuffing of one frame body (without its delimiter).
pub fn decode(src: &[u8]) -> Result<Vec<u8>> {
    let corrupt = || FrameError::FrameCorrupt { len: src.len() };

    let mut out = Vec::with_capacity(src.len());
    let mut pos = 0usize;

    while pos < src.len() {
        let code = src[pos] as usize;
        if code == 0 {
            return Err(corrupt());
        }

        let end = pos + code;
        if end > src.len() {
            return Err(corrupt());
        }

        let block = &src[pos + 1..end];
        if block.contains(&0) {
            return Err(corrupt());
        }
        out.extend_from_slice(block);

        pos = end;
        if code != 0xFF && pos < src.len() {
            out.push(0);
        }
    }

    Ok(out)
}

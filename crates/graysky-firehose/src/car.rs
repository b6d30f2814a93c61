//! CARv1 block stores.
//!
//! A commit carries the blocks its operations reference as a CARv1 archive:
//! a varint-prefixed CBOR header followed by varint-prefixed sections, each
//! holding a binary CID and the block bytes.

use std::collections::HashMap;
use std::io::Cursor;

use ciborium::Value as Cbor;
use cid::Cid;

use graysky_core::error::DecodeError;

use crate::cbor::{self, Fields};

/// Blocks of one commit, addressed by CID string.
#[derive(Debug, Clone, Default)]
pub struct BlockStore {
    roots: Vec<String>,
    blocks: HashMap<String, Vec<u8>>,
}

impl BlockStore {
    /// Parse a CARv1 archive.
    ///
    /// An empty input yields an empty store; commits flagged `tooBig` may
    /// carry no blocks at all.
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut store = Self::default();
        if bytes.is_empty() {
            return Ok(store);
        }

        let (header, mut rest) = split_section(bytes)?;
        store.roots = parse_header(header)?;

        while !rest.is_empty() {
            let (section, tail) = split_section(rest)?;
            rest = tail;

            let mut reader = Cursor::new(section);
            let cid = Cid::read_bytes(&mut reader).map_err(|e| car_error(format!("bad CID: {e}")))?;
            let data = &section[reader.position() as usize..];
            store.blocks.insert(cid.to_string(), data.to_vec());
        }

        Ok(store)
    }

    /// Returns the block with the given CID.
    pub fn get(&self, cid: &str) -> Option<&[u8]> {
        self.blocks.get(cid).map(Vec::as_slice)
    }

    /// Root CIDs from the archive header.
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

fn car_error(reason: impl Into<String>) -> DecodeError {
    DecodeError::Car {
        reason: reason.into(),
    }
}

fn parse_header(header: &[u8]) -> Result<Vec<String>, DecodeError> {
    let mut reader = header;
    let value = cbor::read_value(&mut reader).map_err(|e| car_error(format!("header: {e}")))?;
    let fields = Fields::new("CAR header", &value).map_err(car_error)?;

    let version = fields.int("version").map_err(car_error)?;
    if version != 1 {
        return Err(car_error(format!("unsupported CAR version {version}")));
    }

    fields
        .opt_array("roots")
        .map_err(car_error)?
        .unwrap_or_default()
        .iter()
        .map(|root: &Cbor| {
            cbor::link_to_cid(root)
                .map(|cid| cid.to_string())
                .ok_or_else(|| car_error("root is not a CID link"))
        })
        .collect()
}

/// Split one varint-length-prefixed section off the front of `bytes`.
fn split_section(bytes: &[u8]) -> Result<(&[u8], &[u8]), DecodeError> {
    let (len, used) = read_uvarint(bytes).ok_or_else(|| car_error("bad section length"))?;
    let rest = &bytes[used..];
    let len = usize::try_from(len)
        .ok()
        .filter(|len| *len <= rest.len())
        .ok_or_else(|| car_error(format!("section of {len} bytes overruns archive")))?;
    Ok(rest.split_at(len))
}

/// Unsigned LEB128. Returns the value and the number of bytes read.
fn read_uvarint(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, byte) in bytes.iter().enumerate().take(10) {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

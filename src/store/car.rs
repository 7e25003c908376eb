// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! The archive file ("CAR") format: a self-describing sequence of
//! framed `(cid, bytes)` blocks behind a header naming the root CIDs.
//! Used as the DR exporter/importer's transport.

use cid::Cid;
use integer_encoding::{VarIntAsyncReader, VarIntAsyncWriter};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ArkeError;

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CarHeader {
    pub roots: Vec<Cid>,
    pub version: u64,
}

impl CarHeader {
    pub fn new(roots: Vec<Cid>) -> Self {
        CarHeader { roots, version: 1 }
    }
}

async fn ld_write<W: AsyncWrite + Send + Unpin>(writer: &mut W, bytes: &[u8]) -> Result<(), ArkeError> {
    writer
        .write_varint_async(bytes.len())
        .await
        .map_err(|e| ArkeError::Invariant(format!("car write: {e}")))?;
    writer
        .write_all(bytes)
        .await
        .map_err(|e| ArkeError::Invariant(format!("car write: {e}")))?;
    Ok(())
}

async fn ld_read<R: AsyncRead + Send + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>, ArkeError> {
    let len: usize = match VarIntAsyncReader::read_varint_async(reader).await {
        Ok(len) => len,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(ArkeError::Invariant(format!("car read: {e}"))),
    };
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(|e| ArkeError::Invariant(format!("car read: {e}")))?;
    Ok(Some(buf))
}

/// Streams `header` followed by every `(cid, bytes)` pair in `blocks` to
/// `writer`, length-prefixed per frame.
pub async fn write_car<W: AsyncWrite + Send + Unpin>(
    writer: &mut W,
    roots: Vec<Cid>,
    blocks: impl IntoIterator<Item = (Cid, Vec<u8>)>,
) -> Result<(), ArkeError> {
    let header = CarHeader::new(roots);
    let header_bytes =
        serde_ipld_dagcbor::to_vec(&header).map_err(|e| ArkeError::Invariant(e.to_string()))?;
    ld_write(writer, &header_bytes).await?;
    for (cid, bytes) in blocks {
        let mut frame = cid.to_bytes();
        frame.extend_from_slice(&bytes);
        ld_write(writer, &frame).await?;
    }
    writer
        .flush()
        .await
        .map_err(|e| ArkeError::Invariant(e.to_string()))?;
    Ok(())
}

/// Reads a whole CAR stream into memory, returning the header roots and the
/// ordered list of blocks it carried. Used by the importer (DAGImport) and
/// by `Codec.TypedLinkRequired`-style tests that need to inspect closure
/// size.
pub async fn read_car<R: AsyncRead + Send + Unpin>(
    mut reader: R,
) -> Result<(Vec<Cid>, Vec<(Cid, Vec<u8>)>), ArkeError> {
    let header_bytes = ld_read(&mut reader)
        .await?
        .ok_or_else(|| ArkeError::Malformed("empty CAR file".into()))?;
    let header: CarHeader =
        serde_ipld_dagcbor::from_slice(&header_bytes).map_err(|e| ArkeError::Malformed(e.to_string()))?;
    if header.version != 1 {
        return Err(ArkeError::Malformed("CAR file version must be 1".into()));
    }
    let mut blocks = Vec::new();
    while let Some(frame) = ld_read(&mut reader).await? {
        let mut cursor = std::io::Cursor::new(&frame);
        let cid = Cid::read_bytes(&mut cursor).map_err(|e| ArkeError::Malformed(e.to_string()))?;
        let data = frame[cursor.position() as usize..].to_vec();
        blocks.push((cid, data));
    }
    Ok((header.roots, blocks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cid::multihash::Multihash;

    fn dummy_cid(seed: u8) -> Cid {
        let digest = Multihash::<64>::wrap(0x12, &[seed; 32]).unwrap();
        Cid::new_v1(0x55, digest)
    }

    #[tokio::test]
    async fn round_trips_header_and_blocks() {
        let root = dummy_cid(1);
        let blocks = vec![(root, b"hello".to_vec()), (dummy_cid(2), b"world".to_vec())];
        let mut buf = Vec::new();
        write_car(&mut buf, vec![root], blocks.clone()).await.unwrap();

        let (roots, read_blocks) = read_car(std::io::Cursor::new(buf)).await.unwrap();
        assert_eq!(roots, vec![root]);
        assert_eq!(read_blocks, blocks);
    }

    #[tokio::test]
    async fn rejects_empty_stream() {
        let err = read_car(std::io::Cursor::new(Vec::<u8>::new())).await;
        assert!(err.is_err());
    }
}

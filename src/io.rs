//! Utility I/O functions feeding a stage buffer from an async source.

use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};

use futures_core::ready;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use crate::buf::{Error, StageBuf};

/// The read granularity when pulling bytes from an upstream reader.
pub const DEFAULT_CHUNK: usize = 0x4000;

/// Refills the stage buffer from the reader only once.
///
/// Returns the number of bytes staged, with 0 indicating EOF.
pub async fn refill_once<R>(reader: &mut R, buf: &mut StageBuf) -> io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut chunk = [0u8; DEFAULT_CHUNK];

    let nread = reader.read(&mut chunk).await?;
    if nread != 0 {
        buf.refill(&chunk[..nread])
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    }

    Ok(nread)
}

/// Consumes exactly `n` bytes, refilling the stage buffer from the reader
/// on shortfall.
pub async fn read_exact<R>(reader: &mut R, buf: &mut StageBuf, n: usize) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    loop {
        match buf.consume_to_vec(n) {
            Ok(span) => return Ok(span),
            Err(Error::Shortfall(_)) => {
                let nread = refill_once(reader, buf).await?;
                if nread == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "the source get eof",
                    ));
                }
            }
            Err(e) => return Err(io::Error::new(io::ErrorKind::Other, e)),
        }
    }
}

/// Fills `out` from the stage buffer, pulling chunks from the reader on
/// shortfall.
pub fn poll_read_exact<R>(
    reader: &mut R,
    buf: &mut StageBuf,
    cx: &mut Context<'_>,
    out: &mut [u8],
) -> Poll<io::Result<()>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    loop {
        match buf.consume(out.len()) {
            Ok(span) => {
                out.copy_from_slice(span);
                return Ok(()).into();
            }
            Err(Error::Shortfall(_)) => {}
            Err(e) => return Err(io::Error::new(io::ErrorKind::Other, e)).into(),
        }

        let mut chunk = [0u8; DEFAULT_CHUNK];
        let mut read_buf = ReadBuf::new(&mut chunk);

        ready!(Pin::new(&mut *reader).poll_read(cx, &mut read_buf))?;

        let nread = read_buf.filled().len();
        if nread == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "the source get eof",
            ))
            .into();
        }

        buf.refill(read_buf.filled())
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    }
}

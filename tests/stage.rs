use std::future;

use rand::prelude::*;
use tokio::io::{duplex, AsyncWriteExt};

use stagebuf::{
    buf::StageBuf,
    io::{poll_read_exact, read_exact},
};

const FRAME_COUNT: usize = 64;

#[tokio::test]
async fn test_length_prefixed_frames() {
    let (mut tx, mut rx) = duplex(512);

    let frames: Vec<Vec<u8>> = (0..FRAME_COUNT)
        .map(|i| vec![i as u8; (i * 7) % 256 + 1])
        .collect();

    let expected = frames.clone();
    let writer = tokio::spawn(async move {
        for frame in frames {
            tx.write_all(&(frame.len() as u16).to_be_bytes())
                .await
                .unwrap();
            tx.write_all(&frame).await.unwrap();
        }
    });

    let mut buf = StageBuf::new(8).unwrap();
    for frame in &expected {
        let len = read_exact(&mut rx, &mut buf, 2).await.unwrap();
        let len = u16::from_be_bytes([len[0], len[1]]) as usize;
        assert_eq!(len, frame.len());

        let payload = read_exact(&mut rx, &mut buf, len).await.unwrap();
        assert_eq!(&payload, frame);
    }

    writer.await.unwrap();
}

#[tokio::test]
async fn test_poll_read_exact() {
    let (mut tx, mut rx) = duplex(64);

    tokio::spawn(async move {
        tx.write_all(b"hello world").await.unwrap();
    });

    let mut buf = StageBuf::new(4).unwrap();
    let mut out = [0u8; 11];

    future::poll_fn(|cx| poll_read_exact(&mut rx, &mut buf, cx, &mut out))
        .await
        .unwrap();

    assert_eq!(&out, b"hello world");
}

#[tokio::test]
async fn test_eof_before_full_span() {
    let (mut tx, mut rx) = duplex(64);

    tx.write_all(b"abc").await.unwrap();
    drop(tx);

    let mut buf = StageBuf::new(0).unwrap();

    let err = read_exact(&mut rx, &mut buf, 5).await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);

    // The staged bytes stay available for a later retry.
    assert_eq!(buf.remaining(), 3);
}

#[test]
fn test_random_chunking_round_trip() {
    let mut rng = StdRng::from_entropy();

    let payload: Vec<u8> = (0..64 * 1024).map(|_| rng.gen()).collect();

    let mut buf = StageBuf::new(16).unwrap();
    let mut staged = 0;
    let mut drained = Vec::with_capacity(payload.len());

    while drained.len() < payload.len() {
        if staged < payload.len() && (buf.is_empty() || rng.gen_bool(0.5)) {
            let chunk = rng.gen_range(1..=4096).min(payload.len() - staged);
            buf.refill(&payload[staged..staged + chunk]).unwrap();
            staged += chunk;
        } else {
            let span = rng.gen_range(1..=buf.remaining());
            drained.extend_from_slice(&buf.consume_to_vec(span).unwrap());
        }
    }

    assert_eq!(drained, payload);
}

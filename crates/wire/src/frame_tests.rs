// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Ping {
    seq: u32,
    text: String,
}

#[tokio::test]
async fn round_trip_through_a_duplex_pipe() {
    let (mut client, mut server) = tokio::io::duplex(1024);

    let msg = Ping { seq: 7, text: "hello".into() };
    write_message(&mut client, &msg).await.unwrap();

    let received: Ping = read_message(&mut server).await.unwrap();
    assert_eq!(received, msg);
}

#[tokio::test]
async fn multiple_frames_stay_separated() {
    let (mut client, mut server) = tokio::io::duplex(1024);

    for seq in 0..3u32 {
        write_message(&mut client, &Ping { seq, text: "x".into() }).await.unwrap();
    }
    for seq in 0..3u32 {
        let received: Ping = read_message(&mut server).await.unwrap();
        assert_eq!(received.seq, seq);
    }
}

#[tokio::test]
async fn closed_stream_reports_connection_closed() {
    let (client, mut server) = tokio::io::duplex(64);
    drop(client);

    let err = read_message::<Ping, _>(&mut server).await.unwrap_err();
    assert!(matches!(err, ProtocolError::ConnectionClosed));
}

#[tokio::test]
async fn oversized_length_prefix_is_rejected() {
    let (mut client, mut server) = tokio::io::duplex(64);
    let len = (MAX_FRAME_LEN as u32 + 1).to_be_bytes();
    tokio::io::AsyncWriteExt::write_all(&mut client, &len).await.unwrap();

    let err = read_message::<Ping, _>(&mut server).await.unwrap_err();
    assert!(matches!(err, ProtocolError::FrameTooLarge(_)));
}

#[test]
fn encode_prefixes_big_endian_length() {
    let bytes = encode(&Ping { seq: 1, text: "a".into() }).unwrap();
    let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    assert_eq!(len, bytes.len() - 4);

    let decoded: Ping = decode(&bytes[4..]).unwrap();
    assert_eq!(decoded.seq, 1);
}

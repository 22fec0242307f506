// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The runner's wire dialect: each frame is a big-endian `u32` byte length
//! followed by that many bytes of JSON, carrying one [`RpcRequest`] or
//! [`RpcResponse`].

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::RunnerError;

const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum RpcRequest {
    Register { id: u32 },
    WriteLogs { id: u32, bytes: Vec<u8> },
    Status { id: u32 },
    Exit { id: u32, status: i32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RpcResponse {
    Registered { env: Vec<(String, String)> },
    Status { state: bk_core::RunState },
    Ack,
    Error { message: String },
}

pub async fn read_frame<R: tokio::io::AsyncRead + Unpin>(reader: &mut R) -> Result<Option<RpcRequest>, RunnerError> {
    let mut len_buf = [0u8; 4];
    if let Err(err) = reader.read_exact(&mut len_buf).await {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            return Ok(None);
        }
        return Err(err.into());
    }
    let len = u32::from_be_bytes(len_buf).min(MAX_FRAME_LEN);
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(Some(serde_json::from_slice(&payload)?))
}

pub async fn write_frame<W: tokio::io::AsyncWrite + Unpin>(writer: &mut W, response: &RpcResponse) -> Result<(), RunnerError> {
    let payload = serde_json::to_vec(response)?;
    let len = (payload.len() as u32).to_be_bytes();
    writer.write_all(&len).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn a_request_round_trips_through_the_frame_codec() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let payload = serde_json::to_vec(&RpcRequest::Register { id: 2 }).unwrap();
        let len = (payload.len() as u32).to_be_bytes();
        client.write_all(&len).await.unwrap();
        client.write_all(&payload).await.unwrap();

        let request = read_frame(&mut server).await.unwrap().unwrap();
        assert!(matches!(request, RpcRequest::Register { id: 2 }));
    }

    #[tokio::test]
    async fn a_closed_stream_yields_none_rather_than_an_error() {
        let (client, mut server) = tokio::io::duplex(4096);
        drop(client);
        assert!(read_frame(&mut server).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn a_response_round_trips_through_write_frame() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        write_frame(&mut server, &RpcResponse::Ack).await.unwrap();
        drop(server);
        let request = {
            let mut len_buf = [0u8; 4];
            client.read_exact(&mut len_buf).await.unwrap();
            let len = u32::from_be_bytes(len_buf);
            let mut payload = vec![0u8; len as usize];
            client.read_exact(&mut payload).await.unwrap();
            serde_json::from_slice::<RpcResponse>(&payload).unwrap()
        };
        assert!(matches!(request, RpcResponse::Ack));
    }
}

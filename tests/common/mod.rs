#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::UdpSocket;
use tokio::time::{timeout, Duration};

use tftp_client::{ClientConfig, RequestKind, TftpOptions, TftpPacket};

pub type Store = Arc<Mutex<HashMap<String, Vec<u8>>>>;

const WAIT: Duration = Duration::from_secs(5);

/// Client config with a short timeout so failure scenarios finish fast.
pub fn config(server: SocketAddr) -> ClientConfig {
    let mut config = ClientConfig::new(server);
    config.timeout = Duration::from_millis(200);
    config
}

pub async fn bind() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.unwrap()
}

/// The "well-known" port of a scripted server.
pub async fn listen() -> (UdpSocket, SocketAddr) {
    let socket = bind().await;
    let addr = socket.local_addr().unwrap();
    (socket, addr)
}

pub async fn recv_raw(socket: &UdpSocket) -> (Vec<u8>, SocketAddr) {
    let mut buf = vec![0; tftp_client::MAX_PACKET_SIZE];
    let (num, from) = timeout(WAIT, socket.recv_from(&mut buf))
        .await
        .expect("timed out waiting for client")
        .unwrap();
    buf.truncate(num);
    (buf, from)
}

pub async fn recv(socket: &UdpSocket) -> (TftpPacket, SocketAddr) {
    let (buf, from) = recv_raw(socket).await;
    (TftpPacket::deserialize(&buf).unwrap(), from)
}

/// True if nothing arrives within `wait`.
pub async fn silent(socket: &UdpSocket, wait: Duration) -> bool {
    let mut buf = vec![0; tftp_client::MAX_PACKET_SIZE];
    timeout(wait, socket.recv_from(&mut buf)).await.is_err()
}

pub async fn send(socket: &UdpSocket, pkt: &TftpPacket, to: SocketAddr) {
    socket.send_to(&pkt.serialize(), to).await.unwrap();
}

pub fn oack(blksize: u16) -> TftpPacket {
    let mut options = TftpOptions::new();
    options.insert("blksize", blksize);
    TftpPacket::OptionAck(options)
}

pub fn data(block: u16, data: &[u8]) -> TftpPacket {
    TftpPacket::Data {
        block,
        data: data.to_vec(),
    }
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Minimal in-memory server: answers every request with an OACK for the
/// requested blksize and runs the transfer from a fresh TID.
pub async fn serve(listener: UdpSocket, store: Store) {
    loop {
        let (pkt, client) = recv_forever(&listener).await;
        if let TftpPacket::Request {
            kind,
            filename,
            options,
            ..
        } = pkt
        {
            let store = store.clone();
            tokio::spawn(async move { handle(kind, filename, options, client, store).await });
        }
    }
}

async fn recv_forever(socket: &UdpSocket) -> (TftpPacket, SocketAddr) {
    let mut buf = vec![0; tftp_client::MAX_PACKET_SIZE];
    let (num, from) = socket.recv_from(&mut buf).await.unwrap();
    (TftpPacket::deserialize(&buf[..num]).unwrap(), from)
}

async fn handle(
    kind: RequestKind,
    filename: String,
    options: TftpOptions,
    client: SocketAddr,
    store: Store,
) {
    let socket = bind().await;
    let blksize: u16 = options
        .get("blksize")
        .map(|v| v.parse().unwrap())
        .unwrap_or(512);
    let blksize_len = usize::from(blksize);

    match kind {
        RequestKind::Write => {
            send(&socket, &oack(blksize), client).await;
            let mut content = Vec::new();
            let mut expect: u16 = 1;
            loop {
                let (pkt, _) = recv(&socket).await;
                let TftpPacket::Data { block, data } = pkt else {
                    continue;
                };
                if block != expect {
                    continue;
                }
                content.extend_from_slice(&data);
                let last = data.len() < blksize_len;
                if last {
                    store.lock().unwrap().insert(filename.clone(), content.clone());
                }
                send(&socket, &TftpPacket::Ack(block), client).await;
                expect = expect.wrapping_add(1);
                if last {
                    break;
                }
            }
        }
        RequestKind::Read => {
            let content = store.lock().unwrap().get(&filename).cloned();
            let Some(content) = content else {
                let error = TftpPacket::Error {
                    code: 1,
                    msg: "File not found".into(),
                };
                send(&socket, &error, client).await;
                return;
            };
            send(&socket, &oack(blksize), client).await;
            assert_eq!(recv(&socket).await.0, TftpPacket::Ack(0));

            let mut block: u16 = 1;
            let mut offset = 0;
            loop {
                let end = (offset + blksize_len).min(content.len());
                let chunk = &content[offset..end];
                send(&socket, &data(block, chunk), client).await;
                assert_eq!(recv(&socket).await.0, TftpPacket::Ack(block));
                if chunk.len() < blksize_len {
                    break;
                }
                offset = end;
                block = block.wrapping_add(1);
            }
        }
    }
}

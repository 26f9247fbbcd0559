mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::time::Duration;

use tftp_client::{Client, TransferError};

async fn start() -> (Client, common::Store) {
    let (listener, addr) = common::listen().await;
    let store: common::Store = Arc::new(Mutex::new(HashMap::new()));
    tokio::spawn(common::serve(listener, store.clone()));
    (Client::new(common::config(addr)), store)
}

#[tokio::test]
async fn upload_then_download_reproduces_bytes() {
    let (client, store) = start().await;

    for len in [0usize, 1, 511, 512, 513, 1024, 5000] {
        let name = format!("file-{len}");
        let content = common::pattern(len);
        let mut source = content.as_slice();
        let sent = client
            .upload(&name, &mut source, Some(len as u64))
            .await
            .unwrap();
        // Full blocks plus exactly one short (possibly empty) terminal block.
        assert_eq!(sent.blocks, (len / 512) as u64 + 1, "len {len}");
        assert_eq!(store.lock().unwrap().get(&name), Some(&content));

        let mut sink = Vec::new();
        let received = client.download(&name, &mut sink).await.unwrap();
        assert_eq!(sink, content, "len {len}");
        assert_eq!(received.blocks, sent.blocks);
    }
}

#[tokio::test]
async fn larger_blksize_round_trips() {
    let (listener, addr) = common::listen().await;
    let store: common::Store = Arc::new(Mutex::new(HashMap::new()));
    tokio::spawn(common::serve(listener, store));

    let mut config = common::config(addr);
    config.blksize = 1024;
    let client = Client::new(config);

    let content = common::pattern(4000);
    let mut source = content.as_slice();
    let sent = client.upload("k.bin", &mut source, Some(4000)).await.unwrap();
    assert_eq!(sent.blksize, 1024);
    assert_eq!(sent.blocks, 4);

    let mut sink = Vec::new();
    client.download("k.bin", &mut sink).await.unwrap();
    assert_eq!(sink, content);
}

#[tokio::test]
async fn missing_remote_file_fails() {
    let (client, _store) = start().await;
    let mut sink = Vec::new();
    let err = client.download("nope", &mut sink).await.unwrap_err();
    assert!(matches!(err, TransferError::Protocol { code: 1, .. }));
    assert!(sink.is_empty());
}

#[tokio::test]
async fn block_numbers_wrap_past_65535() {
    let (listener, addr) = common::listen().await;
    let store: common::Store = Arc::new(Mutex::new(HashMap::new()));
    tokio::spawn(common::serve(listener, store));

    let mut config = common::config(addr);
    config.blksize = 8;
    config.timeout = Duration::from_secs(2);
    let client = Client::new(config);

    // 65540 full blocks plus a short one: numbers run 1..=65535, 0, 1, ..., 5.
    let len = 8 * 65540 + 3;
    let content = common::pattern(len);
    let mut source = content.as_slice();
    let sent = client
        .upload("wrap.bin", &mut source, Some(len as u64))
        .await
        .unwrap();
    assert_eq!(sent.blocks, 65541);

    let mut sink = Vec::new();
    let received = client.download("wrap.bin", &mut sink).await.unwrap();
    assert_eq!(received.blocks, 65541);
    assert_eq!(sink, content);
}

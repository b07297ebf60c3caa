//! 실제 UDP 소켓 루프백 전송

mod common;

use std::net::SocketAddr;

use swft::{Receiver, Sender};

use common::{test_config, write_source};

#[tokio::test]
async fn test_udp_loopback_transfer_uses_announced_name() {
    let source_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let (source, data) = write_source(source_dir.path(), "local.bin", 50 * 1024 + 17);

    let localhost: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let receiver = Receiver::bind(test_config(), localhost).await.unwrap();
    let peer = receiver.socket().local_addr().unwrap();

    let target = out_dir.path().to_path_buf();
    let receiving = tokio::spawn(async move { receiver.receive_file(&target).await });

    let sender = Sender::bind(test_config(), localhost, peer).await.unwrap();
    // 디렉터리 구성요소는 수신측에서 제거됨
    let report = sender
        .send_file(&source, "nested/dir/announced.bin")
        .await
        .unwrap();

    let outcome = receiving.await.unwrap().unwrap();
    assert_eq!(outcome.session.file_name, "nested/dir/announced.bin");
    assert_eq!(outcome.path, out_dir.path().join("announced.bin"));
    assert_eq!(outcome.session.transmission_id, report.transmission_id);
    assert!(outcome.verification.is_verified());
    assert_eq!(report.checksum, swft::Checksum::of(&data));
    assert_eq!(std::fs::read(&outcome.path).unwrap(), data);
}

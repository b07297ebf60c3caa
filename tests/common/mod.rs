//! 통합 테스트 공용 도구
//!
//! [`MemoryLink`]는 메모리 채널 위의 [`Datagram`] 구현으로, 송신 시 필터를 적용해
//! 손실/중복을 흉내낸다.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use swft::{Config, Datagram, Packet, SeqNum, TransmissionId};

/// 필터 판정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    Deliver,
    Drop,
    Duplicate,
}

pub type Filter = Box<dyn FnMut(&[u8]) -> Fate + Send>;

type Envelope = (Vec<u8>, SocketAddr);

/// 메모리 데이터그램 링크의 한쪽 끝
pub struct MemoryLink {
    local: SocketAddr,
    outbound: mpsc::UnboundedSender<Envelope>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Envelope>>,
    filter: Mutex<Filter>,
}

impl MemoryLink {
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// 이 끝에서 보내는 데이터그램에 적용할 필터
    pub fn set_filter<F>(&self, filter: F)
    where
        F: FnMut(&[u8]) -> Fate + Send + 'static,
    {
        *self.filter.lock() = Box::new(filter);
    }

    pub async fn send_packet(&self, packet: &Packet) {
        self.send_to(&packet.to_bytes(), self.local).await.unwrap();
    }

    /// `wait` 안에 도착한 다음 패킷
    pub async fn recv_packet(&self, wait: Duration) -> Option<Packet> {
        let mut buf = vec![0u8; 2048];
        match tokio::time::timeout(wait, self.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => Some(Packet::from_bytes(&buf[..len]).unwrap()),
            _ => None,
        }
    }

    /// (id, seq) ACK를 기다림
    pub async fn expect_ack(&self, transmission_id: TransmissionId, seq: SeqNum) {
        let ack = self
            .recv_packet(Duration::from_secs(2))
            .await
            .unwrap_or_else(|| panic!("no ack for seq {}", seq));
        assert!(
            ack.acknowledges(transmission_id, seq),
            "expected ack ({:04X}, {}), got {:?}",
            transmission_id,
            seq,
            ack
        );
        assert!(ack.payload.is_empty());
    }
}

#[async_trait]
impl Datagram for MemoryLink {
    async fn send_to(&self, buf: &[u8], _target: SocketAddr) -> std::io::Result<usize> {
        let fate = {
            let mut filter = self.filter.lock();
            (*filter)(buf)
        };
        let copies = match fate {
            Fate::Deliver => 1,
            Fate::Drop => 0,
            Fate::Duplicate => 2,
        };
        for _ in 0..copies {
            // 상대가 이미 종료했으면 조용히 버림
            let _ = self.outbound.send((buf.to_vec(), self.local));
        }
        Ok(buf.len())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        let mut inbound = self.inbound.lock().await;
        match inbound.recv().await {
            Some((data, from)) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok((len, from))
            }
            // 상대 끝이 사라지면 아무것도 도착하지 않음
            None => std::future::pending().await,
        }
    }
}

/// 연결된 링크 한 쌍 (sender 쪽, receiver 쪽)
pub fn link_pair() -> (MemoryLink, MemoryLink) {
    let a_addr: SocketAddr = "10.0.0.1:4000".parse().unwrap();
    let b_addr: SocketAddr = "10.0.0.2:9000".parse().unwrap();
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();

    let a = MemoryLink {
        local: a_addr,
        outbound: a_tx,
        inbound: tokio::sync::Mutex::new(a_rx),
        filter: Mutex::new(Box::new(|_| Fate::Deliver)),
    };
    let b = MemoryLink {
        local: b_addr,
        outbound: b_tx,
        inbound: tokio::sync::Mutex::new(b_rx),
        filter: Mutex::new(Box::new(|_| Fate::Deliver)),
    };
    (a, b)
}

/// 데이터그램의 시퀀스 번호
pub fn seq_of(datagram: &[u8]) -> SeqNum {
    u32::from_be_bytes([datagram[2], datagram[3], datagram[4], datagram[5]])
}

/// 빠른 타이밍의 테스트 설정
pub fn test_config() -> Config {
    Config {
        ack_timeout_ms: 20,
        handshake_deadline_ms: 5_000,
        idle_timeout_ms: 5_000,
        max_attempts: 500,
        linger_ms: 100,
        ..Config::default()
    }
}

/// 테스트용 데이터 (위치마다 다른 값)
pub fn pattern(size: usize) -> Vec<u8> {
    (0..size).map(|i| ((i * 31 + i / 1024) % 251) as u8).collect()
}

/// 원본 파일 생성
pub fn write_source(dir: &Path, name: &str, size: usize) -> (PathBuf, Vec<u8>) {
    let data = pattern(size);
    let path = dir.join(name);
    std::fs::write(&path, &data).unwrap();
    (path, data)
}

//! 수신자
//!
//! - 핸드쉐이크 수락, 전송 ID 학습
//! - 순서 무관 데이터 수집 + 패킷별 ACK
//! - 최종 패킷 (체크섬) 감지 후 조립, 무결성 검증
//!
//! 단일 루프로만 동작하므로 내부 동기화가 필요 없음

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::chunk::ReceiveStore;
use crate::integrity::{self, Checksum, Verification};
use crate::packet::{HandshakeInfo, Packet};
use crate::stats::TransferStats;
use crate::transport::{recv_packet, send_packet, Datagram, Received};
use crate::{Config, Error, Result, SeqNum, TransmissionId, HANDSHAKE_SEQ};

/// 핸드쉐이크로 확립된 세션
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// 송신자가 고른 전송 ID
    pub transmission_id: TransmissionId,

    /// 총 청크 수 (N)
    pub total_chunks: SeqNum,

    /// 송신자가 알린 파일 이름
    pub file_name: String,

    /// 송신자 주소
    pub peer: SocketAddr,
}

/// 수신 결과
#[derive(Debug)]
pub struct ReceiveOutcome {
    pub session: Session,

    /// 기록된 파일 경로
    pub path: PathBuf,

    /// 기록된 바이트 수
    pub bytes_written: u64,

    /// 무결성 검증 결과 (권고용)
    pub verification: Verification,

    pub stats: TransferStats,
}

/// 수신자
pub struct Receiver<S> {
    config: Config,
    socket: S,
    stats: RwLock<TransferStats>,
}

impl Receiver<UdpSocket> {
    /// UDP 소켓을 바인딩하여 수신자 생성
    pub async fn bind(config: Config, bind_addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await?;
        info!("SWFT Receiver listening on {}", socket.local_addr()?);
        Ok(Self::new(config, socket))
    }
}

impl<S> Receiver<S>
where
    S: Datagram,
{
    pub fn new(config: Config, socket: S) -> Self {
        Self {
            config,
            socket,
            stats: RwLock::new(TransferStats::new()),
        }
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }

    /// 통계 반환
    pub fn stats(&self) -> TransferStats {
        self.stats.read().clone()
    }

    /// 파일 수신: `out_dir`에 송신자가 알린 이름의 마지막 구성요소로 저장
    pub async fn receive_file(&self, out_dir: impl AsRef<Path>) -> Result<ReceiveOutcome> {
        let out_dir = out_dir.as_ref();
        self.receive(|session| Ok(out_dir.join(safe_file_name(&session.file_name)?)))
            .await
    }

    /// 파일 수신: 알린 이름과 무관하게 `path`에 저장
    pub async fn receive_to(&self, path: impl AsRef<Path>) -> Result<ReceiveOutcome> {
        let path = path.as_ref().to_path_buf();
        self.receive(move |_| Ok(path)).await
    }

    async fn receive<F>(&self, resolve: F) -> Result<ReceiveOutcome>
    where
        F: FnOnce(&Session) -> Result<PathBuf>,
    {
        self.config.validate()?;
        *self.stats.write() = TransferStats::new();

        let session = self.accept().await?;
        let path = resolve(&session)?;
        info!(
            "Receiving file: {:?} -> {} ({} chunks, id={:04X})",
            session.file_name,
            path.display(),
            session.total_chunks,
            session.transmission_id
        );

        let (store, checksum) = self.collect(&session).await?;

        // 누락 청크가 있으면 파일을 만들지 않음
        store.ensure_complete()?;

        let mut file = tokio::fs::File::create(&path).await?;
        let bytes_written = store.write_to(&mut file).await?;
        drop(file);
        self.stats.write().total_bytes = bytes_written;

        info!("File received, verifying integrity...");
        let verification = integrity::verify_file(&path, checksum).await?;
        match &verification {
            Verification::Verified(_) => info!("File integrity verified successfully."),
            Verification::Mismatch { expected, actual } => {
                warn!(
                    "File integrity verification failed: expected {}, got {}",
                    expected, actual
                )
            }
        }

        self.linger(&session).await;

        let stats = self.stats();
        info!("{}", stats.summary());

        Ok(ReceiveOutcome {
            session,
            path,
            bytes_written,
            verification,
            stats,
        })
    }

    /// 핸드쉐이크 수락
    ///
    /// 마감 시간 내에 seq 0 패킷이 없으면 HandshakeTimeout.
    /// ACK는 방금 파싱한 전송 ID로 보냄.
    pub async fn accept(&self) -> Result<Session> {
        let wait = self.config.handshake_deadline();
        let deadline = Instant::now() + wait;
        let mut buf = vec![0u8; self.config.recv_buffer_size()];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("Timeout: file information not received");
                return Err(Error::HandshakeTimeout {
                    waited_ms: wait.as_millis() as u64,
                });
            }

            match recv_packet(&self.socket, &mut buf, remaining).await {
                Received::Packet(packet, peer) if packet.seq == HANDSHAKE_SEQ => {
                    let info = match HandshakeInfo::from_bytes(&packet.payload) {
                        Ok(info) if info.total_chunks >= 1 => info,
                        _ => {
                            self.stats.write().discarded_packets += 1;
                            debug!("잘못된 핸드쉐이크 무시: {} bytes", packet.payload.len());
                            continue;
                        }
                    };

                    let session = Session {
                        transmission_id: packet.transmission_id,
                        total_chunks: info.total_chunks,
                        file_name: info.file_name,
                        peer,
                    };
                    self.ack(session.transmission_id, HANDSHAKE_SEQ, peer).await;

                    let mut stats = self.stats.write();
                    stats.total_chunks = session.total_chunks;
                    stats.handshake_attempts += 1;
                    return Ok(session);
                }
                Received::Packet(packet, _) => {
                    self.stats.write().discarded_packets += 1;
                    debug!("핸드쉐이크 대기 중 seq={} 무시", packet.seq);
                }
                Received::Malformed { len } => {
                    self.stats.write().discarded_packets += 1;
                    debug!("잘못된 패킷 무시: {} bytes", len);
                }
                Received::Failed(e) => {
                    debug!("수신 에러: {}", e);
                    tokio::time::sleep(self.config.ack_timeout().min(remaining)).await;
                }
                Received::TimedOut => {}
            }
        }
    }

    /// 데이터 수집: 최종 패킷까지 받고 (저장소, 체크섬) 반환
    ///
    /// idle_timeout 동안 세션 패킷이 없으면 TransferAbandoned
    pub async fn collect(&self, session: &Session) -> Result<(ReceiveStore, Checksum)> {
        let tid = session.transmission_id;
        let total = session.total_chunks;
        let idle_timeout = self.config.idle_timeout();
        let mut store = ReceiveStore::new(total);
        let mut buf = vec![0u8; self.config.recv_buffer_size()];
        let mut last_activity = Instant::now();

        loop {
            match recv_packet(&self.socket, &mut buf, self.config.ack_timeout()).await {
                Received::Packet(packet, from) => {
                    let packet = match packet.for_session(tid) {
                        Ok(packet) => packet,
                        Err(_) => {
                            // 다른 전송의 패킷: 조용히 버림
                            self.stats.write().discarded_packets += 1;
                            continue;
                        }
                    };
                    last_activity = Instant::now();

                    match packet.seq {
                        HANDSHAKE_SEQ => {
                            // 핸드쉐이크 ACK 손실로 송신자가 재전송
                            debug!("Handshake repeated, re-acking");
                            self.ack(tid, HANDSHAKE_SEQ, from).await;
                        }
                        seq if seq == total => match Checksum::from_slice(&packet.payload) {
                            Ok(checksum) => {
                                self.ack(tid, seq, from).await;
                                self.stats.write().final_attempts += 1;
                                debug!("Final packet: {} (checksum {})", seq, checksum);
                                return Ok((store, checksum));
                            }
                            Err(_) => {
                                self.stats.write().discarded_packets += 1;
                                warn!("잘못된 최종 패킷: {} bytes", packet.payload.len());
                            }
                        },
                        seq if store.is_data_seq(seq) => {
                            let is_new = store.insert(seq, packet.payload);
                            {
                                let mut stats = self.stats.write();
                                stats.packets_received += 1;
                                if !is_new {
                                    stats.duplicate_packets += 1;
                                }
                            }
                            self.ack(tid, seq, from).await;
                            debug!("Received: {}", seq);
                        }
                        seq => {
                            self.stats.write().discarded_packets += 1;
                            debug!("범위 밖 seq 무시: {} (N={})", seq, total);
                        }
                    }
                }
                Received::Malformed { len } => {
                    self.stats.write().discarded_packets += 1;
                    debug!("잘못된 패킷 무시: {} bytes", len);
                }
                Received::Failed(e) => {
                    debug!("수신 에러: {}", e);
                    tokio::time::sleep(self.config.ack_timeout()).await;
                }
                Received::TimedOut => {}
            }

            if last_activity.elapsed() >= idle_timeout {
                warn!(
                    "송신자 응답 없음: {}/{} 청크 수신 후 중단",
                    store.received_count(),
                    total.saturating_sub(1)
                );
                return Err(Error::TransferAbandoned {
                    idle_ms: idle_timeout.as_millis() as u64,
                });
            }
        }
    }

    /// 최종 ACK 이후 잠시 대기하며 재전송된 최종 패킷에 다시 응답
    async fn linger(&self, session: &Session) {
        let linger = self.config.linger();
        if linger.is_zero() {
            return;
        }

        let deadline = Instant::now() + linger;
        let mut buf = vec![0u8; self.config.recv_buffer_size()];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return;
            }

            match recv_packet(&self.socket, &mut buf, remaining).await {
                Received::Packet(packet, from)
                    if packet.acknowledges(session.transmission_id, session.total_chunks) =>
                {
                    debug!("Final packet repeated, re-acking");
                    self.ack(session.transmission_id, session.total_chunks, from)
                        .await;
                }
                Received::TimedOut => return,
                Received::Failed(_) => {
                    tokio::time::sleep(remaining).await;
                    return;
                }
                _ => {}
            }
        }
    }

    async fn ack(&self, transmission_id: TransmissionId, seq: SeqNum, to: SocketAddr) {
        if let Err(e) = send_packet(&self.socket, &Packet::ack(transmission_id, seq), to).await {
            warn!("ACK 전송 실패 (seq={}): {}", seq, e);
        }
    }
}

/// 송신자가 알린 이름에서 마지막 경로 구성요소만 사용
pub fn safe_file_name(name: &str) -> Result<&str> {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidFileName(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_file_name_strips_directories() {
        assert_eq!(safe_file_name("report.pdf").unwrap(), "report.pdf");
        assert_eq!(safe_file_name("dir/sub/report.pdf").unwrap(), "report.pdf");
        assert_eq!(safe_file_name("/etc/passwd").unwrap(), "passwd");
        assert_eq!(safe_file_name("../../escape.txt").unwrap(), "escape.txt");
    }

    #[test]
    fn test_safe_file_name_rejects_empty_and_parent() {
        assert!(matches!(safe_file_name(""), Err(Error::InvalidFileName(_))));
        assert!(matches!(safe_file_name(".."), Err(Error::InvalidFileName(_))));
        assert!(matches!(safe_file_name("a/.."), Err(Error::InvalidFileName(_))));
        assert!(matches!(safe_file_name("/"), Err(Error::InvalidFileName(_))));
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let config = Config {
            handshake_deadline_ms: 50,
            ..Config::default()
        };
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let receiver = Receiver::new(config, socket);

        match receiver.accept().await {
            Err(Error::HandshakeTimeout { waited_ms }) => assert_eq!(waited_ms, 50),
            other => panic!("expected HandshakeTimeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_accept_echoes_learned_id() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let receiver = Receiver::new(Config::default(), socket);

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        // 데이터 패킷과 짧은 패킷은 핸드쉐이크로 인정하지 않음
        client
            .send_to(&Packet::new(0x77, 1, "x".into()).to_bytes(), addr)
            .await
            .unwrap();
        client.send_to(&[0, 1], addr).await.unwrap();
        let handshake = Packet::handshake(0xABCD, &HandshakeInfo::new(5, "data.bin"));
        client.send_to(&handshake.to_bytes(), addr).await.unwrap();

        let session = receiver.accept().await.unwrap();
        assert_eq!(session.transmission_id, 0xABCD);
        assert_eq!(session.total_chunks, 5);
        assert_eq!(session.file_name, "data.bin");
        assert_eq!(session.peer, client.local_addr().unwrap());

        let mut buf = [0u8; 64];
        let (len, _) = client.recv_from(&mut buf).await.unwrap();
        assert!(Packet::from_bytes(&buf[..len])
            .unwrap()
            .acknowledges(0xABCD, 0));
        assert_eq!(receiver.stats().discarded_packets, 2);
    }
}

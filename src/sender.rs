//! 송신자
//!
//! - 핸드쉐이크: seq 0 (총 청크 수 + 파일 이름), stop-and-wait
//! - 데이터 단계: 송신 태스크 + ACK 태스크가 [`SendWindow`]를 공유
//! - 종료 핸드쉐이크: seq N (체크섬), stop-and-wait

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::io::{AsyncRead, AsyncSeek};
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::chunk::{chunk_count, ChunkReader};
use crate::integrity::{self, Checksum};
use crate::packet::{self, HandshakeInfo, Packet};
use crate::stats::TransferStats;
use crate::transport::{recv_packet, Datagram, Received};
use crate::window::{AckOutcome, SendWindow};
use crate::{Config, Error, Result, SeqNum, TransmissionId};

/// 전송 완료 보고
#[derive(Debug, Clone)]
pub struct SendReport {
    pub transmission_id: TransmissionId,

    /// 총 청크 수 (N)
    pub total_chunks: SeqNum,

    /// 최종 패킷으로 보낸 체크섬
    pub checksum: Checksum,

    /// 데이터 단계 중 최대 미확인 패킷 수
    pub peak_in_flight: u32,

    pub stats: TransferStats,
}

/// 송신자
pub struct Sender<S> {
    /// 설정
    config: Config,

    /// 전송 채널
    socket: Arc<S>,

    /// 수신자 주소
    peer: SocketAddr,

    /// 전송 통계
    stats: Arc<RwLock<TransferStats>>,
}

impl Sender<UdpSocket> {
    /// UDP 소켓을 바인딩하여 송신자 생성
    pub async fn bind(config: Config, bind_addr: SocketAddr, peer: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await?;
        info!("SWFT Sender bound to {}", socket.local_addr()?);
        Ok(Self::new(config, Arc::new(socket), peer))
    }
}

impl<S> Sender<S>
where
    S: Datagram + 'static,
{
    pub fn new(config: Config, socket: Arc<S>, peer: SocketAddr) -> Self {
        Self {
            config,
            socket,
            peer,
            stats: Arc::new(RwLock::new(TransferStats::new())),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 통계 반환
    pub fn stats(&self) -> TransferStats {
        self.stats.read().clone()
    }

    /// 파일 전송
    ///
    /// `file_name`은 수신측에 알릴 대상 파일 이름
    pub async fn send_file(&self, path: impl AsRef<Path>, file_name: &str) -> Result<SendReport> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        let checksum = integrity::digest_file(path).await?;

        self.send_reader(file, size, file_name, checksum, rand::random())
            .await
    }

    /// 임의의 seek 가능한 리더로부터 전송
    pub async fn send_reader<R>(
        &self,
        reader: R,
        size: u64,
        file_name: &str,
        checksum: Checksum,
        transmission_id: TransmissionId,
    ) -> Result<SendReport>
    where
        R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
    {
        self.config.validate()?;

        let max_name = self.config.max_file_name_len();
        if file_name.len() > max_name {
            return Err(Error::FileNameTooLong {
                len: file_name.len(),
                max: max_name,
            });
        }

        let total_chunks = chunk_count(size, self.config.payload_size)?;
        {
            let mut stats = self.stats.write();
            *stats = TransferStats::new();
            stats.total_chunks = total_chunks;
            stats.total_bytes = size;
        }

        info!(
            "Sending {:?} to {}: {} bytes, {} chunks, id={:04X}",
            file_name, self.peer, size, total_chunks, transmission_id
        );

        // 1. 핸드쉐이크
        let handshake = Packet::handshake(
            transmission_id,
            &HandshakeInfo::new(total_chunks, file_name),
        );
        let attempts = self.stop_and_wait(&handshake).await?;
        self.stats.write().handshake_attempts = attempts;
        info!("Handshake acknowledged ({} attempts)", attempts);

        // 2. 데이터 단계
        let window = Arc::new(SendWindow::new(total_chunks, self.config.window_size));
        let reader = ChunkReader::new(reader, self.config.payload_size);
        self.transfer(transmission_id, window.clone(), reader).await?;
        info!("All {} data chunks acknowledged", total_chunks - 1);

        // 3. 종료 핸드쉐이크 (체크섬)
        let final_packet = Packet::new(
            transmission_id,
            total_chunks,
            Bytes::copy_from_slice(checksum.as_bytes()),
        );
        let attempts = self.stop_and_wait(&final_packet).await?;
        self.stats.write().final_attempts = attempts;

        let stats = self.stats();
        info!("Transfer complete: checksum {}", checksum);
        info!("{}", stats.summary());

        Ok(SendReport {
            transmission_id,
            total_chunks,
            checksum,
            peak_in_flight: window.peak_in_flight(),
            stats,
        })
    }

    /// 데이터 단계: 두 태스크를 띄우고 둘 다 끝날 때까지 대기
    async fn transfer<R>(
        &self,
        transmission_id: TransmissionId,
        window: Arc<SendWindow>,
        reader: ChunkReader<R>,
    ) -> Result<()>
    where
        R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
    {
        if window.is_complete() {
            // 빈 파일: 데이터 청크 없음
            return Ok(());
        }

        let phase = Arc::new(DataPhase {
            config: self.config.clone(),
            socket: self.socket.clone(),
            peer: self.peer,
            transmission_id,
            window,
            stats: self.stats.clone(),
        });

        let transmit = tokio::spawn(phase.clone().run_transmit(reader));
        let acknowledge = tokio::spawn(phase.run_acknowledge());

        let (transmit, acknowledge) = tokio::join!(transmit, acknowledge);
        let transmit = transmit.map_err(|e| Error::TaskFailed(e.to_string()))?;
        let acknowledge = acknowledge.map_err(|e| Error::TaskFailed(e.to_string()))?;

        transmit?;
        acknowledge
    }

    /// 단일 패킷 stop-and-wait: (id, seq) ACK를 받을 때까지 재전송
    ///
    /// 다른 ACK (늦게 도착한 데이터 ACK 등)는 무시하고 남은 시간 동안 계속 대기.
    /// 시도 횟수 반환.
    async fn stop_and_wait(&self, packet: &Packet) -> Result<u32> {
        let datagram = packet.to_bytes();
        let timeout = self.config.ack_timeout();
        let mut buf = vec![0u8; self.config.recv_buffer_size()];
        let mut attempts = 0u32;

        loop {
            if self.config.attempts_exhausted(attempts) {
                warn!("seq {} 응답 없음: {}회 시도 후 포기", packet.seq, attempts);
                return Err(Error::GaveUp {
                    seq: packet.seq,
                    attempts,
                });
            }

            if let Err(e) = self.socket.send_to(&datagram, self.peer).await {
                warn!("송신 실패 (seq={}): {}", packet.seq, e);
            }
            attempts += 1;

            let deadline = Instant::now() + timeout;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }

                match recv_packet(&*self.socket, &mut buf, remaining).await {
                    Received::Packet(ack, _)
                        if ack.acknowledges(packet.transmission_id, packet.seq) =>
                    {
                        debug!("Ack: {}", ack.seq);
                        return Ok(attempts);
                    }
                    Received::Packet(other, _) => {
                        debug!(
                            "무시: id={:04X} seq={} (seq {} 대기 중)",
                            other.transmission_id, other.seq, packet.seq
                        );
                    }
                    Received::Malformed { len } => {
                        debug!("잘못된 ACK 무시: {} bytes", len);
                    }
                    Received::Failed(e) => {
                        debug!("수신 에러: {}", e);
                        tokio::time::sleep_until(deadline).await;
                        break;
                    }
                    Received::TimedOut => break,
                }
            }

            debug!("Resending seq {} (attempt {})", packet.seq, attempts + 1);
        }
    }
}

/// 데이터 단계 공유 컨텍스트
struct DataPhase<S> {
    config: Config,
    socket: Arc<S>,
    peer: SocketAddr,
    transmission_id: TransmissionId,
    window: Arc<SendWindow>,
    stats: Arc<RwLock<TransferStats>>,
}

impl<S> DataPhase<S>
where
    S: Datagram + 'static,
{
    /// 송신 태스크: 윈도우에 여유가 있는 만큼 새 패킷만 전송 (재전송 안 함)
    async fn run_transmit<R>(self: Arc<Self>, mut reader: ChunkReader<R>) -> Result<()>
    where
        R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
    {
        let result = self.transmit_loop(&mut reader).await;
        if let Err(e) = &result {
            warn!("송신 태스크 중단: {}", e);
            self.window.close();
        }
        result
    }

    async fn transmit_loop<R>(&self, reader: &mut ChunkReader<R>) -> Result<()>
    where
        R: AsyncRead + AsyncSeek + Unpin,
    {
        while self.window.is_active() {
            while let Some(seq) = self.window.next_admissible() {
                let data = reader.read_chunk(seq).await?;
                let datagram = packet::encode(self.transmission_id, seq, &data);

                if !self.window.admit(seq, datagram.clone()) {
                    break;
                }
                self.send(&datagram, seq).await;
                self.stats.write().packets_sent += 1;
                debug!("Sent: {}", seq);
            }

            tokio::time::sleep(self.config.ack_timeout()).await;
        }

        Ok(())
    }

    /// ACK 태스크: ACK 기록, 타임아웃 시 미확인 패킷 전체 재전송
    async fn run_acknowledge(self: Arc<Self>) -> Result<()> {
        let result = self.acknowledge_loop().await;
        if result.is_err() {
            self.window.close();
        }
        result
    }

    async fn acknowledge_loop(&self) -> Result<()> {
        let timeout = self.config.ack_timeout();
        let mut buf = vec![0u8; self.config.recv_buffer_size()];
        // ACK 진전 없이 연속된 재전송 라운드 수
        let mut stalled_rounds = 0u32;

        while self.window.is_active() {
            match recv_packet(&*self.socket, &mut buf, timeout).await {
                Received::Packet(ack, _) if ack.transmission_id == self.transmission_id => {
                    self.stats.write().acks_received += 1;

                    match self.window.mark_acked(ack.seq) {
                        AckOutcome::Advanced { base } => {
                            stalled_rounds = 0;
                            debug!("Ack: {} (base={})", ack.seq, base);
                        }
                        AckOutcome::Accepted => {
                            stalled_rounds = 0;
                            debug!("Ack: {}", ack.seq);
                        }
                        AckOutcome::Duplicate => {
                            self.stats.write().duplicate_acks += 1;
                        }
                        AckOutcome::OutOfRange => {
                            debug!("범위 밖 ACK 무시: seq={}", ack.seq);
                        }
                    }
                }
                Received::Packet(other, _) => {
                    self.stats.write().discarded_packets += 1;
                    debug!("다른 전송 ID 무시: {:04X}", other.transmission_id);
                }
                Received::Malformed { len } => {
                    self.stats.write().discarded_packets += 1;
                    debug!("잘못된 ACK: {} bytes", len);
                    self.retransmit_outstanding(&mut stalled_rounds).await?;
                }
                Received::Failed(e) => {
                    debug!("수신 에러: {}", e);
                    tokio::time::sleep(timeout).await;
                    self.retransmit_outstanding(&mut stalled_rounds).await?;
                }
                Received::TimedOut => {
                    self.retransmit_outstanding(&mut stalled_rounds).await?;
                }
            }
        }

        Ok(())
    }

    /// [base, next) 중 미확인 패킷을 저장된 그대로 재전송
    async fn retransmit_outstanding(&self, stalled_rounds: &mut u32) -> Result<()> {
        let outstanding = self.window.outstanding_unacked();
        if outstanding.is_empty() {
            return Ok(());
        }

        if self.config.attempts_exhausted(*stalled_rounds) {
            let seq = self.window.base();
            warn!("seq {} 이후 ACK 없음: {}회 재전송 후 포기", seq, stalled_rounds);
            return Err(Error::GaveUp {
                seq,
                attempts: *stalled_rounds,
            });
        }
        *stalled_rounds += 1;

        for (seq, datagram) in &outstanding {
            self.send(datagram, *seq).await;
            debug!("Resent: {}", seq);
        }

        let mut stats = self.stats.write();
        stats.retransmit_rounds += 1;
        stats.retransmitted_packets += outstanding.len() as u64;
        stats.packets_sent += outstanding.len() as u64;

        Ok(())
    }

    async fn send(&self, datagram: &Bytes, seq: SeqNum) {
        if let Err(e) = self.socket.send_to(datagram, self.peer).await {
            warn!("송신 실패 (seq={}): {}", seq, e);
        }
    }
}

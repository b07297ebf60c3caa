//! 데이터그램 전송 추상화
//!
//! 프로토콜 엔진은 [`Datagram`]만 사용한다. 실제 네트워크는 `tokio::net::UdpSocket`,
//! 테스트는 손실/재정렬을 흉내내는 메모리 링크를 쓴다.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use crate::packet::Packet;
use crate::Result;

/// 순서/전달 보장이 없는 메시지 단위 전송 채널
///
/// 각 호출은 데이터그램 하나 단위이므로 여러 태스크에서 동시에 사용해도 됨
#[async_trait]
pub trait Datagram: Send + Sync {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> std::io::Result<usize>;

    async fn recv_from(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)>;
}

#[async_trait]
impl Datagram for UdpSocket {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> std::io::Result<usize> {
        UdpSocket::send_to(self, buf, target).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }
}

/// 제한 시간 내 수신 결과
#[derive(Debug)]
pub enum Received {
    /// 디코딩된 패킷과 송신 주소
    Packet(Packet, SocketAddr),

    /// 헤더보다 짧거나 수신 버퍼를 넘는 데이터그램
    Malformed { len: usize },

    /// 소켓 에러 (ICMP port unreachable 등)
    Failed(std::io::Error),

    /// 제한 시간 초과
    TimedOut,
}

/// 데이터그램 하나를 `wait` 동안 기다려 패킷으로 디코딩
///
/// `buf`를 가득 채운 데이터그램은 잘렸을 수 있으므로 Malformed로 취급.
/// 호출자는 최대 데이터그램보다 큰 버퍼를 넘겨야 함 ([`Config::recv_buffer_size`]).
///
/// [`Config::recv_buffer_size`]: crate::Config::recv_buffer_size
pub async fn recv_packet<S>(socket: &S, buf: &mut [u8], wait: Duration) -> Received
where
    S: Datagram + ?Sized,
{
    match tokio::time::timeout(wait, socket.recv_from(buf)).await {
        Ok(Ok((len, _))) if len >= buf.len() => Received::Malformed { len },
        Ok(Ok((len, addr))) => match Packet::from_bytes(&buf[..len]) {
            Ok(packet) => Received::Packet(packet, addr),
            Err(_) => Received::Malformed { len },
        },
        Ok(Err(e)) => Received::Failed(e),
        Err(_) => Received::TimedOut,
    }
}

/// 패킷 하나 전송
pub async fn send_packet<S>(socket: &S, packet: &Packet, target: SocketAddr) -> Result<()>
where
    S: Datagram + ?Sized,
{
    socket.send_to(&packet.to_bytes(), target).await?;
    Ok(())
}

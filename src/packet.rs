//! 패킷 정의 및 직렬화
//!
//! 모든 메시지는 동일한 6바이트 헤더를 사용
//! - 핸드쉐이크 (seq=0): 총 청크 수(4) + 파일 이름
//! - 데이터 (seq=1..N-1): 파일 내용
//! - 최종 (seq=N): 16바이트 체크섬
//! - ACK: 헤더만 (빈 페이로드)

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{Error, Result, SeqNum, TransmissionId, HANDSHAKE_SEQ, HEADER_SIZE};

/// 프로토콜 패킷
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// 전송 ID
    pub transmission_id: TransmissionId,

    /// 시퀀스 번호
    pub seq: SeqNum,

    /// 페이로드
    pub payload: Bytes,
}

impl Packet {
    pub fn new(transmission_id: TransmissionId, seq: SeqNum, payload: Bytes) -> Self {
        Self {
            transmission_id,
            seq,
            payload,
        }
    }

    /// ACK 패킷 생성 (빈 페이로드)
    pub fn ack(transmission_id: TransmissionId, seq: SeqNum) -> Self {
        Self::new(transmission_id, seq, Bytes::new())
    }

    /// 핸드쉐이크 패킷 생성
    pub fn handshake(transmission_id: TransmissionId, info: &HandshakeInfo) -> Self {
        Self::new(transmission_id, HANDSHAKE_SEQ, info.to_bytes())
    }

    /// 바이트로 직렬화
    pub fn to_bytes(&self) -> Bytes {
        encode(self.transmission_id, self.seq, &self.payload)
    }

    /// 바이트에서 역직렬화
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (transmission_id, seq, payload) = decode(bytes)?;
        Ok(Self::new(
            transmission_id,
            seq,
            Bytes::copy_from_slice(payload),
        ))
    }

    /// 세션 ID 확인
    pub fn for_session(self, transmission_id: TransmissionId) -> Result<Self> {
        if self.transmission_id != transmission_id {
            return Err(Error::IdentifierMismatch {
                expected: transmission_id,
                got: self.transmission_id,
            });
        }
        Ok(self)
    }

    /// 지정한 (id, seq)에 대한 ACK인지 확인
    pub fn acknowledges(&self, transmission_id: TransmissionId, seq: SeqNum) -> bool {
        self.transmission_id == transmission_id && self.seq == seq
    }
}

/// 헤더 + 페이로드 인코딩
pub fn encode(transmission_id: TransmissionId, seq: SeqNum, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    buf.put_u16(transmission_id);
    buf.put_u32(seq);
    buf.put_slice(payload);
    buf.freeze()
}

/// 헤더 디코딩, 페이로드는 입력 슬라이스를 그대로 참조
pub fn decode(bytes: &[u8]) -> Result<(TransmissionId, SeqNum, &[u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(Error::MalformedPacket { len: bytes.len() });
    }

    let mut header = &bytes[..HEADER_SIZE];
    let transmission_id = header.get_u16();
    let seq = header.get_u32();

    Ok((transmission_id, seq, &bytes[HEADER_SIZE..]))
}

/// 핸드쉐이크 페이로드
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeInfo {
    /// 총 청크 수 (N, 최종 패킷 시퀀스 번호)
    pub total_chunks: SeqNum,

    /// 대상 파일 이름
    pub file_name: String,
}

impl HandshakeInfo {
    pub fn new(total_chunks: SeqNum, file_name: impl Into<String>) -> Self {
        Self {
            total_chunks,
            file_name: file_name.into(),
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let name = self.file_name.as_bytes();
        let mut buf = BytesMut::with_capacity(4 + name.len());
        buf.put_u32(self.total_chunks);
        buf.put_slice(name);
        buf.freeze()
    }

    /// 이름은 UTF-8이 아니면 손실 변환
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(Error::MalformedPacket {
                len: HEADER_SIZE + bytes.len(),
            });
        }

        let mut buf = bytes;
        let total_chunks = buf.get_u32();
        let file_name = String::from_utf8_lossy(buf).into_owned();

        Ok(Self {
            total_chunks,
            file_name,
        })
    }
}

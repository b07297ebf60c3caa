//! 파일 무결성 검증
//!
//! 파일 전체에 대한 MD5 (128비트) 다이제스트. 송신측은 최종 패킷에 담아 보내고,
//! 수신측은 기록한 파일에서 다시 계산하여 비교한다.

use std::fmt;
use std::path::Path;

use md5::{Digest, Md5};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{Error, Result, CHECKSUM_SIZE, HEADER_SIZE};

/// 읽기 버퍼 크기
const DIGEST_BUF_SIZE: usize = 64 * 1024;

/// 128비트 파일 체크섬
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum([u8; CHECKSUM_SIZE]);

impl Checksum {
    pub fn from_bytes(bytes: [u8; CHECKSUM_SIZE]) -> Self {
        Self(bytes)
    }

    /// 최종 패킷 페이로드에서 생성 (정확히 16바이트)
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; CHECKSUM_SIZE] = bytes.try_into().map_err(|_| Error::MalformedPacket {
            len: HEADER_SIZE + bytes.len(),
        })?;
        Ok(Self(array))
    }

    /// 메모리 데이터의 체크섬
    pub fn of(data: &[u8]) -> Self {
        Self::from_hasher(Md5::new_with_prefix(data))
    }

    pub fn as_bytes(&self) -> &[u8; CHECKSUM_SIZE] {
        &self.0
    }

    fn from_hasher(hasher: Md5) -> Self {
        let mut out = [0u8; CHECKSUM_SIZE];
        out.copy_from_slice(&hasher.finalize());
        Self(out)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self)
    }
}

/// 스트림 전체의 체크섬
pub async fn digest_reader<R>(reader: &mut R) -> Result<Checksum>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; DIGEST_BUF_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(Checksum::from_hasher(hasher))
}

/// 파일 전체의 체크섬
pub async fn digest_file(path: impl AsRef<Path>) -> Result<Checksum> {
    let mut file = tokio::fs::File::open(path).await?;
    digest_reader(&mut file).await
}

/// 검증 결과 (권고용, 실패해도 기록된 파일은 유지)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Verified(Checksum),
    Mismatch { expected: Checksum, actual: Checksum },
}

impl Verification {
    pub fn compare(expected: Checksum, actual: Checksum) -> Self {
        if expected == actual {
            Verification::Verified(actual)
        } else {
            Verification::Mismatch { expected, actual }
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, Verification::Verified(_))
    }

    /// 불일치를 에러로 변환
    pub fn ensure(self) -> Result<Checksum> {
        match self {
            Verification::Verified(checksum) => Ok(checksum),
            Verification::Mismatch { expected, actual } => {
                Err(Error::IntegrityMismatch { expected, actual })
            }
        }
    }
}

/// 기록된 파일을 다시 읽어 체크섬 비교
pub async fn verify_file(path: impl AsRef<Path>, expected: Checksum) -> Result<Verification> {
    let actual = digest_file(path).await?;
    Ok(Verification::compare(expected, actual))
}

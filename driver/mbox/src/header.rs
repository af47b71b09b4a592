//! 帧头编解码
//!
//! 每条消息以 8 字节帧头开始，前 4 个字节同时作为 lookahead 字上报给
//! 主机：分配阶段只凭 lookahead 就能算出整帧的块对齐长度。

use crate::error::{MboxError, MboxResult};

/// 帧头长度（字节）。
pub const FRAME_HDR_LEN: usize = 8;

/// 帧头 flags 位定义。
pub mod flags {
    /// 帧尾跨入下一个块，拉取时需多读一个块。
    pub const RECV_MORE_BLOCK: u8 = 0x01;
    /// payload 末尾携带 trailer。
    pub const TRAILER_PRESENT: u8 = 0x02;
    /// 聚合帧数量字段（紧随本帧之后的成员个数）。
    pub const BUNDLE_MASK: u8 = 0xF0;
    pub const BUNDLE_SHIFT: u8 = 4;
}

/// 解码后的帧头。`payload_len` 含 trailer，不含帧头自身。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub eid: u8,
    pub flags: u8,
    pub payload_len: u16,
    pub trailer_len: u8,
    pub seq: u8,
}

impl FrameHeader {
    /// 从完整 8 字节帧头解码。
    pub fn parse(raw: &[u8]) -> MboxResult<Self> {
        if raw.len() < FRAME_HDR_LEN {
            return Err(MboxError::Framing("frame header truncated"));
        }
        Ok(Self {
            eid: raw[0],
            flags: raw[1],
            payload_len: u16::from_le_bytes([raw[2], raw[3]]),
            trailer_len: raw[4],
            seq: raw[5],
        })
    }

    /// 从 32 位 lookahead 字解码。lookahead 即帧头前 4 字节的小端镜像，
    /// 只携带分配所需的字段，trailer/seq 置零待完整帧头补齐。
    pub fn from_lookahead(la: u32) -> Self {
        let raw = la.to_le_bytes();
        Self {
            eid: raw[0],
            flags: raw[1],
            payload_len: u16::from_le_bytes([raw[2], raw[3]]),
            trailer_len: 0,
            seq: 0,
        }
    }

    /// 压回 lookahead 字（聚合成员在拉取后凭此与槽登记交叉校验）。
    pub fn to_lookahead(&self) -> u32 {
        let len = self.payload_len.to_le_bytes();
        u32::from_le_bytes([self.eid, self.flags, len[0], len[1]])
    }

    /// 编码到发送缓冲前部。调用方保证 `buf` 至少 [`FRAME_HDR_LEN`] 字节。
    pub fn write_to(&self, buf: &mut [u8]) {
        let len = self.payload_len.to_le_bytes();
        buf[0] = self.eid;
        buf[1] = self.flags;
        buf[2] = len[0];
        buf[3] = len[1];
        buf[4] = self.trailer_len;
        buf[5] = self.seq;
        buf[6] = 0;
        buf[7] = 0;
    }

    /// 帧头 + payload 的真实长度（未块对齐）。
    #[inline]
    pub fn frame_len(&self) -> usize {
        FRAME_HDR_LEN + self.payload_len as usize
    }

    /// 紧随本帧的聚合成员数，0 表示非聚合。
    #[inline]
    pub fn bundle_count(&self) -> usize {
        ((self.flags & flags::BUNDLE_MASK) >> flags::BUNDLE_SHIFT) as usize
    }

    #[inline]
    pub fn has_trailer(&self) -> bool {
        self.flags & flags::TRAILER_PRESENT != 0
    }

    #[inline]
    pub fn needs_extra_block(&self) -> bool {
        self.flags & flags::RECV_MORE_BLOCK != 0
    }
}

/// 调试输出辅助：按 `0x` 前缀十六进制打印字节串前缀。
pub struct HexPrefix<'a>(pub &'a [u8]);

impl core::fmt::Display for HexPrefix<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let n = self.0.len().min(16);
        write!(f, "0x")?;
        for b in &self.0[..n] {
            write!(f, "{:02x}", b)?;
        }
        if self.0.len() > n {
            write!(f, "..")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        let hdr = FrameHeader {
            eid: 3,
            flags: flags::TRAILER_PRESENT | (2 << flags::BUNDLE_SHIFT),
            payload_len: 300,
            trailer_len: 12,
            seq: 7,
        };
        let mut raw = [0u8; FRAME_HDR_LEN];
        hdr.write_to(&mut raw);
        assert_eq!(FrameHeader::parse(&raw).unwrap(), hdr);
        assert_eq!(hdr.bundle_count(), 2);
        assert!(hdr.has_trailer());
        assert!(!hdr.needs_extra_block());
        assert_eq!(hdr.frame_len(), FRAME_HDR_LEN + 300);
    }

    #[test]
    fn lookahead_subset_of_header() {
        let hdr = FrameHeader {
            eid: 1,
            flags: flags::RECV_MORE_BLOCK,
            payload_len: 1000,
            trailer_len: 0,
            seq: 0,
        };
        let la = hdr.to_lookahead();
        let back = FrameHeader::from_lookahead(la);
        assert_eq!(back.eid, 1);
        assert_eq!(back.payload_len, 1000);
        assert!(back.needs_extra_block());
        assert_eq!(back.to_lookahead(), la);
    }

    #[test]
    fn short_header_rejected() {
        assert!(matches!(
            FrameHeader::parse(&[0u8; 4]),
            Err(MboxError::Framing(_))
        ));
    }
}

//! 传输层错误分类
//!
//! 总线 seam（[`crate::BusOps`]）沿用 errno 风格的 `i32`；进入传输核心后
//! 统一包装为 [`MboxError`]，对外初始化接口再按需映射到 `AxError`。

use axerrno::AxError;

/// 传输核心错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MboxError {
    /// 总线读写失败（errno 值来自 [`crate::BusOps`] 实现）。
    #[error("bus io failed (errno {0})")]
    BusIo(i32),
    /// 帧头通告的 payload 超过消息上限：固件已失去同步，检出点会同时
    /// 触发设备恢复。
    #[error("oversize frame: payload {payload_len} exceeds {max}")]
    OversizeFrame { payload_len: usize, max: usize },
    /// 块对齐后的缓冲长度超出池上限。
    #[error("invalid buffer size: full_len {full_len} exceeds {max}")]
    InvalidSize { full_len: usize, max: usize },
    /// 帧结构不合法（长度不一致、endpoint 越界、trailer 越界等）。
    #[error("framing error: {0}")]
    Framing(&'static str),
    /// 设备上报的 FIFO 错误子中断（可恢复，按寄存器写回清除）。
    #[error("device fifo error (rx_underflow={rx_underflow} tx_overflow={tx_overflow})")]
    FifoError {
        rx_underflow: bool,
        tx_overflow: bool,
    },
    /// 固件断言/崩溃子中断，需整机恢复。
    #[error("firmware reported fatal condition")]
    FirmwareFatal,
    /// 接收槽池已达存活上限。
    #[error("no free rx slot")]
    NoFreeSlot,
    /// 发送描述符空闲链为空（立即返回，不阻塞）。
    #[error("no free tx descriptor")]
    NoFreeDesc,
    /// 有界等待超时（引导交换、唤醒轮询、RX 活性保底）。
    #[error("wait timed out")]
    Timeout,
}

pub type MboxResult<T = ()> = Result<T, MboxError>;

impl MboxError {
    /// 该错误是否意味着设备已不可恢复（上层应停止继续驱动传输）。
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MboxError::OversizeFrame { .. } | MboxError::FirmwareFatal
        )
    }
}

impl MboxError {
    /// 映射为负值 errno，供仍停留在 errno 约定的完成回调使用。
    pub fn to_errno(&self) -> i32 {
        match self {
            MboxError::BusIo(e) => *e,
            MboxError::OversizeFrame { .. }
            | MboxError::FirmwareFatal
            | MboxError::Framing(_)
            | MboxError::FifoError { .. } => -5, // EIO
            MboxError::InvalidSize { .. } => -22, // EINVAL
            MboxError::NoFreeSlot | MboxError::NoFreeDesc => -12, // ENOMEM
            MboxError::Timeout => -110, // ETIMEDOUT
        }
    }
}

impl From<MboxError> for AxError {
    fn from(e: MboxError) -> Self {
        match e {
            MboxError::BusIo(_) | MboxError::FifoError { .. } => AxError::Io,
            MboxError::OversizeFrame { .. } | MboxError::FirmwareFatal => AxError::BadState,
            MboxError::InvalidSize { .. } | MboxError::Framing(_) => AxError::InvalidInput,
            MboxError::NoFreeSlot | MboxError::NoFreeDesc => AxError::NoMemory,
            MboxError::Timeout => AxError::TimedOut,
        }
    }
}

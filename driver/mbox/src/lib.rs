//! SDIO mailbox 传输核心
//!
//! 无线协处理器与主机之间的帧化传输层：在固定地址的 mailbox 窗口上做
//! 变长消息的组帧/拆簇、lookahead 预取、trailer 信用上报提取，并提供
//! 中断处理状态机、异步发送流水线、电源状态机与引导期同步交换。
//!
//! 分层约定：
//! - 向下只依赖 [`BusOps`]（字节/块读写，errno 风格），总线独占
//!   claim/release 由实现方在每次调用内完成；
//! - 向上通过 [`MboxCallbacks`] 把帧、trailer、发送完成与设备恢复
//!   请求交给 endpoint 复用层；
//! - `irq_work` / `tx_work` / `rx_work` / `power_tick` 是同步循环体，
//!   由平台的工作任务/ 定时回调驱动，本 crate 不自行起线程。

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod boot;
mod bus;
mod callbacks;
mod error;
mod header;
mod irq;
mod pool;
mod power;
mod rx;
mod sync;
mod transport;
mod tx;
mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use bus::BusOps;
pub use callbacks::MboxCallbacks;
pub use error::{MboxError, MboxResult};
pub use header::{flags, FrameHeader, HexPrefix, FRAME_HDR_LEN};
pub use pool::{RxSlot, RxSlotPool};
pub use sync::{delay_spin_ms, delay_spin_us, SignalFlag, LOOPS_PER_MS};
pub use transport::MboxTransport;
pub use tx::{TxCompletion, TxToken};
pub use types::{
    reg, MboxConfig, MboxGeometry, MboxWindow, PowerState, MBOX_BLOCK_SIZE, MBOX_EP_COUNT,
    MBOX_MAX_BUF_SIZE, MBOX_MAX_MSG_PAYLOAD, RX_BUNDLE_MAX, RX_LOOKAHEAD_MAX, RX_SLOT_POOL_CAP,
    TX_DESC_CNT,
};

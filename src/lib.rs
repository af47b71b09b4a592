//! wmbox — SDIO 无线协处理器 mailbox 传输
//!
//! 对平台暴露整机入口：
//! - mbox: 帧化传输核心（接收组簇、中断状态机、发送流水线、电源、引导交换）
//! - pktbuf: 帧缓冲
//!
//! 平台提供总线实现与工作任务，协议层提供回调实现。

#![no_std]

extern crate alloc;

pub use mbox;
pub use pktbuf;

use axerrno::AxResult;
use mbox::{BusOps, MboxCallbacks, MboxConfig, MboxGeometry, MboxTransport};

/// 驱动上下文：传输核心加上挂接状态。平台初始化时创建并长期持有。
pub struct MboxDriver<B: BusOps, C: MboxCallbacks> {
    transport: MboxTransport<B, C>,
    attached: bool,
}

impl<B: BusOps, C: MboxCallbacks> MboxDriver<B, C> {
    pub fn new(bus: B, cb: C, geometry: MboxGeometry, config: MboxConfig) -> Self {
        Self {
            transport: MboxTransport::new(bus, cb, geometry, config),
            attached: false,
        }
    }

    pub fn transport(&self) -> &MboxTransport<B, C> {
        &self.transport
    }

    /// 挂接传输：打开设备到主机的中断。引导交换（`boot_exchange`）
    /// 应在此之前完成。
    pub fn attach(&mut self) -> AxResult {
        self.transport.enable_irq()?;
        self.attached = true;
        log::info!(target: "wmbox", "mailbox transport attached");
        Ok(())
    }

    /// 摘除传输：关断中断。在途发送由平台先行排空。
    pub fn detach(&mut self) -> AxResult {
        if !self.attached {
            return Ok(());
        }
        self.transport.disable_irq()?;
        self.attached = false;
        log::info!(target: "wmbox", "mailbox transport detached");
        Ok(())
    }
}

/// 占位回调：协议层尚未就位时使用，收到的一切静默丢弃。
/// 上层就位后换成真实实现即可，传输核心不感知差别。
#[derive(Default)]
pub struct CallbacksStub;

impl MboxCallbacks for CallbacksStub {
    fn on_frame_ready(&self, eid: u8, _buf: pktbuf::PktBuf) {
        log::debug!(target: "wmbox", "stub: drop rx frame on ep {}", eid);
    }

    fn on_trailer(&self, _eid: u8, _trailer: &[u8]) -> alloc::vec::Vec<u32> {
        alloc::vec::Vec::new()
    }

    fn notify_tx_complete(&self, eid: u8, _buf: pktbuf::PktBuf, result: Result<(), i32>) {
        if let Err(e) = result {
            log::warn!(target: "wmbox", "stub: tx on ep {} failed (errno {})", eid, e);
        }
    }

    fn request_recovery(&self) {
        log::error!(target: "wmbox", "stub: device recovery requested, no handler installed");
    }
}

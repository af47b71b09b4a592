//! 异步发送管线
//!
//! 描述符从有界空闲链取出，请求按提交顺序进入待发队列，工作循环体
//! `tx_work` 逐条写总线并回报完成。空闲链耗尽立即失败，不阻塞提交方。

extern crate alloc;

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;

use core::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use log::{debug, warn};
use spin::Mutex;

use crate::bus::BusOps;
use crate::callbacks::MboxCallbacks;
use crate::error::{MboxError, MboxResult};
use crate::header::HexPrefix;
use crate::sync::{delay_spin_ms, delay_spin_us};
use crate::transport::MboxTransport;
use crate::types::PowerState;
use pktbuf::PktBuf;

/// 发送描述符壳：只承载身份，缓冲随请求走。
pub(crate) struct TxDescShell {
    pub(crate) id: usize,
}

/// 一次待发请求。
pub(crate) struct TxRequest {
    pub(crate) shell: TxDescShell,
    pub(crate) addr: u32,
    pub(crate) buf: PktBuf,
    pub(crate) completion: TxCompletion,
}

/// 内部同步发送用的完成令牌。
pub struct TxToken {
    done: AtomicBool,
    status: AtomicI32,
}

impl TxToken {
    pub fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
            status: AtomicI32::new(0),
        }
    }

    pub(crate) fn complete(&self, status: i32) {
        self.status.store(status, Ordering::Release);
        self.done.store(true, Ordering::Release);
    }

    /// 自旋等待完成，返回 errno 风格结果。
    ///
    /// 等待有界：退避节奏先密后疏，耗尽仍未完成按超时处理，
    /// 调用方不会因工作循环卡死而永久自旋。
    pub fn wait_spin(&self) -> Result<(), i32> {
        for i in 0..50 {
            if self.done.load(Ordering::Acquire) {
                return match self.status.load(Ordering::Acquire) {
                    0 => Ok(()),
                    e => Err(e),
                };
            }
            if i < 30 {
                delay_spin_us(200);
            } else if i < 40 {
                delay_spin_ms(1);
            } else {
                delay_spin_ms(10);
            }
        }
        Err(MboxError::Timeout.to_errno())
    }
}

impl Default for TxToken {
    fn default() -> Self {
        Self::new()
    }
}

/// 完成上报方式：走协议层回调，或唤醒内部令牌。
pub enum TxCompletion {
    Endpoint(u8),
    Internal(Arc<TxToken>),
}

/// 发送队列：空闲描述符链 + 待发 FIFO。
pub(crate) struct TxQueue {
    free: Mutex<Vec<TxDescShell>>,
    pending: Mutex<VecDeque<TxRequest>>,
}

impl TxQueue {
    pub(crate) fn new(desc_cnt: usize) -> Self {
        let mut free = Vec::with_capacity(desc_cnt);
        for id in 0..desc_cnt {
            free.push(TxDescShell { id });
        }
        Self {
            free: Mutex::new(free),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn free_count(&self) -> usize {
        self.free.lock().len()
    }
}

impl<B: BusOps, C: MboxCallbacks> MboxTransport<B, C> {
    /// 提交一次发送。缓冲前部须已含帧头。描述符耗尽立即返回
    /// [`MboxError::NoFreeDesc`]，缓冲原样退还调用方处置。
    pub fn submit_tx(&self, addr: u32, buf: PktBuf, completion: TxCompletion) -> MboxResult {
        let shell = match self.tx.free.lock().pop() {
            Some(s) => s,
            None => return Err(MboxError::NoFreeDesc),
        };
        debug!(target: "wmbox::tx",
            "submit desc={} addr={:#x} len={} head={}",
            shell.id, addr, buf.len(), HexPrefix(buf.data()));
        self.tx.pending.lock().push_back(TxRequest {
            shell,
            addr,
            buf,
            completion,
        });
        self.tx_signal.raise();
        Ok(())
    }

    /// 发送循环体：按提交序清空待发队列。每条请求单独完成，一条失败
    /// 不影响后续。排空后若休眠请求已挂起则顺手完成迁移。
    pub fn tx_work(&self) {
        loop {
            let req = self.tx.pending.lock().pop_front();
            let req = match req {
                Some(r) => r,
                None => break,
            };
            let mut result = Ok(());
            if self.geometry.contains(req.addr) {
                // 写入 mailbox 窗口前必须确保设备醒着。唤醒失败按
                // 本条请求失败处理，仍继续后面的请求。
                if let Err(e) = self.wake() {
                    warn!(target: "wmbox::tx", "wake before tx failed: {}", e);
                    result = Err(e.to_errno());
                }
            }
            if result.is_ok() {
                result = self.bus.write(req.addr, req.buf.data());
                if let Err(e) = result {
                    warn!(target: "wmbox::tx",
                        "tx desc={} addr={:#x} failed (errno {})", req.shell.id, req.addr, e);
                }
            }
            match req.completion {
                TxCompletion::Endpoint(eid) => {
                    self.cb.notify_tx_complete(eid, req.buf, result);
                }
                TxCompletion::Internal(tok) => {
                    tok.complete(if let Err(e) = result { e } else { 0 });
                }
            }
            self.tx.free.lock().push(req.shell);
        }
        let want_sleep = *self.power.lock() == PowerState::RequestToSleep;
        if want_sleep {
            if let Err(e) = self.transition_sleep() {
                warn!(target: "wmbox::tx", "sleep transition failed: {}", e);
            }
        }
    }
}

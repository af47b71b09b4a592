//! 接收槽池
//!
//! 槽是一次接收的记账单元：缓冲加上帧长、聚合位置等元数据。池只限制
//! 存活槽数量，缓冲按需分配；槽成功派发后缓冲所有权转交上层，记账
//! 同步递减。

extern crate alloc;

use alloc::vec::Vec;

use pktbuf::PktBuf;
use spin::Mutex;

use crate::error::{MboxError, MboxResult};

/// 一个在途接收槽。
pub struct RxSlot {
    pub buf: PktBuf,
    /// 帧头通告的真实长度（帧头 + payload）。
    pub act_len: usize,
    /// 块对齐后的拉取长度。
    pub full_len: usize,
    /// 是否为聚合批次成员。
    pub part_of_bundle: bool,
    /// 聚合批次中的最后一帧（其 trailer lookahead 才可信）。
    pub last_in_bundle: bool,
    /// 整帧只有 trailer，解析后直接释放，不派发。
    pub trailer_only: bool,
}

/// 槽池。`live` 统计所有在途槽，包括已转交拉取/处理阶段的。
pub struct RxSlotPool {
    live: Mutex<usize>,
    cap: usize,
    max_buf: usize,
}

impl RxSlotPool {
    pub fn new(cap: usize, max_buf: usize) -> Self {
        Self {
            live: Mutex::new(0),
            cap,
            max_buf,
        }
    }

    /// 取一个槽。`full_len` 必须已块对齐；超出池缓冲上限先于容量检查
    /// 报 [`MboxError::InvalidSize`]，不占用记账名额。聚合位置随槽
    /// 一次定型，后续阶段只读。
    pub fn allocate(
        &self,
        act_len: usize,
        full_len: usize,
        part_of_bundle: bool,
        last_in_bundle: bool,
    ) -> MboxResult<RxSlot> {
        if full_len > self.max_buf {
            return Err(MboxError::InvalidSize {
                full_len,
                max: self.max_buf,
            });
        }
        {
            let mut live = self.live.lock();
            if *live >= self.cap {
                return Err(MboxError::NoFreeSlot);
            }
            *live += 1;
        }
        Ok(RxSlot {
            buf: PktBuf::alloc(full_len),
            act_len,
            full_len,
            part_of_bundle,
            last_in_bundle,
            trailer_only: false,
        })
    }

    /// 归还一个未派发的槽，缓冲随槽丢弃。
    pub fn free(&self, slot: RxSlot) {
        drop(slot.buf);
        let mut live = self.live.lock();
        debug_assert!(*live > 0);
        *live -= 1;
    }

    /// 派发路径：取走缓冲、注销槽。之后缓冲归上层所有。
    pub fn take_buf(&self, slot: RxSlot) -> PktBuf {
        let buf = slot.buf;
        let mut live = self.live.lock();
        debug_assert!(*live > 0);
        *live -= 1;
        buf
    }

    /// 当前在途槽数。
    pub fn live(&self) -> usize {
        *self.live.lock()
    }

    /// 批量归还。
    pub fn free_all(&self, slots: &mut Vec<RxSlot>) {
        while let Some(s) = slots.pop() {
            self.free(s);
        }
    }
}

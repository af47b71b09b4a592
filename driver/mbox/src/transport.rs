//! 传输核心载体
//!
//! [`MboxTransport`] 把总线、回调与各状态机聚在一起。工作循环体
//! （`irq_work`/`tx_work`/`rx_work`/`power_tick`）都是普通同步函数，
//! 由平台选择线程、中断下半部或主循环去驱动。

extern crate alloc;

use alloc::collections::VecDeque;

use core::sync::atomic::{AtomicU32, AtomicU8};

use pktbuf::PktBuf;
use spin::Mutex;

use crate::bus::BusOps;
use crate::callbacks::MboxCallbacks;
use crate::pool::RxSlotPool;
use crate::sync::SignalFlag;
use crate::tx::TxQueue;
use crate::types::{
    MboxConfig, MboxGeometry, PowerState, MBOX_MAX_BUF_SIZE, RX_SLOT_POOL_CAP, TX_DESC_CNT,
};

pub struct MboxTransport<B: BusOps, C: MboxCallbacks> {
    pub(crate) bus: B,
    pub(crate) cb: C,
    pub(crate) geometry: MboxGeometry,
    pub(crate) config: MboxConfig,
    pub(crate) pool: RxSlotPool,
    /// 已剥壳待派发的消息，processing 阶段生产，`rx_work` 消费。
    pub(crate) rx_queue: Mutex<VecDeque<(u8, PktBuf)>>,
    pub(crate) rx_signal: SignalFlag,
    pub(crate) tx: TxQueue,
    pub(crate) tx_signal: SignalFlag,
    pub(crate) power: Mutex<PowerState>,
    /// 不活跃倒计数，归零触发休眠请求。
    pub(crate) inactivity: AtomicU32,
    /// 中断使能影子寄存器（见 `irq` 模块）。
    pub(crate) irq_en: AtomicU8,
}

impl<B: BusOps, C: MboxCallbacks> MboxTransport<B, C> {
    /// 几何由挂接方按设备注入，本层不假设任何全局默认。
    pub fn new(bus: B, cb: C, geometry: MboxGeometry, config: MboxConfig) -> Self {
        // 聚合首帧额外块的极端情况下拉取长度会越过消息上限一个块，
        // 池上限随之放宽；消息本身的上限仍在取宽前单独校验。
        let pool_max = MBOX_MAX_BUF_SIZE + geometry.block_size as usize;
        let inactivity_ticks = config.inactivity_ticks;
        Self {
            bus,
            cb,
            geometry,
            config,
            pool: RxSlotPool::new(RX_SLOT_POOL_CAP, pool_max),
            rx_queue: Mutex::new(VecDeque::new()),
            rx_signal: SignalFlag::new(),
            tx: TxQueue::new(TX_DESC_CNT),
            tx_signal: SignalFlag::new(),
            power: Mutex::new(PowerState::Awake),
            inactivity: AtomicU32::new(inactivity_ticks),
            irq_en: AtomicU8::new(0),
        }
    }

    pub fn geometry(&self) -> &MboxGeometry {
        &self.geometry
    }

    pub fn config(&self) -> &MboxConfig {
        &self.config
    }

    pub fn callbacks(&self) -> &C {
        &self.cb
    }

    /// 派发队列有货时置位；平台的接收任务据此调用 [`Self::rx_work`]。
    pub fn rx_signal(&self) -> &SignalFlag {
        &self.rx_signal
    }

    /// 有待发请求（或休眠请求挂起）时置位；平台的发送任务据此调用
    /// [`Self::tx_work`]。
    pub fn tx_signal(&self) -> &SignalFlag {
        &self.tx_signal
    }

    /// 接收派发循环体：把 processing 阶段入队的消息交给协议层。
    /// 回调期间不持有队列锁。
    pub fn rx_work(&self) {
        loop {
            let next = self.rx_queue.lock().pop_front();
            match next {
                Some((eid, buf)) => self.cb.on_frame_ready(eid, buf),
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockBus, RecordingCallbacks};

    #[test]
    fn rx_work_drains_in_order() {
        let t = MboxTransport::new(
            MockBus::new(),
            RecordingCallbacks::new(),
            MboxGeometry::default(),
            MboxConfig::default(),
        );
        t.rx_queue
            .lock()
            .push_back((1, PktBuf::from_vec(alloc::vec![0xaa])));
        t.rx_queue
            .lock()
            .push_back((2, PktBuf::from_vec(alloc::vec![0xbb])));
        t.rx_work();
        let frames = t.cb.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].0, 1);
        assert_eq!(frames[1].0, 2);
        assert!(t.rx_queue.lock().is_empty());
    }

    #[test]
    fn injected_geometry_takes_effect() {
        use crate::types::MboxWindow;
        let geo = MboxGeometry {
            block_size: 128,
            block_mask: 127,
            htc: MboxWindow {
                addr: 0x2000,
                size: 0x0800,
            },
            boot: MboxWindow {
                addr: 0x3000,
                size: 0x0800,
            },
        };
        let t = MboxTransport::new(
            MockBus::new(),
            RecordingCallbacks::new(),
            geo,
            MboxConfig::default(),
        );
        assert_eq!(t.geometry().htc.addr, 0x2000);
        assert_eq!(t.geometry().padded_len(100), 128);
    }
}

//! 中断处理状态机
//!
//! 每次中断读一块状态寄存器，按固定优先级派发：先收帧，再 CPU 子
//! 中断，再 error，最后 counter。收帧阶段带"尚未收完"启发：一轮里
//! 处理过不止一帧、或 trailer 又带回了新 lookahead，就再查一轮状态。

extern crate alloc;

use alloc::vec::Vec;

use core::sync::atomic::Ordering;

use log::{debug, error, trace, warn};

use crate::bus::BusOps;
use crate::callbacks::MboxCallbacks;
use crate::error::{MboxError, MboxResult};
use crate::transport::MboxTransport;
use crate::types::{cpu_int, error_int, int_status, reg, IRQ_PROC_LEN, RX_LOOKAHEAD_MAX};

/// 一次读出的中断状态块。
#[derive(Debug, Clone, Copy)]
pub(crate) struct IrqStatus {
    pub host: u8,
    pub cpu: u8,
    pub error: u8,
    pub counter: u8,
    pub lookahead_valid: u8,
    pub lookahead: [u32; 2],
}

impl IrqStatus {
    pub(crate) fn parse(raw: &[u8; IRQ_PROC_LEN]) -> Self {
        Self {
            host: raw[0],
            cpu: raw[1],
            error: raw[2],
            counter: raw[3],
            lookahead_valid: raw[5],
            lookahead: [
                u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]),
                u32::from_le_bytes([raw[12], raw[13], raw[14], raw[15]]),
            ],
        }
    }
}

/// 状态机步骤。`irq_once` 在步骤间线性推进，每步决定下一步。
enum IrqStep {
    ReadStatus,
    DispatchRx(IrqStatus),
    DispatchAux(IrqStatus, bool),
    Finish(bool),
}

impl<B: BusOps, C: MboxCallbacks> MboxTransport<B, C> {
    /// 打开设备到主机的中断。影子值先行更新，掉电恢复后可按影子重放。
    pub fn enable_irq(&self) -> MboxResult {
        let en = int_status::DATA_MASK
            | int_status::CPU_MASK
            | int_status::ERROR_MASK
            | int_status::COUNTER_MASK;
        self.irq_en.store(en, Ordering::Release);
        self.bus
            .write(reg::INT_STATUS_ENABLE, &[en])
            .map_err(MboxError::BusIo)
    }

    /// 关断设备到主机的中断。
    pub fn disable_irq(&self) -> MboxResult {
        self.irq_en.store(0, Ordering::Release);
        self.bus
            .write(reg::INT_STATUS_ENABLE, &[0])
            .map_err(MboxError::BusIo)
    }

    /// 中断工作循环体：平台在硬中断（或轮询点）触发后调用。循环驱动
    /// `irq_once` 直到一轮报告"已收敛"，轮数超出预算报 Timeout 兜底。
    pub fn irq_work(&self) -> MboxResult {
        for _ in 0..self.config.irq_poll_budget {
            if self.irq_once()? {
                return Ok(());
            }
        }
        warn!(target: "wmbox::irq", "irq poll budget exhausted");
        Err(MboxError::Timeout)
    }

    /// 推进一整轮状态机。Ok(true) 表示中断源已收敛，可以退出循环。
    pub(crate) fn irq_once(&self) -> MboxResult<bool> {
        let mut step = IrqStep::ReadStatus;
        // 可恢复错误先记下，剩余阶段照常推进，收尾时再上报第一个。
        let mut first_err: Option<MboxError> = None;
        loop {
            step = match step {
                IrqStep::ReadStatus => {
                    // 上电早期中断尚未使能时会有杂散触发，静默返回，
                    // 避免访问可能还在睡的寄存器区。
                    if self.irq_en.load(Ordering::Acquire) == 0 {
                        trace!(target: "wmbox::irq", "spurious irq before enable");
                        return Ok(true);
                    }
                    let mut raw = [0u8; IRQ_PROC_LEN];
                    if let Err(e) = self.bus.read(reg::HOST_INT_STATUS, &mut raw) {
                        error!(target: "wmbox::irq", "status read failed (errno {})", e);
                        self.cb.request_recovery();
                        return Err(MboxError::BusIo(e));
                    }
                    IrqStep::DispatchRx(IrqStatus::parse(&raw))
                }
                IrqStep::DispatchRx(st) => {
                    let mut done = true;
                    if st.host & int_status::DATA_MASK != 0 && st.lookahead_valid & 0x01 != 0 {
                        let mut las = Vec::new();
                        for &la in &st.lookahead {
                            if la != 0 && las.len() < RX_LOOKAHEAD_MAX {
                                las.push(la);
                            }
                        }
                        if !las.is_empty() {
                            match self.drain_rx(las) {
                                Ok(d) => done = d,
                                Err(e) if e.is_fatal() => return Err(e),
                                Err(e) => {
                                    if first_err.is_none() {
                                        first_err = Some(e);
                                    }
                                }
                            }
                        }
                    }
                    // 收帧没收敛也要把剩余子中断查完再回去重读状态，
                    // 不能让锁存位等一整轮收帧。
                    IrqStep::DispatchAux(st, done)
                }
                IrqStep::DispatchAux(st, done) => {
                    if st.host & int_status::CPU_MASK != 0 {
                        let ack = st.cpu;
                        if let Err(e) = self.bus.write(reg::CPU_INT_STATUS, &[ack]) {
                            warn!(target: "wmbox::irq", "cpu ack write failed (errno {})", e);
                        }
                        if st.cpu & cpu_int::FATAL != 0 {
                            error!(target: "wmbox::irq", "firmware fatal interrupt");
                            self.cb.request_recovery();
                            return Err(MboxError::FirmwareFatal);
                        }
                        debug!(target: "wmbox::irq", "cpu interrupt {:#04x}", st.cpu);
                    }
                    if st.host & int_status::ERROR_MASK != 0 {
                        let ack = st.error;
                        if let Err(e) = self.bus.write(reg::ERROR_INT_STATUS, &[ack]) {
                            warn!(target: "wmbox::irq", "error ack write failed (errno {})", e);
                        }
                        let e = MboxError::FifoError {
                            rx_underflow: st.error & error_int::RX_UNDERFLOW != 0,
                            tx_overflow: st.error & error_int::TX_OVERFLOW != 0,
                        };
                        warn!(target: "wmbox::irq", "{}", e);
                        if first_err.is_none() {
                            first_err = Some(e);
                        }
                    }
                    if st.host & int_status::COUNTER_MASK != 0 {
                        let ack = st.counter;
                        if let Err(e) = self.bus.write(reg::COUNTER_INT_STATUS, &[ack]) {
                            warn!(target: "wmbox::irq", "counter ack write failed (errno {})", e);
                        }
                        debug!(target: "wmbox::irq", "counter interrupt {:#04x}", st.counter);
                    }
                    IrqStep::Finish(done)
                }
                IrqStep::Finish(done) => {
                    return match first_err {
                        Some(e) => Err(e),
                        None => Ok(done),
                    };
                }
            };
        }
    }

    /// 收帧子循环：一批 lookahead 可能经 trailer 连环带出后续批次。
    /// 批次数受 `rx_pass_budget` 保底，超出视为设备异常。
    fn drain_rx(&self, mut lookaheads: Vec<u32>) -> MboxResult<bool> {
        let mut total = 0usize;
        let mut chained = false;
        let mut passes = 0u32;
        while !lookaheads.is_empty() {
            passes += 1;
            if passes > self.config.rx_pass_budget {
                error!(target: "wmbox::rx", "rx pass budget exhausted");
                return Err(MboxError::Timeout);
            }
            let (dispatched, next) = self.mbox_rx_process(&lookaheads)?;
            total += dispatched;
            chained = chained || !next.is_empty();
            lookaheads = next;
        }
        // 一轮里处理了多帧、或有 trailer 带回新 lookahead，都说明
        // 设备侧可能还在持续产出，让上层重读一次状态确认。
        Ok(total < 2 && !chained)
    }
}

//! 引导交换
//!
//! 传输层就绪前与固件的原始对话：没有帧头、没有聚合、没有 trailer，
//! 请求与响应都是裸字节，只按块对齐整读整写。没有中断，全靠轮询。
//! 信用寄存器必须按 4 字节对齐整读，仅低字节有效。

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;

use log::{debug, trace};

use crate::bus::BusOps;
use crate::callbacks::MboxCallbacks;
use crate::error::{MboxError, MboxResult};
use crate::header::HexPrefix;
use crate::sync::{delay_spin_ms, delay_spin_us};
use crate::transport::MboxTransport;
use crate::types::reg;

impl<B: BusOps, C: MboxCallbacks> MboxTransport<B, C> {
    /// 一次引导交换。`request` 为 None 时跳过发送（纯收响应）；
    /// `expect_resp` 为 None 时发完即返回空。响应从窗口起点整块读出，
    /// 截取前 `expect_resp` 字节原样返回。
    pub fn boot_exchange(
        &self,
        request: Option<&[u8]>,
        expect_resp: Option<usize>,
    ) -> MboxResult<Vec<u8>> {
        let addr = self.geometry.boot.addr;
        if let Some(req) = request {
            self.boot_wait_credit()?;
            let full = self.geometry.padded_len(req.len());
            let mut buf = vec![0u8; full];
            buf[..req.len()].copy_from_slice(req);
            debug!(target: "wmbox::boot",
                "boot tx {} bytes head={}", full, HexPrefix(&buf));
            self.bus.write(addr, &buf).map_err(MboxError::BusIo)?;
        }
        let Some(resp_len) = expect_resp else {
            return Ok(Vec::new());
        };
        self.boot_wait_lookahead_valid()?;
        let full = self.geometry.padded_len(resp_len);
        let mut buf = vec![0u8; full];
        self.bus.read(addr, &mut buf).map_err(MboxError::BusIo)?;
        debug!(target: "wmbox::boot", "boot rx {} bytes head={}", resp_len, HexPrefix(&buf));
        buf.truncate(resp_len);
        Ok(buf)
    }

    /// 轮询发送信用。延时随轮数升档：先密后疏，不把总线打满。
    fn boot_wait_credit(&self) -> MboxResult {
        for i in 0..self.config.boot_poll_retries {
            let mut raw = [0u8; 4];
            self.bus
                .read(reg::CREDIT_COUNT, &mut raw)
                .map_err(MboxError::BusIo)?;
            if raw[0] > 0 {
                trace!(target: "wmbox::boot", "boot credit {}", raw[0]);
                return Ok(());
            }
            if i < 30 {
                delay_spin_us(200);
            } else if i < 40 {
                delay_spin_ms(1);
            } else {
                delay_spin_ms(10);
            }
        }
        Err(MboxError::Timeout)
    }

    /// 轮询响应就绪位。
    fn boot_wait_lookahead_valid(&self) -> MboxResult {
        for i in 0..self.config.boot_poll_retries {
            let mut v = [0u8; 1];
            self.bus
                .read(reg::RX_LOOKAHEAD_VALID, &mut v)
                .map_err(MboxError::BusIo)?;
            if v[0] & 0x01 != 0 {
                return Ok(());
            }
            if i < 30 {
                delay_spin_us(200);
            } else if i < 40 {
                delay_spin_ms(1);
            } else {
                delay_spin_ms(10);
            }
        }
        Err(MboxError::Timeout)
    }
}

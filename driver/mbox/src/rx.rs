//! 接收帧化引擎
//!
//! 接收分三个阶段：按 lookahead 预分配槽（allocation）、把帧体从窗口
//! 拉进槽缓冲（fetching）、逐槽剥壳派发（processing）。聚合簇整簇走
//! 一次总线读，成员再按各自帧头拆分。

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;

use log::{debug, error, trace};

use crate::bus::BusOps;
use crate::callbacks::MboxCallbacks;
use crate::error::{MboxError, MboxResult};
use crate::header::{FrameHeader, HexPrefix, FRAME_HDR_LEN};
use crate::pool::RxSlot;
use crate::transport::MboxTransport;
use crate::types::{MBOX_EP_COUNT, MBOX_MAX_MSG_PAYLOAD};

impl<B: BusOps, C: MboxCallbacks> MboxTransport<B, C> {
    /// allocation 阶段：lookahead 词逐个展开成槽。聚合首帧展开为
    /// 成员槽在前、首帧槽收尾（簇内最后一帧的 trailer 才携带可信的
    /// 后续 lookahead）。超限 payload 在此处即触发设备恢复。
    pub(crate) fn alloc_rx_batch(&self, lookaheads: &[u32]) -> MboxResult<Vec<RxSlot>> {
        let mut slots: Vec<RxSlot> = Vec::new();
        for &la in lookaheads {
            let hdr = FrameHeader::from_lookahead(la);
            if hdr.payload_len as usize > MBOX_MAX_MSG_PAYLOAD {
                error!(target: "wmbox::rx",
                    "oversize frame advertised: payload {} (lookahead {:#010x})",
                    hdr.payload_len, la);
                self.cb.request_recovery();
                self.pool.free_all(&mut slots);
                return Err(MboxError::OversizeFrame {
                    payload_len: hdr.payload_len as usize,
                    max: MBOX_MAX_MSG_PAYLOAD,
                });
            }
            let act_len = hdr.frame_len();
            let full_len = self.geometry.padded_len(act_len);
            let bundle = hdr.bundle_count().min(self.config.bundle_max);
            for _ in 0..bundle {
                let s = match self.pool.allocate(act_len, full_len, true, false) {
                    Ok(s) => s,
                    Err(e) => {
                        self.pool.free_all(&mut slots);
                        return Err(e);
                    }
                };
                slots.push(s);
            }
            // 首帧可能跨块，多拉一个块；只有首帧需要，成员长度
            // 以各自帧头为准在 fetching 阶段重新校验。
            let opener_full = if hdr.needs_extra_block() {
                full_len + self.geometry.block_size as usize
            } else {
                full_len
            };
            let opener =
                match self
                    .pool
                    .allocate(act_len, opener_full, bundle > 0, bundle > 0)
                {
                    Ok(s) => s,
                    Err(e) => {
                        self.pool.free_all(&mut slots);
                        return Err(e);
                    }
                };
            slots.push(opener);
        }
        Ok(slots)
    }

    /// fetching 阶段：单帧直读进槽缓冲；聚合簇把全簇长度一次读进
    /// 暂存区再拆分。拆分后用帧内真实帧头覆盖登记长度。
    pub(crate) fn fetch_rx_batch(&self, slots: &mut [RxSlot]) -> MboxResult {
        let addr = self.geometry.htc.addr;
        let mut i = 0;
        while i < slots.len() {
            if slots[i].part_of_bundle {
                let mut end = i;
                while !slots[end].last_in_bundle {
                    end += 1;
                }
                let total: usize = slots[i..=end].iter().map(|s| s.full_len).sum();
                let mut arena = vec![0u8; total];
                self.bus
                    .read_fixed(addr, &mut arena)
                    .map_err(MboxError::BusIo)?;
                trace!(target: "wmbox::rx",
                    "bundle fetch {} frames {} bytes head={}",
                    end - i + 1, total, HexPrefix(&arena));
                let mut off = 0;
                for slot in &mut slots[i..=end] {
                    let chunk = &arena[off..off + slot.full_len];
                    slot.buf.data_mut()[..slot.full_len].copy_from_slice(chunk);
                    slot.buf.set_len(slot.full_len);
                    off += slot.full_len;
                    Self::refresh_slot_len(slot)?;
                }
                i = end + 1;
            } else {
                let full = slots[i].full_len;
                let slot = &mut slots[i];
                self.bus
                    .read_fixed(addr, &mut slot.buf.data_mut()[..full])
                    .map_err(MboxError::BusIo)?;
                slot.buf.set_len(full);
                Self::refresh_slot_len(slot)?;
                i += 1;
            }
        }
        Ok(())
    }

    /// 以拉回的真实帧头修正槽登记。帧比预留缓冲还长说明设备与主机
    /// 已失步。
    fn refresh_slot_len(slot: &mut RxSlot) -> MboxResult {
        let hdr = FrameHeader::parse(slot.buf.data())?;
        let act = hdr.frame_len();
        if act > slot.full_len {
            return Err(MboxError::Framing("frame longer than fetched length"));
        }
        slot.act_len = act;
        Ok(())
    }

    /// processing 阶段：逐槽剥壳。任一槽出错时当前槽与其余未处理槽
    /// 全部归还池，再向上传播。返回 (派发数, 新 lookahead)。
    pub(crate) fn process_rx_batch(
        &self,
        mut slots: Vec<RxSlot>,
    ) -> MboxResult<(usize, Vec<u32>)> {
        let mut dispatched = 0;
        let mut lookaheads = Vec::new();
        slots.reverse();
        while let Some(slot) = slots.pop() {
            match self.process_one_slot(slot, &mut lookaheads) {
                Ok(n) => dispatched += n,
                Err(e) => {
                    self.pool.free_all(&mut slots);
                    return Err(e);
                }
            }
        }
        Ok((dispatched, lookaheads))
    }

    /// 剥壳一个槽。槽的归宿在此一次定清：派发则入队并注销记账，
    /// trailer-only 或出错则归还池。返回派发数（0 或 1）。
    fn process_one_slot(&self, mut slot: RxSlot, lookaheads: &mut Vec<u32>) -> MboxResult<usize> {
        macro_rules! bail {
            ($e:expr) => {{
                self.pool.free(slot);
                return Err($e);
            }};
        }
        let hdr = match FrameHeader::parse(slot.buf.data()) {
            Ok(h) => h,
            Err(e) => bail!(e),
        };
        if hdr.eid >= MBOX_EP_COUNT {
            bail!(MboxError::Framing("endpoint id out of range"));
        }
        let payload = hdr.payload_len as usize;
        let mut trailer_len = 0usize;
        if hdr.has_trailer() {
            trailer_len = hdr.trailer_len as usize;
            if trailer_len > payload {
                bail!(MboxError::Framing("trailer longer than payload"));
            }
            let start = FRAME_HDR_LEN + payload - trailer_len;
            let tr = &slot.buf.data()[start..FRAME_HDR_LEN + payload];
            let replies = self.cb.on_trailer(hdr.eid, tr);
            // 簇内非末帧的 trailer 回报的 lookahead 描述的是簇内
            // 下一帧，该帧已经拉回来了，采纳会导致重复拉取。
            if !slot.part_of_bundle || slot.last_in_bundle {
                for la in replies {
                    if lookaheads.len() < self.config.lookahead_max && la != 0 {
                        lookaheads.push(la);
                    }
                }
            }
        }
        if trailer_len == payload {
            trace!(target: "wmbox::rx", "trailer-only frame on ep {}", hdr.eid);
            slot.trailer_only = true;
            self.pool.free(slot);
            return Ok(0);
        }
        slot.buf.set_len(slot.act_len);
        slot.buf.trim(slot.act_len - trailer_len);
        slot.buf.pull(FRAME_HDR_LEN);
        debug!(target: "wmbox::rx",
            "deliver ep={} seq={} len={}", hdr.eid, hdr.seq, slot.buf.len());
        let eid = hdr.eid;
        let buf = self.pool.take_buf(slot);
        self.rx_queue.lock().push_back((eid, buf));
        self.rx_signal.raise();
        Ok(1)
    }

    /// 一轮完整接收：分配、拉取、剥壳。返回 (派发数, 新 lookahead)。
    pub(crate) fn mbox_rx_process(&self, lookaheads: &[u32]) -> MboxResult<(usize, Vec<u32>)> {
        let mut slots = self.alloc_rx_batch(lookaheads)?;
        if let Err(e) = self.fetch_rx_batch(&mut slots) {
            self.pool.free_all(&mut slots);
            return Err(e);
        }
        self.process_rx_batch(slots)
    }
}

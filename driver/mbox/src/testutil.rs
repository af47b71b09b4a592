//! 测试桩：脚本化总线与记录型回调。

extern crate alloc;

use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use pktbuf::PktBuf;

use crate::bus::BusOps;
use crate::callbacks::MboxCallbacks;
use crate::header::{flags, FrameHeader, FRAME_HDR_LEN};
use crate::types::IRQ_PROC_LEN;

/// 脚本化总线。每个地址一条读队列，按 FIFO 回放；队列空读全零。
/// 所有写入按地址记录。
pub(crate) struct MockBus {
    reads: Mutex<BTreeMap<u32, VecDeque<Vec<u8>>>>,
    read_counts: Mutex<BTreeMap<u32, usize>>,
    writes: Mutex<Vec<(u32, Vec<u8>)>>,
    fail_write: Mutex<Option<i32>>,
    fail_read: Mutex<Option<i32>>,
}

impl MockBus {
    pub(crate) fn new() -> Self {
        Self {
            reads: Mutex::new(BTreeMap::new()),
            read_counts: Mutex::new(BTreeMap::new()),
            writes: Mutex::new(Vec::new()),
            fail_write: Mutex::new(None),
            fail_read: Mutex::new(None),
        }
    }

    pub(crate) fn push_read(&self, addr: u32, data: Vec<u8>) {
        self.reads.lock().entry(addr).or_default().push_back(data);
    }

    pub(crate) fn read_count(&self, addr: u32) -> usize {
        self.read_counts.lock().get(&addr).copied().unwrap_or(0)
    }

    pub(crate) fn writes_at(&self, addr: u32) -> Vec<Vec<u8>> {
        self.writes
            .lock()
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, d)| d.clone())
            .collect()
    }

    pub(crate) fn fail_next_write(&self, errno: i32) {
        *self.fail_write.lock() = Some(errno);
    }

    pub(crate) fn fail_next_read(&self, errno: i32) {
        *self.fail_read.lock() = Some(errno);
    }
}

impl BusOps for MockBus {
    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<(), i32> {
        if let Some(e) = self.fail_read.lock().take() {
            return Err(e);
        }
        *self.read_counts.lock().entry(addr).or_default() += 1;
        buf.fill(0);
        if let Some(q) = self.reads.lock().get_mut(&addr) {
            if let Some(data) = q.pop_front() {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
            }
        }
        Ok(())
    }

    fn write(&self, addr: u32, buf: &[u8]) -> Result<(), i32> {
        if let Some(e) = self.fail_write.lock().take() {
            return Err(e);
        }
        self.writes.lock().push((addr, buf.to_vec()));
        Ok(())
    }
}

/// 记录型回调：所有事件按序留痕，trailer 回复按预置队列回放。
pub(crate) struct RecordingCallbacks {
    frames: Mutex<Vec<(u8, Vec<u8>)>>,
    trailers: Mutex<Vec<(u8, Vec<u8>)>>,
    trailer_replies: Mutex<VecDeque<Vec<u32>>>,
    tx_done: Mutex<Vec<(u8, Result<(), i32>)>>,
    recoveries: Mutex<usize>,
}

impl RecordingCallbacks {
    pub(crate) fn new() -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
            trailers: Mutex::new(Vec::new()),
            trailer_replies: Mutex::new(VecDeque::new()),
            tx_done: Mutex::new(Vec::new()),
            recoveries: Mutex::new(0),
        }
    }

    pub(crate) fn frames(&self) -> Vec<(u8, Vec<u8>)> {
        self.frames.lock().clone()
    }

    pub(crate) fn trailers(&self) -> Vec<(u8, Vec<u8>)> {
        self.trailers.lock().clone()
    }

    pub(crate) fn push_trailer_reply(&self, replies: Vec<u32>) {
        self.trailer_replies.lock().push_back(replies);
    }

    pub(crate) fn tx_done(&self) -> Vec<(u8, Result<(), i32>)> {
        self.tx_done.lock().clone()
    }

    pub(crate) fn recoveries(&self) -> usize {
        *self.recoveries.lock()
    }
}

impl MboxCallbacks for RecordingCallbacks {
    fn on_frame_ready(&self, eid: u8, buf: PktBuf) {
        self.frames.lock().push((eid, buf.into_vec()));
    }

    fn on_trailer(&self, eid: u8, trailer: &[u8]) -> Vec<u32> {
        self.trailers.lock().push((eid, trailer.to_vec()));
        self.trailer_replies
            .lock()
            .pop_front()
            .unwrap_or_default()
    }

    fn notify_tx_complete(&self, eid: u8, _buf: PktBuf, result: Result<(), i32>) {
        self.tx_done.lock().push((eid, result));
    }

    fn request_recovery(&self) {
        *self.recoveries.lock() += 1;
    }
}

/// 组一条帧：帧头 + payload（未块对齐）。`trailer_len > 0` 时自动
/// 置 TRAILER_PRESENT，payload 的末尾 `trailer_len` 字节视为 trailer。
pub(crate) fn frame_buf(eid: u8, fl: u8, payload: &[u8], trailer_len: u8) -> Vec<u8> {
    let mut fl = fl;
    if trailer_len > 0 {
        fl |= flags::TRAILER_PRESENT;
    }
    let hdr = FrameHeader {
        eid,
        flags: fl,
        payload_len: payload.len() as u16,
        trailer_len,
        seq: 0,
    };
    let mut buf = vec![0u8; FRAME_HDR_LEN + payload.len()];
    hdr.write_to(&mut buf);
    buf[FRAME_HDR_LEN..].copy_from_slice(payload);
    buf
}

/// 组一个中断状态块。`la0` 非零时置响应就绪位。
pub(crate) fn status_block(host: u8, cpu: u8, error: u8, counter: u8, la0: u32, la1: u32) -> Vec<u8> {
    let mut raw = vec![0u8; IRQ_PROC_LEN];
    raw[0] = host;
    raw[1] = cpu;
    raw[2] = error;
    raw[3] = counter;
    raw[5] = if la0 != 0 { 1 } else { 0 };
    raw[8..12].copy_from_slice(&la0.to_le_bytes());
    raw[12..16].copy_from_slice(&la1.to_le_bytes());
    raw
}

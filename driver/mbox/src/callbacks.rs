//! 上层回调接口
//!
//! 传输核心通过 [`MboxCallbacks`] 把收到的帧、trailer 与发送完成事件
//! 交还协议层，自身不解析 payload 内容。

extern crate alloc;

use alloc::vec::Vec;

use pktbuf::PktBuf;

/// 协议层需要实现的回调集合。所有方法都可能在工作循环上下文被调用，
/// 实现方不得在其中回调传输核心的阻塞接口。
pub trait MboxCallbacks: Send + Sync {
    /// 一条完整消息就绪。`buf` 已剥掉帧头与 trailer，只剩 payload。
    fn on_frame_ready(&self, eid: u8, buf: PktBuf);

    /// 帧尾 trailer 交由协议层解析，返回其中嵌入的 lookahead 字
    /// （没有则返回空）。
    fn on_trailer(&self, eid: u8, trailer: &[u8]) -> Vec<u32>;

    /// 一次发送请求完成（成功或失败），缓冲归还协议层。
    fn notify_tx_complete(&self, eid: u8, buf: PktBuf, result: Result<(), i32>);

    /// 设备状态已不可信，请求整机恢复。传输核心只上报一次原因现场，
    /// 复位流程由平台执行。
    fn request_recovery(&self);
}

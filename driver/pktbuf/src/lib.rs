//! PktBuf — mailbox 帧缓冲
//!
//! 布局：`[ 已剥离前缀 | data (len) | 未使用尾部 ]`。
//! 一块缓冲在收包路径上经历三步：总线按 `full_len` 整块写入 → `set_len`
//! 收窄到实际帧长 → `trim` 截掉 trailer、`pull` 剥离帧头后移交上层。
//! 容量在 `alloc` 时一次确定，之后不再增长。

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use alloc::vec::Vec;

/// 单帧缓冲。
///
/// - `data()`：当前有效载荷（前缀剥离之后、`len` 截止）
/// - `set_len(n)`：收包后设定有效长度（不超过剩余容量）
/// - `pull(n)`：从头部剥离 n 字节（帧头）
/// - `trim(n)`：把有效长度截短到 n 字节（去 trailer）
#[derive(Clone, Debug)]
pub struct PktBuf {
    /// 整块存储：[0..head] 为已剥离前缀，[head..head+len] 为有效 data
    storage: Vec<u8>,
    head: usize,
    len: usize,
}

impl PktBuf {
    /// 分配指定容量的缓冲，初始有效长度 0。
    pub fn alloc(capacity: usize) -> Self {
        let mut storage = Vec::with_capacity(capacity);
        storage.resize(capacity, 0);
        PktBuf {
            storage,
            head: 0,
            len: 0,
        }
    }

    /// 用调用方已有的字节构造（发送路径：有效长度即 `bytes.len()`）。
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        PktBuf {
            storage: bytes,
            head: 0,
            len,
        }
    }

    /// 总容量（含已剥离前缀）。
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// 当前有效载荷长度。
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 有效载荷只读视图。
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.storage[self.head..self.head + self.len]
    }

    /// 从 head 起的整个可写区域（总线整块写入用，配合 `set_len`）。
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.head..]
    }

    /// 设定有效长度；超出剩余容量时收窄到容量上限。
    #[inline]
    pub fn set_len(&mut self, len: usize) {
        let max = self.storage.len() - self.head;
        self.len = len.min(max);
    }

    /// 从头部剥离 n 字节（data 前移、len 减少）。
    #[inline]
    pub fn pull(&mut self, n: usize) {
        let consume = n.min(self.len);
        self.head += consume;
        self.len -= consume;
    }

    /// 把有效长度截短到 n 字节；n 不小于当前长度时无操作。
    #[inline]
    pub fn trim(&mut self, n: usize) {
        if n < self.len {
            self.len = n;
        }
    }

    /// 交出有效载荷的独立拷贝并消费缓冲。
    pub fn into_vec(self) -> Vec<u8> {
        let mut v = self.storage;
        v.truncate(self.head + self.len);
        v.drain(..self.head);
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_then_strip() {
        let mut buf = PktBuf::alloc(64);
        assert_eq!(buf.len(), 0);
        buf.data_mut()[..10].copy_from_slice(&[9, 8, 7, 6, 5, 4, 3, 2, 1, 0]);
        buf.set_len(10);
        assert_eq!(buf.data(), &[9, 8, 7, 6, 5, 4, 3, 2, 1, 0]);
        // 去掉 2 字节 trailer，再剥 4 字节帧头
        buf.trim(8);
        buf.pull(4);
        assert_eq!(buf.data(), &[5, 4, 3, 2]);
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn set_len_clamped_to_capacity() {
        let mut buf = PktBuf::alloc(16);
        buf.set_len(100);
        assert_eq!(buf.len(), 16);
        buf.pull(4);
        buf.set_len(100);
        assert_eq!(buf.len(), 12);
    }

    #[test]
    fn into_vec_keeps_only_payload() {
        let mut buf = PktBuf::from_vec(alloc::vec![1, 2, 3, 4, 5, 6]);
        buf.pull(2);
        buf.trim(3);
        assert_eq!(buf.into_vec(), alloc::vec![3, 4, 5]);
    }
}

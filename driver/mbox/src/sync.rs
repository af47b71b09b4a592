//! 自旋延时与轻量信号
//!
//! 传输核心不依赖内核定时器：有界等待用标定过的空转循环实现，
//! 工作循环之间的唤醒用单比特信号传递。

use core::sync::atomic::{AtomicBool, Ordering};

/// 每毫秒空转次数的保守标定值。偏大只会让轮询更密，不影响正确性。
pub const LOOPS_PER_MS: u64 = 100_000;

/// 空转约 `us` 微秒。
#[inline]
pub fn delay_spin_us(us: u64) {
    let loops = LOOPS_PER_MS * us / 1000;
    for _ in 0..loops {
        core::hint::spin_loop();
    }
}

/// 空转约 `ms` 毫秒。
#[inline]
pub fn delay_spin_ms(ms: u64) {
    delay_spin_us(ms * 1000);
}

/// 单比特事件信号。raise 置位，take 取走并清零。多次 raise 合并为一次,
/// 消费方循环体自己负责把积压事件处理干净。
pub struct SignalFlag(AtomicBool);

impl SignalFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    #[inline]
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for SignalFlag {
    fn default() -> Self {
        Self::new()
    }
}

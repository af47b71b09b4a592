//! mailbox 几何、寄存器映射与常量
//!
//! 所有对窗口的读写长度都必须先按 `block_mask` 向上取整，未对齐的
//! 长度会使设备侧 FIFO 指针错位。

/// mailbox 块大小：窗口读写长度的对齐粒度。
pub const MBOX_BLOCK_SIZE: u32 = 256;

/// 接收缓冲的最大尺寸（块对齐后的 full_len 上限）。
pub const MBOX_MAX_BUF_SIZE: usize = 4096;

/// 单条消息 payload 上限；超过即视为固件已失去同步，需触发设备恢复。
pub const MBOX_MAX_MSG_PAYLOAD: usize = MBOX_MAX_BUF_SIZE - crate::header::FRAME_HDR_LEN;

/// 逻辑 endpoint 数量；帧头中的 endpoint id 必须小于该值。
pub const MBOX_EP_COUNT: u8 = 8;

/// 接收槽池同时存活的槽数上限。
pub const RX_SLOT_POOL_CAP: usize = 64;

/// 发送描述符总数（空闲链初始长度）。
pub const TX_DESC_CNT: usize = 64;

/// 单簇成员数上限；帧头通告的 bundle 计数超过时按此截断。
pub const RX_BUNDLE_MAX: usize = 8;

/// 一次批处理可携带的 lookahead 词数上限。
pub const RX_LOOKAHEAD_MAX: usize = 8;

/// Function 1 寄存器偏移。
pub mod reg {
    /// 中断状态块起点（host/cpu/error/counter + mbox_frame + lookahead），
    /// 一次总线事务读 [`super::IRQ_PROC_LEN`] 字节。
    pub const HOST_INT_STATUS: u32 = 0x0400;
    /// CPU 子中断锁存位的确认写回地址。
    pub const CPU_INT_STATUS: u32 = 0x0401;
    /// error 子中断锁存位的确认写回地址。
    pub const ERROR_INT_STATUS: u32 = 0x0402;
    /// counter 子中断锁存位的确认写回地址。
    pub const COUNTER_INT_STATUS: u32 = 0x0403;
    /// 中断使能寄存器；写 0 即全部关断。
    pub const INT_STATUS_ENABLE: u32 = 0x0418;
    /// 睡眠控制：写 1 允许休眠，写 0 保持唤醒。
    pub const SLEEP_CTRL: u32 = 0x0420;
    /// 睡眠状态：bit0 为 1 表示 mailbox 区域已可访问。
    pub const SLEEP_STATE: u32 = 0x0424;
    /// 引导期信用计数；须按 4 字节对齐整读，仅低字节有效。
    pub const CREDIT_COUNT: u32 = 0x0440;
    /// 引导期响应就绪位（lookahead valid 的别名视图）。
    pub const RX_LOOKAHEAD_VALID: u32 = 0x0405;
}

/// 中断状态块总长（一次读出）。
pub const IRQ_PROC_LEN: usize = 16;

/// host_int_status 位域。
pub mod int_status {
    /// bit0..3：对应 mailbox 0..3 有数据待取。
    pub const DATA_MASK: u8 = 0x0F;
    /// CPU（固件）子中断汇总位。
    pub const CPU_MASK: u8 = 0x10;
    /// error 子中断汇总位。
    pub const ERROR_MASK: u8 = 0x20;
    /// counter（调试断言）子中断汇总位。
    pub const COUNTER_MASK: u8 = 0x40;
}

/// cpu_int_status 位域。
pub mod cpu_int {
    /// 固件断言/崩溃，必须整机恢复。
    pub const FATAL: u8 = 0x01;
}

/// error_int_status 位域。
pub mod error_int {
    /// 设备侧 RX FIFO 下溢。
    pub const RX_UNDERFLOW: u8 = 0x01;
    /// 设备侧 TX FIFO 上溢。
    pub const TX_OVERFLOW: u8 = 0x02;
}

/// sleep_state 位域。
pub mod sleep {
    /// mailbox 区域就绪（唤醒完成）。
    pub const AWAKE_READY: u8 = 0x01;
}

/// 一个 mailbox 窗口：设备地址空间中的固定地址/长度区间。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MboxWindow {
    pub addr: u32,
    pub size: u32,
}

impl MboxWindow {
    /// 地址是否落在本窗口内。
    #[inline]
    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.addr && addr < self.addr + self.size
    }
}

/// 每设备固定的 mailbox 几何描述。
#[derive(Debug, Clone)]
pub struct MboxGeometry {
    /// 窗口读写长度的对齐块大小。
    pub block_size: u32,
    /// `block_size - 1`，供取整用。
    pub block_mask: u32,
    /// 主传输窗口（帧化收发走这里）。
    pub htc: MboxWindow,
    /// 引导交换窗口（仅传输层就绪前使用）。
    pub boot: MboxWindow,
}

impl Default for MboxGeometry {
    fn default() -> Self {
        Self {
            block_size: MBOX_BLOCK_SIZE,
            block_mask: MBOX_BLOCK_SIZE - 1,
            htc: MboxWindow {
                addr: 0x0800,
                size: 0x0800,
            },
            boot: MboxWindow {
                addr: 0x1800,
                size: 0x0800,
            },
        }
    }
}

impl MboxGeometry {
    /// `len` 向上取整到块边界后的长度（不小于 `len` 的最小块倍数）。
    #[inline]
    pub fn padded_len(&self, len: usize) -> usize {
        (len + self.block_mask as usize) & !(self.block_mask as usize)
    }

    /// 地址是否落在任一 mailbox 窗口内（电源门控用）。
    #[inline]
    pub fn contains(&self, addr: u32) -> bool {
        self.htc.contains(addr) || self.boot.contains(addr)
    }
}

/// 传输层可调参数。
#[derive(Debug, Clone)]
pub struct MboxConfig {
    /// 单簇成员数上限（帧头通告值超过时截断）。
    pub bundle_max: usize,
    /// 单批 lookahead 词数上限。
    pub lookahead_max: usize,
    /// RX 循环单次中断调用内的批次预算（活性保底，非正常出口）。
    pub rx_pass_budget: u32,
    /// `irq_work` 重查状态寄存器的轮数上限。
    pub irq_poll_budget: u32,
    /// 唤醒就绪轮询的重试次数上限。
    pub wake_poll_retries: u32,
    /// 唤醒就绪轮询的单次延时（微秒）。
    pub wake_poll_delay_us: u32,
    /// 引导交换信用/就绪位轮询的重试次数上限。
    pub boot_poll_retries: u32,
    /// 唤醒后允许进入 RequestToSleep 前的空闲 tick 数。
    pub inactivity_ticks: u32,
}

impl Default for MboxConfig {
    fn default() -> Self {
        Self {
            bundle_max: RX_BUNDLE_MAX,
            lookahead_max: RX_LOOKAHEAD_MAX,
            rx_pass_budget: 64,
            irq_poll_budget: 32,
            wake_poll_retries: 50,
            wake_poll_delay_us: 125,
            boot_poll_retries: 50,
            inactivity_ticks: 30,
        }
    }
}

/// mailbox 区域电源状态。迁移串行化于一把锁内；睡眠方向先置状态后写
/// 硬件，唤醒方向轮询就绪后才置状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Awake,
    Asleep,
    RequestToSleep,
}

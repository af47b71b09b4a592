//! 底层总线抽象
//!
//! 传输核心不直接操作控制器，所有读写经由平台实现的 [`BusOps`]。
//! 实现方负责在每次调用内部完成 claim/release，返回值沿用 errno 约定。

/// 平台总线操作。地址为设备侧字节地址，长度由调用方保证块对齐
/// （寄存器访问除外）。
pub trait BusOps: Send + Sync {
    /// 从 `addr` 读取 `buf.len()` 字节。
    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<(), i32>;

    /// 向 `addr` 写入 `buf` 全部字节。
    fn write(&self, addr: u32, buf: &[u8]) -> Result<(), i32>;

    /// 固定地址读取（地址不自增的 FIFO 端口）。不区分两种模式的
    /// 控制器按普通读处理即可。
    fn read_fixed(&self, addr: u32, buf: &mut [u8]) -> Result<(), i32> {
        self.read(addr, buf)
    }
}

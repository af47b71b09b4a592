//! mailbox 区域电源管理
//!
//! 状态迁移都在 `power` 锁内完成。休眠方向采取乐观写：先置 Asleep
//! 再写硬件，写失败也不回滚，宁可之后多做一次唤醒，不冒睡着了还当
//! 醒着去碰窗口的险。唤醒方向相反，轮询到就绪位才算醒。

use core::sync::atomic::Ordering;

use log::{debug, warn};

use crate::bus::BusOps;
use crate::callbacks::MboxCallbacks;
use crate::error::{MboxError, MboxResult};
use crate::sync::delay_spin_us;
use crate::transport::MboxTransport;
use crate::types::{reg, sleep, PowerState};

impl<B: BusOps, C: MboxCallbacks> MboxTransport<B, C> {
    /// 确保设备醒着。已醒时只重置不活跃倒计时；其余状态写保持唤醒位
    /// 并轮询就绪，轮完未就绪报 Timeout（状态维持原样）。
    pub fn wake(&self) -> MboxResult {
        let mut st = self.power.lock();
        if *st == PowerState::Awake {
            self.arm_inactivity();
            return Ok(());
        }
        self.bus
            .write(reg::SLEEP_CTRL, &[0])
            .map_err(MboxError::BusIo)?;
        let mut ready = false;
        for _ in 0..self.config.wake_poll_retries {
            let mut v = [0u8; 1];
            self.bus
                .read(reg::SLEEP_STATE, &mut v)
                .map_err(MboxError::BusIo)?;
            if v[0] & sleep::AWAKE_READY != 0 {
                ready = true;
                break;
            }
            delay_spin_us(self.config.wake_poll_delay_us as u64);
        }
        if !ready {
            warn!(target: "wmbox::power", "wake poll timed out");
            return Err(MboxError::Timeout);
        }
        debug!(target: "wmbox::power", "mailbox awake");
        *st = PowerState::Awake;
        self.arm_inactivity();
        Ok(())
    }

    /// 完成休眠迁移（RequestToSleep 挂起后由发送循环排空时调用）。
    /// 已在 Asleep 则幂等返回，不再写硬件。
    pub fn transition_sleep(&self) -> MboxResult {
        let mut st = self.power.lock();
        if *st == PowerState::Asleep {
            return Ok(());
        }
        // 乐观置位：写失败时状态不回滚。
        *st = PowerState::Asleep;
        debug!(target: "wmbox::power", "mailbox asleep");
        self.bus
            .write(reg::SLEEP_CTRL, &[1])
            .map_err(MboxError::BusIo)
    }

    /// 周期性心跳：由平台以固定节拍调用。醒着且倒计时归零时挂起
    /// 休眠请求，由发送循环在排空后落实。
    pub fn power_tick(&self) {
        let prev = self.inactivity.fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
            Some(v.saturating_sub(1))
        });
        if prev != Ok(1) {
            return;
        }
        let mut st = self.power.lock();
        if *st == PowerState::Awake {
            *st = PowerState::RequestToSleep;
            debug!(target: "wmbox::power", "idle, requesting sleep");
            self.tx_signal.raise();
        }
    }

    /// 重置不活跃倒计时。
    pub(crate) fn arm_inactivity(&self) {
        self.inactivity
            .store(self.config.inactivity_ticks, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn power_state(&self) -> PowerState {
        *self.power.lock()
    }

    #[cfg(test)]
    pub(crate) fn set_power_state(&self, st: PowerState) {
        *self.power.lock() = st;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockBus, RecordingCallbacks};
    use crate::types::{MboxConfig, MboxGeometry};

    fn transport() -> MboxTransport<MockBus, RecordingCallbacks> {
        let mut cfg = MboxConfig::default();
        cfg.wake_poll_retries = 3;
        cfg.wake_poll_delay_us = 0;
        cfg.inactivity_ticks = 2;
        MboxTransport::new(
            MockBus::new(),
            RecordingCallbacks::new(),
            MboxGeometry::default(),
            cfg,
        )
    }

    #[test]
    fn wake_when_awake_skips_bus() {
        let t = transport();
        t.wake().unwrap();
        assert!(t.bus.writes_at(reg::SLEEP_CTRL).is_empty());
    }

    #[test]
    fn wake_polls_until_ready() {
        let t = transport();
        t.set_power_state(PowerState::Asleep);
        t.bus.push_read(reg::SLEEP_STATE, alloc::vec![0u8]);
        t.bus.push_read(reg::SLEEP_STATE, alloc::vec![sleep::AWAKE_READY]);
        t.wake().unwrap();
        assert_eq!(t.power_state(), PowerState::Awake);
        assert_eq!(t.bus.writes_at(reg::SLEEP_CTRL), alloc::vec![alloc::vec![0u8]]);
    }

    #[test]
    fn wake_timeout_keeps_state() {
        let t = transport();
        t.set_power_state(PowerState::Asleep);
        for _ in 0..3 {
            t.bus.push_read(reg::SLEEP_STATE, alloc::vec![0u8]);
        }
        assert!(matches!(t.wake(), Err(MboxError::Timeout)));
        assert_eq!(t.power_state(), PowerState::Asleep);
    }

    #[test]
    fn sleep_is_idempotent() {
        let t = transport();
        t.set_power_state(PowerState::RequestToSleep);
        t.transition_sleep().unwrap();
        t.transition_sleep().unwrap();
        // 第二次不再写硬件。
        assert_eq!(t.bus.writes_at(reg::SLEEP_CTRL).len(), 1);
        assert_eq!(t.power_state(), PowerState::Asleep);
    }

    #[test]
    fn sleep_state_sticks_on_write_failure() {
        let t = transport();
        t.set_power_state(PowerState::RequestToSleep);
        t.bus.fail_next_write(-5);
        assert!(matches!(
            t.transition_sleep(),
            Err(MboxError::BusIo(-5))
        ));
        assert_eq!(t.power_state(), PowerState::Asleep);
    }

    #[test]
    fn inactivity_countdown_requests_sleep() {
        let t = transport();
        t.power_tick();
        assert_eq!(t.power_state(), PowerState::Awake);
        t.power_tick();
        assert_eq!(t.power_state(), PowerState::RequestToSleep);
        assert!(t.tx_signal.is_raised());
        // 继续 tick 不重复挂请求。
        t.power_tick();
        assert_eq!(t.power_state(), PowerState::RequestToSleep);
    }
}

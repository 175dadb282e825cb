use chrono::Utc;
use lk_core::ports::ClockPort;

pub struct SystemClock;

impl ClockPort for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_milliseconds_since_epoch() {
        let before = Utc::now().timestamp_millis();
        let now = SystemClock.now_ms();
        assert!(now >= before);
        // 2020-01-01T00:00:00Z
        assert!(now > 1_577_836_800_000);
    }
}

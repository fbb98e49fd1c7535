use crate::config::config::ScheduleCfg;
use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// The intraday slot grid for one market: every `interval` from `open` to
/// `close` inclusive, Monday through Friday, in the market's timezone.
///
/// All methods are pure in `now`; calling them repeatedly without advancing
/// time yields the same answer. System clock jumps are not specially handled:
/// the scheduler recomputes the slot after every wake, so a backward jump
/// lengthens at most one wait.
#[derive(Clone, Debug)]
pub struct MarketHours {
    pub tz: Tz,
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub interval: ChronoDuration,
}

impl MarketHours {
    pub fn from_cfg(cfg: &ScheduleCfg) -> Result<Self> {
        let tz: Tz = cfg
            .timezone
            .parse()
            .map_err(|e| anyhow::anyhow!("unknown timezone {}: {}", cfg.timezone, e))?;
        let open = NaiveTime::parse_from_str(&cfg.open, "%H:%M")
            .with_context(|| format!("parsing schedule.open {:?}", cfg.open))?;
        let close = NaiveTime::parse_from_str(&cfg.close, "%H:%M")
            .with_context(|| format!("parsing schedule.close {:?}", cfg.close))?;
        let interval = ChronoDuration::from_std(cfg.interval).context("schedule.interval")?;
        anyhow::ensure!(open < close, "schedule.open must precede schedule.close");
        anyhow::ensure!(
            interval > ChronoDuration::zero(),
            "schedule.interval must be positive"
        );
        Ok(Self {
            tz,
            open,
            close,
            interval,
        })
    }

    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    /// The date used for daily-reset bookkeeping.
    pub fn trading_day(&self, now: DateTime<Tz>) -> NaiveDate {
        now.date_naive()
    }

    fn is_weekday(date: NaiveDate) -> bool {
        date.weekday().number_from_monday() <= 5
    }

    fn at(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Tz> {
        // A local time inside a DST spring-forward gap maps to the first
        // valid instant after the gap.
        let mut local = date.and_time(time);
        for _ in 0..240 {
            if let Some(dt) = self.tz.from_local_datetime(&local).earliest() {
                return dt;
            }
            local += ChronoDuration::minutes(1);
        }
        self.tz.from_utc_datetime(&date.and_time(time))
    }

    /// True when `now` sits exactly on a grid point inside the trading
    /// window on a weekday. An exactly-on-grid instant is due immediately,
    /// not deferred to the following slot.
    pub fn is_due(&self, now: DateTime<Tz>) -> bool {
        let date = now.date_naive();
        if !Self::is_weekday(date) {
            return false;
        }
        let t = now.time();
        if t < self.open || t > self.close {
            return false;
        }
        let elapsed = (t - self.open).num_milliseconds();
        now.timestamp_subsec_millis() == 0 && elapsed % self.interval.num_milliseconds() == 0
    }

    /// The next grid point strictly after `now`, skipping weekends.
    pub fn next_slot(&self, now: DateTime<Tz>) -> DateTime<Tz> {
        let date = now.date_naive();
        let t = now.time();
        if Self::is_weekday(date) {
            if t < self.open {
                return self.at(date, self.open);
            }
            if t <= self.close {
                let step = self.interval.num_milliseconds();
                let elapsed = (t - self.open).num_milliseconds();
                let next = self.open + ChronoDuration::milliseconds((elapsed / step + 1) * step);
                if next <= self.close {
                    return self.at(date, next);
                }
            }
        }
        // After close, or a weekend: first slot of the next weekday.
        let mut day = date.succ_opt().expect("date overflow");
        while !Self::is_weekday(day) {
            day = day.succ_opt().expect("date overflow");
        }
        self.at(day, self.open)
    }

    /// `now` itself when due, otherwise the next slot.
    pub fn next_slot_or_now(&self, now: DateTime<Tz>) -> DateTime<Tz> {
        if self.is_due(now) { now } else { self.next_slot(now) }
    }
}

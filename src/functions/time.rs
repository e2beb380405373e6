use chrono::{DateTime, Datelike, Duration, FixedOffset, TimeZone, Timelike, Utc};

use super::Macro;
use crate::context::EvalContext;
use crate::sestring::{marker, MacroCode, Payload};
use crate::Evaluator;

/// Writes every date/time placeholder from `at`.
fn update_date_time(ctx: &mut dyn EvalContext, at: &DateTime<FixedOffset>, millisecond: u32) {
    ctx.update_placeholder(marker::MILLISECOND, millisecond);
    ctx.update_placeholder(marker::SECOND, at.second());
    ctx.update_placeholder(marker::MINUTE, at.minute());
    ctx.update_placeholder(marker::HOUR, at.hour());
    ctx.update_placeholder(marker::DAY, at.day());
    ctx.update_placeholder(marker::WEEKDAY, at.weekday().num_days_from_sunday());
    ctx.update_placeholder(marker::MONTH, at.month());
    ctx.update_placeholder(marker::YEAR, at.year() as u32);
}

/// `SetResetTime(hour[, weekday])`: the next reset at `hour:00` UTC, today or
/// on the given weekday (0 = Sunday), in local time.
pub struct SetResetTime;

impl SetResetTime {
    fn reset_instant(
        ev: &Evaluator,
        ctx: &mut dyn EvalContext,
        payload: &Payload<'_>,
    ) -> Option<DateTime<Utc>> {
        let now = ev.clock().now_utc();
        let weekly = payload.args::<2>().and_then(|[hour, weekday]| {
            let hour = ev.resolve_int(ctx, hour)?;
            let weekday = ev.resolve_int(ctx, weekday)?;
            Some((hour, weekday))
        });
        let (hour, days) = match weekly {
            Some((hour, weekday)) => {
                let today = i64::from(now.weekday().num_days_from_sunday());
                (hour, (i64::from(weekday) - today + 7) % 7)
            }
            None => {
                let [hour] = payload.args::<1>()?;
                (ev.resolve_int(ctx, hour)?, 0)
            }
        };
        let date = now.date_naive().checked_add_signed(Duration::days(days))?;
        let at = date.and_hms_opt(u32::try_from(hour).ok()?, 0, 0)?;
        Some(Utc.from_utc_datetime(&at))
    }
}

impl Macro for SetResetTime {
    fn code(&self) -> MacroCode {
        MacroCode::SetResetTime
    }

    fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        let Some(at) = Self::reset_instant(ev, ctx, payload) else {
            return false;
        };
        let local = ev.clock().to_local(at);
        update_date_time(ctx, &local, local.timestamp_subsec_millis());
        true
    }
}

/// `SetTime(unix_seconds)`. The millisecond placeholder comes from the
/// current wall clock, not from the argument.
pub struct SetTime;

impl Macro for SetTime {
    fn code(&self) -> MacroCode {
        MacroCode::SetTime
    }

    fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        let Some([secs]) = payload.args::<1>() else {
            return false;
        };
        let Some(secs) = ev.resolve_uint(ctx, secs) else {
            return false;
        };
        let Some(at) = DateTime::from_timestamp(i64::from(secs), 0) else {
            return false;
        };
        let local = ev.clock().to_local(at);
        let millisecond = ev.clock().now_local().timestamp_subsec_millis();
        update_date_time(ctx, &local, millisecond);
        true
    }
}

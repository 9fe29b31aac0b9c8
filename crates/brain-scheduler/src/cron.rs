use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, Timelike, Utc};

/// One field of a 5-field cron expression: `*`, a list of specific
/// values, or (expanded at parse time) a range or step (§4.8: "cron
/// expression, validated: 5 fields; invalid schedules are rejected at
/// config load").
#[derive(Debug, Clone)]
enum Field {
    Any,
    Values(Vec<u32>),
}

impl Field {
    fn matches(&self, value: u32) -> bool {
        match self {
            Field::Any => true,
            Field::Values(values) => values.contains(&value),
        }
    }

    fn parse(field: &str, min: u32, max: u32) -> Result<Self> {
        if field == "*" {
            return Ok(Field::Any);
        }
        let mut values = Vec::new();
        for part in field.split(',') {
            if let Some((start_s, end_s)) = part.split_once('-') {
                let start = parse_bounded(start_s, min, max)?;
                let end = parse_bounded(end_s, min, max)?;
                if start > end {
                    return Err(Error::InvalidCron(format!("range {start}-{end} is backwards")));
                }
                values.extend(start..=end);
            } else if let Some(step_s) = part.strip_prefix("*/") {
                let step: u32 = step_s
                    .parse()
                    .map_err(|_| Error::InvalidCron(format!("bad step '{step_s}'")))?;
                if step == 0 {
                    return Err(Error::InvalidCron("step cannot be 0".to_string()));
                }
                let mut v = min;
                while v <= max {
                    values.push(v);
                    v += step;
                }
            } else {
                values.push(parse_bounded(part, min, max)?);
            }
        }
        Ok(Field::Values(values))
    }
}

fn parse_bounded(s: &str, min: u32, max: u32) -> Result<u32> {
    let value: u32 = s.parse().map_err(|_| Error::InvalidCron(format!("bad value '{s}'")))?;
    if value < min || value > max {
        return Err(Error::InvalidCron(format!("value {value} out of bounds [{min}-{max}]")));
    }
    Ok(value)
}

/// A validated 5-field cron expression (`minute hour day-of-month
/// month day-of-week`), matched at minute resolution.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    source: String,
    minute: Field,
    hour: Field,
    dom: Field,
    month: Field,
    dow: Field,
}

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self> {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(Error::InvalidCron(format!("expected 5 fields, got {}", parts.len())));
        }
        Ok(Self {
            source: expr.to_string(),
            minute: Field::parse(parts[0], 0, 59)?,
            hour: Field::parse(parts[1], 0, 23)?,
            dom: Field::parse(parts[2], 1, 31)?,
            month: Field::parse(parts[3], 1, 12)?,
            dow: Field::parse(parts[4], 0, 6)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `now`'s minute matches this schedule. Standard cron
    /// treats day-of-month and day-of-week as OR'd when both are
    /// restricted; this implementation follows that convention only
    /// when both fields are non-`*`, matching common cron semantics.
    pub fn matches(&self, now: DateTime<Utc>) -> bool {
        let minute = now.minute();
        let hour = now.hour();
        let dom = now.day();
        let month = now.month();
        let dow = now.weekday().num_days_from_sunday();

        if !self.minute.matches(minute) || !self.hour.matches(hour) || !self.month.matches(month) {
            return false;
        }

        match (&self.dom, &self.dow) {
            (Field::Any, Field::Any) => true,
            (Field::Any, dow_field) => dow_field.matches(dow),
            (dom_field, Field::Any) => dom_field.matches(dom),
            (dom_field, dow_field) => dom_field.matches(dom) || dow_field.matches(dow),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rejects_wrong_field_count() {
        assert!(CronSchedule::parse("0 2 * *").is_err());
    }

    #[test]
    fn rejects_out_of_range_value() {
        assert!(CronSchedule::parse("0 25 * * *").is_err());
    }

    #[test]
    fn matches_daily_time() {
        let schedule = CronSchedule::parse("0 2 * * *").unwrap();
        let at_2am = Utc.with_ymd_and_hms(2026, 1, 1, 2, 0, 0).unwrap();
        let at_3am = Utc.with_ymd_and_hms(2026, 1, 1, 3, 0, 0).unwrap();
        assert!(schedule.matches(at_2am));
        assert!(!schedule.matches(at_3am));
    }

    #[test]
    fn matches_weekday_range() {
        let schedule = CronSchedule::parse("0 9 * * 1-5").unwrap();
        let monday = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let saturday = Utc.with_ymd_and_hms(2026, 1, 3, 9, 0, 0).unwrap();
        assert!(schedule.matches(monday));
        assert!(!schedule.matches(saturday));
    }
}

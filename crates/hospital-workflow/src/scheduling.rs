//! 排班与预约规则

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use hospital_core::{DoctorSchedule, HospitalError, Result};
use serde::{Deserialize, Serialize};

/// 每个预约时段长度（分钟）
pub const SLOT_MINUTES: i64 = 30;
/// 最少提前预约时间（小时）
pub const BOOKING_LEAD_TIME_HOURS: i64 = 2;
/// 开始前多少小时内不允许取消
pub const CANCELLATION_WINDOW_HOURS: i64 = 1;

const SLOT_FORMAT: &str = "%H:%M";

/// 时段可用情况
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotAvailability {
    pub time: String,
    pub is_booked: bool,
}

/// 解析 `HH:MM` 格式时间
pub fn parse_slot_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), SLOT_FORMAT)
        .map_err(|_| HospitalError::Validation(format!("invalid time '{}', expected HH:MM", value)))
}

pub fn format_slot_time(time: NaiveTime) -> String {
    time.format(SLOT_FORMAT).to_string()
}

/// 周几索引，0 = 周一
pub fn weekday_index(date: NaiveDate) -> i16 {
    date.weekday().num_days_from_monday() as i16
}

/// 时段结束时间
pub fn slot_end(start: NaiveTime) -> NaiveTime {
    start + Duration::minutes(SLOT_MINUTES)
}

/// 按30分钟切分班次 [start, end)
pub fn generate_time_slots(start: NaiveTime, end: NaiveTime) -> Vec<NaiveTime> {
    let mut slots = Vec::new();
    let mut current = start;
    while current < end {
        slots.push(current);
        let (next, wrapped) = current.overflowing_add_signed(Duration::minutes(SLOT_MINUTES));
        if wrapped != 0 {
            break;
        }
        current = next;
    }
    slots
}

/// 标记已预约时段
pub fn mark_booked_slots(slots: &[NaiveTime], booked: &[NaiveTime]) -> Vec<SlotAvailability> {
    slots
        .iter()
        .map(|slot| SlotAvailability {
            time: format_slot_time(*slot),
            is_booked: booked.contains(slot),
        })
        .collect()
}

/// 校验排班参数
pub fn validate_shift(day_of_week: i16, shift_start: NaiveTime, shift_end: NaiveTime) -> Result<()> {
    if !(0..=6).contains(&day_of_week) {
        return Err(HospitalError::validation("day_of_week must be between 0 (Monday) and 6 (Sunday)"));
    }
    if shift_start >= shift_end {
        return Err(HospitalError::validation("shift_start must be before shift_end"));
    }
    Ok(())
}

/// 预约时间必须落在医生当天有效排班的某个时段上
pub fn ensure_slot_in_schedule(
    schedule: Option<&DoctorSchedule>,
    start_time: NaiveTime,
) -> Result<()> {
    let schedule = match schedule {
        Some(s) if s.is_active => s,
        _ => return Err(HospitalError::validation("doctor does not work on this day")),
    };

    if !generate_time_slots(schedule.shift_start, schedule.shift_end).contains(&start_time) {
        return Err(HospitalError::Validation(format!(
            "{} is not a valid slot for this doctor",
            format_slot_time(start_time)
        )));
    }
    Ok(())
}

/// 至少提前2小时预约
pub fn ensure_booking_lead_time(date: NaiveDate, start_time: NaiveTime, now: NaiveDateTime) -> Result<()> {
    let appointment_at = date.and_time(start_time);
    let earliest = now + Duration::hours(BOOKING_LEAD_TIME_HOURS);
    if appointment_at < earliest {
        return Err(HospitalError::Validation(format!(
            "appointments must be booked at least {} hours ahead; earliest available time is {}",
            BOOKING_LEAD_TIME_HOURS,
            earliest.format("%H:%M %d/%m/%Y")
        )));
    }
    Ok(())
}

/// 开始前1小时内不可取消
pub fn ensure_cancellable(date: NaiveDate, start_time: NaiveTime, now: NaiveDateTime) -> Result<()> {
    let appointment_at = date.and_time(start_time);
    if appointment_at - now < Duration::hours(CANCELLATION_WINDOW_HOURS) {
        return Err(HospitalError::Validation(format!(
            "appointments cannot be cancelled within {} hour of the slot",
            CANCELLATION_WINDOW_HOURS
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap() // 周一
    }

    fn schedule(active: bool) -> DoctorSchedule {
        DoctorSchedule {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            day_of_week: 0,
            shift_start: t(8, 0),
            shift_end: t(11, 30),
            is_active: active,
        }
    }

    #[test]
    fn test_generate_time_slots() {
        let slots = generate_time_slots(t(8, 0), t(10, 0));
        assert_eq!(slots, vec![t(8, 0), t(8, 30), t(9, 0), t(9, 30)]);

        // 不足一个时段的尾部也生成起点
        assert_eq!(generate_time_slots(t(8, 0), t(8, 10)), vec![t(8, 0)]);
        assert!(generate_time_slots(t(9, 0), t(9, 0)).is_empty());
    }

    #[test]
    fn test_slots_stop_at_midnight() {
        let slots = generate_time_slots(t(23, 0), t(23, 59));
        assert_eq!(slots, vec![t(23, 0), t(23, 30)]);
    }

    #[test]
    fn test_mark_booked_slots() {
        let slots = generate_time_slots(t(8, 0), t(9, 30));
        let marked = mark_booked_slots(&slots, &[t(8, 30)]);
        assert_eq!(marked.len(), 3);
        assert!(!marked[0].is_booked);
        assert_eq!(marked[1], SlotAvailability { time: "08:30".to_string(), is_booked: true });
    }

    #[test]
    fn test_parse_slot_time() {
        assert_eq!(parse_slot_time("09:30").unwrap(), t(9, 30));
        assert!(parse_slot_time("9h30").is_err());
        assert!(parse_slot_time("25:00").is_err());
    }

    #[test]
    fn test_weekday_index() {
        assert_eq!(weekday_index(day()), 0);
        assert_eq!(weekday_index(day() + Duration::days(6)), 6);
    }

    #[test]
    fn test_booking_lead_time() {
        let now = day().and_time(t(7, 0));
        assert!(ensure_booking_lead_time(day(), t(9, 0), now).is_ok());
        assert!(ensure_booking_lead_time(day(), t(8, 30), now).is_err());
        assert!(ensure_booking_lead_time(day() - Duration::days(1), t(15, 0), now).is_err());
    }

    #[test]
    fn test_cancellation_window() {
        let now = day().and_time(t(8, 0));
        assert!(ensure_cancellable(day(), t(9, 0), now).is_ok());
        assert!(ensure_cancellable(day(), t(8, 30), now).is_err());
    }

    #[test]
    fn test_slot_must_be_in_schedule() {
        let active = schedule(true);
        assert!(ensure_slot_in_schedule(Some(&active), t(9, 0)).is_ok());
        assert!(ensure_slot_in_schedule(Some(&active), t(9, 15)).is_err());
        assert!(ensure_slot_in_schedule(Some(&active), t(11, 30)).is_err());
        assert!(ensure_slot_in_schedule(Some(&schedule(false)), t(9, 0)).is_err());
        assert!(ensure_slot_in_schedule(None, t(9, 0)).is_err());
    }

    #[test]
    fn test_validate_shift() {
        assert!(validate_shift(0, t(8, 0), t(12, 0)).is_ok());
        assert!(validate_shift(7, t(8, 0), t(12, 0)).is_err());
        assert!(validate_shift(2, t(12, 0), t(8, 0)).is_err());
    }
}

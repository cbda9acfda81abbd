//! 床位费计算
//!
//! 每段床位占用按已满整天数计费，零头舍去，最少计一天；单价取分配时锁定的价格，
//! 之后病房调价不影响已有占用。转床会产生多段占用，总床位费为各段之和。

use chrono::{DateTime, Utc};
use hospital_core::BedAllocation;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 占用天数：max(1, 入住到退床（或当前时间）的整天数)
pub fn stay_days(
    check_in: DateTime<Utc>,
    check_out: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> i64 {
    let end = check_out.unwrap_or(now);
    (end - check_in).num_days().max(1)
}

/// 单段占用费用
pub fn allocation_fee(price_per_day: Decimal, days: i64) -> Decimal {
    price_per_day * Decimal::from(days)
}

/// 床位历史明细
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BedFeeLine {
    pub allocation_id: Uuid,
    pub bed_id: Uuid,
    pub bed_number: String,
    pub room_number: String,
    pub price_per_day: Decimal,
    pub check_in_time: DateTime<Utc>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub days: i64,
    pub total_price: Decimal,
}

impl BedFeeLine {
    pub fn new(
        allocation: &BedAllocation,
        bed_number: impl Into<String>,
        room_number: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let days = stay_days(allocation.check_in_time, allocation.check_out_time, now);
        Self {
            allocation_id: allocation.id,
            bed_id: allocation.bed_id,
            bed_number: bed_number.into(),
            room_number: room_number.into(),
            price_per_day: allocation.price_per_day,
            check_in_time: allocation.check_in_time,
            check_out_time: allocation.check_out_time,
            days,
            total_price: allocation_fee(allocation.price_per_day, days),
        }
    }
}

/// 床位费汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BedFeeSummary {
    pub lines: Vec<BedFeeLine>,
    pub bed_fee_total: Decimal,
}

impl BedFeeSummary {
    pub fn from_lines(lines: Vec<BedFeeLine>) -> Self {
        let bed_fee_total = lines.iter().map(|l| l.total_price).sum();
        Self { lines, bed_fee_total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn allocation(price: i64, check_in: DateTime<Utc>, check_out: Option<DateTime<Utc>>) -> BedAllocation {
        BedAllocation {
            id: Uuid::new_v4(),
            inpatient_id: Uuid::new_v4(),
            bed_id: Uuid::new_v4(),
            price_per_day: Decimal::from(price),
            check_in_time: check_in,
            check_out_time: check_out,
        }
    }

    #[test]
    fn test_three_day_stay() {
        let check_in = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let check_out = check_in + Duration::days(3);
        let line = BedFeeLine::new(&allocation(500_000, check_in, Some(check_out)), "B01", "101", check_out);

        assert_eq!(line.days, 3);
        assert_eq!(line.total_price, Decimal::from(1_500_000));
    }

    #[test]
    fn test_partial_day_counts_as_one() {
        let check_in = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        assert_eq!(stay_days(check_in, Some(check_in + Duration::hours(2)), check_in), 1);
        assert_eq!(stay_days(check_in, Some(check_in), check_in), 1);
        // 不足整天的部分不计
        assert_eq!(stay_days(check_in, Some(check_in + Duration::hours(50)), check_in), 2);
    }

    #[test]
    fn test_open_allocation_uses_now() {
        let check_in = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let now = check_in + Duration::days(4) + Duration::hours(3);
        assert_eq!(stay_days(check_in, None, now), 4);
    }

    #[test]
    fn test_transfer_sums_allocations() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let t1 = t0 + Duration::days(2);
        let now = t1 + Duration::days(3);

        let summary = BedFeeSummary::from_lines(vec![
            BedFeeLine::new(&allocation(300_000, t0, Some(t1)), "A01", "101", now),
            BedFeeLine::new(&allocation(500_000, t1, None), "V01", "201", now),
        ]);

        assert_eq!(summary.bed_fee_total, Decimal::from(600_000 + 1_500_000));
    }
}

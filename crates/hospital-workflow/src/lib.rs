//! # 医院业务规则模块
//!
//! 与数据库无关的纯业务计算，包括：
//! - 状态机：就诊、预约、检验申请的状态流转
//! - 收费计算：药品、服务、诊查费与医保折扣
//! - 床位费计算：按占用区间与锁定单价累计
//! - 排班与预约：时段生成、提前预约与取消时限
//! - 库存规则：扣减校验与库存预警

pub mod bed_fee;
pub mod billing;
pub mod inventory;
pub mod scheduling;
pub mod state_machine;

// 重新导出主要类型
pub use bed_fee::{allocation_fee, stay_days, BedFeeLine, BedFeeSummary};
pub use billing::{BillLine, BillPreview, BillingInput};
pub use inventory::{check_stock, InventoryAlert, InventoryAlertType};
pub use scheduling::{generate_time_slots, parse_slot_time, SlotAvailability};
pub use state_machine::{
    AppointmentEvent, ServiceRequestEvent, StateMachine, VisitEvent,
};

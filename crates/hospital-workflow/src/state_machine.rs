//! 状态机
//!
//! 就诊、预约与检验申请的状态转换规则。状态只能前进，没有回退路径。

use hospital_core::{
    AppointmentStatus, HospitalError, Result, ServiceRequestStatus, VisitStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// 就诊状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum VisitEvent {
    /// 医生录入/更新诊断
    Examine,
    /// 结束诊疗，转入待收费
    Finish,
    /// 收费完成
    Pay,
}

/// 预约状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentEvent {
    Confirm,
    Reschedule,
    CheckIn,
    Cancel,
}

/// 检验申请状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ServiceRequestEvent {
    RecordResult,
    Cancel,
}

/// 通用状态机
#[derive(Debug)]
pub struct StateMachine<S, E> {
    transitions: HashMap<(S, E), S>,
}

impl<S, E> StateMachine<S, E>
where
    S: Copy + Eq + Hash + Debug,
    E: Copy + Eq + Hash + Debug,
{
    fn from_rules(rules: &[(S, E, S)]) -> Self {
        let transitions = rules
            .iter()
            .map(|(from, event, to)| ((*from, *event), *to))
            .collect();
        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: &S, event: &E) -> bool {
        self.transitions.contains_key(&(*from, *event))
    }

    /// 执行状态转换
    pub fn transition(&self, from: &S, event: &E) -> Result<S> {
        match self.transitions.get(&(*from, *event)) {
            Some(to) => Ok(*to),
            None => Err(HospitalError::InvalidStateTransition {
                from: format!("{:?}", from),
                event: format!("{:?}", event),
            }),
        }
    }

    /// 获取状态的所有可能事件
    pub fn possible_events(&self, current: &S) -> Vec<E> {
        self.transitions
            .keys()
            .filter(|(state, _)| state == current)
            .map(|(_, event)| *event)
            .collect()
    }
}

impl StateMachine<VisitStatus, VisitEvent> {
    /// WAITING → IN_PROGRESS → COMPLETED → PAID
    pub fn visit() -> Self {
        Self::from_rules(&[
            (VisitStatus::Waiting, VisitEvent::Examine, VisitStatus::InProgress),
            (VisitStatus::InProgress, VisitEvent::Examine, VisitStatus::InProgress),
            (VisitStatus::InProgress, VisitEvent::Finish, VisitStatus::Completed),
            (VisitStatus::Completed, VisitEvent::Pay, VisitStatus::Paid),
        ])
    }
}

impl StateMachine<AppointmentStatus, AppointmentEvent> {
    pub fn appointment() -> Self {
        use AppointmentEvent::*;
        use AppointmentStatus::*;

        Self::from_rules(&[
            (Pending, Confirm, Confirmed),
            (Pending, Reschedule, Pending),
            (Confirmed, Reschedule, Pending), // 改期后需重新确认
            (Pending, CheckIn, Completed),
            (Confirmed, CheckIn, Completed),
            (Pending, Cancel, Cancelled),
            (Confirmed, Cancel, Cancelled),
        ])
    }
}

impl StateMachine<ServiceRequestStatus, ServiceRequestEvent> {
    pub fn service_request() -> Self {
        Self::from_rules(&[
            (
                ServiceRequestStatus::Pending,
                ServiceRequestEvent::RecordResult,
                ServiceRequestStatus::Completed,
            ),
            (
                ServiceRequestStatus::Pending,
                ServiceRequestEvent::Cancel,
                ServiceRequestStatus::Cancelled,
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visit_lifecycle() {
        let sm = StateMachine::visit();

        let status = sm.transition(&VisitStatus::Waiting, &VisitEvent::Examine).unwrap();
        assert_eq!(status, VisitStatus::InProgress);
        let status = sm.transition(&status, &VisitEvent::Examine).unwrap();
        assert_eq!(status, VisitStatus::InProgress);
        let status = sm.transition(&status, &VisitEvent::Finish).unwrap();
        assert_eq!(status, VisitStatus::Completed);
        let status = sm.transition(&status, &VisitEvent::Pay).unwrap();
        assert_eq!(status, VisitStatus::Paid);
    }

    #[test]
    fn test_visit_cannot_go_back() {
        let sm = StateMachine::visit();

        assert!(!sm.can_transition(&VisitStatus::Paid, &VisitEvent::Examine));
        assert!(!sm.can_transition(&VisitStatus::Completed, &VisitEvent::Examine));
        assert!(!sm.can_transition(&VisitStatus::Waiting, &VisitEvent::Pay));
        assert!(sm.possible_events(&VisitStatus::Paid).is_empty());

        let err = sm.transition(&VisitStatus::Waiting, &VisitEvent::Finish).unwrap_err();
        assert!(matches!(err, HospitalError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_appointment_transitions() {
        let sm = StateMachine::appointment();

        assert!(sm.can_transition(&AppointmentStatus::Pending, &AppointmentEvent::Confirm));
        assert_eq!(
            sm.transition(&AppointmentStatus::Confirmed, &AppointmentEvent::Reschedule).unwrap(),
            AppointmentStatus::Pending
        );
        assert!(!sm.can_transition(&AppointmentStatus::Cancelled, &AppointmentEvent::CheckIn));
        assert!(!sm.can_transition(&AppointmentStatus::Completed, &AppointmentEvent::Cancel));
    }

    #[test]
    fn test_service_request_transitions() {
        let sm = StateMachine::service_request();

        assert!(sm.can_transition(&ServiceRequestStatus::Pending, &ServiceRequestEvent::RecordResult));
        assert!(!sm.can_transition(&ServiceRequestStatus::Cancelled, &ServiceRequestEvent::RecordResult));
        assert!(!sm.can_transition(&ServiceRequestStatus::Completed, &ServiceRequestEvent::Cancel));
    }
}

//! ============================================================================
//! Lifecycle Transitions - Who may move a task, and when
//! ============================================================================
//! open ──assign──▶ assigned ──complete──▶ completed (payment pending)
//!   ▲                                          │
//!   └─apply (stays open)                       └─pay──▶ payment paid
//!
//! Every transition checks all of its guards before touching the task, so a
//! rejected transition leaves the task exactly as it was. Nothing here is
//! reversible and there is no cancellation.
//! ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Application, ApplicationStatus, PaymentStatus, Task, TaskStatus};

/// Reasons a transition is refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum LifecycleError {
    #[error("Task {0} is not open")]
    NotOpen(String),

    #[error("Task {0} is not assigned")]
    NotAssigned(String),

    #[error("Task {0} is not completed")]
    NotCompleted(String),

    #[error("Payment for task {0} is not pending")]
    PaymentNotPending(String),

    #[error("Only the creator of task {task_id} may do this (caller: {caller})")]
    NotCreator { task_id: String, caller: String },

    #[error("Only the assignee of task {task_id} may do this (caller: {caller})")]
    NotAssignee { task_id: String, caller: String },

    #[error("{applicant} has not applied to task {task_id}")]
    NotAnApplicant { task_id: String, applicant: String },

    #[error("Cannot apply to your own task {0}")]
    OwnTask(String),

    #[error("Cover letter must not be empty")]
    EmptyCoverLetter,
}

/// What happens to the applications that were not chosen on assignment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionPolicy {
    /// Other applications stay `pending`; rejection is implicit
    #[default]
    LeavePending,
    /// Pending applications from everyone else become `rejected`
    RejectOthers,
}

/// A requested state change, as sent to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Transition {
    Apply { cover_letter: String },
    Assign { applicant_id: String },
    Complete,
    Pay,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Apply { .. } => "apply",
            Transition::Assign { .. } => "assign",
            Transition::Complete => "complete",
            Transition::Pay => "pay",
        }
    }

    /// Guard check only; does not modify the task
    pub fn check(&self, task: &Task, actor: &str) -> Result<(), LifecycleError> {
        match self {
            Transition::Apply { cover_letter } => check_apply(task, actor, cover_letter),
            Transition::Assign { applicant_id } => check_assign(task, actor, applicant_id),
            Transition::Complete => check_complete(task, actor),
            Transition::Pay => check_pay(task, actor),
        }
    }

    /// Guards that a newer copy of the task cannot lift: creator and assignee
    /// identity, and a blank cover letter. `task` is the caller's possibly
    /// stale copy, or None when it has none. Status and applicant checks
    /// belong to the backend.
    pub fn check_caller(&self, task: Option<&Task>, actor: &str) -> Result<(), LifecycleError> {
        match self {
            Transition::Apply { cover_letter } => {
                if cover_letter.trim().is_empty() {
                    return Err(LifecycleError::EmptyCoverLetter);
                }
                if let Some(task) = task.filter(|t| t.is_created_by(actor)) {
                    return Err(LifecycleError::OwnTask(task.id.clone()));
                }
            }
            Transition::Assign { .. } | Transition::Pay => {
                if let Some(task) = task.filter(|t| !t.is_created_by(actor)) {
                    return Err(LifecycleError::NotCreator {
                        task_id: task.id.clone(),
                        caller: actor.to_string(),
                    });
                }
            }
            Transition::Complete => {
                // An assignee, once set, never changes
                if let Some(task) = task.filter(|t| t.assigned_to.is_some() && !t.is_assigned_to(actor)) {
                    return Err(LifecycleError::NotAssignee {
                        task_id: task.id.clone(),
                        caller: actor.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Produce the post-transition snapshot of `task`
    pub fn apply_to(
        &self,
        task: &Task,
        actor: &str,
        now: DateTime<Utc>,
        policy: RejectionPolicy,
    ) -> Result<Task, LifecycleError> {
        let mut next = task.clone();
        match self {
            Transition::Apply { cover_letter } => apply(&mut next, actor, cover_letter, now)?,
            Transition::Assign { applicant_id } => {
                assign(&mut next, actor, applicant_id, now, policy)?
            }
            Transition::Complete => complete(&mut next, actor, now)?,
            Transition::Pay => pay(&mut next, actor)?,
        }
        Ok(next)
    }
}

// ============================================================================
// Guards
// ============================================================================

fn check_apply(task: &Task, applicant: &str, cover_letter: &str) -> Result<(), LifecycleError> {
    if task.status != TaskStatus::Open {
        return Err(LifecycleError::NotOpen(task.id.clone()));
    }
    if task.is_created_by(applicant) {
        return Err(LifecycleError::OwnTask(task.id.clone()));
    }
    if cover_letter.trim().is_empty() {
        return Err(LifecycleError::EmptyCoverLetter);
    }
    Ok(())
}

fn check_assign(task: &Task, caller: &str, applicant: &str) -> Result<(), LifecycleError> {
    if task.status != TaskStatus::Open {
        return Err(LifecycleError::NotOpen(task.id.clone()));
    }
    if !task.is_created_by(caller) {
        return Err(LifecycleError::NotCreator {
            task_id: task.id.clone(),
            caller: caller.to_string(),
        });
    }
    if !task.has_applied(applicant) {
        return Err(LifecycleError::NotAnApplicant {
            task_id: task.id.clone(),
            applicant: applicant.to_string(),
        });
    }
    Ok(())
}

fn check_complete(task: &Task, caller: &str) -> Result<(), LifecycleError> {
    if task.status != TaskStatus::Assigned {
        return Err(LifecycleError::NotAssigned(task.id.clone()));
    }
    if !task.is_assigned_to(caller) {
        return Err(LifecycleError::NotAssignee {
            task_id: task.id.clone(),
            caller: caller.to_string(),
        });
    }
    Ok(())
}

fn check_pay(task: &Task, caller: &str) -> Result<(), LifecycleError> {
    if task.status != TaskStatus::Completed {
        return Err(LifecycleError::NotCompleted(task.id.clone()));
    }
    if task.payment_status != Some(PaymentStatus::Pending) {
        return Err(LifecycleError::PaymentNotPending(task.id.clone()));
    }
    if !task.is_created_by(caller) {
        return Err(LifecycleError::NotCreator {
            task_id: task.id.clone(),
            caller: caller.to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// Transitions
// ============================================================================

/// Record a pending application. Repeat applications from the same viewer
/// are accepted as separate entries.
pub fn apply(
    task: &mut Task,
    applicant: &str,
    cover_letter: &str,
    now: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    check_apply(task, applicant, cover_letter)?;

    task.applicants.push(Application {
        user_id: applicant.to_string(),
        applied_at: now,
        cover_letter: cover_letter.trim().to_string(),
        status: ApplicationStatus::Pending,
    });
    Ok(())
}

/// Creator picks one applicant
pub fn assign(
    task: &mut Task,
    caller: &str,
    applicant: &str,
    now: DateTime<Utc>,
    policy: RejectionPolicy,
) -> Result<(), LifecycleError> {
    check_assign(task, caller, applicant)?;

    for application in &mut task.applicants {
        if application.user_id == applicant {
            application.status = ApplicationStatus::Accepted;
        } else if policy == RejectionPolicy::RejectOthers
            && application.status == ApplicationStatus::Pending
        {
            application.status = ApplicationStatus::Rejected;
        }
    }

    task.assigned_to = Some(applicant.to_string());
    task.assigned_at = Some(now);
    task.status = TaskStatus::Assigned;
    Ok(())
}

/// Assignee finishes the work; payment becomes pending
pub fn complete(task: &mut Task, caller: &str, now: DateTime<Utc>) -> Result<(), LifecycleError> {
    check_complete(task, caller)?;

    task.status = TaskStatus::Completed;
    task.completed_at = Some(now);
    task.payment_status = Some(PaymentStatus::Pending);
    // Completed tasks carry no applicants
    task.applicants.clear();
    Ok(())
}

/// Creator settles the pending payment
pub fn pay(task: &mut Task, caller: &str) -> Result<(), LifecycleError> {
    check_pay(task, caller)?;

    task.payment_status = Some(PaymentStatus::Paid);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::open_task;

    fn t1(now: DateTime<Utc>) -> Task {
        open_task("T1", "U2", now, 1)
    }

    #[test]
    fn test_apply_adds_pending_applicant() {
        let now = Utc::now();
        let mut task = t1(now);

        apply(&mut task, "U1", "I can help", now).unwrap();

        assert_eq!(task.status, TaskStatus::Open);
        assert_eq!(task.applicants.len(), 1);
        assert_eq!(task.applicants[0].user_id, "U1");
        assert_eq!(task.applicants[0].status, ApplicationStatus::Pending);
        assert_eq!(task.applicants[0].cover_letter, "I can help");
    }

    #[test]
    fn test_repeat_application_recorded() {
        let now = Utc::now();
        let mut task = t1(now);

        apply(&mut task, "U1", "I can help", now).unwrap();
        apply(&mut task, "U1", "Still interested", now).unwrap();

        assert_eq!(task.applicants.len(), 2);
    }

    #[test]
    fn test_apply_guards() {
        let now = Utc::now();
        let mut task = t1(now);

        assert_eq!(
            apply(&mut task, "U2", "my own", now),
            Err(LifecycleError::OwnTask("T1".to_string()))
        );
        assert_eq!(apply(&mut task, "U1", "   ", now), Err(LifecycleError::EmptyCoverLetter));

        task.status = TaskStatus::Assigned;
        task.assigned_to = Some("U3".to_string());
        assert_eq!(
            apply(&mut task, "U1", "late", now),
            Err(LifecycleError::NotOpen("T1".to_string()))
        );
        assert!(task.applicants.is_empty());
    }

    #[test]
    fn test_assign_requires_creator_and_applicant() {
        let now = Utc::now();
        let mut task = t1(now);
        apply(&mut task, "U1", "I can help", now).unwrap();

        let not_creator = assign(&mut task, "U1", "U1", now, RejectionPolicy::LeavePending);
        assert!(matches!(not_creator, Err(LifecycleError::NotCreator { .. })));

        let stranger = assign(&mut task, "U2", "U9", now, RejectionPolicy::LeavePending);
        assert!(matches!(stranger, Err(LifecycleError::NotAnApplicant { .. })));

        assert_eq!(task.status, TaskStatus::Open);
        assert!(task.assigned_to.is_none());
    }

    #[test]
    fn test_check_caller_ignores_stale_state() {
        let now = Utc::now();
        let task = t1(now);
        let assign_u1 = Transition::Assign {
            applicant_id: "U1".to_string(),
        };

        // No application in this copy, but the creator may still try
        assert!(assign_u1.check_caller(Some(&task), "U2").is_ok());
        assert!(assign_u1.check(&task, "U2").is_err());
        assert!(matches!(
            assign_u1.check_caller(Some(&task), "U1"),
            Err(LifecycleError::NotCreator { .. })
        ));

        // Not assigned yet locally: only the backend can tell
        assert!(Transition::Complete.check_caller(Some(&task), "U1").is_ok());
        let mut assigned = task.clone();
        assigned.status = TaskStatus::Assigned;
        assigned.assigned_to = Some("U3".to_string());
        assert!(matches!(
            Transition::Complete.check_caller(Some(&assigned), "U1"),
            Err(LifecycleError::NotAssignee { .. })
        ));

        let blank = Transition::Apply {
            cover_letter: "  ".to_string(),
        };
        assert_eq!(blank.check_caller(None, "U1"), Err(LifecycleError::EmptyCoverLetter));
        let own = Transition::Apply {
            cover_letter: "mine".to_string(),
        };
        assert!(matches!(own.check_caller(Some(&task), "U2"), Err(LifecycleError::OwnTask(_))));
        assert!(Transition::Pay.check_caller(None, "anyone").is_ok());
    }

    #[test]
    fn test_assign_leaves_others_pending_by_default() {
        let now = Utc::now();
        let mut task = t1(now);
        apply(&mut task, "U1", "pick me", now).unwrap();
        apply(&mut task, "U3", "or me", now).unwrap();

        assign(&mut task, "U2", "U1", now, RejectionPolicy::LeavePending).unwrap();

        assert_eq!(task.status, TaskStatus::Assigned);
        assert_eq!(task.assigned_to.as_deref(), Some("U1"));
        assert_eq!(task.assigned_at, Some(now));
        assert_eq!(task.applicants[0].status, ApplicationStatus::Accepted);
        assert_eq!(task.applicants[1].status, ApplicationStatus::Pending);
        assert!(task.invariant_violations().is_empty());
    }

    #[test]
    fn test_assign_can_reject_others() {
        let now = Utc::now();
        let mut task = t1(now);
        apply(&mut task, "U1", "pick me", now).unwrap();
        apply(&mut task, "U3", "or me", now).unwrap();

        assign(&mut task, "U2", "U1", now, RejectionPolicy::RejectOthers).unwrap();

        assert_eq!(task.applicants[0].status, ApplicationStatus::Accepted);
        assert_eq!(task.applicants[1].status, ApplicationStatus::Rejected);
    }

    #[test]
    fn test_complete_by_non_assignee_rejected() {
        let now = Utc::now();
        let mut task = t1(now);
        apply(&mut task, "U1", "I can help", now).unwrap();
        assign(&mut task, "U2", "U1", now, RejectionPolicy::LeavePending).unwrap();

        let before = task.clone();
        let result = complete(&mut task, "U2", now);
        assert!(matches!(result, Err(LifecycleError::NotAssignee { .. })));
        assert_eq!(task, before);
    }

    #[test]
    fn test_pay_before_completion_rejected() {
        let now = Utc::now();
        let mut task = t1(now);
        apply(&mut task, "U1", "I can help", now).unwrap();
        assign(&mut task, "U2", "U1", now, RejectionPolicy::LeavePending).unwrap();

        assert_eq!(pay(&mut task, "U2"), Err(LifecycleError::NotCompleted("T1".to_string())));
        assert!(task.payment_status.is_none());
    }

    #[test]
    fn test_full_lifecycle() {
        let now = Utc::now();
        let mut task = t1(now);

        apply(&mut task, "U1", "I can help", now).unwrap();
        assign(&mut task, "U2", "U1", now, RejectionPolicy::LeavePending).unwrap();
        complete(&mut task, "U1", now).unwrap();

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.payment_status, Some(PaymentStatus::Pending));
        assert!(task.applicants.is_empty());
        assert!(task.invariant_violations().is_empty());

        assert!(matches!(pay(&mut task, "U1"), Err(LifecycleError::NotCreator { .. })));
        pay(&mut task, "U2").unwrap();
        assert_eq!(task.payment_status, Some(PaymentStatus::Paid));

        // Paid is terminal
        assert_eq!(pay(&mut task, "U2"), Err(LifecycleError::PaymentNotPending("T1".to_string())));
        assert!(task.invariant_violations().is_empty());
    }

    #[test]
    fn test_transition_apply_to_leaves_input_untouched() {
        let now = Utc::now();
        let task = t1(now);
        let transition = Transition::Apply {
            cover_letter: "I can help".to_string(),
        };

        let next = transition
            .apply_to(&task, "U1", now, RejectionPolicy::LeavePending)
            .unwrap();
        assert!(task.applicants.is_empty());
        assert_eq!(next.applicants.len(), 1);

        assert!(Transition::Complete.check(&task, "U1").is_err());
        assert!(transition.check(&task, "U1").is_ok());
    }

    #[test]
    fn test_transition_serialization() {
        let json = serde_json::to_value(Transition::Assign {
            applicant_id: "U1".to_string(),
        })
        .unwrap();
        assert_eq!(json["action"], "assign");
        assert_eq!(json["applicant_id"], "U1");
        assert_eq!(Transition::Pay.name(), "pay");
    }
}

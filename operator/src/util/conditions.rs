use k8s_openapi::{
    apimachinery::pkg::apis::meta::v1::{Condition, Time},
    jiff::Timestamp,
};

pub fn new_condition(type_: &str, status: &str, reason: &str, message: &str) -> Condition {
    Condition {
        type_: type_.to_string(),
        status: status.to_string(),
        reason: reason.to_string(),
        message: message.to_string(),
        last_transition_time: Time::from(Timestamp::now()),
        observed_generation: None,
    }
}

/// Insert or update a condition by type. The transition time only moves
/// when the status actually changes.
pub fn set_condition(conditions: &mut Vec<Condition>, condition: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            if existing.status != condition.status {
                existing.last_transition_time = condition.last_transition_time;
            }
            existing.status = condition.status;
            existing.reason = condition.reason;
            existing.message = condition.message;
            existing.observed_generation = condition.observed_generation;
        }
        None => conditions.push(condition),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserts_new_condition() {
        let mut conditions = Vec::new();
        set_condition(
            &mut conditions,
            new_condition("PodCreated", "True", "PodCreatedSuccessfully", "created"),
        );
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].type_, "PodCreated");
    }

    #[test]
    fn updates_existing_condition_in_place() {
        let mut conditions = Vec::new();
        set_condition(
            &mut conditions,
            new_condition("PodCreated", "True", "PodCreatedSuccessfully", "created"),
        );
        let original_transition = conditions[0].last_transition_time.clone();

        set_condition(
            &mut conditions,
            new_condition("PodCreated", "True", "PodAlreadyExists", "exists"),
        );
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].reason, "PodAlreadyExists");
        // Same status, transition time untouched.
        assert_eq!(conditions[0].last_transition_time, original_transition);
    }

    #[test]
    fn transition_time_moves_on_status_flip() {
        let mut conditions = vec![Condition {
            type_: "Finalizing".to_string(),
            status: "False".to_string(),
            reason: "PodDeletionFailed".to_string(),
            message: String::new(),
            last_transition_time: Time::from(Timestamp::UNIX_EPOCH),
            observed_generation: None,
        }];
        set_condition(
            &mut conditions,
            new_condition("Finalizing", "True", "PodDeleted", "deleted"),
        );
        assert_eq!(conditions[0].status, "True");
        assert_ne!(
            conditions[0].last_transition_time,
            Time::from(Timestamp::UNIX_EPOCH)
        );
    }

    #[test]
    fn distinct_types_accumulate() {
        let mut conditions = Vec::new();
        set_condition(
            &mut conditions,
            new_condition("PodCreated", "True", "PodCreatedSuccessfully", ""),
        );
        set_condition(
            &mut conditions,
            new_condition("Finalizing", "True", "PodDeleted", ""),
        );
        assert_eq!(conditions.len(), 2);
    }
}

//! SLURM job types.

use std::fmt;
use std::str::FromStr;

/// Scheduler job state as reported by `squeue %T`.
///
/// Closed set; anything squeue prints that is not listed here maps to
/// `Unrecognized` while the raw token stays on the `Job`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    BootFail,
    Cancelled,
    Completed,
    Configuring,
    Completing,
    Deadline,
    Failed,
    NodeFail,
    OutOfMemory,
    Pending,
    Preempted,
    Running,
    ResvDelHold,
    RequeueFed,
    RequeueHold,
    Requeued,
    Resizing,
    Revoked,
    Signaling,
    SpecialExit,
    StageOut,
    Stopped,
    Suspended,
    Timeout,
    Unrecognized,
}

impl JobState {
    /// Every state, in declaration order.
    pub const ALL: [JobState; 25] = [
        Self::BootFail,
        Self::Cancelled,
        Self::Completed,
        Self::Configuring,
        Self::Completing,
        Self::Deadline,
        Self::Failed,
        Self::NodeFail,
        Self::OutOfMemory,
        Self::Pending,
        Self::Preempted,
        Self::Running,
        Self::ResvDelHold,
        Self::RequeueFed,
        Self::RequeueHold,
        Self::Requeued,
        Self::Resizing,
        Self::Revoked,
        Self::Signaling,
        Self::SpecialExit,
        Self::StageOut,
        Self::Stopped,
        Self::Suspended,
        Self::Timeout,
        Self::Unrecognized,
    ];

    /// Canonical squeue token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BootFail => "BOOT_FAIL",
            Self::Cancelled => "CANCELLED",
            Self::Completed => "COMPLETED",
            Self::Configuring => "CONFIGURING",
            Self::Completing => "COMPLETING",
            Self::Deadline => "DEADLINE",
            Self::Failed => "FAILED",
            Self::NodeFail => "NODE_FAIL",
            Self::OutOfMemory => "OUT_OF_MEMORY",
            Self::Pending => "PENDING",
            Self::Preempted => "PREEMPTED",
            Self::Running => "RUNNING",
            Self::ResvDelHold => "RESV_DEL_HOLD",
            Self::RequeueFed => "REQUEUE_FED",
            Self::RequeueHold => "REQUEUE_HOLD",
            Self::Requeued => "REQUEUED",
            Self::Resizing => "RESIZING",
            Self::Revoked => "REVOKED",
            Self::Signaling => "SIGNALING",
            Self::SpecialExit => "SPECIAL_EXIT",
            Self::StageOut => "STAGE_OUT",
            Self::Stopped => "STOPPED",
            Self::Suspended => "SUSPENDED",
            Self::Timeout => "TIMEOUT",
            Self::Unrecognized => "UNKNOWN",
        }
    }

    /// Title-cased label for display ("Out Of Memory").
    pub fn label(&self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_string() + &chars.as_str().to_lowercase(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl FromStr for JobState {
    type Err = std::convert::Infallible;

    /// squeue prints underscores, older front-ends print spaces; both parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(' ', "_");
        let state = Self::ALL
            .iter()
            .copied()
            .find(|state| *state != Self::Unrecognized && state.as_str() == normalized)
            .unwrap_or(Self::Unrecognized);
        Ok(state)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the scheduler queue, rebuilt from scratch every poll tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Job {
    /// Unique per queue entry (`%A`); for arrays, unique per element.
    pub job_id: String,

    /// Raw `<base>_<index>` form (`%i`)
    pub job_id_combined: String,

    /// Array base job id (`%F`); the job id itself for plain jobs
    pub array_base_id: String,

    /// Array task index (`%K`), `"N/A"` for plain jobs
    pub array_task_index: String,

    /// Allocated or requested CPUs
    pub cpu_count: Option<u32>,

    /// Generic resources per node (`%b`), free-form
    pub generic_resources: String,

    pub name: String,
    pub partition: String,

    /// Pending reason or node list reason
    pub reason: String,

    pub user: String,

    /// Nice value
    pub nice: Option<i32>,

    /// State token exactly as squeue printed it
    pub state: String,

    /// Scheduler-formatted elapsed time
    pub elapsed_time: String,

    /// Node names, bracket ranges kept intact
    pub requested_nodes: Vec<String>,

    pub is_array_job: bool,

    /// Upper bound of the pending task range, pending arrays only
    pub array_total_tasks: Option<u32>,

    /// `%N` concurrency limit, pending arrays only; None means unlimited
    pub array_throttle: Option<u32>,
}

impl Job {
    /// Parsed form of the raw state token.
    pub fn job_state(&self) -> JobState {
        self.state.parse().unwrap_or(JobState::Unrecognized)
    }

    pub fn is_running(&self) -> bool {
        self.job_state() == JobState::Running
    }

    pub fn is_pending(&self) -> bool {
        self.job_state() == JobState::Pending
    }

    pub fn uses_gpu(&self) -> bool {
        self.generic_resources.contains("gpu")
    }

    /// Task index for array jobs, empty otherwise.
    pub fn array_label(&self) -> &str {
        if self.is_array_job {
            &self.array_task_index
        } else {
            ""
        }
    }

    /// Number of tasks in the pending index expression (`5-9%2` is 5,
    /// `1,4-6` is 4, `1-9:2` is 5).
    pub fn array_task_count(&self) -> Option<u32> {
        if !self.is_array_job {
            return None;
        }
        let index = self
            .array_task_index
            .trim_matches(|c| c == '[' || c == ']');
        let index = index.split_once('%').map_or(index, |(ranges, _)| ranges);

        let mut total: u32 = 0;
        for part in index.split(',') {
            let (range, step) = match part.split_once(':') {
                Some((range, step)) => (range, step.parse::<u32>().ok().filter(|s| *s > 0)?),
                None => (part, 1),
            };
            let count = match range.split_once('-') {
                Some((first, last)) => {
                    let first: u32 = first.parse().ok()?;
                    let last: u32 = last.parse().ok()?;
                    last.checked_sub(first)? / step + 1
                }
                None => {
                    range.parse::<u32>().ok()?;
                    1
                }
            };
            total = total.checked_add(count)?;
        }
        Some(total)
    }

    /// Node list joined back into the squeue form.
    pub fn nodes_label(&self) -> String {
        self.requested_nodes.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_state_tokens() {
        assert_eq!("RUNNING".parse::<JobState>().unwrap(), JobState::Running);
        assert_eq!("pending".parse::<JobState>().unwrap(), JobState::Pending);
        assert_eq!(
            "OUT_OF_MEMORY".parse::<JobState>().unwrap(),
            JobState::OutOfMemory
        );
        assert_eq!(
            "NODE FAIL".parse::<JobState>().unwrap(),
            JobState::NodeFail
        );
        assert_eq!(
            "SOMETHING_NEW".parse::<JobState>().unwrap(),
            JobState::Unrecognized
        );
    }

    #[test]
    fn test_every_state_round_trips_its_token() {
        for state in JobState::ALL {
            if state == JobState::Unrecognized {
                continue;
            }
            assert_eq!(state.as_str().parse::<JobState>().unwrap(), state);
        }
    }

    #[test]
    fn test_label() {
        assert_eq!(JobState::Running.label(), "Running");
        assert_eq!(JobState::OutOfMemory.label(), "Out Of Memory");
    }

    #[test]
    fn test_job_helpers() {
        let job = Job {
            state: "RUNNING".to_string(),
            generic_resources: "gres/gpu:2".to_string(),
            array_task_index: "N/A".to_string(),
            requested_nodes: vec!["node[01-02]".to_string(), "gpu1".to_string()],
            ..Default::default()
        };
        assert!(job.is_running());
        assert!(!job.is_pending());
        assert!(job.uses_gpu());
        assert_eq!(job.array_label(), "");
        assert_eq!(job.nodes_label(), "node[01-02],gpu1");
    }

    #[test]
    fn test_array_task_count() {
        let array = |index: &str| Job {
            array_task_index: index.to_string(),
            is_array_job: true,
            ..Default::default()
        };
        assert_eq!(array("5-9%2").array_task_count(), Some(5));
        assert_eq!(array("[5-9]").array_task_count(), Some(5));
        assert_eq!(array("1,4-6").array_task_count(), Some(4));
        assert_eq!(array("1-9:2").array_task_count(), Some(5));
        assert_eq!(array("7").array_task_count(), Some(1));
        assert_eq!(array("9-5").array_task_count(), None);
        assert_eq!(array("garbage").array_task_count(), None);

        let single = Job {
            array_task_index: "N/A".to_string(),
            ..Default::default()
        };
        assert_eq!(single.array_task_count(), None);
    }
}

//! Builders for every command line squint sends to a cluster.
//!
//! Everything here returns fully formed shell text; the transport treats it
//! as opaque.

/// Used to detect a local SLURM installation.
pub const PROBE_PROGRAM: &str = "sinfo";

pub const WHOAMI: &str = "whoami";

pub const SHOW_CONFIG: &str = "scontrol show config";

pub const MY_PARTITIONS: &str = "sinfo --format=\"%R\" --noheader";

pub const ALL_PARTITIONS: &str = "sinfo --format=\"%R\" --noheader --all";

/// `scancel` for an explicit id list. None when the list is empty.
pub fn cancel_jobs<S: AsRef<str>>(job_ids: &[S]) -> Option<String> {
    if job_ids.is_empty() {
        return None;
    }
    let ids: Vec<&str> = job_ids.iter().map(AsRef::as_ref).collect();
    Some(format!("scancel {}", ids.join(" ")))
}

pub fn cancel_user_jobs(user: &str) -> String {
    format!("scancel -u {}", user)
}

/// Which end of the submission-time ordering to cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobAge {
    Newest,
    Oldest,
}

/// Query-then-cancel pipeline for the user's newest or oldest job.
pub fn cancel_user_job_by_age(user: &str, which: JobAge) -> String {
    let sort = match which {
        JobAge::Newest => "-V",
        JobAge::Oldest => "+V",
    };
    format!(
        "squeue -u {} --sort={} -h --format=\"%A\" | head -n 1 | xargs scancel",
        user, sort
    )
}

pub fn set_nice(job_id: &str, nice: i32) -> String {
    format!("scontrol update JobId={} Nice={}", job_id, nice)
}

pub fn set_array_throttle(job_id: &str, throttle: u32) -> String {
    format!("scontrol update JobId={} ArrayTaskThrottle={}", job_id, throttle)
}

/// Interactive attach to step 0 of a job.
///
/// Returned as argv since it runs in the foreground terminal, not through
/// the command queue. Remote targets are wrapped in `ssh -t`.
pub fn attach_argv(job_id: &str, remote: Option<&str>) -> Vec<String> {
    let step = format!("{}.0", job_id);
    match remote {
        Some(target) => vec![
            "ssh".to_string(),
            "-t".to_string(),
            target.to_string(),
            format!("sattach {}", step),
        ],
        None => vec!["sattach".to_string(), step],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_jobs() {
        assert_eq!(
            cancel_jobs(&["1", "2", "3_4"]),
            Some("scancel 1 2 3_4".to_string())
        );
        assert_eq!(cancel_jobs::<&str>(&[]), None);
    }

    #[test]
    fn test_cancel_user_jobs() {
        assert_eq!(cancel_user_jobs("alice"), "scancel -u alice");
    }

    #[test]
    fn test_cancel_by_age() {
        assert_eq!(
            cancel_user_job_by_age("alice", JobAge::Newest),
            "squeue -u alice --sort=-V -h --format=\"%A\" | head -n 1 | xargs scancel"
        );
        assert!(cancel_user_job_by_age("alice", JobAge::Oldest).contains("--sort=+V"));
    }

    #[test]
    fn test_updates() {
        assert_eq!(set_nice("42", -5), "scontrol update JobId=42 Nice=-5");
        assert_eq!(
            set_array_throttle("42", 3),
            "scontrol update JobId=42 ArrayTaskThrottle=3"
        );
    }

    #[test]
    fn test_attach_argv() {
        assert_eq!(attach_argv("42", None), vec!["sattach", "42.0"]);
        assert_eq!(
            attach_argv("42", Some("bob@hpc")),
            vec!["ssh", "-t", "bob@hpc", "sattach 42.0"]
        );
    }
}

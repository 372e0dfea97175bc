//! Job table filters.

use squint_slurm::Job;

/// Who "mine" refers to and which partitions count as the user's own.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterScope<'a> {
    pub current_user: &'a str,
    pub my_partitions: &'a [String],
}

/// All active filters; a job is shown only if it passes every one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    /// Show jobs from every partition, not just the user's own.
    pub all_partitions: bool,
    pub only_mine: bool,
    pub only_running: bool,
    pub only_gpu: bool,
    /// Substring of the job name.
    pub name: String,
    /// Substring of the node list.
    pub node: String,
}

impl JobFilter {
    pub fn matches(&self, job: &Job, scope: &FilterScope<'_>) -> bool {
        (self.all_partitions || in_partitions(job, scope.my_partitions))
            && (!self.only_mine || job.user == scope.current_user)
            && (!self.only_running || job.is_running())
            && (!self.only_gpu || job.uses_gpu())
            && (self.name.is_empty() || job.name.contains(&self.name))
            && (self.node.is_empty() || job.nodes_label().contains(&self.node))
    }

    /// Indices of the jobs that pass, in listing order.
    pub fn apply(&self, jobs: &[Job], scope: &FilterScope<'_>) -> Vec<usize> {
        jobs.iter()
            .enumerate()
            .filter(|(_, job)| self.matches(job, scope))
            .map(|(i, _)| i)
            .collect()
    }

    /// Compact description for the table title, e.g. `mine,gpu,name~bwa`.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.all_partitions {
            parts.push("all partitions".to_string());
        }
        if self.only_mine {
            parts.push("mine".to_string());
        }
        if self.only_running {
            parts.push("running".to_string());
        }
        if self.only_gpu {
            parts.push("gpu".to_string());
        }
        if !self.name.is_empty() {
            parts.push(format!("name~{}", self.name));
        }
        if !self.node.is_empty() {
            parts.push(format!("node~{}", self.node));
        }
        parts.join(",")
    }
}

/// Pending jobs may list several candidate partitions (`short,long`).
fn in_partitions(job: &Job, partitions: &[String]) -> bool {
    // Partition facts are unknown until the session is ready.
    if partitions.is_empty() {
        return true;
    }
    job.partition
        .split(',')
        .any(|p| partitions.iter().any(|mine| mine == p.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str, user: &str, partition: &str, state: &str) -> Job {
        Job {
            job_id: id.to_string(),
            user: user.to_string(),
            partition: partition.to_string(),
            state: state.to_string(),
            ..Default::default()
        }
    }

    fn jobs() -> Vec<Job> {
        let mut gpu = job("3", "alice", "gpu", "RUNNING");
        gpu.generic_resources = "gres/gpu:a100:2".into();
        gpu.name = "train-bert".into();
        gpu.requested_nodes = vec!["gpu[01-02]".into()];

        let mut multi = job("4", "carol", "short,long", "PENDING");
        multi.name = "align".into();

        vec![
            job("1", "alice", "short", "PENDING"),
            job("2", "bob", "debug", "RUNNING"),
            gpu,
            multi,
        ]
    }

    fn scope(partitions: &[String]) -> FilterScope<'_> {
        FilterScope {
            current_user: "alice",
            my_partitions: partitions,
        }
    }

    #[test]
    fn test_default_limits_to_my_partitions() {
        let mine = vec!["short".to_string(), "gpu".to_string()];
        let visible = JobFilter::default().apply(&jobs(), &scope(&mine));
        assert_eq!(visible, vec![0, 2, 3]);
    }

    #[test]
    fn test_all_partitions() {
        let mine = vec!["short".to_string()];
        let filter = JobFilter {
            all_partitions: true,
            ..Default::default()
        };
        assert_eq!(filter.apply(&jobs(), &scope(&mine)).len(), 4);
    }

    #[test]
    fn test_unknown_partitions_show_everything() {
        assert_eq!(JobFilter::default().apply(&jobs(), &scope(&[])).len(), 4);
    }

    #[test]
    fn test_combined_filters() {
        let filter = JobFilter {
            all_partitions: true,
            only_mine: true,
            only_running: true,
            only_gpu: true,
            ..Default::default()
        };
        assert_eq!(filter.apply(&jobs(), &scope(&[])), vec![2]);
    }

    #[test]
    fn test_substring_filters() {
        let by_name = JobFilter {
            all_partitions: true,
            name: "bert".into(),
            ..Default::default()
        };
        assert_eq!(by_name.apply(&jobs(), &scope(&[])), vec![2]);

        let by_node = JobFilter {
            all_partitions: true,
            node: "gpu[01".into(),
            ..Default::default()
        };
        assert_eq!(by_node.apply(&jobs(), &scope(&[])), vec![2]);
    }

    #[test]
    fn test_summary() {
        assert_eq!(JobFilter::default().summary(), "");
        let filter = JobFilter {
            only_mine: true,
            only_gpu: true,
            name: "bwa".into(),
            ..Default::default()
        };
        assert_eq!(filter.summary(), "mine,gpu,name~bwa");
    }
}

//! Multi-job selection, keyed by job id so it survives refreshes.

use squint_slurm::Job;
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct Selection {
    ids: HashSet<String>,
}

impl Selection {
    /// Returns whether the job is selected afterwards.
    pub fn toggle(&mut self, job_id: &str) -> bool {
        if self.ids.remove(job_id) {
            false
        } else {
            self.ids.insert(job_id.to_string());
            true
        }
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.ids.contains(job_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Forget jobs that have left the queue.
    pub fn retain_present(&mut self, jobs: &[Job]) {
        let present: HashSet<&str> = jobs.iter().map(|j| j.job_id.as_str()).collect();
        self.ids.retain(|id| present.contains(id.as_str()));
    }

    /// Selected ids in listing order.
    pub fn ids_in(&self, jobs: &[Job]) -> Vec<String> {
        jobs.iter()
            .filter(|j| self.ids.contains(&j.job_id))
            .map(|j| j.job_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jobs(ids: &[&str]) -> Vec<Job> {
        ids.iter()
            .map(|id| Job {
                job_id: id.to_string(),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_toggle() {
        let mut selection = Selection::default();
        assert!(selection.toggle("10"));
        assert!(selection.contains("10"));
        assert!(!selection.toggle("10"));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_survives_reordering_refresh() {
        let mut selection = Selection::default();
        selection.toggle("2");
        selection.toggle("3");

        let refreshed = jobs(&["3", "1", "2"]);
        selection.retain_present(&refreshed);
        assert_eq!(selection.ids_in(&refreshed), vec!["3", "2"]);
    }

    #[test]
    fn test_departed_jobs_dropped() {
        let mut selection = Selection::default();
        selection.toggle("2");
        selection.toggle("9");
        selection.retain_present(&jobs(&["1", "2"]));
        assert_eq!(selection.len(), 1);
        assert!(!selection.contains("9"));
    }
}

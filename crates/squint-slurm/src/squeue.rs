//! Query active SLURM jobs via squeue.
//!
//! squeue's fixed-width output is ambiguous for variable-length fields, so
//! the listing asks for an explicit `|`-separated field set and the parser
//! reads it back through the same [`FieldOrder`].

use crate::types::Job;
use once_cell::sync::Lazy;
use regex::Regex;
use squint_parsers::{non_empty_string, split_delimited, split_outside_brackets, strip_quotes};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SqueueError {
    #[error("Invalid squeue field order: {0}")]
    FieldOrder(String),
    #[error("Failed to parse squeue output: {0}")]
    ParseError(String),
}

/// Delimiter requested from squeue; never appears in SLURM identifiers.
pub const QUEUE_DELIMITER: char = '|';

/// A single column requested from `squeue --format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueField {
    /// %A - unique job id (per array element)
    JobId,
    /// %i - `<base>_<index>` for arrays
    JobIdCombined,
    /// %F - array base job id
    ArrayBaseId,
    /// %K - array task index
    ArrayTaskIndex,
    /// %C - CPUs
    Cpus,
    /// %j - job name
    Name,
    /// %P - partition
    Partition,
    /// %r - reason
    Reason,
    /// %u - user
    User,
    /// %y - nice value
    Nice,
    /// %T - state (extended)
    State,
    /// %M - elapsed time
    Elapsed,
    /// %b - generic resources per node (undocumented short flag)
    GenericResources,
    /// %N - node list
    Nodes,
}

impl QueueField {
    /// The order squint asks for by default.
    pub const STANDARD: [QueueField; 14] = [
        Self::JobId,
        Self::JobIdCombined,
        Self::ArrayBaseId,
        Self::ArrayTaskIndex,
        Self::Cpus,
        Self::Name,
        Self::Partition,
        Self::Reason,
        Self::User,
        Self::Nice,
        Self::State,
        Self::Elapsed,
        Self::GenericResources,
        Self::Nodes,
    ];

    /// squeue `--format` specifier.
    pub fn format_spec(self) -> &'static str {
        match self {
            Self::JobId => "%A",
            Self::JobIdCombined => "%i",
            Self::ArrayBaseId => "%F",
            Self::ArrayTaskIndex => "%K",
            Self::Cpus => "%C",
            Self::Name => "%j",
            Self::Partition => "%P",
            Self::Reason => "%r",
            Self::User => "%u",
            Self::Nice => "%y",
            Self::State => "%T",
            Self::Elapsed => "%M",
            Self::GenericResources => "%b",
            Self::Nodes => "%N",
        }
    }

    /// Writes this field's raw value into `job`.
    ///
    /// Numeric fields that fail to parse are left unset rather than failing
    /// the line.
    fn apply(self, job: &mut Job, value: &str) {
        match self {
            Self::JobId => job.job_id = value.trim().to_string(),
            Self::JobIdCombined => job.job_id_combined = value.trim().to_string(),
            Self::ArrayBaseId => job.array_base_id = value.trim().to_string(),
            Self::ArrayTaskIndex => job.array_task_index = value.trim().to_string(),
            Self::Cpus => job.cpu_count = value.trim().parse().ok(),
            Self::Name => job.name = value.to_string(),
            Self::Partition => job.partition = value.trim().to_string(),
            Self::Reason => job.reason = value.trim().to_string(),
            Self::User => job.user = value.trim().to_string(),
            Self::Nice => job.nice = value.trim().parse().ok(),
            Self::State => job.state = value.trim().to_string(),
            Self::Elapsed => job.elapsed_time = value.trim().to_string(),
            Self::GenericResources => {
                job.generic_resources = non_empty_string(value).unwrap_or_default()
            }
            Self::Nodes => {
                job.requested_nodes = non_empty_string(value)
                    .map(|nodes| split_outside_brackets(&nodes))
                    .unwrap_or_default()
            }
        }
    }
}

/// The ordered field list shared by the query and the parser.
///
/// Every [`QueueField`] must appear exactly once, so a mismatch between
/// what was asked for and what is parsed fails at construction, not per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOrder {
    fields: Vec<QueueField>,
}

impl FieldOrder {
    pub fn new(fields: Vec<QueueField>) -> Result<Self, SqueueError> {
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(*field) {
                return Err(SqueueError::FieldOrder(format!(
                    "{:?} requested more than once",
                    field
                )));
            }
        }
        if let Some(missing) = QueueField::STANDARD.iter().find(|f| !seen.contains(f)) {
            return Err(SqueueError::FieldOrder(format!(
                "{:?} is not requested",
                missing
            )));
        }
        Ok(Self { fields })
    }

    pub fn standard() -> Self {
        Self {
            fields: QueueField::STANDARD.to_vec(),
        }
    }

    pub fn fields(&self) -> &[QueueField] {
        &self.fields
    }

    /// `%A|%i|...` as passed to `squeue --format`.
    pub fn format_string(&self) -> String {
        self.fields
            .iter()
            .map(|f| f.format_spec())
            .collect::<Vec<_>>()
            .join(&QUEUE_DELIMITER.to_string())
    }

    /// The full queue-listing command line.
    pub fn listing_command(&self) -> String {
        format!(
            "squeue --noheader --all --format=\"{}\"",
            self.format_string()
        )
    }

    /// Parse a single line of squeue output.
    pub fn parse_line(&self, line: &str) -> Result<Job, SqueueError> {
        let line = strip_quotes(line.trim_end_matches(['\r', '\n']));
        let values = split_delimited(line, QUEUE_DELIMITER, self.fields.len())
            .map_err(SqueueError::ParseError)?;

        let mut job = Job::default();
        for (field, value) in self.fields.iter().zip(values) {
            field.apply(&mut job, value);
        }

        if job.job_id.is_empty() {
            return Err(SqueueError::ParseError(format!("Empty job id: {}", line)));
        }

        job.is_array_job = job.array_task_index != "N/A";
        if job.is_array_job && job.is_pending() {
            decompose_array(&mut job);
        }

        Ok(job)
    }
}

impl Default for FieldOrder {
    fn default() -> Self {
        Self::standard()
    }
}

/// `5-9%2`: range upper bound and throttle.
static THROTTLED_INDEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)%(\d+)\]?$").expect("static regex"));

/// `[9]`, `0-9`, `[0-9]`: range upper bound only.
static UNTHROTTLED_INDEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[?(?:\d+-)?(\d+)\]?$").expect("static regex"));

/// Extract total task count and throttle from a pending array's index field.
///
/// No match leaves both fields unset.
fn decompose_array(job: &mut Job) {
    let index = job.array_task_index.as_str();

    if index.contains('%') {
        if let Some(caps) = THROTTLED_INDEX.captures(index) {
            job.array_total_tasks = caps[1].parse().ok();
            job.array_throttle = caps[2].parse().ok();
        }
    } else if let Some(caps) = UNTHROTTLED_INDEX.captures(index) {
        job.array_total_tasks = caps[1].parse().ok();
    }

    if job.array_total_tasks.is_none() {
        tracing::debug!(
            "Could not decompose array index {:?} for job {}",
            index,
            job.job_id
        );
    }
}

/// Parse every line of a listing, dropping malformed lines with a warning.
pub fn parse_squeue_output(order: &FieldOrder, lines: &[String]) -> Vec<Job> {
    let mut jobs = Vec::with_capacity(lines.len());

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        match order.parse_line(line) {
            Ok(job) => jobs.push(job),
            Err(e) => tracing::warn!("Dropping squeue line: {}", e),
        }
    }

    jobs
}

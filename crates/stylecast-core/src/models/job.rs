use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Server-issued identifier of a remote stylization job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        JobId(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

impl JobStatus {
    /// Normalizes a status string received from the service.
    ///
    /// Returns `None` for unknown values; callers treat those as still pending.
    pub fn from_wire(status: &str) -> Option<Self> {
        match status.trim().to_lowercase().as_str() {
            "pending" | "queued" | "starting" | "processing" | "running" | "in_progress" => {
                Some(JobStatus::Pending)
            }
            "completed" | "complete" | "succeeded" | "success" | "done" => {
                Some(JobStatus::Completed)
            }
            "failed" | "failure" | "error" | "canceled" | "cancelled" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Why a job ended without a usable result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum JobFailure {
    /// The service reported the job as failed.
    Rejected(String),
    /// Polling gave up after the attempt cap.
    TimedOut { attempts: u32 },
    /// The job could not be submitted at all.
    Unreachable(String),
    /// The service reported completion without a result URL.
    MissingResult,
}

impl Display for JobFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobFailure::Rejected(msg) => write!(f, "job rejected: {}", msg),
            JobFailure::TimedOut { attempts } => {
                write!(f, "job timed out after {} status checks", attempts)
            }
            JobFailure::Unreachable(msg) => write!(f, "service unreachable: {}", msg),
            JobFailure::MissingResult => write!(f, "job completed without a result"),
        }
    }
}

/// Terminal or in-progress view of one remote job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteJob {
    pub id: Option<JobId>,
    pub status: JobStatus,
    pub result_url: Option<String>,
    pub failure: Option<JobFailure>,
}

impl RemoteJob {
    pub fn completed(id: JobId, result_url: String) -> Self {
        Self {
            id: Some(id),
            status: JobStatus::Completed,
            result_url: Some(result_url),
            failure: None,
        }
    }

    pub fn failed(id: Option<JobId>, failure: JobFailure) -> Self {
        Self {
            id,
            status: JobStatus::Failed,
            result_url: None,
            failure: Some(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_case_normalized() {
        assert_eq!(JobStatus::from_wire("COMPLETED"), Some(JobStatus::Completed));
        assert_eq!(JobStatus::from_wire(" Pending "), Some(JobStatus::Pending));
        assert_eq!(JobStatus::from_wire("Failed"), Some(JobStatus::Failed));
        assert_eq!(JobStatus::from_wire("succeeded"), Some(JobStatus::Completed));
        assert_eq!(JobStatus::from_wire("weird"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_failed_job_has_no_result() {
        let job = RemoteJob::failed(None, JobFailure::TimedOut { attempts: 30 });
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.result_url.is_none());
        assert_eq!(
            job.failure.unwrap().to_string(),
            "job timed out after 30 status checks"
        );
    }
}

/// Errors raised while building or rendering a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("A job needs at least a name or a stage")]
    MissingIdentity,

    #[error("Job '{job}' has an empty script")]
    EmptyScript { job: String },

    #[error("Job '{job}' cannot declare both a script and a trigger")]
    ScriptWithTrigger { job: String },

    #[error("Cache key accepts either an explicit key or a list of files, not both")]
    ConflictingCacheKey,

    #[error("Cache key prefix '{prefix}' only applies to a list of files")]
    PrefixWithoutFiles { prefix: String },

    #[error("Invalid cache key '{key}': a key cannot consist only of '.' characters")]
    InvalidCacheKey { key: String },

    #[error("Need on job '{job}' sets ref '{git_ref}' without a project")]
    RefWithoutProject { job: String, git_ref: String },

    #[error("Invalid remote include URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Trigger jobs accept between 1 and 3 includes, got {count}")]
    TriggerIncludes { count: usize },

    #[error("Retry count {count} is out of range, the maximum is 2")]
    InvalidRetry { count: u8 },

    #[error(
        "Job name '{name}' is produced by more than one job ({}). Provide a different name or stage when adding them to their sequences",
        jobs.join(", ")
    )]
    DuplicateJobName { name: String, jobs: Vec<String> },

    #[error("Job name '{job}' is a reserved top-level pipeline keyword")]
    ReservedJobName { job: String },

    #[error("Sequence #{sequence} contains itself")]
    Cycle { sequence: usize },

    #[error("Failed to serialize pipeline: {0}")]
    Serialize(String),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

//! Antidote Core Library
//!
//! The hypothesis evaluation pipeline: a restricted predicate compiler, a
//! sandboxed evaluator, a parallel batch executor over a file corpus, the
//! hypothesis store, validation sampling, scoring and run ranking, and the
//! search session that ties them together.

pub mod aggregator;
pub mod batch;
pub mod cancel;
pub mod collaborator;
pub mod config;
pub mod corpus;
pub mod domain;
pub mod metrics;
pub mod obs;
pub mod predicate;
pub mod reporting;
pub mod sampler;
pub mod sandbox;
pub mod scoring;
pub mod session;
pub mod store;
pub mod telemetry;

pub use domain::{
    AntidoteError, AttackType, Confidence, ErrorBreakdown, EvalErrorKind, EvalOutcome, FileId,
    FileRecord, GroundTruthLabel, GroundTruthSet, Hypothesis, HypothesisId, Metrics, Result,
    RunId, RunResult,
};

pub use aggregator::RunAggregator;
pub use batch::{run_batch, BatchConfig, BatchError, BatchOutcome, NoProgress, ProgressSink};
pub use cancel::CancellationToken;
pub use collaborator::{
    CollaboratorError, Excerpt, FallbackPolicy, GenerationRequest, HypothesisGenerator,
    NoFallback, Proposal, RetryPolicy, RoundRobinPool, ValidationJudge, ValidationRequest,
};
pub use config::{ConfigError, SessionConfig};
pub use corpus::{Corpus, CorpusError, FsCorpus, InMemoryCorpus};
pub use predicate::{compile, CompileError, CompileErrorKind, CompiledPredicate};
pub use reporting::{Grade, RiskVerdict, RunRecord, SessionReport};
pub use sampler::{Confirmations, ValidationBatch};
pub use sandbox::{evaluate, Budget};
pub use session::{evaluate_once, IterationOutcome, SearchSession};
pub use store::{HypothesisStore, Rejected, StoreError};
pub use telemetry::init_tracing;

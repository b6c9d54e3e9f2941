// formguard/src/lib.rs
//
// FormGuard: abuse detection and lead scoring for inbound form submissions.
//
//   sanitize  → bounded, markup-free Submission
//   state     → per-identifier fixed-window limiter + cadence detector
//   workers   → the six independent spam checks
//   engine    → verdict fusion, lead scoring, the admission pipeline, JSONL sink
//   eval      → labelled-dataset evaluation of the classifier

pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod events;
pub mod metrics;
pub mod sanitize;
pub mod state;
pub mod workers;

pub use config::Config;
pub use engine::fusion::SpamClassifier;
pub use engine::pipeline::Pipeline;
pub use events::{Decision, Outcome, RawSubmission, Submission};
pub use state::window::RateLimiter;

//! Pipeline failure kinds (`spec.md` §4.1 "Failure").

use snafu::Snafu;

#[derive(Debug, Snafu, Clone)]
pub enum PipelineError {
    #[snafu(display("stage {stage} instance {instance} failed: {detail}"))]
    InstanceFailed { stage: usize, instance: usize, detail: String },

    #[snafu(display("stage {stage} merge failed: {detail}"))]
    MergeFailed { stage: usize, detail: String },

    #[snafu(display("stage {stage} instance {instance} panicked"))]
    InstancePanicked { stage: usize, instance: usize },

    #[snafu(display("stage {stage} produced {got} sub-results with no merge function defined; exactly 1 required"))]
    MergeRequired { stage: usize, got: usize },
}

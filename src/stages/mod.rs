//! The pipeline's stages.
//!
//! Each stage reads what earlier stages left in the [`PipelineState`] and
//! writes its own output back. Routing between stages lives in
//! [`crate::pipeline`].

mod execute;
mod generate;
mod package;
mod review;
mod sample_data;

pub use execute::Executor;
pub use generate::Generator;
pub use package::{PackageMetadata, Packager};
pub use review::{parse_review, Reviewer};
pub use sample_data::SampleDataGenerator;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::state::PipelineState;

/// Identifies a stage in logs and in the run's stage trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Generate,
    GenerateSampleData,
    Execute,
    Review,
    Package,
}

impl StageName {
    /// All stages in execution order.
    pub const ALL: [StageName; 5] = [
        StageName::Generate,
        StageName::GenerateSampleData,
        StageName::Execute,
        StageName::Review,
        StageName::Package,
    ];

    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Generate => "generate",
            StageName::GenerateSampleData => "generate_sample_data",
            StageName::Execute => "execute",
            StageName::Review => "review",
            StageName::Package => "package",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of the pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Which stage this is.
    fn name(&self) -> StageName;

    /// Runs the stage against the shared state.
    ///
    /// An `Err` halts the pipeline.
    async fn run(&self, state: &mut PipelineState) -> Result<()>;
}

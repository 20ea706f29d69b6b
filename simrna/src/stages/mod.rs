pub mod amplification;
pub mod base;
pub mod breakage;
pub mod enzymatic;
pub mod nebulization;
pub mod reverse_transcription;
pub mod size_selection;

pub use amplification::{Amplification, AmplificationConfig};
pub use base::FragmentStage;
pub use breakage::{Breakage, UniformBreakage};
pub use enzymatic::Enzymatic;
pub use nebulization::{Nebulization, NebulizationConfig};
pub use reverse_transcription::{DisplacementRule, GcHistogram, ReverseTranscription, RtConfig};
pub use size_selection::{SelectionMode, SizeSelection, TargetDistribution, TargetSource};

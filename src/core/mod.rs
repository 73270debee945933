pub mod error;
pub mod profile;
pub mod session;
pub mod simulation;
pub mod story;

pub use error::{ContentError, SessionError};
pub use profile::{Role, UserProfile};
pub use session::{ScenarioState, Session, Stage};
pub use simulation::{NoiseSource, RandomNoise, SimStatus, SimulationTuning, StabilizationSim};
pub use story::{NodeContext, StoryContent, StoryOption, ANALYSIS_FALLBACK};

mod backend;
pub mod backends;
mod finding;
pub mod hazard;
pub mod posture;
pub mod suffocation;

pub use backend::{DetectorBackend, DetectorSet, PoseBackend, PoseLandmarks, RawDetection};
pub use backends::{StubBackend, StubPoseBackend};
pub use finding::{FaceFinding, Family, Finding, HazardFinding, Posture, PostureFinding};
pub use hazard::{HazardCategory, HazardTable};
pub use posture::PostureClassifier;
pub use suffocation::SuffocationMonitor;

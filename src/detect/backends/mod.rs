pub mod stub;

pub use stub::{StubBackend, StubPoseBackend};

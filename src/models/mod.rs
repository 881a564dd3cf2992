pub mod assessment;
pub mod consent;
pub mod crisis;
pub mod enums;
pub mod filters;
pub mod group_session;
pub mod medication;
pub mod mood;
pub mod progress_note;
pub mod support_group;
pub mod therapy_session;
pub mod treatment;

pub use assessment::*;
pub use consent::*;
pub use crisis::*;
pub use filters::*;
pub use group_session::*;
pub use medication::*;
pub use mood::*;
pub use progress_note::*;
pub use support_group::*;
pub use therapy_session::*;
pub use treatment::*;

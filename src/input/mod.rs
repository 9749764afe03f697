//! Touch input: gesture recognition and resource harvesting

pub mod gesture;
pub mod harvest;

pub use gesture::{Gesture, GestureConfig, GestureRecognizer};
pub use harvest::{Feedback, FeedbackKind, HarvestOutcome, Target, TouchConfig, TouchHarvester};

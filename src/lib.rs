pub mod catalog;
pub mod compositor;
pub mod config;
pub mod critique;
pub mod error;
pub mod history;
pub mod models;
pub mod orchestrator;
pub mod provider;
pub mod selection;
pub mod session;

pub use compositor::{BakedImage, ImageCompositor};
pub use config::{Config, CredentialStore};
pub use critique::CritiqueRequester;
pub use error::InkError;
pub use history::EditHistory;
pub use models::{Adjustments, Analysis, EditSnapshot, GenerationResult, Rotation, TattooSimulation};
pub use orchestrator::Orchestrator;
pub use provider::{Credential, PollPolicy, PredictionApi, ReplicateClient};
pub use selection::{SelectionBox, SelectionTool};
pub use session::EditSession;

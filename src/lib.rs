pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod llm;
pub mod matching;
pub mod models;

pub use config::EngineConfig;
pub use engine::{
    IngestReport, MinutesEngine, PassStatus, PassSummary, SessionId, SessionSnapshot,
    SynthesisReport, Transcriber,
};
pub use error::{EngineError, EngineResult, Violation, ViolationRule};
pub use io::{
    parse_agenda_file, parse_catalog_file, parse_fragments_file, HumanMinutes, MinutesReport,
};
pub use llm::{AnthropicClient, AnthropicConfig, Drafter, ExtractiveDrafter};
pub use models::{
    ActionSuggestion, Agenda, AgendaSubmission, EntryTarget, ItemId, ItemStatus, MinutesDocument,
    RawFragment, TemplateCatalog,
};

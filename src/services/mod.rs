pub mod engine;
pub mod executor;
pub mod loader;
pub mod planner;
pub mod range_parser;
pub mod session;
pub mod validator;

pub use engine::{LopdfEngine, PdfEngine};
pub use executor::{CancelHandle, DocumentOperationExecutor, OperationRequest};
pub use loader::DocumentLoader;
pub use planner::{DefinitionList, OperationListPlanner, OperationPlan};
pub use range_parser::{PageRangeParser, PageSet};
pub use session::{MergeSession, OutputTarget, RotateSession, SplitSession, WatermarkSession};
pub use validator::{FieldInput, RangeValidator, Validate};

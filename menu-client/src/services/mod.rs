pub mod file_policy;
pub mod menu_api;
pub mod menu_schema;
pub mod preview;
pub mod token;
pub mod transport;
pub mod upload_session;

pub use file_policy::{validate_batch, validate_files, FileValidation};
pub use menu_api::MenuApi;
pub use menu_schema::{
    add_category, add_item_to_category, create_empty_menu_data, validate_menu_data,
    SchemaValidation,
};
pub use preview::{PreviewHandle, PreviewRegistry};
pub use token::{StaticTokenProvider, TokenProvider};
pub use transport::{Transport, UploadEvent, UploadEvents};
pub use upload_session::{
    ImageUploader, SessionPhase, SessionSnapshot, StagedFileInfo, UploadOrchestrator,
};

pub mod error;
pub mod validation;
pub mod formats;
pub mod fs;
pub mod logging;
pub mod process;
pub mod reveal;
pub mod store;

pub use error::{SettingsError, SlimmerError, SlimmerResult, SubmitError, ValidationError};
pub use validation::{validate, validate_input_path};
pub use formats::{WorkbookFormat, format_from_path};
pub use logging::{LogControl, init_logging};
pub use fs::{describe_size_change, display_name, file_size};
pub use process::{NoWindowExt, std_command, tokio_command};
pub use reveal::{FileRevealer, NoopRevealer, SystemRevealer};
pub use store::{JsonFileStore, SettingsStore, SharedSettings};
#[cfg(feature = "desktop")]
pub use store::TauriSettingsStore;
#[cfg(feature = "desktop")]
pub use reveal::OpenerRevealer;

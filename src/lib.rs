//! Workspace facade crate.
//!
//! Re-exports the intake core so host applications can depend on
//! `resume-intake-workspace` alone. The `desktop-shims` feature (default)
//! brings in the reqwest/SQLite bridges and [`bootstrap_desktop`].

pub use core_intake::{
    AddFilesReport, BatchRun, BatchUploader, IncomingFile, IntakeError, QueueCounts, UploadConfig,
    UploadItem, UploadItemId, UploadStatus,
};
pub use core_runtime::config::CoreConfig;
pub use core_runtime::events::{CoreEvent, EventBus, PrecheckEvent, UploadEvent};

#[cfg(any(feature = "headless", feature = "desktop-shims"))]
pub use core_service::{CoreError, CoreService};

#[cfg(feature = "desktop-shims")]
pub use core_service::{bootstrap_desktop, DesktopOptions};

mod client;
mod store;

pub use client::{
    About, AboutUser, ApiErrorClass, DriveClient, DriveError, DriveFile, FOLDER_MIME_TYPE,
    FilePage, UPLOAD_MIME_TYPE,
};
pub use reqwest::StatusCode;
pub use store::RemoteStore;

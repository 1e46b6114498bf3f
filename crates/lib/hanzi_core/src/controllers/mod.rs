//! Screen-level state.
//!
//! Each controller owns the state one screen renders: the data it shows, a
//! loading flag and the message of the last failed call. Failures never wipe
//! data already shown. Optimistic updates are reverted when the backing call
//! fails.

pub mod account;
pub mod chat;
pub mod image_upload;
pub mod notifications;
pub mod word_form;
pub mod word_list;

pub use account::{AccountController, RegisterForm};
pub use chat::ChatController;
pub use image_upload::{ImageUploadController, ImageUploadState};
pub use notifications::NotificationsController;
pub use word_form::{WordForm, WordFormController};
pub use word_list::{WordListController, WordListState};

use crate::error::Result;

/// Stores the outcome of a call in `last_error` and passes it through.
pub(crate) fn record<T>(last_error: &mut Option<String>, result: Result<T>) -> Result<T> {
    *last_error = result.as_ref().err().map(ToString::to_string);
    result
}

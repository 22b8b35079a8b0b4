pub mod audio;
pub mod sonification;

pub use audio::serve_audio;
pub use sonification::sonificate;

use actix_web::web;

use crate::error::AppError;

/// JSON extractor settings that report malformed bodies as `{ "error": ... }`
/// with status 400.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| AppError::from(err).into())
}

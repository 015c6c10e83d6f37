pub mod frames;
pub mod health;
pub mod predictions;
pub mod state;

pub use frames::post_frame;
pub use health::{health_live, health_ready};
pub use predictions::{get_latest_prediction, list_predictions};
pub use state::{get_state, put_prediction_interval};

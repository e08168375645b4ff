use std::sync::Arc;
use wayfarer::Assistant;

pub struct AppState {
    pub assistant: Arc<Assistant>,
}

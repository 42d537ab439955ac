use thinkchat::{ChatError, SessionStorage};
use wasm_bindgen::JsValue;

/// localStorage key holding the serialized session list.
pub const STORAGE_KEY: &str = "chatSessions";

/// Sessions persisted under a single `localStorage` key.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorage;

impl LocalStorage {
    fn storage() -> Result<web_sys::Storage, ChatError> {
        web_sys::window()
            .ok_or_else(|| ChatError::storage("no window"))?
            .local_storage()
            .map_err(js_error)?
            .ok_or_else(|| ChatError::storage("localStorage unavailable"))
    }
}

impl SessionStorage for LocalStorage {
    fn load(&self) -> Result<Option<String>, ChatError> {
        Self::storage()?.get_item(STORAGE_KEY).map_err(js_error)
    }

    fn save(&self, payload: &str) -> Result<(), ChatError> {
        Self::storage()?.set_item(STORAGE_KEY, payload).map_err(js_error)
    }

    fn clear(&self) -> Result<(), ChatError> {
        Self::storage()?.remove_item(STORAGE_KEY).map_err(js_error)
    }
}

fn js_error(e: JsValue) -> ChatError {
    ChatError::storage(format!("{e:?}"))
}

//! Shared panic-payload formatting for the catch_unwind boundary every
//! worker loop wraps its cycle body in (§7: "No exception is allowed to
//! kill a worker thread").

use std::any::Any;

#[must_use]
pub fn describe_panic(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

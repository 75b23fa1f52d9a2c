//! JNI bindings for Android

use jni::objects::{JClass, JString};
use jni::sys::{jlong, jstring};
use jni::JNIEnv;

use crate::core::BridgeCore;
use crate::error::BridgeError;

fn bridge_from_handle<'a>(handle: jlong) -> Result<&'a BridgeCore, BridgeError> {
    if handle == 0 {
        return Err(BridgeError::InvalidParameter("Invalid handle".to_string()));
    }
    Ok(unsafe { &*(handle as *const BridgeCore) })
}

/// Initialize the bridge
/// Returns a handle to the BridgeCore instance
#[no_mangle]
pub extern "system" fn Java_com_example_casttotvscreen_CastBridge_init(
    mut env: JNIEnv,
    _class: JClass,
    config_json: JString,
) -> jlong {
    let result = || -> Result<jlong, BridgeError> {
        let config_str: String = env.get_string(&config_json)?.into();
        let bridge = BridgeCore::init(&config_str)?;
        let handle = Box::into_raw(Box::new(bridge)) as jlong;
        Ok(handle)
    }();

    match result {
        Ok(handle) => handle,
        Err(e) => {
            let _ = env.throw_new("java/lang/RuntimeException", e.to_string());
            0
        }
    }
}

/// Destroy the BridgeCore instance, stopping any active session
#[no_mangle]
pub extern "system" fn Java_com_example_casttotvscreen_CastBridge_destroy(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) {
    if handle != 0 {
        unsafe {
            let _ = Box::from_raw(handle as *mut BridgeCore);
        }
    }
}

/// Channel name the host should register the method handler under
#[no_mangle]
pub extern "system" fn Java_com_example_casttotvscreen_CastBridge_channelName(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jstring {
    let result = || -> Result<jstring, BridgeError> {
        let bridge = bridge_from_handle(handle)?;
        Ok(env.new_string(bridge.channel_name())?.into_raw())
    }();

    match result {
        Ok(name) => name,
        Err(e) => {
            let _ = env.throw_new("java/lang/RuntimeException", e.to_string());
            std::ptr::null_mut()
        }
    }
}

/// Handle one channel call
/// Returns the JSON reply envelope, or null when the method is not implemented
/// Note: This blocks until the dispatcher replies - call from a background thread
#[no_mangle]
pub extern "system" fn Java_com_example_casttotvscreen_CastBridge_invoke(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
    request_json: JString,
) -> jstring {
    let result = || -> Result<Option<jstring>, BridgeError> {
        let bridge = bridge_from_handle(handle)?;
        let request: String = env.get_string(&request_json)?.into();

        let envelope = bridge.invoke(request.as_bytes());
        if envelope.is_empty() {
            return Ok(None);
        }

        let envelope = String::from_utf8(envelope)
            .map_err(|e| BridgeError::Codec(format!("reply is not UTF-8: {}", e)))?;
        Ok(Some(env.new_string(envelope)?.into_raw()))
    }();

    match result {
        Ok(Some(envelope)) => envelope,
        Ok(None) => std::ptr::null_mut(),
        Err(e) => {
            let _ = env.throw_new("java/lang/RuntimeException", e.to_string());
            std::ptr::null_mut()
        }
    }
}

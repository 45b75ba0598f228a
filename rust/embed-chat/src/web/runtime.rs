use std::time::Duration;

use serde_json::Value;
use wasm_bindgen::{JsCast, prelude::*};
use web_sys::{Document, HtmlFormElement, HtmlInputElement, MessageEvent, MessagePort, Window};

use super::{js_to_json, json_to_js, transport_error};
use crate::{
    EmbedError, LaunchForm,
    transport::{Port, PortHandler, Runtime, Subscription, WindowHandler, WindowMessage},
};

impl Port for MessagePort {
    fn start(&self) {
        MessagePort::start(self);
    }

    fn post(&self, message: &Value) -> Result<(), EmbedError> {
        self.post_message(&json_to_js(message)?)
            .map_err(transport_error)
    }

    fn close(&self) {
        MessagePort::close(self);
    }
}

enum Registration {
    WindowListener {
        window: Window,
        closure: Closure<dyn FnMut(MessageEvent)>,
    },
    PortListener {
        port: MessagePort,
        closure: Closure<dyn FnMut(MessageEvent)>,
    },
    Interval {
        window: Window,
        id: i32,
        closure: Closure<dyn FnMut()>,
    },
    Timeout {
        window: Window,
        id: i32,
        closure: Closure<dyn FnMut()>,
    },
}

/// A live listener or timer. Cancelling detaches it immediately; the Rust
/// closure behind it is dropped on a later turn of the event loop, because
/// the closure may be the one currently running.
pub struct WebHandle(Option<Registration>);

impl Subscription for WebHandle {
    fn cancel(&mut self) {
        let Some(registration) = self.0.take() else {
            return;
        };

        match registration {
            Registration::WindowListener { window, closure } => {
                let _ = window.remove_event_listener_with_callback(
                    "message",
                    closure.as_ref().unchecked_ref(),
                );
                defer_drop(closure);
            }
            Registration::PortListener { port, closure } => {
                port.set_onmessage(None);
                defer_drop(closure);
            }
            Registration::Interval {
                window,
                id,
                closure,
            } => {
                window.clear_interval_with_handle(id);
                defer_drop(closure);
            }
            Registration::Timeout {
                window,
                id,
                closure,
            } => {
                window.clear_timeout_with_handle(id);
                defer_drop(closure);
            }
        }
    }
}

impl Drop for WebHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn defer_drop<T: 'static>(value: T) {
    wasm_bindgen_futures::spawn_local(async move {
        drop(value);
    });
}

/// [`Runtime`] backed by the browser: the Host's own `window` and the
/// Guest iframe's `contentWindow`.
#[derive(Clone)]
pub struct WebRuntime {
    host: Window,
    guest: Window,
}

impl WebRuntime {
    /// Drive the iframe whose `contentWindow` is `guest`
    pub fn new(guest: Window) -> Result<Self, EmbedError> {
        let host = web_sys::window()
            .ok_or_else(|| EmbedError::Transport("no global `window`".into()))?;
        Ok(Self { host, guest })
    }

    fn millis(duration: Duration) -> i32 {
        i32::try_from(duration.as_millis()).unwrap_or(i32::MAX)
    }
}

impl Runtime for WebRuntime {
    type Port = MessagePort;
    type Handle = WebHandle;

    fn post_to_guest(&self, message: &Value, target_origin: &str) -> Result<(), EmbedError> {
        self.guest
            .post_message(&json_to_js(message)?, target_origin)
            .map_err(transport_error)
    }

    fn submit_form(&self, form: &LaunchForm) -> Result<(), EmbedError> {
        // Before the first navigation the iframe holds a same-origin
        // `about:blank` document, so its DOM is reachable. A cross-origin
        // frame throws on `document`; `Reflect::get` turns that into an Err.
        let document: Document = js_sys::Reflect::get(&self.guest, &"document".into())
            .map_err(transport_error)?
            .dyn_into()
            .map_err(|_| EmbedError::Transport("guest document is not accessible".into()))?;

        let element: HtmlFormElement = document
            .create_element("form")
            .map_err(transport_error)?
            .dyn_into()
            .map_err(transport_error)?;
        element.set_action(form.action.as_str());
        element.set_method(LaunchForm::METHOD);

        for (name, value) in &form.fields {
            let input: HtmlInputElement = document
                .create_element("input")
                .map_err(transport_error)?
                .dyn_into()
                .map_err(transport_error)?;
            input.set_type("hidden");
            input.set_name(name);
            input.set_value(value);
            element.append_child(&input).map_err(transport_error)?;
        }

        let body = document
            .body()
            .ok_or_else(|| EmbedError::Transport("guest document has no body".into()))?;
        body.append_child(&element).map_err(transport_error)?;
        element.submit().map_err(transport_error)
    }

    fn listen_window(
        &self,
        mut handler: WindowHandler<MessagePort>,
    ) -> Result<WebHandle, EmbedError> {
        let closure = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            let data = event.data();
            let reply_to = js_sys::Reflect::get(&data, &"replyTo".into())
                .ok()
                .and_then(|port| port.dyn_into::<MessagePort>().ok());

            handler(WindowMessage {
                origin: Some(event.origin()),
                data: js_to_json(&data).unwrap_or(Value::Null),
                reply_to,
            });
        });

        self.host
            .add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
            .map_err(transport_error)?;

        Ok(WebHandle(Some(Registration::WindowListener {
            window: self.host.clone(),
            closure,
        })))
    }

    fn listen_port(
        &self,
        port: &MessagePort,
        mut handler: PortHandler,
    ) -> Result<WebHandle, EmbedError> {
        let closure = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            match js_to_json(&event.data()) {
                Some(message) => handler(message),
                None => tracing::debug!("Dropping port message that is not JSON"),
            }
        });

        port.set_onmessage(Some(closure.as_ref().unchecked_ref()));

        Ok(WebHandle(Some(Registration::PortListener {
            port: port.clone(),
            closure,
        })))
    }

    fn interval(
        &self,
        period: Duration,
        mut tick: Box<dyn FnMut()>,
    ) -> Result<WebHandle, EmbedError> {
        let closure = Closure::<dyn FnMut()>::new(move || tick());
        let id = self
            .host
            .set_interval_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                Self::millis(period),
            )
            .map_err(transport_error)?;

        Ok(WebHandle(Some(Registration::Interval {
            window: self.host.clone(),
            id,
            closure,
        })))
    }

    fn timeout(&self, delay: Duration, fire: Box<dyn FnOnce()>) -> Result<WebHandle, EmbedError> {
        let mut fire = Some(fire);
        let closure = Closure::<dyn FnMut()>::new(move || {
            if let Some(fire) = fire.take() {
                fire();
            }
        });
        let id = self
            .host
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                Self::millis(delay),
            )
            .map_err(transport_error)?;

        Ok(WebHandle(Some(Registration::Timeout {
            window: self.host.clone(),
            id,
            closure,
        })))
    }
}

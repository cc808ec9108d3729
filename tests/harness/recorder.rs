//! Event log fixture.

use std::sync::Arc;

use parking_lot::Mutex;
use wsession::WebSocket;

/// Records every delivered event as a short string.
///
/// `open`, `message:<text>`, `binary:<len>`, `error:<display>`,
/// `close:<code>:<reason>`.
#[derive(Clone, Default)]
pub struct Recorder {
    log: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn attach(ws: &WebSocket) -> Self {
        let recorder = Self::default();

        let log = recorder.log.clone();
        ws.on_open(move || log.lock().push("open".to_owned()));

        let log = recorder.log.clone();
        ws.on_message(move |msg| {
            let entry = match msg.as_text() {
                Some(text) => format!("message:{text}"),
                None => format!("binary:{}", msg.len()),
            };
            log.lock().push(entry);
        });

        let log = recorder.log.clone();
        ws.on_error(move |err| log.lock().push(format!("error:{err}")));

        let log = recorder.log.clone();
        ws.on_close(move |info| {
            log.lock()
                .push(format!("close:{}:{}", info.code.as_u16(), info.reason));
        });

        recorder
    }

    pub fn entries(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.log.lock().iter().any(|e| e == entry)
    }

    pub fn is_closed(&self) -> bool {
        self.count("close:") > 0
    }
}

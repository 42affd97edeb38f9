mod delay;
mod http;
mod telemetry;

pub use self::delay::{Delay, DelayElapsed, DelayOperation};
pub use self::http::{
    Http, HttpError, HttpHeaders, HttpMethod, HttpOperation, HttpRequest, HttpResponse,
    HttpResult, ValidatedUrl,
};
pub use self::telemetry::{Telemetry, TelemetryLevel, TelemetryOperation};

// Crux's built-in Render capability covers view invalidation as-is.
pub use crux_core::render::Render;

use crate::{App, Event};

// The Effect derive resolves the operation type from each field's literal
// type, so the fields spell out the generic forms directly.
#[derive(crux_core::macros::Effect)]
#[effect(app = "App")]
pub struct Capabilities {
    pub render: Render<Event>,
    pub http: Http<Event>,
    pub delay: Delay<Event>,
    pub telemetry: Telemetry<Event>,
}

impl Capabilities {
    pub fn render(&self) -> &Render<Event> {
        &self.render
    }

    pub fn http(&self) -> &Http<Event> {
        &self.http
    }

    pub fn delay(&self) -> &Delay<Event> {
        &self.delay
    }

    pub fn telemetry(&self) -> &Telemetry<Event> {
        &self.telemetry
    }
}

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

/// Fire-and-forget diagnostics. Nothing user-visible flows through here; the
/// shell forwards records to whatever logging backend it owns.
#[derive(Clone)]
pub struct Telemetry<Ev> {
    context: CapabilityContext<TelemetryOperation, Ev>,
}

impl<Ev> Capability<Ev> for Telemetry<Ev> {
    type Operation = TelemetryOperation;
    type MappedSelf<MappedEv> = Telemetry<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Telemetry::new(self.context.map_event(f))
    }
}

impl<Ev> Telemetry<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<TelemetryOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn event(&self, name: &str) {
        self.record(TelemetryOperation::Record {
            level: TelemetryLevel::Info,
            name: name.to_string(),
            detail: None,
        });
    }

    pub fn event_with(&self, name: &str, detail: impl Into<String>) {
        self.record(TelemetryOperation::Record {
            level: TelemetryLevel::Info,
            name: name.to_string(),
            detail: Some(detail.into()),
        });
    }

    pub fn warn(&self, name: &str, detail: impl Into<String>) {
        self.record(TelemetryOperation::Record {
            level: TelemetryLevel::Warn,
            name: name.to_string(),
            detail: Some(detail.into()),
        });
    }

    pub fn error(&self, name: &str, detail: impl Into<String>) {
        self.record(TelemetryOperation::Record {
            level: TelemetryLevel::Error,
            name: name.to_string(),
            detail: Some(detail.into()),
        });
    }

    fn record(&self, operation: TelemetryOperation) {
        let context = self.context.clone();
        self.context.spawn(async move {
            context.notify_shell(operation).await;
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TelemetryLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TelemetryOperation {
    Record {
        level: TelemetryLevel,
        name: String,
        detail: Option<String>,
    },
}

impl Operation for TelemetryOperation {
    type Output = ();
}
